//! Study planner: per-user planner state with server-side sanitization and
//! a best-effort syncing client.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod planner;
pub mod store;
