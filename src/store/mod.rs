//! Persistence layer: libSQL-backed storage for per-user planner state.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::StateStore;
