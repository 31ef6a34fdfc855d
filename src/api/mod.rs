//! HTTP API: axum routes over the state gateway.

pub mod routes;

pub use routes::{ApiState, app, cors_layer, state_routes};
