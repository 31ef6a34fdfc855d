//! REST endpoints for per-user planner and tools state.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::StateError;
use crate::planner::{PlannerUpdate, StateGateway, ToolsUpdate};

/// Shared state for the state routes.
#[derive(Clone)]
pub struct ApiState {
    pub gateway: Arc<StateGateway>,
}

/// JSON error body `{message, error}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
    error: String,
    retryable: bool,
}

impl ApiError {
    fn from_state(message: &'static str, err: StateError) -> Self {
        let (status, retryable) = match &err {
            StateError::InvalidUserId => (StatusCode::BAD_REQUEST, false),
            StateError::Storage(db) if db.is_retryable() => (StatusCode::CONFLICT, true),
            StateError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, false),
        };
        if status.is_server_error() {
            error!(error = %err, "{message}");
        } else {
            warn!(error = %err, "{message}");
        }
        Self {
            status,
            message,
            error: err.to_string(),
            retryable,
        }
    }

    fn bad_body(message: &'static str, err: serde_json::Error) -> Self {
        warn!(error = %err, "Rejected malformed request body");
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
            error: format!("Invalid JSON body: {err}"),
            retryable: false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "message": self.message,
            "error": self.error,
        });
        if self.retryable {
            body["retryable"] = json!(true);
        }
        (self.status, Json(body)).into_response()
    }
}

/// Parse a partial-update body. An empty or `null` body is an empty update.
fn parse_update<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    match serde_json::from_slice::<serde_json::Value>(body)? {
        serde_json::Value::Null => Ok(T::default()),
        value => serde_json::from_value(value),
    }
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// GET /api/state/{user_id}
///
/// Returns `{planner, tools}`, creating a default record on first access.
async fn get_state(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .gateway
        .get_state(&user_id)
        .await
        .map_err(|e| ApiError::from_state("Unable to fetch state", e))?;
    Ok(Json(view))
}

/// PUT /api/state/{user_id}/planner
async fn update_planner(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    const FAILED: &str = "Unable to update planner";
    let update: PlannerUpdate =
        parse_update(&body).map_err(|e| ApiError::bad_body(FAILED, e))?;
    let planner = state
        .gateway
        .update_planner(&user_id, &update)
        .await
        .map_err(|e| ApiError::from_state(FAILED, e))?;
    Ok(Json(json!({ "planner": planner })))
}

/// PUT /api/state/{user_id}/tools
async fn update_tools(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    const FAILED: &str = "Unable to update tools";
    let update: ToolsUpdate = parse_update(&body).map_err(|e| ApiError::bad_body(FAILED, e))?;
    let tools = state
        .gateway
        .update_tools(&user_id, &update)
        .await
        .map_err(|e| ApiError::from_state(FAILED, e))?;
    Ok(Json(json!({ "tools": tools })))
}

/// Build the state REST routes.
pub fn state_routes(gateway: Arc<StateGateway>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/state/{user_id}", get(get_state))
        .route("/api/state/{user_id}/planner", put(update_planner))
        .route("/api/state/{user_id}/tools", put(update_tools))
        .with_state(ApiState { gateway })
}

/// CORS policy for the widget's origins. An empty list allows any origin.
/// The opaque `null` origin (pages opened from `file://`) is always allowed.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let mut origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring unparseable allowed origin");
                None
            }
        })
        .collect();
    origins.push(HeaderValue::from_static("null"));
    layer.allow_origin(AllowOrigin::list(origins))
}

/// The full application: state routes plus CORS and request tracing.
pub fn app(gateway: Arc<StateGateway>, allowed_origins: &[String]) -> Router {
    state_routes(gateway)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}
