//! HTTP client for the state API.

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::planner::{PlannerState, ToolsState};

/// Thin reqwest wrapper bound to one user's state endpoints.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct StateApi {
    base_url: String,
    user_id: String,
    client: reqwest::Client,
}

impl StateApi {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            user_id: config.user_id.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn state_url(&self) -> String {
        format!("{}/state/{}", self.base_url, self.user_id)
    }

    /// Fetch `{planner, tools}`. The body is returned loosely typed; callers
    /// validate field by field.
    pub async fn fetch_state(&self) -> Result<Value, SyncError> {
        let response = self.client.get(self.state_url()).send().await?;
        ensure_success(response.status())?;
        response
            .json::<Value>()
            .await
            .map_err(|e| SyncError::Decode(e.to_string()))
    }

    /// Send the full planner as a partial update.
    pub async fn put_planner(&self, planner: &PlannerState) -> Result<(), SyncError> {
        self.put(&format!("{}/planner", self.state_url()), planner).await
    }

    /// Send the tools state as a partial update.
    pub async fn put_tools(&self, tools: &ToolsState) -> Result<(), SyncError> {
        self.put(&format!("{}/tools", self.state_url()), tools).await
    }

    async fn put<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<(), SyncError> {
        let response = self.client.put(url).json(body).send().await?;
        ensure_success(response.status())
    }
}

fn ensure_success(status: StatusCode) -> Result<(), SyncError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(SyncError::Status {
            status: status.as_u16(),
        })
    }
}
