//! `StateStore` trait: the keyed get/create/update capability the gateway
//! needs from a document store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::planner::{PlannerState, ToolsState, UserState};

/// Backend-agnostic store for per-user planner state.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Load the record for `user_id`, if one exists.
    async fn get_state(&self, user_id: &str) -> Result<Option<UserState>, DatabaseError>;

    /// Insert a new record.
    ///
    /// Fails with [`DatabaseError::Conflict`] when a record for the same
    /// `user_id` already exists; the store never holds two.
    async fn create_state(&self, state: &UserState) -> Result<(), DatabaseError>;

    /// Overwrite the planner section and `updated_at` of an existing record.
    /// The tools section is left as stored.
    ///
    /// Fails with [`DatabaseError::NotFound`] when no record exists.
    async fn update_planner(
        &self,
        user_id: &str,
        planner: &PlannerState,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// Overwrite the tools section and `updated_at` of an existing record.
    /// The planner section is left as stored.
    async fn update_tools(
        &self,
        user_id: &str,
        tools: &ToolsState,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;
}
