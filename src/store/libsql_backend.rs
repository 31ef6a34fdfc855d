//! libSQL backend: async `StateStore` implementation.
//!
//! Planner and tools are stored as JSON text columns; `user_id` carries a
//! UNIQUE constraint so concurrent first accesses cannot create two rows.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::planner::{PlannerState, ToolsState, UserState};
use crate::store::migrations;
use crate::store::traits::StateStore;

const STATE_COLUMNS: &str = "id, user_id, planner, tools, created_at, updated_at";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database. Data is lost when the backend drops.
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

/// Map a libsql Row to a UserState.
///
/// Column order matches STATE_COLUMNS:
/// 0:id, 1:user_id, 2:planner, 3:tools, 4:created_at, 5:updated_at
fn row_to_state(row: &libsql::Row) -> Result<UserState, DatabaseError> {
    let read = |idx: i32| {
        row.get::<String>(idx)
            .map_err(|e| DatabaseError::Query(format!("read column {idx}: {e}")))
    };
    let id_str = read(0)?;
    let planner_str = read(2)?;
    let tools_str = read(3)?;

    let planner: PlannerState = serde_json::from_str(&planner_str)
        .map_err(|e| DatabaseError::Serialization(format!("planner column: {e}")))?;
    let tools: ToolsState = serde_json::from_str(&tools_str)
        .map_err(|e| DatabaseError::Serialization(format!("tools column: {e}")))?;

    Ok(UserState {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        user_id: read(1)?,
        planner,
        tools,
        created_at: parse_datetime(&read(4)?),
        updated_at: parse_datetime(&read(5)?),
    })
}

#[async_trait]
impl StateStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn get_state(&self, user_id: &str) -> Result<Option<UserState>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {STATE_COLUMNS} FROM user_states WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_state: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_state(&row).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_state: {e}"))),
        }
    }

    async fn create_state(&self, state: &UserState) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let inserted = conn
            .execute(
                &format!(
                    "INSERT INTO user_states ({STATE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT (user_id) DO NOTHING"
                ),
                params![
                    state.id.to_string(),
                    state.user_id.as_str(),
                    to_json(&state.planner)?,
                    to_json(&state.tools)?,
                    state.created_at.to_rfc3339(),
                    state.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_state: {e}")))?;

        if inserted == 0 {
            return Err(DatabaseError::Conflict {
                user_id: state.user_id.clone(),
            });
        }
        debug!(user_id = %state.user_id, id = %state.id, "Created user state");
        Ok(())
    }

    async fn update_planner(
        &self,
        user_id: &str,
        planner: &PlannerState,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.update_column("planner", user_id, to_json(planner)?, updated_at).await
    }

    async fn update_tools(
        &self,
        user_id: &str,
        tools: &ToolsState,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.update_column("tools", user_id, to_json(tools)?, updated_at).await
    }
}

impl LibSqlBackend {
    /// Write one JSON section. `column` is always a fixed name, never input.
    async fn update_column(
        &self,
        column: &'static str,
        user_id: &str,
        json: String,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let updated = self
            .conn()
            .execute(
                &format!("UPDATE user_states SET {column} = ?2, updated_at = ?3 WHERE user_id = ?1"),
                params![user_id, json, updated_at.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update {column}: {e}")))?;

        if updated == 0 {
            return Err(DatabaseError::NotFound {
                user_id: user_id.to_string(),
            });
        }
        Ok(())
    }
}
