//! Error types for the study planner.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Storage failures. Every variant is surfaced to callers as-is; nothing in
/// the crate retries on its own.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("State for user {user_id} already exists")]
    Conflict { user_id: String },

    #[error("No state found for user {user_id}")]
    NotFound { user_id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DatabaseError {
    /// Whether repeating the same operation may succeed.
    ///
    /// A creation conflict means another request created the record first,
    /// so a repeated read will find it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DatabaseError::Conflict { .. })
    }
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("User id must not be empty")]
    InvalidUserId,

    #[error("Storage failure: {0}")]
    Storage(#[from] DatabaseError),
}

/// Client-side transport failures. Logged, never shown, never retried.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Request failed with status {status}")]
    Status { status: u16 },

    #[error("Invalid response body: {0}")]
    Decode(String),
}
