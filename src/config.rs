//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::planner::PlanMergePolicy;

/// Database location used when `STUDY_PLANNER_DB_PATH` is not set.
pub const DEFAULT_DB_PATH: &str = "./data/study-planner.db";

/// Listen port used when `PORT` is not set.
pub const DEFAULT_PORT: u16 = 4000;

/// API base URL used by the client when none is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:4000/api";

/// Fixed user identifier for the single-user widget.
pub const DEFAULT_USER_ID: &str = "default-user";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// libSQL database file, or `:memory:`.
    pub db_path: PathBuf,
    /// Whether `db_path` came from the environment.
    pub db_path_from_env: bool,
    /// Origins allowed for cross-origin requests. Empty allows any origin.
    pub allowed_origins: Vec<String>,
    /// Listen port.
    pub port: u16,
    /// How `lastPlan` updates that fail sanitization are merged.
    pub plan_policy: PlanMergePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            db_path_from_env: false,
            allowed_origins: Vec::new(),
            port: DEFAULT_PORT,
            plan_policy: PlanMergePolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Build the configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("STUDY_PLANNER_DB_PATH").filter(|s| !s.trim().is_empty());
        let db_path_from_env = db_path.is_some();
        let db_path = db_path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let allowed_origins = parse_origins(&lookup("ALLOWED_ORIGINS").unwrap_or_default());

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "PORT".into(),
                message: format!("{raw:?}: {e}"),
            })?,
            None => DEFAULT_PORT,
        };

        let plan_policy = match lookup("STUDY_PLANNER_PLAN_POLICY") {
            Some(raw) => raw.parse().map_err(|message| ConfigError::InvalidValue {
                key: "STUDY_PLANNER_PLAN_POLICY".into(),
                message,
            })?,
            None => PlanMergePolicy::default(),
        };

        Ok(Self {
            db_path,
            db_path_from_env,
            allowed_origins,
            port,
            plan_policy,
        })
    }

    /// Whether the database lives only in memory.
    pub fn is_in_memory(&self) -> bool {
        self.db_path.as_os_str() == ":memory:"
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the state API, without a trailing slash.
    pub api_base_url: String,
    /// User whose state this client mirrors.
    pub user_id: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
        }
    }
}

impl ClientConfig {
    /// Build the configuration from environment variables.
    pub fn from_env() -> Self {
        let api_base_url = std::env::var("STUDY_PLANNER_API_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        Self::new(api_base_url)
    }

    /// Client for the default user against `api_base_url`.
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
