//! Client configuration
//!
//! JSON file, every field optional:
//!
//! ```json
//! {
//!   "default_cache_policy": "cache_else_network",
//!   "default_max_cache_age_secs": 300,
//!   "log_level": "info",
//!   "cache_file": "/var/lib/app/objquery-cache.json"
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{CacheError, CachePolicy, CacheStore};
use crate::executor::ExecutorConfig;
use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::query::{QueryResult, QuerySpec};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "OBJQ_CONFIG_IO",
            Self::Parse(_) => "OBJQ_CONFIG_PARSE",
            Self::Invalid(_) => "OBJQ_CONFIG_INVALID",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Policy given to queries built through `query()`
    #[serde(default)]
    pub default_cache_policy: CachePolicy,

    /// Max cache age when a query sets none; absent means never stale
    #[serde(default)]
    pub default_max_cache_age_secs: Option<u64>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Snapshot file for cache persistence across restarts
    #[serde(default)]
    pub cache_file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_cache_policy: CachePolicy::default(),
            default_max_cache_age_secs: None,
            log_level: default_log_level(),
            cache_file: None,
        }
    }
}

impl ClientConfig {
    /// Reads and validates the config file at `path`
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&content)?;

        let path_str = path.display().to_string();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("log_level", &config.log_level),
                ("path", &path_str),
                ("policy", config.default_cache_policy.as_str()),
            ],
        );
        Ok(config)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: ClientConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.severity()?;
        if let Some(path) = &self.cache_file {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::invalid("cache_file must not be empty"));
            }
        }
        Ok(())
    }

    pub fn severity(&self) -> ConfigResult<Severity> {
        self.log_level.parse().map_err(ConfigError::invalid)
    }

    /// Sets the process-wide log level
    pub fn apply_logging(&self) -> ConfigResult<()> {
        Logger::set_min_severity(self.severity()?);
        Ok(())
    }

    pub fn default_max_cache_age(&self) -> Option<Duration> {
        self.default_max_cache_age_secs.map(Duration::from_secs)
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            default_max_cache_age: self.default_max_cache_age(),
        }
    }

    /// New query on `collection` carrying the configured cache defaults
    pub fn query(&self, collection: &str) -> QueryResult<QuerySpec> {
        let mut spec = QuerySpec::new(collection)?;
        spec.set_cache_policy(self.default_cache_policy, self.default_max_cache_age());
        Ok(spec)
    }

    /// Loads the configured snapshot into `store`.
    ///
    /// No configured file, or a file that does not exist yet, loads nothing.
    pub fn restore_cache(&self, store: &CacheStore) -> Result<usize, CacheError> {
        match &self.cache_file {
            Some(path) if path.exists() => store.load_from(path),
            _ => Ok(0),
        }
    }

    /// Writes `store` to the configured snapshot, if any
    pub fn persist_cache(&self, store: &CacheStore) -> Result<usize, CacheError> {
        match &self.cache_file {
            Some(path) => store.save_to(path),
            None => Ok(0),
        }
    }
}
