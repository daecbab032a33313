//! Console service configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::batch::DEFAULT_DELIMITER;
use crate::error::{QueryServiceError, QueryServiceResult};
use crate::executor::DEFAULT_CONTENT_THRESHOLD;
use crate::manager::DEFAULT_WORKER_POOL_SIZE;

/// Configuration for the console service
///
/// Every field has a default, so a TOML file only needs to name what it
/// changes. Limits set to 0 are unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Number of batches that may run at the same time
    pub worker_pool_size: usize,
    /// Idle time in milliseconds after which a session expires (0 = never)
    pub session_timeout_ms: u64,
    /// Time in milliseconds a batch may run before it is interrupted
    pub batch_wait_timeout_ms: Option<u64>,
    /// Keep running a batch after a statement fails
    pub continue_on_error: bool,
    pub default_query_row_limit: usize,
    pub max_query_row_limit: usize,
    /// Maximum script length in bytes
    pub max_sql_length: usize,
    /// Maximum number of statements per script
    pub max_statement_count: usize,
    /// Cells larger than this are moved to the content store
    pub virtual_content_threshold_bytes: usize,
    pub default_delimiter: String,
    /// How long `poll` waits for a batch to finish
    pub poll_wait_ms: u64,
    /// Parent directory for session spool directories (system temp if unset)
    pub spool_dir: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            session_timeout_ms: 30 * 60 * 1000, // 30 minutes
            batch_wait_timeout_ms: None,
            continue_on_error: false,
            default_query_row_limit: 1000,
            max_query_row_limit: 100_000,
            max_sql_length: 0,
            max_statement_count: 0,
            virtual_content_threshold_bytes: DEFAULT_CONTENT_THRESHOLD,
            default_delimiter: DEFAULT_DELIMITER.to_string(),
            poll_wait_ms: 3000,
            spool_dir: None,
        }
    }
}

impl ConsoleConfig {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse console config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read console config from {:?}", path))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> QueryServiceResult<()> {
        if self.worker_pool_size == 0 {
            return Err(QueryServiceError::Config(
                "worker_pool_size must be greater than 0".into(),
            ));
        }
        if self.virtual_content_threshold_bytes == 0 {
            return Err(QueryServiceError::Config(
                "virtual_content_threshold_bytes must be greater than 0".into(),
            ));
        }
        if self.default_delimiter.is_empty()
            || self.default_delimiter.chars().any(char::is_whitespace)
        {
            return Err(QueryServiceError::Config(format!(
                "invalid default_delimiter {:?}",
                self.default_delimiter
            )));
        }
        if self.max_query_row_limit > 0 && self.default_query_row_limit > self.max_query_row_limit {
            return Err(QueryServiceError::Config(format!(
                "default_query_row_limit ({}) cannot exceed max_query_row_limit ({})",
                self.default_query_row_limit, self.max_query_row_limit
            )));
        }
        Ok(())
    }

    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    pub fn with_session_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.session_timeout_ms = timeout_ms;
        self
    }

    pub fn with_batch_wait_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.batch_wait_timeout_ms = timeout_ms;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_row_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.default_query_row_limit = default_limit;
        self.max_query_row_limit = max_limit;
        self
    }

    pub fn with_max_sql_length(mut self, max: usize) -> Self {
        self.max_sql_length = max;
        self
    }

    pub fn with_max_statement_count(mut self, max: usize) -> Self {
        self.max_statement_count = max;
        self
    }

    pub fn with_virtual_content_threshold(mut self, bytes: usize) -> Self {
        self.virtual_content_threshold_bytes = bytes;
        self
    }

    pub fn with_default_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.default_delimiter = delimiter.into();
        self
    }

    pub fn with_poll_wait_ms(mut self, wait_ms: u64) -> Self {
        self.poll_wait_ms = wait_ms;
        self
    }

    pub fn with_spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }

    pub fn session_timeout(&self) -> Option<Duration> {
        (self.session_timeout_ms > 0).then(|| Duration::from_millis(self.session_timeout_ms))
    }

    pub fn batch_wait_timeout(&self) -> Option<Duration> {
        self.batch_wait_timeout_ms.map(Duration::from_millis)
    }

    pub fn poll_wait(&self) -> Duration {
        Duration::from_millis(self.poll_wait_ms)
    }

    /// Row limit to apply for a request, clamped to the configured maximum.
    ///
    /// A requested limit of 0 means "as many as allowed".
    pub fn effective_row_limit(&self, requested: Option<usize>) -> Option<usize> {
        let limit = requested.unwrap_or(self.default_query_row_limit);
        match (limit, self.max_query_row_limit) {
            (0, 0) => None,
            (0, max) => Some(max),
            (limit, 0) => Some(limit),
            (limit, max) => Some(limit.min(max)),
        }
    }
}
