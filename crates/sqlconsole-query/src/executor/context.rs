use std::sync::Arc;

use uuid::Uuid;

use super::StatusBoard;
use crate::manager::ErrorPolicy;

/// Per-batch execution settings, already resolved against the service config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSettings {
    /// Maximum rows kept per result set; `None` keeps everything
    pub row_limit: Option<usize>,
    pub include_column_metadata: bool,
    /// Auto-commit mode to align the connection to before the batch runs
    pub auto_commit: Option<bool>,
    pub policy: ErrorPolicy,
    /// Batch wait timeout in milliseconds, reported in timeout errors
    pub wait_timeout_ms: Option<u64>,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            row_limit: None,
            include_column_metadata: true,
            auto_commit: None,
            policy: ErrorPolicy::default(),
            wait_timeout_ms: None,
        }
    }
}

impl ExecutionSettings {
    pub fn with_row_limit(mut self, limit: Option<usize>) -> Self {
        self.row_limit = limit;
        self
    }

    pub fn with_column_metadata(mut self, include: bool) -> Self {
        self.include_column_metadata = include;
        self
    }

    pub fn with_auto_commit(mut self, auto_commit: Option<bool>) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_wait_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.wait_timeout_ms = timeout_ms;
        self
    }
}

/// What a statement execution and its interceptors know about the batch
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    batch_id: Uuid,
    unit_count: usize,
    settings: ExecutionSettings,
    statuses: Arc<StatusBoard>,
}

impl ExecutionContext {
    pub fn new(batch_id: Uuid, unit_count: usize, settings: ExecutionSettings) -> Self {
        Self {
            batch_id,
            unit_count,
            settings,
            statuses: Arc::new(StatusBoard::new(unit_count)),
        }
    }

    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Number of units in the batch
    pub fn unit_count(&self) -> usize {
        self.unit_count
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    pub fn statuses(&self) -> &Arc<StatusBoard> {
        &self.statuses
    }
}
