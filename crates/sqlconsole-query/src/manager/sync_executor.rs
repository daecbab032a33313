use std::sync::Arc;

use super::{ExecutionPipeline, PendingBatch};
use crate::batch::StatementUnit;
use crate::executor::{ExecutionSettings, StatementOutcome};
use crate::session::{Session, SessionError};

/// Runs a batch inline on the caller's task
///
/// Used for short administrative work where queueing on the worker pool
/// would only add latency.
#[derive(Debug, Clone)]
pub struct SyncExecutor {
    pipeline: Arc<ExecutionPipeline>,
}

impl SyncExecutor {
    pub fn new(pipeline: Arc<ExecutionPipeline>) -> Self {
        Self { pipeline }
    }

    /// Execute `units` in order and return one result per unit
    pub async fn execute(
        &self,
        session: &Session,
        units: Vec<StatementUnit>,
        settings: ExecutionSettings,
    ) -> Result<Vec<StatementOutcome>, SessionError> {
        session.validate()?;
        let batch = PendingBatch::new(session.id(), units, settings);
        self.pipeline.run(session, &batch, None).await;
        Ok(batch.results())
    }
}
