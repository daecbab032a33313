use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use super::{ExecutionPipeline, PendingBatch, SyncExecutor};
use crate::batch::StatementUnit;
use crate::executor::{ExecutionSettings, StatementOutcome};
use crate::session::{Session, SessionError};

/// Default number of batches that may run at the same time
pub const DEFAULT_WORKER_POOL_SIZE: usize = 8;

/// Schedules batches on a bounded pool of workers
///
/// Each submitted batch becomes one job. At most `pool_size` jobs run at a
/// time across all sessions; within one session, jobs additionally wait for
/// the session's reserved connection, so they run in submission order.
#[derive(Debug)]
pub struct AsyncExecutionManager {
    pipeline: Arc<ExecutionPipeline>,
    permits: Arc<Semaphore>,
    pool_size: usize,
    wait_timeout: Option<Duration>,
}

impl AsyncExecutionManager {
    pub fn new(pool_size: usize, pipeline: ExecutionPipeline) -> Self {
        let pool_size = pool_size.max(1);
        Self {
            pipeline: Arc::new(pipeline),
            permits: Arc::new(Semaphore::new(pool_size)),
            pool_size,
            wait_timeout: None,
        }
    }

    /// Interrupt a batch that has been running longer than `timeout`
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn pipeline(&self) -> Arc<ExecutionPipeline> {
        self.pipeline.clone()
    }

    pub fn sync_executor(&self) -> SyncExecutor {
        SyncExecutor::new(self.pipeline.clone())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout
    }

    /// Number of workers currently idle
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    /// Queue a batch for execution and return its handle immediately
    #[tracing::instrument(skip(self, session, units, settings), fields(session_id = %session.id(), units = units.len()))]
    pub fn submit(
        &self,
        session: &Arc<Session>,
        units: Vec<StatementUnit>,
        settings: ExecutionSettings,
    ) -> Result<Arc<PendingBatch>, SessionError> {
        session.validate()?;

        let settings = settings.with_wait_timeout_ms(self.wait_timeout.map(|t| t.as_millis() as u64));
        let batch = Arc::new(PendingBatch::new(session.id(), units, settings));
        session.register_batch(batch.clone());

        let pipeline = self.pipeline.clone();
        let permits = self.permits.clone();
        let wait_timeout = self.wait_timeout;
        let job_session = session.clone();
        let job_batch = batch.clone();

        tokio::spawn(async move {
            let permit = tokio::select! {
                permit = permits.acquire_owned() => permit,
                _ = job_batch.cancel_token().cancelled() => {
                    job_batch.abandon("batch canceled while queued");
                    return;
                }
            };
            let Ok(_permit) = permit else {
                job_batch.abandon("execution manager shut down");
                return;
            };
            pipeline.run(&job_session, &job_batch, wait_timeout).await;
        });

        tracing::debug!(batch_id = %batch.id(), "batch submitted");
        Ok(batch)
    }

    /// Wait up to `timeout` for the batch to finish and return what it has
    pub async fn block_until_done(
        &self,
        batch: &PendingBatch,
        timeout: Option<Duration>,
    ) -> Vec<StatementOutcome> {
        batch.wait_finished(timeout).await;
        batch.results()
    }

    pub fn cancel(&self, batch: &PendingBatch) {
        batch.cancel();
    }

    /// Stop accepting work; batches still queued are canceled
    pub fn shutdown(&self) {
        self.permits.close();
        tracing::info!("execution manager shut down");
    }
}
