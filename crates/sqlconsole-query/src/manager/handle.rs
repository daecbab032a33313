use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::batch::StatementUnit;
use crate::executor::{
    ExecutionContext, ExecutionSettings, ExecutionStatus, StatementError, StatementOutcome,
};

/// Identifier of a submitted batch
pub type BatchId = Uuid;

/// Coarse state of a batch job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Waiting for a worker or for the session's connection
    Queued,
    Running,
    /// Every unit has a result
    Finished,
}

#[derive(Debug, Clone, Copy)]
struct Progress {
    state: BatchState,
    completed: usize,
}

/// Handle to a batch and the results it has produced so far
///
/// Results are appended in unit order. Once the batch is finished there is
/// exactly one result per unit.
#[derive(Debug)]
pub struct PendingBatch {
    id: BatchId,
    session_id: Uuid,
    units: Vec<StatementUnit>,
    context: ExecutionContext,
    results: Mutex<Vec<StatementOutcome>>,
    delivered: Mutex<usize>,
    progress: watch::Sender<Progress>,
    cancel: CancellationToken,
    submitted_at: DateTime<Utc>,
}

impl PendingBatch {
    pub fn new(session_id: Uuid, units: Vec<StatementUnit>, settings: ExecutionSettings) -> Self {
        let id = Uuid::new_v4();
        let context = ExecutionContext::new(id, units.len(), settings);
        let (progress, _) = watch::channel(Progress {
            state: BatchState::Queued,
            completed: 0,
        });
        Self {
            id,
            session_id,
            units,
            context,
            results: Mutex::new(Vec::new()),
            delivered: Mutex::new(0),
            progress,
            cancel: CancellationToken::new(),
            submitted_at: Utc::now(),
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn units(&self) -> &[StatementUnit] {
        &self.units
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn state(&self) -> BatchState {
        self.progress.borrow().state
    }

    pub fn is_finished(&self) -> bool {
        self.state() == BatchState::Finished
    }

    /// Current status of every unit
    pub fn statuses(&self) -> Vec<ExecutionStatus> {
        self.context.statuses().snapshot()
    }

    // -- Cancellation --

    /// Request cancellation; a no-op once the batch has finished
    pub fn cancel(&self) {
        if !self.is_finished() {
            tracing::info!(batch_id = %self.id, "batch cancellation requested");
            self.cancel.cancel();
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    // -- Results --

    /// Snapshot of every result produced so far
    pub fn results(&self) -> Vec<StatementOutcome> {
        self.results.lock().clone()
    }

    pub fn completed_count(&self) -> usize {
        self.results.lock().len()
    }

    /// Results not handed out by a previous call
    pub fn take_undelivered(&self) -> Vec<StatementOutcome> {
        let results = self.results.lock();
        let mut delivered = self.delivered.lock();
        let fresh = results[*delivered..].to_vec();
        *delivered = results.len();
        fresh
    }

    pub fn delivered_count(&self) -> usize {
        *self.delivered.lock()
    }

    /// Wait until the batch finishes or `timeout` elapses.
    ///
    /// Returns whether the batch is finished.
    pub async fn wait_finished(&self, timeout: Option<Duration>) -> bool {
        self.wait_until(timeout, |p| p.state == BatchState::Finished)
            .await
    }

    /// Wait until more than `seen` results exist, the batch finishes or
    /// `timeout` elapses
    pub async fn wait_for_progress(&self, seen: usize, timeout: Option<Duration>) -> bool {
        self.wait_until(timeout, |p| {
            p.completed > seen || p.state == BatchState::Finished
        })
        .await
    }

    async fn wait_until(&self, timeout: Option<Duration>, done: impl FnMut(&Progress) -> bool) -> bool {
        let mut rx = self.progress.subscribe();
        let wait = async { rx.wait_for(done).await.is_ok() };
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait).await.unwrap_or(false),
            None => wait.await,
        }
    }

    // -- Job side --

    pub(crate) fn mark_running(&self) {
        self.progress.send_modify(|p| p.state = BatchState::Running);
    }

    pub(crate) fn publish(&self, outcome: StatementOutcome) {
        let completed = {
            let mut results = self.results.lock();
            results.push(outcome);
            results.len()
        };
        self.progress.send_modify(|p| p.completed = completed);
    }

    pub(crate) fn finish(&self) {
        self.progress.send_modify(|p| p.state = BatchState::Finished);
        tracing::debug!(batch_id = %self.id, "batch finished");
    }

    /// Give every unit without a result a terminal one and finish the batch.
    ///
    /// A unit caught mid-execution is reported as failed, the rest as canceled.
    pub(crate) fn abandon(&self, reason: &str) {
        if self.is_finished() {
            return;
        }
        let statuses = self.context.statuses();
        let start = self.completed_count();
        for unit in &self.units[start..] {
            let index = unit.sequence_index();
            let outcome = if statuses.get(index) == Some(ExecutionStatus::Running) {
                statuses.advance(index, ExecutionStatus::Failed);
                StatementOutcome::failed(unit.clone(), StatementError::new(reason), 0)
            } else {
                statuses.advance(index, ExecutionStatus::Canceled);
                StatementOutcome::canceled(unit.clone())
            };
            self.publish(outcome);
        }
        tracing::warn!(batch_id = %self.id, reason, "batch abandoned");
        self.finish();
    }
}
