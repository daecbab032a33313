use std::time::Duration;

use tokio::time::Instant;

use super::PendingBatch;
use crate::batch::StatementUnit;
use crate::executor::{
    ExecutionStatus, KillDirective, StatementError, StatementExecutor, StatementOutcome,
    run_administrative,
};
use crate::interceptor::InterceptorChain;
use crate::session::Session;

/// Why a batch stopped running its remaining units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    Failed,
    Canceled,
    TimedOut,
}

/// Finishes the batch even if the job is torn down half way
struct FinishGuard<'a>(&'a PendingBatch);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        if !self.0.is_finished() {
            self.0.abandon("batch execution aborted");
        }
    }
}

/// The sequential run loop shared by the sync and async executors
#[derive(Debug)]
pub struct ExecutionPipeline {
    executor: StatementExecutor,
    interceptors: InterceptorChain,
}

impl ExecutionPipeline {
    pub fn new(executor: StatementExecutor, interceptors: InterceptorChain) -> Self {
        Self {
            executor,
            interceptors,
        }
    }

    pub fn executor(&self) -> &StatementExecutor {
        &self.executor
    }

    pub fn interceptors(&self) -> &InterceptorChain {
        &self.interceptors
    }

    /// Run every unit of `batch` in order on the session's reserved connection.
    ///
    /// On return the batch is finished and holds one result per unit.
    #[tracing::instrument(
        skip(self, session, batch),
        fields(session_id = %session.id(), batch_id = %batch.id(), units = batch.unit_count())
    )]
    pub async fn run(&self, session: &Session, batch: &PendingBatch, wait_timeout: Option<Duration>) {
        let _finish = FinishGuard(batch);
        let ctx = batch.context();

        // Kill directives run on administrative connections and must not wait
        // behind the very batch they are meant to stop
        let needs_connection = batch
            .units()
            .iter()
            .any(|unit| KillDirective::parse(unit.original_text()).is_none());

        let reservation = if needs_connection {
            tokio::select! {
                guard = session.reserve() => Some(guard),
                _ = batch.cancel_token().cancelled() => {
                    batch.abandon("batch canceled before it started");
                    return;
                }
            }
        } else {
            None
        };

        batch.mark_running();
        let deadline = wait_timeout.map(|timeout| Instant::now() + timeout);

        // Only the reservation holder may touch the session's connection
        if let (Some(auto_commit), Some(_)) = (ctx.settings().auto_commit, &reservation) {
            if let Err(e) = session.align_auto_commit(auto_commit).await {
                tracing::warn!(auto_commit, error = %e, "failed to align auto-commit mode");
            }
        }

        let mut halt: Option<Halt> = None;
        for unit in batch.units() {
            if halt.is_none() {
                if batch.is_canceled() {
                    halt = Some(Halt::Canceled);
                } else if deadline.is_some_and(|d| Instant::now() >= d) {
                    halt = Some(Halt::TimedOut);
                }
            }
            if halt.is_some() {
                ctx.statuses()
                    .advance(unit.sequence_index(), ExecutionStatus::Canceled);
                batch.publish(StatementOutcome::canceled(unit.clone()));
                continue;
            }

            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                outcome = self.executor.execute(unit, session, ctx) => outcome,
                _ = batch.cancel_token().cancelled() => {
                    halt = Some(Halt::Canceled);
                    self.interrupt(session, unit.clone(), StatementError::canceled(), started, batch).await
                }
                _ = sleep_until(deadline) => {
                    halt = Some(Halt::TimedOut);
                    let error = StatementError::timed_out(ctx.settings().wait_timeout_ms.unwrap_or_default());
                    self.interrupt(session, unit.clone(), error, started, batch).await
                }
            };

            self.interceptors.after_completion(&outcome, session, ctx);

            if outcome.is_failed() && halt.is_none() && ctx.settings().policy.stops_on_error() {
                halt = Some(Halt::Failed);
            }
            batch.publish(outcome);
        }

        if let Some(halt) = halt {
            tracing::info!(?halt, "batch stopped before its last unit");
        }
        batch.finish();
    }

    /// Stop the statement running on the reserved connection and record the
    /// interrupted unit as failed
    async fn interrupt(
        &self,
        session: &Session,
        unit: StatementUnit,
        error: StatementError,
        started: Instant,
        batch: &PendingBatch,
    ) -> StatementOutcome {
        match session.connection().connection_id() {
            Some(connection_id) => {
                let sql = session.dialect().kill_query_statement(&connection_id);
                if let Err(e) = run_administrative(session.admin_factory().as_ref(), &sql).await {
                    tracing::warn!(error = %e, "failed to kill in-flight statement");
                }
            }
            None => tracing::warn!("connection id unknown; in-flight statement left running"),
        }

        batch
            .context()
            .statuses()
            .advance(unit.sequence_index(), ExecutionStatus::Failed);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        StatementOutcome::failed(unit, error, elapsed_ms)
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
