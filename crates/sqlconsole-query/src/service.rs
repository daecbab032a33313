//! Console service facade
//!
//! `ConsoleService` is the entry point hosts talk to: it owns the session
//! registry and the execution manager, applies the configured limits and
//! turns scripts into batches.

use std::sync::Arc;

use sqlconsole_core::{Connection, ConnectionFactory, ConsoleError, Dialect};
use uuid::Uuid;

use crate::batch::{SplitScript, Splitter, StatementUnit};
use crate::config::ConsoleConfig;
use crate::content::{BinaryContent, ContentBackend, ValueEncoding};
use crate::error::{QueryServiceError, QueryServiceResult};
use crate::executor::{
    ExecutionSettings, ExecutionStatus, KillDirective, Payload, StatementExecutor,
    StatementOutcome,
};
use crate::interceptor::InterceptorChain;
use crate::manager::{
    AsyncExecutionManager, BatchId, ErrorPolicy, ExecutionPipeline, PendingBatch,
};
use crate::session::{Session, SessionRegistry, SessionSettings};

const SQL_PREVIEW_CHARS: usize = 100;

/// Per-request options; unset fields fall back to the service config
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub query_row_limit: Option<usize>,
    pub auto_commit: Option<bool>,
    pub include_column_metadata: Option<bool>,
    pub continue_on_error: Option<bool>,
    /// Initial statement delimiter of the script
    pub delimiter: Option<String>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_row_limit(mut self, limit: usize) -> Self {
        self.query_row_limit = Some(limit);
        self
    }

    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = Some(auto_commit);
        self
    }

    pub fn with_column_metadata(mut self, include: bool) -> Self {
        self.include_column_metadata = Some(include);
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = Some(continue_on_error);
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Execution settings for this request under `config`
    pub fn resolve(&self, config: &ConsoleConfig) -> ExecutionSettings {
        let continue_on_error = self.continue_on_error.unwrap_or(config.continue_on_error);
        ExecutionSettings::default()
            .with_row_limit(config.effective_row_limit(self.query_row_limit))
            .with_column_metadata(self.include_column_metadata.unwrap_or(true))
            .with_auto_commit(self.auto_commit)
            .with_policy(ErrorPolicy::from_continue_on_error(continue_on_error))
    }
}

/// Address of a window of virtual content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub table_id: String,
    pub row: usize,
    pub col: usize,
    /// Bytes to skip from the start of the content
    pub skip: u64,
    /// Maximum bytes to return
    pub limit: u64,
    pub encoding: ValueEncoding,
}

impl ContentRequest {
    /// Request the whole content of a cell as raw text
    pub fn new(table_id: impl Into<String>, row: usize, col: usize) -> Self {
        Self {
            table_id: table_id.into(),
            row,
            col,
            skip: 0,
            limit: u64::MAX,
            encoding: ValueEncoding::Txt,
        }
    }

    pub fn with_window(mut self, skip: u64, limit: u64) -> Self {
        self.skip = skip;
        self.limit = limit;
        self
    }

    pub fn with_encoding(mut self, encoding: ValueEncoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// Results handed out by [`ConsoleService::poll_more`]
#[derive(Debug, Clone)]
pub struct BatchProgress {
    /// Results not returned by an earlier call, in unit order
    pub results: Vec<StatementOutcome>,
    /// No further results will follow
    pub finished: bool,
}

pub struct ConsoleService {
    config: ConsoleConfig,
    interceptors: InterceptorChain,
    backends: Vec<Arc<dyn ContentBackend>>,
    executors: Arc<AsyncExecutionManager>,
    sessions: SessionRegistry,
}

impl ConsoleService {
    pub fn new(config: ConsoleConfig) -> QueryServiceResult<Self> {
        config.validate()?;
        Ok(Self::assemble(config, InterceptorChain::with_defaults(), Vec::new()))
    }

    /// Replace the interceptor chain. Must be called before sessions exist.
    pub fn with_interceptors(self, interceptors: InterceptorChain) -> Self {
        Self::assemble(self.config, interceptors, self.backends)
    }

    /// Make an extra content backend available. Must be called before
    /// sessions exist.
    pub fn with_content_backend(mut self, backend: Arc<dyn ContentBackend>) -> Self {
        self.backends.push(backend);
        Self::assemble(self.config, self.interceptors, self.backends)
    }

    fn assemble(
        config: ConsoleConfig,
        interceptors: InterceptorChain,
        backends: Vec<Arc<dyn ContentBackend>>,
    ) -> Self {
        let pipeline = ExecutionPipeline::new(
            StatementExecutor::new(config.virtual_content_threshold_bytes),
            interceptors.clone(),
        );
        let executors = Arc::new(
            AsyncExecutionManager::new(config.worker_pool_size, pipeline)
                .with_wait_timeout(config.batch_wait_timeout()),
        );
        let settings = SessionSettings {
            timeout: config.session_timeout(),
            spool_dir: config.spool_dir.clone(),
        };
        let sessions = backends.iter().fold(
            SessionRegistry::new(executors.clone(), settings),
            |registry, backend| registry.with_content_backend(backend.clone()),
        );

        Self {
            config,
            interceptors,
            backends,
            executors,
            sessions,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn executors(&self) -> &Arc<AsyncExecutionManager> {
        &self.executors
    }

    // -- Sessions --

    /// Open a session around a reserved connection.
    ///
    /// `admin` hands out short-lived connections to the same server, used to
    /// interrupt statements running on the reserved one.
    pub fn create_session(
        &self,
        connection: Arc<dyn Connection>,
        admin: Arc<dyn ConnectionFactory>,
        dialect: Dialect,
    ) -> Uuid {
        self.sessions.create(connection, admin, dialect).id()
    }

    pub async fn close_session(&self, session_id: Uuid) -> QueryServiceResult<()> {
        self.sessions.close(session_id).await?;
        Ok(())
    }

    /// Close idle sessions, returning how many were closed
    pub async fn purge_expired_sessions(&self) -> usize {
        self.sessions.purge_expired().await
    }

    // -- Execution --

    /// Split `script` and queue it for execution on the session's connection.
    ///
    /// Limit and split errors are reported before anything runs.
    #[tracing::instrument(
        skip(self, script, options),
        fields(
            sql_preview = %script.chars().take(SQL_PREVIEW_CHARS).collect::<String>()
        )
    )]
    pub fn execute(
        &self,
        session_id: Uuid,
        script: &str,
        options: ExecuteOptions,
    ) -> QueryServiceResult<BatchId> {
        let session = self.sessions.get(session_id)?;

        check_limit("sql_length", script.len(), self.config.max_sql_length)?;

        let delimiter = options
            .delimiter
            .as_deref()
            .unwrap_or(&self.config.default_delimiter);
        let split = Splitter::new(session.dialect())
            .with_delimiter(delimiter)
            .split_script(script)?;

        check_limit("statement_count", split.units.len(), self.config.max_statement_count)?;

        let settings = options.resolve(&self.config);
        if split.units.is_empty() && split.pragma_count > 0 {
            return Ok(acknowledge_pragmas(&session, script, &split, settings));
        }

        let batch = self.executors.submit(&session, split.units, settings)?;
        tracing::info!(batch_id = %batch.id(), units = batch.unit_count(), "script submitted");
        Ok(batch.id())
    }

    /// Wait up to the configured poll time for the batch to finish and return
    /// every result produced so far.
    ///
    /// Once a finished batch has been polled it is forgotten.
    pub async fn poll(
        &self,
        session_id: Uuid,
        batch_id: BatchId,
    ) -> QueryServiceResult<Vec<StatementOutcome>> {
        let (session, batch) = self.lookup(session_id, batch_id)?;

        let finished = batch.wait_finished(Some(self.config.poll_wait())).await;
        let results = batch.results();
        if finished {
            session.remove_batch(batch_id);
            tracing::debug!(%batch_id, results = results.len(), "finished batch delivered");
        }
        Ok(results)
    }

    /// Return only the results not handed out by an earlier call, waiting up
    /// to the configured poll time for at least one
    pub async fn poll_more(
        &self,
        session_id: Uuid,
        batch_id: BatchId,
    ) -> QueryServiceResult<BatchProgress> {
        let (session, batch) = self.lookup(session_id, batch_id)?;

        batch
            .wait_for_progress(batch.delivered_count(), Some(self.config.poll_wait()))
            .await;
        let finished = batch.is_finished();
        let results = batch.take_undelivered();
        if finished {
            session.remove_batch(batch_id);
        }
        Ok(BatchProgress { results, finished })
    }

    /// Request cancellation of a batch; a no-op once it has finished
    pub fn cancel(&self, session_id: Uuid, batch_id: BatchId) -> QueryServiceResult<()> {
        let (_, batch) = self.lookup(session_id, batch_id)?;
        self.executors.cancel(&batch);
        Ok(())
    }

    /// Read a window of a large cell value moved out of a result table
    pub fn get_binary_content(
        &self,
        session_id: Uuid,
        request: &ContentRequest,
    ) -> QueryServiceResult<BinaryContent> {
        let session = self.sessions.get(session_id)?;
        let content = session.content().read(
            &request.table_id,
            request.row,
            request.col,
            request.skip,
            request.limit,
            request.encoding,
        )?;
        Ok(content)
    }

    /// Terminate another database session from within this one.
    ///
    /// `target` is either a complete kill statement or a session identifier
    /// turned into the dialect's kill statement. The kill runs on an
    /// administrative connection and is reported as successful even if the
    /// server rejected it.
    pub async fn kill_session(
        &self,
        session_id: Uuid,
        target: &str,
    ) -> QueryServiceResult<StatementOutcome> {
        let session = self.sessions.get(session_id)?;

        let target = target.trim();
        let statement = match KillDirective::parse(target) {
            Some(kill) => kill.statement().to_string(),
            None => session.dialect().kill_session_statement(target),
        };
        if target.is_empty() || KillDirective::parse(&statement).is_none() {
            return Err(QueryServiceError::Core(ConsoleError::NotSupported(format!(
                "invalid kill target {:?}",
                target
            ))));
        }

        let outcomes = session
            .sync_executor()
            .execute(
                &session,
                vec![StatementUnit::new(0, 0, statement)],
                ExecutionSettings::default(),
            )
            .await?;
        outcomes
            .into_iter()
            .next()
            .ok_or_else(|| QueryServiceError::Core(ConsoleError::Other("kill produced no result".into())))
    }

    fn lookup(
        &self,
        session_id: Uuid,
        batch_id: BatchId,
    ) -> QueryServiceResult<(Arc<Session>, Arc<PendingBatch>)> {
        let session = self.sessions.get(session_id)?;
        let batch = session
            .batch(batch_id)
            .ok_or(QueryServiceError::BatchNotFound(batch_id))?;
        Ok((session, batch))
    }
}

fn check_limit(metric: &'static str, actual: usize, max: usize) -> QueryServiceResult<()> {
    if max > 0 && actual > max {
        return Err(QueryServiceError::LimitExceeded { metric, actual, max });
    }
    Ok(())
}

/// Register an already finished batch acknowledging a script made only of
/// delimiter pragmas
fn acknowledge_pragmas(
    session: &Session,
    script: &str,
    split: &SplitScript,
    settings: ExecutionSettings,
) -> BatchId {
    let unit = StatementUnit::new(0, 0, script.trim());
    let batch = Arc::new(PendingBatch::new(session.id(), vec![unit.clone()], settings));

    let statuses = batch.context().statuses();
    statuses.advance(0, ExecutionStatus::Running);
    statuses.advance(0, ExecutionStatus::Success);
    batch.publish(StatementOutcome::success(unit, Payload::Void, 0));
    batch.finish();

    tracing::debug!(
        batch_id = %batch.id(),
        pragmas = split.pragma_count,
        delimiter = %split.delimiter,
        "script only changed the delimiter"
    );
    session.register_batch(batch.clone());
    batch.id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockConnection, MockConnectionFactory};
    use std::time::Duration;

    fn service() -> ConsoleService {
        ConsoleService::new(ConsoleConfig::default().with_poll_wait_ms(2000)).unwrap()
    }

    fn session(service: &ConsoleService) -> Uuid {
        service.create_session(
            Arc::new(MockConnection::new()),
            Arc::new(MockConnectionFactory::new()),
            Dialect::MySql,
        )
    }

    #[test]
    fn test_options_resolve_against_config() {
        let config = ConsoleConfig::default()
            .with_row_limits(50, 200)
            .with_continue_on_error(true);

        let settings = ExecuteOptions::new().resolve(&config);
        assert_eq!(settings.row_limit, Some(50));
        assert_eq!(settings.policy, ErrorPolicy::ContinueOnError);
        assert!(settings.include_column_metadata);
        assert_eq!(settings.auto_commit, None);

        let settings = ExecuteOptions::new()
            .with_query_row_limit(1000)
            .with_continue_on_error(false)
            .with_column_metadata(false)
            .with_auto_commit(true)
            .resolve(&config);
        assert_eq!(settings.row_limit, Some(200));
        assert_eq!(settings.policy, ErrorPolicy::StopOnError);
        assert!(!settings.include_column_metadata);
        assert_eq!(settings.auto_commit, Some(true));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = ConsoleService::new(ConsoleConfig::default().with_worker_pool_size(0));
        assert!(matches!(result, Err(QueryServiceError::Config(_))));
    }

    #[tokio::test]
    async fn test_pragma_only_script_is_acknowledged() {
        let service = service();
        let session_id = session(&service);

        let batch_id = service
            .execute(session_id, "DELIMITER $$\n", ExecuteOptions::new())
            .unwrap();
        let results = service.poll(session_id, batch_id).await.unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].is_success());
        assert_eq!(results[0].payload, Some(Payload::Void));
    }

    #[tokio::test]
    async fn test_blank_script_yields_empty_batch() {
        let service = service();
        let session_id = session(&service);

        let batch_id = service
            .execute(session_id, "  -- nothing here\n", ExecuteOptions::new())
            .unwrap();
        let results = service.poll(session_id, batch_id).await.unwrap();

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_limits_checked_before_execution() {
        let service = ConsoleService::new(
            ConsoleConfig::default()
                .with_max_sql_length(20)
                .with_max_statement_count(2),
        )
        .unwrap();
        let session_id = session(&service);

        let too_long = service.execute(session_id, &"x".repeat(21), ExecuteOptions::new());
        assert!(matches!(
            too_long,
            Err(QueryServiceError::LimitExceeded { metric: "sql_length", actual: 21, max: 20 })
        ));

        let too_many = service.execute(session_id, "a;b;c", ExecuteOptions::new());
        assert!(matches!(
            too_many,
            Err(QueryServiceError::LimitExceeded { metric: "statement_count", .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_batch_and_session() {
        let service = service();
        let session_id = session(&service);

        let missing_batch = service.poll(session_id, Uuid::new_v4()).await;
        assert!(matches!(missing_batch, Err(QueryServiceError::BatchNotFound(_))));

        let missing_session = service.execute(Uuid::new_v4(), "select 1", ExecuteOptions::new());
        assert!(matches!(missing_session, Err(QueryServiceError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_kill_session_builds_dialect_statement() {
        let service = service();
        let admin = Arc::new(MockConnectionFactory::new());
        let session_id = service.create_session(
            Arc::new(MockConnection::new()),
            admin.clone(),
            Dialect::Oracle,
        );

        let outcome = service.kill_session(session_id, "12,345").await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(
            admin.query_log(),
            vec!["ALTER SYSTEM KILL SESSION '12,345' IMMEDIATE".to_string()]
        );
    }

    #[tokio::test]
    async fn test_kill_session_rejects_injected_target() {
        let service = service();
        let session_id = session(&service);

        let result = service.kill_session(session_id, "1; drop table t").await;
        assert!(result.is_err());

        let result = service.kill_session(session_id, "  ").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_poll_more_then_forget() {
        let service = service();
        let session_id = session(&service);
        let batch_id = service
            .execute(session_id, "select 1; select 2", ExecuteOptions::new())
            .unwrap();

        let mut collected = Vec::new();
        for _ in 0..10 {
            let progress = service.poll_more(session_id, batch_id).await.unwrap();
            collected.extend(progress.results);
            if progress.finished {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(collected.len(), 2);
        assert!(matches!(
            service.poll_more(session_id, batch_id).await,
            Err(QueryServiceError::BatchNotFound(_))
        ));
    }
}
