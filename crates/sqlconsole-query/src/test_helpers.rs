//! Test scaffolding for the sqlconsole-query crate
//!
//! Provides a scriptable mock connection, a mock administrative connection
//! factory and helpers that wire them into a session.
//!
//! Usage:
//! ```ignore
//! let conn = MockConnection::new().with_response("select", MockResponse::Affected(3));
//! let fixture = SessionFixture::new(conn);
//! let outcomes = fixture.session.sync_executor().execute(...).await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlconsole_core::{
    ColumnMeta, Connection, ConnectionFactory, ConsoleError, Dialect, ExecuteOutcome, Result,
    RowSet, Value,
};

use crate::batch::{StatementUnit, split_statements};
use crate::executor::StatementExecutor;
use crate::interceptor::InterceptorChain;
use crate::manager::{AsyncExecutionManager, ExecutionPipeline};
use crate::session::Session;

/// Canned reaction of the mock connection to a statement
#[derive(Debug, Clone)]
pub enum MockResponse {
    Rows(RowSet),
    Affected(u64),
    Ack,
    Error { message: String, code: Option<String> },
    /// Never completes
    Hang,
    /// Wait, then react like the inner response
    Delayed(Duration, Box<MockResponse>),
}

impl MockResponse {
    pub fn error(message: impl Into<String>) -> Self {
        MockResponse::Error {
            message: message.into(),
            code: None,
        }
    }

    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        MockResponse::Delayed(delay, Box::new(inner))
    }
}

/// Mock connection for testing execution logic without a real database.
///
/// Statements containing a registered pattern (case-insensitive) get the
/// matching response; everything else is acknowledged.
pub struct MockConnection {
    responses: Vec<(String, MockResponse)>,
    connection_id: Option<String>,
    /// Log of all SQL executed, for assertion in tests
    pub query_log: Arc<Mutex<Vec<String>>>,
    pub auto_commit_calls: Arc<Mutex<Vec<bool>>>,
    closed: AtomicBool,
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            connection_id: None,
            query_log: Arc::new(Mutex::new(Vec::new())),
            auto_commit_calls: Arc::new(Mutex::new(Vec::new())),
            closed: AtomicBool::new(false),
        }
    }

    /// Register a response for statements containing `pattern`
    pub fn with_response(mut self, pattern: impl Into<String>, response: MockResponse) -> Self {
        self.responses.push((pattern.into().to_lowercase(), response));
        self
    }

    pub fn with_connection_id(mut self, id: impl Into<String>) -> Self {
        self.connection_id = Some(id.into());
        self
    }

    /// Share the query log with someone else
    pub fn with_query_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.query_log = log;
        self
    }

    pub fn query_log(&self) -> Vec<String> {
        self.query_log.lock().clone()
    }

    pub fn auto_commit_calls(&self) -> Vec<bool> {
        self.auto_commit_calls.lock().clone()
    }

    fn response_for(&self, sql: &str) -> MockResponse {
        let sql = sql.to_lowercase();
        self.responses
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or(MockResponse::Ack)
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    fn connection_id(&self) -> Option<String> {
        self.connection_id.clone()
    }

    async fn execute(&self, sql: &str) -> Result<ExecuteOutcome> {
        self.query_log.lock().push(sql.to_string());

        let mut response = self.response_for(sql);
        loop {
            match response {
                MockResponse::Rows(rows) => return Ok(ExecuteOutcome::Rows(rows)),
                MockResponse::Affected(count) => return Ok(ExecuteOutcome::Affected(count)),
                MockResponse::Ack => return Ok(ExecuteOutcome::Ack),
                MockResponse::Error { message, code } => {
                    return Err(ConsoleError::Database {
                        message,
                        code,
                        position: None,
                    });
                }
                MockResponse::Hang => return std::future::pending().await,
                MockResponse::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    response = *inner;
                }
            }
        }
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        self.auto_commit_calls.lock().push(auto_commit);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Factory whose connections all log into one shared list
#[derive(Default)]
pub struct MockConnectionFactory {
    pub query_log: Arc<Mutex<Vec<String>>>,
    pub should_fail: bool,
    created: AtomicUsize,
}

impl MockConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn query_log(&self) -> Vec<String> {
        self.query_log.lock().clone()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(ConsoleError::Connection("connection refused".into()));
        }
        Ok(Arc::new(
            MockConnection::new().with_query_log(self.query_log.clone()),
        ))
    }
}

/// A session wired to mocks, with handles kept for assertions
pub struct SessionFixture {
    pub session: Arc<Session>,
    pub connection: Arc<MockConnection>,
    pub admin: Arc<MockConnectionFactory>,
    pub manager: Arc<AsyncExecutionManager>,
}

impl SessionFixture {
    pub fn new(connection: MockConnection) -> Self {
        Self::with_admin(connection, MockConnectionFactory::new())
    }

    pub fn with_admin(connection: MockConnection, admin: MockConnectionFactory) -> Self {
        let manager = test_manager();
        let connection = Arc::new(connection);
        let admin = Arc::new(admin);
        let session = Arc::new(Session::new(
            connection.clone(),
            admin.clone(),
            Dialect::MySql,
            manager.clone(),
        ));
        Self {
            session,
            connection,
            admin,
            manager,
        }
    }
}

pub fn test_pipeline() -> ExecutionPipeline {
    ExecutionPipeline::new(StatementExecutor::new(16), InterceptorChain::with_defaults())
}

pub fn test_manager() -> Arc<AsyncExecutionManager> {
    Arc::new(AsyncExecutionManager::new(4, test_pipeline()))
}

/// Split a `;`-delimited script, panicking on malformed input
pub fn units(script: &str) -> Vec<StatementUnit> {
    split_statements(script, ";").expect("test script should split")
}

/// Build a row set with untyped text columns
pub fn rows(columns: &[&str], data: Vec<Vec<Value>>) -> RowSet {
    let columns = columns
        .iter()
        .enumerate()
        .map(|(i, name)| ColumnMeta::new(*name, "VARCHAR", i))
        .collect();
    RowSet::new(columns, data)
}
