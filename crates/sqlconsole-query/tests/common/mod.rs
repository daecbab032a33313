//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sqlconsole_core::{
    ColumnMeta, Connection, ConnectionFactory, ConsoleError, Dialect, ExecuteOutcome, Result,
    RowSet, Value,
};
use sqlconsole_query::{ConsoleConfig, ConsoleService};
use uuid::Uuid;

/// How a mock connection reacts to a statement
#[derive(Debug, Clone)]
pub enum Reply {
    Rows(RowSet),
    Affected(u64),
    Fail(String),
    /// Never returns
    Block,
    Slow(Duration),
}

/// Mock connection for testing the console service without a real database.
///
/// Statements containing a registered pattern get the matching reply;
/// everything else is acknowledged.
pub struct MockConnection {
    pub replies: Vec<(String, Reply)>,
    pub connection_id: Option<String>,
    /// Log of all SQL executed, for assertion in tests
    pub query_log: Arc<parking_lot::Mutex<Vec<String>>>,
    pub closed: AtomicBool,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            replies: Vec::new(),
            connection_id: None,
            query_log: Arc::new(parking_lot::Mutex::new(Vec::new())),
            closed: AtomicBool::new(false),
        }
    }

    /// Register a reply for statements containing `sql_contains`
    pub fn with_reply(mut self, sql_contains: impl Into<String>, reply: Reply) -> Self {
        self.replies.push((sql_contains.into().to_lowercase(), reply));
        self
    }

    pub fn with_connection_id(mut self, id: impl Into<String>) -> Self {
        self.connection_id = Some(id.into());
        self
    }

    pub fn query_log(&self) -> Vec<String> {
        self.query_log.lock().clone()
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

        let lowered = sql.to_lowercase();
        let reply = self
            .replies
            .iter()
            .find(|(pattern, _)| lowered.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone());

        match reply {
            Some(Reply::Rows(rows)) => Ok(ExecuteOutcome::Rows(rows)),
            Some(Reply::Affected(count)) => Ok(ExecuteOutcome::Affected(count)),
            Some(Reply::Fail(message)) => Err(ConsoleError::database(message)),
            Some(Reply::Block) => std::future::pending().await,
            Some(Reply::Slow(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(ExecuteOutcome::Ack)
            }
            None => Ok(ExecuteOutcome::Ack),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Administrative connection factory recording every statement it runs
#[derive(Default)]
pub struct AdminFactory {
    pub query_log: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl AdminFactory {
    pub fn query_log(&self) -> Vec<String> {
        self.query_log.lock().clone()
    }
}

#[async_trait]
impl ConnectionFactory for AdminFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        let mut connection = MockConnection::new();
        connection.query_log = self.query_log.clone();
        Ok(Arc::new(connection))
    }
}

/// A service with one open session and handles to its mocks
pub struct Console {
    pub service: ConsoleService,
    pub session_id: Uuid,
    pub connection: Arc<MockConnection>,
    pub admin: Arc<AdminFactory>,
}

impl Console {
    pub fn open(config: ConsoleConfig, connection: MockConnection, dialect: Dialect) -> Self {
        let service = ConsoleService::new(config).expect("valid config");
        let connection = Arc::new(connection);
        let admin = Arc::new(AdminFactory::default());
        let session_id = service.create_session(connection.clone(), admin.clone(), dialect);
        Self {
            service,
            session_id,
            connection,
            admin,
        }
    }

    pub fn mysql(connection: MockConnection) -> Self {
        Self::open(test_config(), connection, Dialect::MySql)
    }
}

/// Short poll waits keep failing tests fast
pub fn test_config() -> ConsoleConfig {
    ConsoleConfig::default()
        .with_poll_wait_ms(2000)
        .with_virtual_content_threshold(32)
}

pub fn text_rows(columns: &[&str], data: Vec<Vec<&str>>) -> RowSet {
    let columns = columns
        .iter()
        .enumerate()
        .map(|(i, name)| ColumnMeta::new(*name, "TEXT", i))
        .collect();
    let rows = data
        .into_iter()
        .map(|row| row.into_iter().map(|v| Value::String(v.to_string())).collect())
        .collect();
    RowSet::new(columns, rows)
}
