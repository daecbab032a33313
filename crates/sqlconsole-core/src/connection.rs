//! Connection contracts the engine drives

use crate::{ExecuteOutcome, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// A database connection
///
/// A session reserves exactly one of these for its whole lifetime; every
/// statement of every batch in that session runs on it, one at a time.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "mysql", "oracle")
    fn driver_name(&self) -> &str;

    /// Server-side identifier of this connection (thread id, SID, ...).
    ///
    /// Used to build the kill statement that interrupts a running query
    /// from another connection. Returns `None` if the driver cannot tell.
    fn connection_id(&self) -> Option<String> {
        None
    }

    /// Execute a single raw SQL statement
    async fn execute(&self, sql: &str) -> Result<ExecuteOutcome>;

    /// Switch the connection's auto-commit mode
    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        let sql = if auto_commit {
            "SET autocommit = 1"
        } else {
            "SET autocommit = 0"
        };
        tracing::debug!(auto_commit, "switching auto-commit mode");
        self.execute(sql).await.map(|_| ())
    }

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// Factory for creating connections to the server a session is bound to
///
/// The engine uses it to open short-lived administrative connections, for
/// example to kill a query that is still running on the reserved connection.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Create a new connection
    async fn create(&self) -> Result<Arc<dyn Connection>>;
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        (**self).create().await
    }
}
