use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use sqlconsole_core::{Connection, ConnectionFactory, Dialect};
use thiserror::Error;
use uuid::Uuid;

use super::attributes::{NLS_DATE_FORMAT, NLS_TIMESTAMP_FORMAT, NLS_TIMESTAMP_TZ_FORMAT, TIME_ZONE};
use crate::content::ContentStore;
use crate::manager::{AsyncExecutionManager, BatchId, PendingBatch, SyncExecutor};

/// Errors raised when a session can no longer be used
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(Uuid),

    #[error("session {0} has expired")]
    Expired(Uuid),
}

impl SessionError {
    pub fn session_id(&self) -> Uuid {
        match self {
            SessionError::NotFound(id) | SessionError::Expired(id) => *id,
        }
    }
}

/// A console session bound to one reserved connection
///
/// Every statement the session runs goes through its reserved connection,
/// one at a time: a batch job holds the session's reservation for its whole
/// run, so batches of the same session never interleave.
pub struct Session {
    id: Uuid,
    dialect: Dialect,
    connection: Arc<dyn Connection>,
    admin: Arc<dyn ConnectionFactory>,
    executors: Arc<AsyncExecutionManager>,
    content: ContentStore,
    attributes: RwLock<HashMap<String, serde_json::Value>>,
    batches: RwLock<HashMap<BatchId, Arc<PendingBatch>>>,
    auto_commit: Mutex<Option<bool>>,
    reservation: tokio::sync::Mutex<()>,
    created_at: DateTime<Utc>,
    last_access: Mutex<Instant>,
    timeout: Option<Duration>,
    expired: AtomicBool,
}

impl Session {
    pub fn new(
        connection: Arc<dyn Connection>,
        admin: Arc<dyn ConnectionFactory>,
        dialect: Dialect,
        executors: Arc<AsyncExecutionManager>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            dialect,
            connection,
            admin,
            executors,
            content: ContentStore::new(),
            attributes: RwLock::new(HashMap::new()),
            batches: RwLock::new(HashMap::new()),
            auto_commit: Mutex::new(None),
            reservation: tokio::sync::Mutex::new(()),
            created_at: Utc::now(),
            last_access: Mutex::new(Instant::now()),
            timeout: None,
            expired: AtomicBool::new(false),
        }
    }

    /// Expire the session after `timeout` without access; `None` never expires
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_content_store(mut self, content: ContentStore) -> Self {
        self.content = content;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The reserved connection
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Factory for short-lived administrative connections to the same server
    pub fn admin_factory(&self) -> &Arc<dyn ConnectionFactory> {
        &self.admin
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    /// Executor that runs units inline on the caller's task
    pub fn sync_executor(&self) -> SyncExecutor {
        SyncExecutor::new(self.executors.pipeline())
    }

    /// Manager that runs batches on the shared worker pool
    pub fn async_executor(&self) -> &Arc<AsyncExecutionManager> {
        &self.executors
    }

    // -- Lifecycle --

    /// Whether the session has expired, either explicitly or by inactivity
    pub fn is_expired(&self) -> bool {
        if self.expired.load(Ordering::SeqCst) {
            return true;
        }
        self.timeout
            .is_some_and(|timeout| self.last_access.lock().elapsed() > timeout)
    }

    /// Fail if the session has expired, making the expiry permanent
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.is_expired() {
            self.expire();
            return Err(SessionError::Expired(self.id));
        }
        Ok(())
    }

    /// Validate and record an access
    pub fn touch(&self) -> Result<(), SessionError> {
        self.validate()?;
        *self.last_access.lock() = Instant::now();
        Ok(())
    }

    /// Mark the session expired.
    ///
    /// A batch already running keeps going until it finishes and may still
    /// spool content; the store is discarded by [`Session::close`].
    pub fn expire(&self) {
        if !self.expired.swap(true, Ordering::SeqCst) {
            tracing::info!(session_id = %self.id, "session expired");
        }
    }

    /// Expire the session, then discard its content and close its reserved
    /// connection once no batch holds it anymore
    pub async fn close(&self) {
        self.expire();
        let _reservation = self.reservation.lock().await;
        self.content.discard();
        if let Err(e) = self.connection.close().await {
            tracing::warn!(session_id = %self.id, error = %e, "failed to close session connection");
        }
        self.batches.write().clear();
        tracing::info!(session_id = %self.id, "session closed");
    }

    /// Wait until this task is the only one using the reserved connection
    pub(crate) async fn reserve(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.reservation.lock().await
    }

    // -- Attributes --

    pub fn attribute(&self, key: &str) -> Result<Option<serde_json::Value>, SessionError> {
        self.validate()?;
        Ok(self.attributes.read().get(key).cloned())
    }

    /// Set an attribute, returning the previous value. Setting null removes it.
    pub fn set_attribute(
        &self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        self.validate()?;
        let key = key.into();
        let mut attributes = self.attributes.write();
        if value.is_null() {
            Ok(attributes.remove(&key))
        } else {
            Ok(attributes.insert(key, value))
        }
    }

    pub fn remove_attribute(&self, key: &str) -> Result<Option<serde_json::Value>, SessionError> {
        self.validate()?;
        Ok(self.attributes.write().remove(key))
    }

    pub fn attributes(&self) -> Result<HashMap<String, serde_json::Value>, SessionError> {
        self.validate()?;
        Ok(self.attributes.read().clone())
    }

    fn string_attribute(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self
            .attribute(key)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    pub fn time_zone(&self) -> Result<Option<String>, SessionError> {
        self.string_attribute(TIME_ZONE)
    }

    pub fn nls_date_format(&self) -> Result<Option<String>, SessionError> {
        self.string_attribute(NLS_DATE_FORMAT)
    }

    pub fn nls_timestamp_format(&self) -> Result<Option<String>, SessionError> {
        self.string_attribute(NLS_TIMESTAMP_FORMAT)
    }

    pub fn nls_timestamp_tz_format(&self) -> Result<Option<String>, SessionError> {
        self.string_attribute(NLS_TIMESTAMP_TZ_FORMAT)
    }

    // -- Batches --

    pub(crate) fn register_batch(&self, batch: Arc<PendingBatch>) {
        self.batches.write().insert(batch.id(), batch);
    }

    pub fn batch(&self, batch_id: BatchId) -> Option<Arc<PendingBatch>> {
        self.batches.read().get(&batch_id).cloned()
    }

    pub(crate) fn remove_batch(&self, batch_id: BatchId) -> Option<Arc<PendingBatch>> {
        self.batches.write().remove(&batch_id)
    }

    pub fn batch_count(&self) -> usize {
        self.batches.read().len()
    }

    // -- Transaction mode --

    /// Auto-commit mode last applied to the reserved connection
    pub fn auto_commit(&self) -> Option<bool> {
        *self.auto_commit.lock()
    }

    /// Switch the reserved connection's auto-commit mode if it differs
    pub(crate) async fn align_auto_commit(&self, auto_commit: bool) -> sqlconsole_core::Result<()> {
        if self.auto_commit() == Some(auto_commit) {
            return Ok(());
        }
        self.connection.set_auto_commit(auto_commit).await?;
        *self.auto_commit.lock() = Some(auto_commit);
        tracing::debug!(session_id = %self.id, auto_commit, "aligned auto-commit mode");
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("dialect", &self.dialect)
            .field("created_at", &self.created_at)
            .field("expired", &self.expired.load(Ordering::SeqCst))
            .finish()
    }
}
