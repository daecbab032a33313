use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use sqlconsole_core::{Connection, ConnectionFactory, Dialect};
use uuid::Uuid;

use super::{Session, SessionError};
use crate::content::{ContentBackend, ContentStore};
use crate::manager::AsyncExecutionManager;

/// Settings applied to every session the registry creates
#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    /// Idle time after which a session expires; `None` disables expiry
    pub timeout: Option<Duration>,
    /// Parent directory for content spools; `None` uses the system temp dir
    pub spool_dir: Option<PathBuf>,
}

/// Registry of live sessions
///
/// Looking a session up counts as an access. Sessions found expired on
/// lookup are removed and their connection is closed in the background.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    executors: Arc<AsyncExecutionManager>,
    settings: SessionSettings,
    backends: Vec<Arc<dyn ContentBackend>>,
}

impl SessionRegistry {
    pub fn new(executors: Arc<AsyncExecutionManager>, settings: SessionSettings) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            executors,
            settings,
            backends: Vec::new(),
        }
    }

    /// Make an extra content backend available to every new session
    pub fn with_content_backend(mut self, backend: Arc<dyn ContentBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Create a session around a reserved connection
    #[tracing::instrument(skip(self, connection, admin), fields(driver = connection.driver_name()))]
    pub fn create(
        &self,
        connection: Arc<dyn Connection>,
        admin: Arc<dyn ConnectionFactory>,
        dialect: Dialect,
    ) -> Arc<Session> {
        let content = ContentStore::new().with_spool_dir(self.settings.spool_dir.clone());
        for backend in &self.backends {
            content.register_backend(backend.clone());
        }

        let session = Arc::new(
            Session::new(connection, admin, dialect, self.executors.clone())
                .with_timeout(self.settings.timeout)
                .with_content_store(content),
        );
        self.sessions.write().insert(session.id(), session.clone());
        tracing::info!(session_id = %session.id(), %dialect, "session created");
        session
    }

    /// Look up a live session and record the access
    pub fn get(&self, id: Uuid) -> Result<Arc<Session>, SessionError> {
        let session = self
            .sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))?;

        if let Err(e) = session.touch() {
            self.evict(&session);
            return Err(e);
        }
        Ok(session)
    }

    /// Close a session and release its connection
    pub async fn close(&self, id: Uuid) -> Result<(), SessionError> {
        let session = self
            .sessions
            .write()
            .remove(&id)
            .ok_or(SessionError::NotFound(id))?;
        session.close().await;
        Ok(())
    }

    /// Close every session that has expired, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let expired: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.write();
            let ids: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, session)| session.is_expired())
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for session in &expired {
            session.close().await;
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "purged expired sessions");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    fn evict(&self, session: &Arc<Session>) {
        self.sessions.write().remove(&session.id());
        let session = session.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { session.close().await });
            }
            Err(_) => tracing::warn!(
                session_id = %session.id(),
                "no runtime to close expired session; connection left to its owner"
            ),
        }
    }
}
