//! Errors surfaced at the console service boundary
//!
//! Per-statement failures are not errors here: they travel as FAILED
//! results. These variants cover requests that cannot be served at all.

use sqlconsole_core::ConsoleError;
use thiserror::Error;
use uuid::Uuid;

use crate::batch::SplitError;
use crate::content::ContentError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum QueryServiceError {
    /// The script could not be split; nothing was executed
    #[error("Invalid script: {0}")]
    Split(#[from] SplitError),

    /// The session does not exist or has expired
    #[error("Session {0} not found or expired")]
    SessionNotFound(Uuid),

    #[error("Batch {0} not found")]
    BatchNotFound(Uuid),

    /// Only the requested cell is affected
    #[error("Failed to read content: {0}")]
    ContentRead(#[from] ContentError),

    #[error("{metric} limit exceeded: {actual} > {max}")]
    LimitExceeded {
        metric: &'static str,
        actual: usize,
        max: usize,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] ConsoleError),
}

impl From<SessionError> for QueryServiceError {
    fn from(err: SessionError) -> Self {
        QueryServiceError::SessionNotFound(err.session_id())
    }
}

pub type QueryServiceResult<T> = std::result::Result<T, QueryServiceError>;
