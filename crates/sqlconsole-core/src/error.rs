//! Error types for the console engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Location of a database-reported error inside the statement text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPosition {
    /// 1-based line number
    pub line: u32,
    /// 1-based column, when the server reports one
    pub column: Option<u32>,
}

impl ErrorPosition {
    pub fn new(line: u32, column: Option<u32>) -> Self {
        Self { line, column }
    }
}

/// Core error type for connection-level operations
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Connection error: {0}")]
    Connection(String),

    /// Error reported by the database while running a statement
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: Option<String>,
        position: Option<ErrorPosition>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl ConsoleError {
    /// Create a database error with only a message
    pub fn database(message: impl Into<String>) -> Self {
        ConsoleError::Database {
            message: message.into(),
            code: None,
            position: None,
        }
    }

    /// Create a database error carrying the server's error code
    pub fn database_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        ConsoleError::Database {
            message: message.into(),
            code: Some(code.into()),
            position: None,
        }
    }

    /// Server error code, if this error came from the database
    pub fn code(&self) -> Option<&str> {
        match self {
            ConsoleError::Database { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Position of the error in the statement text, if reported
    pub fn position(&self) -> Option<ErrorPosition> {
        match self {
            ConsoleError::Database { position, .. } => *position,
            _ => None,
        }
    }
}

/// Result type alias for connection-level operations
pub type Result<T> = std::result::Result<T, ConsoleError>;
