//! SQL console - session-scoped, multi-statement SQL execution
//!
//! This crate splits scripts into statements, runs them in order on a
//! session's reserved connection and exposes the results for polling,
//! with cancellation, timeouts and paged access to large cell values.

pub mod batch;
mod config;
pub mod content;
mod error;
pub mod executor;
pub mod interceptor;
pub mod logging;
pub mod manager;
mod service;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use config::ConsoleConfig;
pub use error::{QueryServiceError, QueryServiceResult};
pub use service::{BatchProgress, ConsoleService, ContentRequest, ExecuteOptions};

// Re-export the types callers see in results
pub use batch::{SplitError, StatementUnit, split_statements};
pub use content::{BinaryContent, ValueEncoding};
pub use executor::{
    Cell, ExecutionStatus, Payload, ResultTable, StatementError, StatementOutcome, VirtualCell,
};
pub use manager::{BatchId, ErrorPolicy};
pub use session::{Session, SessionError};
