//! Single-statement execution
//!
//! The [`StatementExecutor`] runs one statement unit on a session's reserved
//! connection and shapes whatever the server returned into a
//! [`StatementOutcome`]: row limits, optional column metadata and moving
//! oversized cells into the session's content store all happen here.

mod context;
mod kill;
mod outcome;
mod statement;

pub use context::{ExecutionContext, ExecutionSettings};
pub use kill::KillDirective;
pub(crate) use kill::run_administrative;
pub use outcome::{
    Cell, ExecutionStatus, Payload, ResultTable, StatementError, StatementOutcome, StatusBoard,
    VirtualCell,
};
pub use statement::{DEFAULT_CONTENT_THRESHOLD, StatementExecutor};
