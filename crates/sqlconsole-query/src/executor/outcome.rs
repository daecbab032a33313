use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sqlconsole_core::{ColumnMeta, ConsoleError, ErrorPosition, Value};

use crate::batch::StatementUnit;

/// Lifecycle state of a statement unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Created,
    Running,
    Success,
    Failed,
    Canceled,
}

impl ExecutionStatus {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Success | ExecutionStatus::Failed | ExecutionStatus::Canceled
        )
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    ///
    /// Only units that never started can be canceled; an interrupted unit
    /// ends up failed.
    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, next),
            (Created, Running) | (Created, Canceled) | (Running, Success | Failed)
        )
    }
}

/// Per-unit status of one batch, shared between the job and its observers
#[derive(Debug)]
pub struct StatusBoard {
    statuses: Mutex<Vec<ExecutionStatus>>,
}

impl StatusBoard {
    pub fn new(unit_count: usize) -> Self {
        Self {
            statuses: Mutex::new(vec![ExecutionStatus::Created; unit_count]),
        }
    }

    /// Move a unit to `next`. Illegal transitions are ignored and reported.
    pub fn advance(&self, index: usize, next: ExecutionStatus) -> bool {
        let mut statuses = self.statuses.lock();
        let Some(current) = statuses.get_mut(index) else {
            tracing::warn!(index, "status update for unknown unit");
            return false;
        };
        if !current.can_transition_to(next) {
            tracing::warn!(index, from = ?*current, to = ?next, "ignoring illegal status transition");
            return false;
        }
        *current = next;
        true
    }

    pub fn get(&self, index: usize) -> Option<ExecutionStatus> {
        self.statuses.lock().get(index).copied()
    }

    pub fn snapshot(&self) -> Vec<ExecutionStatus> {
        self.statuses.lock().clone()
    }
}

/// Error information for a failed statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementError {
    /// Error message
    pub message: String,
    /// Error code (if available from database)
    pub code: Option<String>,
    /// Where in the statement the database located the error
    pub position: Option<ErrorPosition>,
}

impl StatementError {
    /// Create a new statement error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            position: None,
        }
    }

    /// Create a statement error with a code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_position(mut self, position: ErrorPosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Error recorded for a statement interrupted by a cancel request
    pub fn canceled() -> Self {
        Self::new("statement canceled by user")
    }

    /// Error recorded for a statement interrupted by the batch wait timeout
    pub fn timed_out(timeout_ms: u64) -> Self {
        Self::new(format!("batch wait timeout of {} ms exceeded", timeout_ms))
    }
}

impl From<ConsoleError> for StatementError {
    fn from(err: ConsoleError) -> Self {
        match err {
            ConsoleError::Database {
                message,
                code,
                position,
            } => Self {
                message,
                code,
                position,
            },
            other => Self::new(other.to_string()),
        }
    }
}

impl std::fmt::Display for StatementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "[{}] {}", code, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Placeholder for a cell whose value was moved to the session content store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualCell {
    pub row: usize,
    pub col: usize,
    /// Full size of the stored content in bytes
    pub size: u64,
    pub type_name: String,
}

/// One cell of a result table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Value(Value),
    Virtual(VirtualCell),
}

impl Cell {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Cell::Value(v) => Some(v),
            Cell::Virtual(_) => None,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Cell::Virtual(_))
    }
}

/// Result set of a query, shaped for the console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    /// Identifier used to address stored cell content; equals the unit id
    pub table_id: String,
    pub column_names: Vec<String>,
    /// Full column metadata, omitted when the caller opted out
    pub columns: Option<Vec<ColumnMeta>>,
    pub rows: Vec<Vec<Cell>>,
    /// Whether rows were dropped to honor the row limit
    pub truncated: bool,
}

impl ResultTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Payload of a successful statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    RowSet(ResultTable),
    UpdateCount(u64),
    Void,
}

/// Result of executing a single statement unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementOutcome {
    pub unit: StatementUnit,
    pub status: ExecutionStatus,
    pub payload: Option<Payload>,
    pub error: Option<StatementError>,
    pub elapsed_ms: u64,
}

impl StatementOutcome {
    pub fn success(unit: StatementUnit, payload: Payload, elapsed_ms: u64) -> Self {
        Self {
            unit,
            status: ExecutionStatus::Success,
            payload: Some(payload),
            error: None,
            elapsed_ms,
        }
    }

    pub fn failed(unit: StatementUnit, error: StatementError, elapsed_ms: u64) -> Self {
        Self {
            unit,
            status: ExecutionStatus::Failed,
            payload: None,
            error: Some(error),
            elapsed_ms,
        }
    }

    /// Placeholder for a unit that never ran
    pub fn canceled(unit: StatementUnit) -> Self {
        Self {
            unit,
            status: ExecutionStatus::Canceled,
            payload: None,
            error: None,
            elapsed_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == ExecutionStatus::Failed
    }

    pub fn is_canceled(&self) -> bool {
        self.status == ExecutionStatus::Canceled
    }

    pub fn table(&self) -> Option<&ResultTable> {
        match &self.payload {
            Some(Payload::RowSet(table)) => Some(table),
            _ => None,
        }
    }

    pub fn update_count(&self) -> Option<u64> {
        match &self.payload {
            Some(Payload::UpdateCount(n)) => Some(*n),
            _ => None,
        }
    }
}
