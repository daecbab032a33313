use std::time::Instant;

use sqlconsole_core::{ColumnMeta, ExecuteOutcome, RowSet, Value};

use super::{
    Cell, ExecutionContext, KillDirective, Payload, ResultTable, StatementError, StatementOutcome,
    VirtualCell,
};
use crate::batch::StatementUnit;
use crate::session::Session;

/// Default size above which a cell is moved into the content store
pub const DEFAULT_CONTENT_THRESHOLD: usize = 64 * 1024;

/// Runs one statement unit on a session's reserved connection
#[derive(Debug, Clone)]
pub struct StatementExecutor {
    content_threshold: usize,
}

impl Default for StatementExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENT_THRESHOLD)
    }
}

impl StatementExecutor {
    /// Create an executor that spools cells larger than `content_threshold` bytes
    pub fn new(content_threshold: usize) -> Self {
        Self { content_threshold }
    }

    pub fn content_threshold(&self) -> usize {
        self.content_threshold
    }

    /// Execute a unit and record its status transitions on the batch board.
    ///
    /// Never returns an error: database failures become a FAILED outcome.
    #[tracing::instrument(
        skip(self, unit, session, ctx),
        fields(
            session_id = %session.id(),
            index = unit.sequence_index(),
            sql_preview = %unit.original_text().chars().take(100).collect::<String>()
        )
    )]
    pub async fn execute(
        &self,
        unit: &StatementUnit,
        session: &Session,
        ctx: &ExecutionContext,
    ) -> StatementOutcome {
        let index = unit.sequence_index();
        ctx.statuses().advance(index, super::ExecutionStatus::Running);
        let started = Instant::now();

        let outcome = if let Some(kill) = KillDirective::parse(unit.original_text()) {
            kill.run(session.admin_factory().as_ref()).await;
            StatementOutcome::success(unit.clone(), Payload::Void, elapsed_ms(started))
        } else {
            match session.connection().execute(unit.original_text()).await {
                Ok(result) => {
                    let payload = self.to_payload(unit, result, session, ctx);
                    StatementOutcome::success(unit.clone(), payload, elapsed_ms(started))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "statement failed");
                    StatementOutcome::failed(unit.clone(), StatementError::from(e), elapsed_ms(started))
                }
            }
        };

        ctx.statuses().advance(index, outcome.status);
        tracing::debug!(status = ?outcome.status, elapsed_ms = outcome.elapsed_ms, "statement finished");
        outcome
    }

    fn to_payload(
        &self,
        unit: &StatementUnit,
        result: ExecuteOutcome,
        session: &Session,
        ctx: &ExecutionContext,
    ) -> Payload {
        match result {
            ExecuteOutcome::Rows(rows) => Payload::RowSet(self.build_table(unit, rows, session, ctx)),
            ExecuteOutcome::Affected(count) => Payload::UpdateCount(count),
            ExecuteOutcome::Ack => Payload::Void,
        }
    }

    fn build_table(
        &self,
        unit: &StatementUnit,
        row_set: RowSet,
        session: &Session,
        ctx: &ExecutionContext,
    ) -> ResultTable {
        let settings = ctx.settings();
        let limit = settings.row_limit.unwrap_or(usize::MAX);
        let truncated = row_set.rows.len() > limit;
        let column_names = row_set.column_names();
        let RowSet { columns, rows } = row_set;

        let rows = rows
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(row, values)| {
                values
                    .into_iter()
                    .enumerate()
                    .map(|(col, value)| self.to_cell(unit.id(), row, col, value, &columns, session))
                    .collect()
            })
            .collect();

        if truncated {
            tracing::debug!(limit, "result set truncated to row limit");
        }

        ResultTable {
            table_id: unit.id().to_string(),
            column_names,
            columns: settings.include_column_metadata.then_some(columns),
            rows,
            truncated,
        }
    }

    fn to_cell(
        &self,
        table_id: &str,
        row: usize,
        col: usize,
        value: Value,
        columns: &[ColumnMeta],
        session: &Session,
    ) -> Cell {
        let meta = columns.get(col);
        let type_name = meta
            .map(|m| m.data_type.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| value.type_name())
            .to_string();
        let column_name = meta.map(|m| m.name.as_str()).unwrap_or_default();

        let spooled = match value.content_bytes() {
            Some(bytes) if bytes.len() > self.content_threshold => Some(
                session
                    .content()
                    .spool(table_id, row, col, &type_name, column_name, &bytes),
            ),
            _ => None,
        };

        match spooled {
            Some(Ok(element)) => Cell::Virtual(VirtualCell {
                row,
                col,
                size: element.content.length,
                type_name,
            }),
            Some(Err(e)) => {
                tracing::warn!(row, col, error = %e, "failed to spool cell content; keeping it inline");
                Cell::Value(value)
            }
            None => Cell::Value(value),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
