use std::sync::LazyLock;

use regex::Regex;

use super::{InterceptorError, ResultInterceptor, session_directive, unquote};
use crate::executor::{ExecutionContext, StatementOutcome};
use crate::session::{Session, TIME_ZONE};

static TIME_ZONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^(?:set\s+(?:session\s+|@@session\.|@@)?time_zone|alter\s+session\s+set\s+time_zone)\s*=\s*(.+?)\s*;?\s*$",
    )
    .expect("valid regex")
});

/// Mirrors session time zone changes into the `time_zone` session attribute
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeZoneInterceptor;

impl TimeZoneInterceptor {
    /// New time zone set by `sql`, if it is a session time zone change
    pub fn parse(sql: &str) -> Option<String> {
        let captures = TIME_ZONE_REGEX.captures(sql)?;
        Some(unquote(captures.get(1)?.as_str()))
    }
}

impl ResultInterceptor for TimeZoneInterceptor {
    fn name(&self) -> &str {
        "time_zone"
    }

    fn after_completion(
        &self,
        outcome: &StatementOutcome,
        session: &Session,
        ctx: &ExecutionContext,
    ) -> Result<(), InterceptorError> {
        let Some(time_zone) = session_directive(outcome, ctx).and_then(Self::parse) else {
            return Ok(());
        };
        tracing::debug!(session_id = %session.id(), %time_zone, "recording session time zone");
        session.set_attribute(TIME_ZONE, serde_json::Value::String(time_zone))?;
        Ok(())
    }
}
