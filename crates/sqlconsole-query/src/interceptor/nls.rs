use std::sync::LazyLock;

use regex::Regex;

use super::{InterceptorError, ResultInterceptor, session_directive, unquote};
use crate::executor::{ExecutionContext, StatementOutcome};
use crate::session::Session;

static SET_NLS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^set\s+(?:session\s+|@@session\.)?[`"]?(nls_date_format|nls_timestamp_format|nls_timestamp_tz_format)[`"]?\s*=\s*(.+?)\s*;?\s*$"#,
    )
    .expect("valid regex")
});

static ALTER_SESSION_NLS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^alter\s+session\s+set\s+[`"]?(nls_date_format|nls_timestamp_format|nls_timestamp_tz_format)[`"]?\s*=\s*(.+?)\s*;?\s*$"#,
    )
    .expect("valid regex")
});

/// Mirrors session-scoped NLS date/time format changes into session attributes
///
/// Global-scope changes do not affect the current session and are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct NlsFormatInterceptor;

impl NlsFormatInterceptor {
    /// Attribute key and new value set by `sql`, if it is an NLS format change
    pub fn parse(sql: &str) -> Option<(String, String)> {
        let captures = SET_NLS_REGEX
            .captures(sql)
            .or_else(|| ALTER_SESSION_NLS_REGEX.captures(sql))?;
        let key = captures.get(1)?.as_str().to_ascii_lowercase();
        let value = unquote(captures.get(2)?.as_str());
        Some((key, value))
    }
}

impl ResultInterceptor for NlsFormatInterceptor {
    fn name(&self) -> &str {
        "nls_format"
    }

    fn after_completion(
        &self,
        outcome: &StatementOutcome,
        session: &Session,
        ctx: &ExecutionContext,
    ) -> Result<(), InterceptorError> {
        let Some((key, value)) = session_directive(outcome, ctx).and_then(Self::parse) else {
            return Ok(());
        };
        tracing::debug!(session_id = %session.id(), %key, %value, "recording NLS format");
        session.set_attribute(key, serde_json::Value::String(value))?;
        Ok(())
    }
}
