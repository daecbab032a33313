//! Result interceptors
//!
//! Interceptors observe every completed statement before its result becomes
//! visible to pollers. The built-in ones mirror session parameters the user
//! changed through SQL (`SET time_zone`, `ALTER SESSION SET NLS_...`) into
//! session attributes, so later result formatting can honor them.

mod chain;
mod nls;
mod time_zone;

pub use chain::{InterceptorChain, InterceptorError, ResultInterceptor};
pub use nls::NlsFormatInterceptor;
pub use time_zone::TimeZoneInterceptor;

use crate::executor::{ExecutionContext, StatementOutcome};

/// Text of a successful single-statement batch, without leading comments.
///
/// Session directives are only mirrored when they are the whole batch; in
/// a longer script a later statement may already have changed them again.
fn session_directive<'a>(outcome: &'a StatementOutcome, ctx: &ExecutionContext) -> Option<&'a str> {
    if ctx.unit_count() != 1 || !outcome.is_success() {
        return None;
    }
    Some(strip_trailing_comment(outcome.unit.text_without_leading_comments()))
}

/// Cut `sql` at the first comment outside a quoted string
fn strip_trailing_comment(sql: &str) -> &str {
    let bytes = sql.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match (b, bytes.get(i + 1).copied()) {
                (b'\'' | b'"' | b'`', _) => quote = Some(b),
                (b'-', Some(b'-')) | (b'/', Some(b'*')) | (b'#', _) => return sql[..i].trim_end(),
                _ => {}
            },
        }
        i += 1;
    }
    sql
}

/// Strip one level of matching single or double quotes from a SQL value
fn unquote(raw: &str) -> String {
    let value = raw.trim();
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            let inner = &value[1..value.len() - 1];
            let doubled = format!("{quote}{quote}");
            return inner.replace(&doubled, &quote.to_string());
        }
    }
    value.to_string()
}
