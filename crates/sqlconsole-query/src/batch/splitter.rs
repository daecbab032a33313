use sqlconsole_core::Dialect;
use thiserror::Error;

use super::StatementUnit;

/// Statement delimiter used when a script does not override it
pub const DEFAULT_DELIMITER: &str = ";";

const PRAGMA_KEYWORD: &str = "delimiter";

/// Errors raised while splitting a script
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("statement delimiter must not be empty")]
    EmptyDelimiter,

    #[error("line {line}: DELIMITER requires a delimiter string")]
    MissingDelimiter { line: usize },

    #[error("line {line}: invalid delimiter '{delimiter}'")]
    InvalidDelimiter { line: usize, delimiter: String },
}

/// Full outcome of splitting a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitScript {
    /// Executable units in source order
    pub units: Vec<StatementUnit>,
    /// Delimiter in effect at the end of the script
    pub delimiter: String,
    /// Number of `DELIMITER` pragmas consumed
    pub pragma_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    Quoted(u8),
    LineComment,
    BlockComment,
}

/// Text of the unit currently being collected
#[derive(Debug, Default)]
struct PendingUnit {
    text: String,
    start: Option<usize>,
    has_code: bool,
}

impl PendingUnit {
    fn push(&mut self, segment: &str) {
        self.text.push_str(segment);
    }

    fn mark_start(&mut self, offset: usize) {
        self.start.get_or_insert(offset);
    }

    /// Close the pending unit. Comment-only or blank text yields nothing.
    fn take(&mut self, sequence_index: usize) -> Option<StatementUnit> {
        let text = std::mem::take(&mut self.text);
        let start = self.start.take();
        let has_code = std::mem::replace(&mut self.has_code, false);
        if !has_code {
            return None;
        }
        Some(StatementUnit::new(sequence_index, start?, text.trim()))
    }
}

/// Lexical statement splitter
///
/// Splitting never executes or parses SQL. It tracks just enough lexical
/// state (string literals, quoted identifiers, comments) to find the
/// statement delimiters that are really delimiters.
///
/// A line whose first word is `DELIMITER` changes the delimiter for the rest
/// of the script. The pragma is only honored between statements, so a
/// continuation line that happens to begin with a column named `delimiter`
/// stays part of its statement.
///
/// # Example
/// ```ignore
/// let splitter = Splitter::new(Dialect::MySql);
/// let units = splitter.split("DELIMITER $$\nCREATE PROCEDURE p() BEGIN SELECT 1; END$$")?;
/// assert_eq!(units.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Splitter {
    dialect: Dialect,
    delimiter: String,
}

impl Default for Splitter {
    fn default() -> Self {
        Self::new(Dialect::default())
    }
}

impl Splitter {
    /// Create a splitter for the given dialect using the default delimiter
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }

    /// Set the delimiter in effect at the start of the script
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Split a script into executable units
    pub fn split(&self, script: &str) -> Result<Vec<StatementUnit>, SplitError> {
        Ok(self.split_script(script)?.units)
    }

    /// Split a script and report the pragma bookkeeping along with the units
    pub fn split_script(&self, script: &str) -> Result<SplitScript, SplitError> {
        if self.delimiter.trim().is_empty() {
            return Err(SplitError::EmptyDelimiter);
        }

        let bytes = script.as_bytes();
        let len = bytes.len();
        let mut units = Vec::new();
        let mut pending = PendingUnit::default();
        let mut delimiter = self.delimiter.clone();
        let mut pragma_count = 0;
        let mut state = State::Normal;
        let mut segment_start = 0;
        let mut i = 0;

        while i < len {
            let b = bytes[i];
            let next = bytes.get(i + 1).copied();

            match state {
                State::Normal => {
                    if !pending.has_code && is_line_start(bytes, i) {
                        let line_end = script[i..].find('\n').map_or(len, |p| i + p);
                        if let Some(pragma) = parse_pragma(&script[i..line_end]) {
                            let line = script[..i].matches('\n').count() + 1;
                            delimiter = match pragma {
                                Pragma::Delimiter(d) => d.to_string(),
                                Pragma::Missing => {
                                    return Err(SplitError::MissingDelimiter { line });
                                }
                                Pragma::Invalid(d) => {
                                    return Err(SplitError::InvalidDelimiter {
                                        line,
                                        delimiter: d.to_string(),
                                    });
                                }
                            };
                            pragma_count += 1;
                            pending.push(&script[segment_start..i]);
                            segment_start = line_end;
                            i = line_end;
                            continue;
                        }
                    }

                    if b.is_ascii_whitespace() {
                        i += 1;
                        continue;
                    }
                    pending.mark_start(i);

                    if b == b'-' && next == Some(b'-') && self.opens_double_dash(bytes.get(i + 2)) {
                        state = State::LineComment;
                        i += 2;
                    } else if b == b'#' && self.dialect.hash_comments() {
                        state = State::LineComment;
                        i += 1;
                    } else if b == b'/' && next == Some(b'*') {
                        // MySQL executable comments carry code of their own
                        if bytes.get(i + 2) == Some(&b'!') {
                            pending.has_code = true;
                        }
                        state = State::BlockComment;
                        i += 2;
                    } else if b == b'\''
                        || b == b'"'
                        || (b == b'`' && self.dialect.backtick_identifiers())
                    {
                        pending.has_code = true;
                        state = State::Quoted(b);
                        i += 1;
                    } else if bytes[i..].starts_with(delimiter.as_bytes()) {
                        pending.push(&script[segment_start..i]);
                        if let Some(unit) = pending.take(units.len()) {
                            units.push(unit);
                        }
                        i += delimiter.len();
                        segment_start = i;
                    } else {
                        pending.has_code = true;
                        i += 1;
                    }
                }
                State::LineComment => {
                    if b == b'\n' {
                        state = State::Normal;
                    }
                    i += 1;
                }
                State::BlockComment => {
                    if b == b'*' && next == Some(b'/') {
                        state = State::Normal;
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                State::Quoted(quote) => {
                    if b == b'\\' && quote != b'`' && self.dialect.backslash_escapes() {
                        i += 2;
                    } else if b == quote {
                        if next == Some(quote) {
                            i += 2;
                        } else {
                            state = State::Normal;
                            i += 1;
                        }
                    } else {
                        i += 1;
                    }
                }
            }
        }

        if segment_start < len {
            pending.push(&script[segment_start..]);
        }
        if let Some(unit) = pending.take(units.len()) {
            units.push(unit);
        }

        tracing::trace!(
            units = units.len(),
            pragmas = pragma_count,
            "split script into statement units"
        );

        Ok(SplitScript {
            units,
            delimiter,
            pragma_count,
        })
    }

    fn opens_double_dash(&self, after: Option<&u8>) -> bool {
        if !self.dialect.strict_double_dash() {
            return true;
        }
        after.is_none_or(|b| b.is_ascii_whitespace())
    }
}

/// Split a MySQL-flavored script using the given initial delimiter
pub fn split_statements(script: &str, delimiter: &str) -> Result<Vec<StatementUnit>, SplitError> {
    Splitter::new(Dialect::MySql)
        .with_delimiter(delimiter)
        .split(script)
}

/// Skip leading whitespace and comments of a statement
pub fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("--").or_else(|| rest.strip_prefix('#')) {
            rest = after.find('\n').map_or("", |p| &after[p + 1..]);
        } else if rest.starts_with("/*!") {
            return rest;
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |p| &after[p + 2..]);
        } else {
            return rest;
        }
    }
}

enum Pragma<'a> {
    Delimiter(&'a str),
    Missing,
    Invalid(&'a str),
}

fn is_line_start(bytes: &[u8], i: usize) -> bool {
    i == 0 || bytes[i - 1] == b'\n'
}

fn parse_pragma(line: &str) -> Option<Pragma<'_>> {
    let trimmed = line.trim();
    let keyword = trimmed.get(..PRAGMA_KEYWORD.len())?;
    if !keyword.eq_ignore_ascii_case(PRAGMA_KEYWORD) {
        return None;
    }
    let rest = &trimmed[PRAGMA_KEYWORD.len()..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut words = rest.split_whitespace();
    match words.next() {
        None => Some(Pragma::Missing),
        Some(token) => {
            let quoted = token.contains(['\'', '"', '`']);
            if quoted || words.next().is_some() {
                Some(Pragma::Invalid(rest.trim()))
            } else {
                Some(Pragma::Delimiter(token))
            }
        }
    }
}
