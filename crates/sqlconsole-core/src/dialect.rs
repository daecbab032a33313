//! Server dialects the engine knows how to talk to

use serde::{Deserialize, Serialize};

/// SQL dialect of the server behind a session
///
/// The dialect decides the lexical rules of the statement splitter and the
/// syntax of the administrative statements the engine generates itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    MySql,
    Oracle,
}

impl Dialect {
    /// Whether `#` starts a line comment
    pub fn hash_comments(&self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Whether backticks quote identifiers
    pub fn backtick_identifiers(&self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Whether a backslash escapes the next character inside a string literal
    pub fn backslash_escapes(&self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Whether `--` only starts a comment when followed by whitespace
    pub fn strict_double_dash(&self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Statement that interrupts the query running on `connection_id`
    /// without dropping the connection itself
    pub fn kill_query_statement(&self, connection_id: &str) -> String {
        match self {
            Dialect::MySql => format!("KILL QUERY {}", connection_id),
            Dialect::Oracle => format!("ALTER SYSTEM CANCEL SQL '{}'", connection_id),
        }
    }

    /// Statement that terminates the whole session `target`
    pub fn kill_session_statement(&self, target: &str) -> String {
        match self {
            Dialect::MySql => format!("KILL {}", target),
            Dialect::Oracle => format!("ALTER SYSTEM KILL SESSION '{}' IMMEDIATE", target),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::MySql => write!(f, "mysql"),
            Dialect::Oracle => write!(f, "oracle"),
        }
    }
}
