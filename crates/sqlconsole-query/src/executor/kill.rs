use std::sync::LazyLock;

use regex::Regex;
use sqlconsole_core::ConnectionFactory;

use crate::batch::strip_leading_comments;

static KILL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^kill\s+(?:(?:connection|query|session)\s+)?[^\s;]+\s*;?\s*$")
        .expect("valid regex")
});

static ALTER_SYSTEM_KILL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^alter\s+system\s+(?:kill\s+session|cancel\s+sql)\s+'[^']+'(?:\s+immediate)?\s*;?\s*$")
        .expect("valid regex")
});

/// A statement that terminates another session or query
///
/// These never run on the session's reserved connection: that connection
/// may be the very one being killed. They go through a short-lived
/// administrative connection instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillDirective {
    statement: String,
}

impl KillDirective {
    /// Recognize a kill statement, ignoring leading comments
    pub fn parse(sql: &str) -> Option<Self> {
        let statement = strip_leading_comments(sql).trim();
        if KILL_REGEX.is_match(statement) || ALTER_SYSTEM_KILL_REGEX.is_match(statement) {
            Some(Self {
                statement: statement.to_string(),
            })
        } else {
            None
        }
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Run the directive on a fresh administrative connection.
    ///
    /// Failures are logged and swallowed; the kill counts as done either way.
    pub async fn run(&self, admin: &dyn ConnectionFactory) {
        match run_administrative(admin, &self.statement).await {
            Ok(()) => tracing::info!(statement = %self.statement, "kill directive executed"),
            Err(e) => tracing::warn!(
                statement = %self.statement,
                error = %e,
                "kill directive failed on administrative connection"
            ),
        }
    }
}

/// Execute one statement on a new connection from `admin`, then close it
pub(crate) async fn run_administrative(
    admin: &dyn ConnectionFactory,
    sql: &str,
) -> sqlconsole_core::Result<()> {
    let connection = admin.create().await?;
    let result = connection.execute(sql).await;
    if let Err(e) = connection.close().await {
        tracing::debug!(error = %e, "failed to close administrative connection");
    }
    result.map(|_| ())
}
