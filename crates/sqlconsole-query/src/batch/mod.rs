//! Script splitting
//!
//! This module turns a raw multi-statement script into an ordered list of
//! statement units, honoring quoting, comments and the client-side
//! `DELIMITER` pragma.

mod splitter;
mod unit;

pub use splitter::{
    DEFAULT_DELIMITER, SplitError, SplitScript, Splitter, split_statements, strip_leading_comments,
};
pub use unit::StatementUnit;
