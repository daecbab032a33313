use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::splitter::strip_leading_comments;

/// One executable statement cut out of a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementUnit {
    id: String,
    original_text: String,
    sequence_index: usize,
    offset: usize,
}

impl StatementUnit {
    /// Create a unit with a fresh identifier
    pub fn new(sequence_index: usize, offset: usize, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            original_text: text.into(),
            sequence_index,
            offset,
        }
    }

    /// Unique identifier, also used as the table id of the unit's result
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Statement text exactly as written, comments included
    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    /// 0-based position of the unit in its batch
    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    /// Byte offset of the unit's first character in the source script
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Statement text with leading comments and whitespace removed
    pub fn text_without_leading_comments(&self) -> &str {
        strip_leading_comments(&self.original_text)
    }
}
