use serde::{Deserialize, Serialize};

/// What a batch does after one of its units fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Cancel every unit after the failed one
    #[default]
    StopOnError,
    /// Keep executing the remaining units
    ContinueOnError,
}

impl ErrorPolicy {
    pub fn from_continue_on_error(continue_on_error: bool) -> Self {
        if continue_on_error {
            ErrorPolicy::ContinueOnError
        } else {
            ErrorPolicy::StopOnError
        }
    }

    pub fn stops_on_error(&self) -> bool {
        matches!(self, ErrorPolicy::StopOnError)
    }
}
