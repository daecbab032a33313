use std::borrow::Cow;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// How content bytes are rendered for the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueEncoding {
    /// Raw bytes, meant to be shown as text
    #[default]
    Txt,
    /// Lowercase hexadecimal
    Hex,
    /// Standard base64 with padding
    Base64,
}

impl ValueEncoding {
    pub fn encode(&self, bytes: Vec<u8>) -> Vec<u8> {
        match self {
            ValueEncoding::Txt => bytes,
            ValueEncoding::Hex => hex::encode(bytes).into_bytes(),
            ValueEncoding::Base64 => STANDARD.encode(bytes).into_bytes(),
        }
    }
}

impl FromStr for ValueEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ValueEncoding::Txt),
            "hex" => Ok(ValueEncoding::Hex),
            "base64" => Ok(ValueEncoding::Base64),
            other => Err(format!("unknown value encoding '{}'", other)),
        }
    }
}

/// One page of stored content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryContent {
    /// Requested window, already encoded
    pub data: Vec<u8>,
    /// Full size of the stored content in bytes, regardless of the window
    pub size: u64,
    pub encoding: ValueEncoding,
}

impl BinaryContent {
    /// Window rendered as text; invalid UTF-8 is replaced
    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}
