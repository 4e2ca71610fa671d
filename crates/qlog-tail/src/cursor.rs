use std::fmt;

use serde::{Deserialize, Serialize};

/// Continuation token for resuming a backward scan.
///
/// Opaque to callers; internally it is the byte offset of the first byte the
/// scan has not yet delivered, counted from the start of the file. The wire
/// form is the decimal text of that offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(u64);

impl Cursor {
    pub fn new(offset: u64) -> Self {
        Self(offset)
    }

    pub fn offset(self) -> u64 {
        self.0
    }

    pub fn encode(self) -> String {
        self.0.to_string()
    }

    /// Strict decode: ASCII digits only, no sign, no whitespace, must fit
    /// in a u64. Anything else is rejected rather than coerced.
    pub fn decode(token: &str) -> Result<Self, CursorDecodeError> {
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CursorDecodeError {
                token: token.to_string(),
            });
        }
        token
            .parse::<u64>()
            .map(Self)
            .map_err(|_| CursorDecodeError {
                token: token.to_string(),
            })
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorDecodeError {
    pub token: String,
}

impl fmt::Display for CursorDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid continuation token: {:?}", self.token)
    }
}

impl std::error::Error for CursorDecodeError {}
