//! Certificate thumbprint (SHA-1 of the DER encoding)

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use sha1::{Digest, Sha1};
use thiserror::Error;

/// Hex SHA-1 digest identifying a certificate.
///
/// Stored upper-case so equality is case-insensitive with respect to user
/// input: `"abcd1234"` and `"ABCD1234"` parse to the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Thumbprint(String);

impl Thumbprint {
    /// Thumbprint of a DER-encoded certificate
    pub fn of(der: &[u8]) -> Self {
        Self(hex::encode_upper(Sha1::digest(der)))
    }

    /// Parse a user-supplied thumbprint.
    ///
    /// Surrounding whitespace and the space/colon separators certificate
    /// viewers insert between bytes are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ThumbprintError` if the input is empty, holds a non-hex
    /// character or an odd number of digits.
    pub fn parse(input: &str) -> Result<Self, ThumbprintError> {
        let digits: String = input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .collect();

        if digits.is_empty() {
            return Err(ThumbprintError::Empty);
        }
        if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ThumbprintError::InvalidCharacter { found: bad });
        }
        if digits.len() % 2 != 0 {
            return Err(ThumbprintError::OddLength { len: digits.len() });
        }

        Ok(Self(digits.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Thumbprint {
    type Err = ThumbprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Thumbprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThumbprintError {
    #[error("thumbprint is empty")]
    Empty,

    #[error("thumbprint contains non-hex character {found:?}")]
    InvalidCharacter { found: char },

    #[error("thumbprint has an odd number of hex digits ({len})")]
    OddLength { len: usize },
}
