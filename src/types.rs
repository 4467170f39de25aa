//! Core types for the Holocene storage engine.

use crate::error::StorageError;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of random bytes in an identifier.
pub const ID_LEN: usize = 16;

/// Identifier: 128 random bits rendered as 32 lowercase hex characters
///
/// Used for database names, resource names and revision ids.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier([u8; ID_LEN]);

/// RevisionId: identifier of an immutable revision blob
pub type RevisionId = Identifier;

impl Identifier {
    /// Generate a fresh identifier from the operating system's CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; ID_LEN];
        OsRng.fill_bytes(&mut bytes);
        Identifier(bytes)
    }

    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Identifier(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// Parse the 32-character lowercase hex form.
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        // Uppercase is rejected so one id never maps to two directory names.
        if s.len() != ID_LEN * 2 || !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(StorageError::InvalidIdentifier(s.to_string()));
        }
        let mut bytes = [0u8; ID_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|_| StorageError::InvalidIdentifier(s.to_string()))?;
        Ok(Identifier(bytes))
    }

    /// Whether `s` is a well-formed identifier.
    pub fn is_valid(s: &str) -> bool {
        Self::parse(s).is_ok()
    }

    /// First eight hex characters, for log lines and tables.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self)
    }
}

impl FromStr for Identifier {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identifier::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = StorageError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Identifier::parse(&s)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.to_string()
    }
}

/// Content type label for JSON-serialized objects.
pub const JSON_CONTENT_TYPE: &str = "application/json";
