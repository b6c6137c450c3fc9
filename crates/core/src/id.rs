//! Object identifiers.
//!
//! An [`ObjectId`] is the only representation of a model reference that may
//! cross a process boundary. Identifiers are opaque strings such as
//! `unit:42` or `player:natives`; they are ordered lexically so that every
//! map keyed by them iterates deterministically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum identifier length accepted from the wire.
pub const MAX_ID_LEN: usize = 128;

/// Error returned when parsing an invalid [`ObjectId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The identifier was empty or whitespace.
    #[error("object identifier cannot be empty")]
    Empty,
    /// The identifier exceeded [`MAX_ID_LEN`].
    #[error("object identifier too long ({len} > {MAX_ID_LEN})")]
    TooLong {
        /// Length of the rejected input.
        len: usize,
    },
    /// The identifier contained a character outside `A-Za-z0-9:._-`.
    #[error("object identifier has invalid character {ch:?}")]
    InvalidChar {
        /// First offending character.
        ch: char,
    },
}

/// Stable, globally unique name of one persistent model entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Parse and validate an identifier.
    pub fn parse(input: &str) -> Result<Self, IdError> {
        if input.trim().is_empty() {
            return Err(IdError::Empty);
        }
        if input.len() > MAX_ID_LEN {
            return Err(IdError::TooLong { len: input.len() });
        }
        if let Some(ch) = input
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, ':' | '.' | '_' | '-')))
        {
            return Err(IdError::InvalidChar { ch });
        }
        Ok(Self(input.to_string()))
    }

    /// Build `prefix:serial`, the shape used for freshly allocated objects.
    pub fn with_serial(prefix: &str, serial: u64) -> Result<Self, IdError> {
        Self::parse(&format!("{prefix}:{serial}"))
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Part before the first `:`, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.0.split_once(':').map(|(prefix, _)| prefix)
    }

    /// FNV-1a hash of the identifier text.
    ///
    /// Stable across runs and platforms, unlike `std::hash`, so it can seed
    /// replayable randomness.
    pub fn stable_hash(&self) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;
        self.0.bytes().fold(OFFSET, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(PRIME)
        })
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ObjectId> for String {
    fn from(value: ObjectId) -> Self {
        value.0
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Kind of entity an identifier is expected to name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A player (human, AI or native).
    Player,
    /// A unit on the map.
    Unit,
    /// A colony or native settlement.
    Settlement,
    /// An AI shadow object.
    AiObject,
}

impl ObjectKind {
    /// Canonical lower-case name used in error text.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Unit => "unit",
            Self::Settlement => "settlement",
            Self::AiObject => "AI object",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_identifier() {
        let id = ObjectId::parse("unit:42").unwrap();
        assert_eq!(id.as_str(), "unit:42");
        assert_eq!(id.prefix(), Some("unit"));
        assert_eq!(id.to_string(), "unit:42");
    }

    #[test]
    fn rejects_empty_and_invalid() {
        assert_eq!(ObjectId::parse(""), Err(IdError::Empty));
        assert_eq!(ObjectId::parse("   "), Err(IdError::Empty));
        assert_eq!(
            ObjectId::parse("unit 42"),
            Err(IdError::InvalidChar { ch: ' ' })
        );
        assert!(ObjectId::parse("unit:<42>").is_err());
        assert!(ObjectId::parse(&"x".repeat(MAX_ID_LEN + 1)).is_err());
    }

    #[test]
    fn stable_hash_is_fixed() {
        let id = ObjectId::parse("settlement:1").unwrap();
        assert_eq!(id.stable_hash(), id.clone().stable_hash());
        assert_ne!(
            id.stable_hash(),
            ObjectId::parse("settlement:2").unwrap().stable_hash()
        );
    }

    #[test]
    fn serde_rejects_invalid_identifier() {
        let ok: ObjectId = serde_json::from_str("\"player:1\"").unwrap();
        assert_eq!(ok.as_str(), "player:1");
        assert!(serde_json::from_str::<ObjectId>("\"bad id\"").is_err());
    }
}
