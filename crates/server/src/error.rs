//! Client errors.

use thiserror::Error;
use tradewind_core::ResolveError;
use tradewind_net::{CodecError, ErrorKind, ErrorMessage};
use tradewind_world::{LookupError, RuleError};

/// A rejected submission. Reported to the submitter only; the world is left
/// exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {reason}")]
pub struct ClientError {
    kind: ErrorKind,
    reason: String,
}

impl ClientError {
    /// Error of the given kind.
    pub fn new(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    /// A referenced identifier did not resolve.
    pub fn resolution(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resolution, reason)
    }

    /// A precondition of the command does not hold.
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Precondition, reason)
    }

    /// Game logic refused the command.
    pub fn rules(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rules, reason)
    }

    /// The frame or element could not be decoded.
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, reason)
    }

    /// Error category.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Wire form sent back to the submitter.
    pub fn to_message(&self) -> ErrorMessage {
        ErrorMessage::new(self.kind, self.reason.clone())
    }
}

impl From<ResolveError> for ClientError {
    fn from(value: ResolveError) -> Self {
        ClientError::resolution(value.to_string())
    }
}

impl From<LookupError> for ClientError {
    fn from(value: LookupError) -> Self {
        match value {
            LookupError::Resolve(_) | LookupError::NotOwned { .. } => {
                ClientError::resolution(value.to_string())
            }
            LookupError::NotAdjacent { .. } => ClientError::precondition(value.to_string()),
        }
    }
}

impl From<RuleError> for ClientError {
    fn from(value: RuleError) -> Self {
        match value {
            RuleError::Lookup(lookup) => lookup.into(),
            other => ClientError::rules(other.to_string()),
        }
    }
}

impl From<CodecError> for ClientError {
    fn from(value: CodecError) -> Self {
        ClientError::decode(value.to_string())
    }
}
