//! Error types for context verification.
//!
//! Policy-unsatisfied outcomes are not errors: they come back as a
//! [`ProofArtifact`](crate::types::ProofArtifact) with the failing verdicts
//! visible. Everything here aborts the request.

use thiserror::Error;

use crate::types::Category;

/// Coarse classification of a [`ContextError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller supplied a malformed witness or nonce. Rejected before any
    /// constraint is evaluated.
    InvalidInput,
    /// Malformed policy, proof or key material, or an arithmetic range
    /// violation. Retrying with the same inputs reproduces it.
    Structural,
}

/// Errors that can occur while building or checking a context proof.
#[derive(Debug, Error)]
pub enum ContextError {
    /// A witness field failed validation.
    #[error("Invalid input `{field}`: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// A category required by the policy mask has no witness.
    #[error("Missing required context: {0}")]
    MissingContext(Category),

    /// Empty or whitespace-only challenge nonce.
    #[error("Invalid challenge nonce: must be non-empty")]
    InvalidNonce,

    /// A policy field is structurally unusable.
    #[error("Invalid policy `{field}`: {reason}")]
    InvalidPolicy { field: &'static str, reason: String },

    /// Witness was built against a different policy version than the pinned snapshot.
    #[error("Policy version mismatch: witness built for {found}, snapshot is {expected}")]
    PolicyVersionMismatch { expected: u64, found: u64 },

    /// Aggregated trust score left [0, 100].
    #[error("Trust score {0} outside [0, 100]")]
    TrustScoreOutOfRange(i64),

    /// Behavioral risk score left [0, 100].
    #[error("Risk score {0} outside [0, 100]")]
    RiskScoreOutOfRange(u64),

    /// Proof bytes or public signals could not be decoded.
    #[error("Malformed proof: {reason}")]
    MalformedProof { reason: String },

    /// Policy store has no entry for the requested key.
    #[error("Unknown policy: {0}")]
    UnknownPolicy(String),

    /// Policy document could not be parsed.
    #[error("Policy config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Nova SNARK error
    #[cfg(feature = "nova")]
    #[error("Nova SNARK error: {0}")]
    NovaError(String),
}

impl ContextError {
    pub(crate) fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput { field, reason: reason.into() }
    }

    pub(crate) fn invalid_policy(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidPolicy { field, reason: reason.into() }
    }

    /// Which side of the taxonomy this error falls on.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } | Self::MissingContext(_) | Self::InvalidNonce => {
                ErrorKind::InvalidInput
            }
            _ => ErrorKind::Structural,
        }
    }
}

/// Result type alias for context verification operations.
pub type Result<T> = core::result::Result<T, ContextError>;
