//! Error types for keylink core.

use thiserror::Error;

use crate::types::{AccountId, EventId};

/// Errors from parsing and encoding identifiers and events.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("invalid secret key")]
    InvalidSecretKey,

    #[error("signing failed")]
    SigningFailed,

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the signature verifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("invalid signature length: expected {expected} bytes, got {got}")]
    InvalidSignatureLength { expected: usize, got: usize },

    #[error("signature scalar out of range")]
    ScalarOutOfRange,

    #[error("signature s value is not in the lower half of the curve order")]
    MalleableSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("public key recovery failed")]
    RecoveryFailed,

    #[error("signature verification failed")]
    BadSignature,

    #[error("signer mismatch: expected {expected}, recovered {actual}")]
    SignerMismatch { expected: AccountId, actual: AccountId },
}

/// Validation errors for linking events.
///
/// The variants are ordered the way the checks run: every structural
/// check precedes any curve arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("event kind {got} is not a linking event (expected {expected})")]
    InvalidKind { expected: u32, got: u32 },

    #[error("linking event tags must be empty")]
    TagsNotEmpty,

    #[error("content mismatch: expected {expected:?}, got {got:?}")]
    ContentMismatch { expected: String, got: String },

    #[error("created_at {created_at} is in the future (now {now}, tolerance {tolerance}s)")]
    TimestampInFuture {
        created_at: u64,
        now: u64,
        tolerance: u64,
    },

    #[error("event id mismatch: computed {computed}, claimed {claimed}")]
    EventIdMismatch { computed: EventId, claimed: EventId },

    #[error("invalid signature length: {0} bytes")]
    InvalidSignatureLength(usize),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,
}

impl From<VerificationError> for ValidationError {
    fn from(e: VerificationError) -> Self {
        match e {
            VerificationError::InvalidSignatureLength { got, .. } => {
                ValidationError::InvalidSignatureLength(got)
            }
            VerificationError::InvalidPublicKey => ValidationError::InvalidPublicKey,
            VerificationError::ScalarOutOfRange
            | VerificationError::MalleableSignature
            | VerificationError::InvalidRecoveryId(_)
            | VerificationError::RecoveryFailed
            | VerificationError::BadSignature
            | VerificationError::SignerMismatch { .. } => ValidationError::InvalidSignature,
        }
    }
}
