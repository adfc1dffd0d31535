//! Error types for the registry.

use keylink_core::{AccountId, SchnorrPubkey, ValidationError, VerificationError};
use keylink_store::StoreError;
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The linking event or one of its signatures was rejected.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The account has no link to remove.
    #[error("no link found for account {0}")]
    NoLinkFound(AccountId),

    /// The key is held by another account and the registry rejects conflicts.
    #[error("key {key} is already linked to {holder}")]
    ConflictingLink {
        key: SchnorrPubkey,
        holder: AccountId,
    },

    /// The account's key changed after the unlink was authorized.
    #[error("unlink of {account} authorized for key {authorized}, but it is now linked to {current}")]
    StaleAuthorization {
        account: AccountId,
        authorized: SchnorrPubkey,
        current: SchnorrPubkey,
    },
}

impl From<VerificationError> for RegistryError {
    fn from(e: VerificationError) -> Self {
        RegistryError::Validation(e.into())
    }
}

impl RegistryError {
    /// The validation error, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            RegistryError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
