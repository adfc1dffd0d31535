//! # keylink core
//!
//! Pure primitives for linking an ECDSA account identity to a Schnorr
//! (NIP-01 / BIP-340) identity: linking events, canonical serialization,
//! validation, and signature verification.
//!
//! This crate contains no I/O, no storage, no logging. Everything here is
//! deterministic and safe to call in parallel.
//!
//! ## Key Types
//!
//! - [`LinkingEvent`] - The signed claim binding a Schnorr key to an account
//! - [`AccountId`] - 20-byte account address (ECDSA identity)
//! - [`SchnorrPubkey`] - 32-byte x-only key (social identity)
//! - [`EventId`] - SHA-256 of the canonical serialization
//!
//! ## Canonicalization
//!
//! Event IDs are computed over the NIP-01 serialization. See [`canonical`].

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod event;
pub mod types;
pub mod validation;
pub mod verify;

pub use canonical::{canonical_event_bytes, compute_event_id};
pub use crypto::{
    keccak256, link_authorization_digest, unlink_authorization_digest, AccountKeypair,
    AccountSignature, SchnorrKeypair,
};
pub use error::{CoreError, ValidationError, VerificationError};
pub use event::{LinkingEvent, LinkingEventBuilder, Tag, LINKING_KIND, SCHNORR_SIGNATURE_LEN};
pub use types::{AccountId, EventId, SchnorrPubkey};
pub use validation::{
    validate_event_structure, validate_linking_event, verify_event_signature, ValidationPolicy,
    DEFAULT_SKEW_TOLERANCE_SECS,
};
pub use verify::{recover_account, verify_account_signature, verify_schnorr, SchnorrVerification};
