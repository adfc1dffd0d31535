//! Linking events: the signed claim that binds a Schnorr identity to an
//! account identity.
//!
//! A linking event is a NIP-01 event with a fixed kind, no tags, and the
//! linked account's hex address as its content. Its `event_id` and
//! `signature` are claims made by the submitter; validation recomputes the
//! former and verifies the latter.

use serde::{Deserialize, Serialize};

use crate::canonical::compute_event_id;
use crate::crypto::SchnorrKeypair;
use crate::error::CoreError;
use crate::types::{AccountId, EventId, SchnorrPubkey};

/// The event kind reserved for identity-linking claims.
pub const LINKING_KIND: u32 = 27235;

/// Length of a BIP-340 signature (`r || s`).
pub const SCHNORR_SIGNATURE_LEN: usize = 64;

/// A single tag: an ordered list of strings.
pub type Tag = Vec<String>;

/// A linking claim as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkingEvent {
    /// The Schnorr identity making the claim.
    pub pubkey: SchnorrPubkey,

    /// Claimant-asserted unix timestamp (seconds).
    pub created_at: u64,

    /// Must equal [`LINKING_KIND`].
    pub kind: u32,

    /// Must be empty for a linking event.
    pub tags: Vec<Tag>,

    /// Lowercase hex of the linked account, no prefix.
    pub content: String,

    /// Claimed SHA-256 of the canonical serialization. Untrusted.
    pub event_id: EventId,

    /// BIP-340 signature over `event_id`. Kept as raw bytes so that a
    /// malformed length can be reported rather than unrepresentable.
    pub signature: Vec<u8>,
}

impl LinkingEvent {
    /// Recompute the event ID from the event fields.
    pub fn compute_id(&self) -> EventId {
        compute_event_id(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        )
    }

    /// Check whether the claimed ID matches the recomputed one.
    pub fn has_valid_id(&self) -> bool {
        self.compute_id() == self.event_id
    }

    /// Serialize to the NIP-01 JSON object form.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(&WireEvent::from(self))?)
    }

    /// Parse from the NIP-01 JSON object form.
    ///
    /// The `id` field is decoded but not checked here; validation compares
    /// it against the recomputed identifier.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let wire: WireEvent = serde_json::from_str(json)?;
        Self::try_from(wire)
    }
}

/// NIP-01 JSON representation with hex-encoded binary fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireEvent {
    id: String,
    pubkey: String,
    created_at: u64,
    kind: u32,
    tags: Vec<Tag>,
    content: String,
    sig: String,
}

impl From<&LinkingEvent> for WireEvent {
    fn from(event: &LinkingEvent) -> Self {
        Self {
            id: event.event_id.to_hex(),
            pubkey: event.pubkey.to_hex(),
            created_at: event.created_at,
            kind: event.kind,
            tags: event.tags.clone(),
            content: event.content.clone(),
            sig: hex::encode(&event.signature),
        }
    }
}

impl TryFrom<WireEvent> for LinkingEvent {
    type Error = CoreError;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        Ok(Self {
            pubkey: SchnorrPubkey::from_hex(&wire.pubkey)?,
            created_at: wire.created_at,
            kind: wire.kind,
            tags: wire.tags,
            content: wire.content,
            event_id: EventId::from_hex(&wire.id)?,
            signature: hex::decode(&wire.sig)?,
        })
    }
}

/// Builder for signed linking events (the client-side half of the protocol).
///
/// # Example
///
/// ```rust
/// use keylink_core::{AccountId, LinkingEventBuilder, SchnorrKeypair};
///
/// let keypair = SchnorrKeypair::from_seed(&[0x42; 32]).unwrap();
/// let account = AccountId::from_bytes([0x11; 20]);
/// let event = LinkingEventBuilder::new()
///     .created_at(1_700_000_000)
///     .for_account(&account)
///     .sign(&keypair)
///     .unwrap();
/// assert!(event.has_valid_id());
/// ```
#[derive(Debug, Clone)]
pub struct LinkingEventBuilder {
    created_at: u64,
    kind: u32,
    tags: Vec<Tag>,
    content: String,
}

impl LinkingEventBuilder {
    /// Start a linking event with the fixed kind and no tags.
    pub fn new() -> Self {
        Self {
            created_at: 0,
            kind: LINKING_KIND,
            tags: Vec::new(),
            content: String::new(),
        }
    }

    /// Set the timestamp.
    pub fn created_at(mut self, created_at: u64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Override the kind.
    pub fn kind(mut self, kind: u32) -> Self {
        self.kind = kind;
        self
    }

    /// Add a tag.
    pub fn add_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// Set the raw content.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set the content to the account's canonical hex rendering.
    pub fn for_account(self, account: &AccountId) -> Self {
        self.content(account.to_hex())
    }

    /// Compute the event ID and sign it.
    pub fn sign(self, keypair: &SchnorrKeypair) -> Result<LinkingEvent, CoreError> {
        let pubkey = keypair.public_key();
        let event_id = compute_event_id(
            &pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        );
        let signature = keypair.sign_digest(event_id.as_bytes())?;

        Ok(LinkingEvent {
            pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            event_id,
            signature: signature.to_vec(),
        })
    }
}

impl Default for LinkingEventBuilder {
    fn default() -> Self {
        Self::new()
    }
}
