//! # keylink
//!
//! Bidirectional links between an ECDSA account identity and a Schnorr
//! (NIP-01 / BIP-340) social identity, proven by signed linking events.
//!
//! ## Overview
//!
//! A link is created by pushing a [`LinkingEvent`](core::LinkingEvent):
//! a NIP-01 event of the linking kind, with no tags, whose content is the
//! account's lowercase hex address, signed by the Schnorr key being
//! linked. The registry validates the event, verifies its signature, and
//! then records the pair in both directions.
//!
//! ## Key Concepts
//!
//! - **Bijection**: Every account has at most one key and every key at most
//!   one account. Re-linking cleans up both displaced edges.
//! - **All-or-nothing**: A rejected push or pull changes nothing.
//! - **Notifications**: Every change is announced as `Created` / `Removed`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use keylink::{LinkRegistry, RegistryConfig};
//! use keylink::core::{AccountId, LinkingEventBuilder, SchnorrKeypair};
//! use keylink::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("links.db").unwrap();
//!     let registry = LinkRegistry::new(store, RegistryConfig::default());
//!
//!     let account = AccountId::from_hex("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf").unwrap();
//!     let social = SchnorrKeypair::generate();
//!     let event = LinkingEventBuilder::new()
//!         .created_at(1_700_000_000)
//!         .for_account(&account)
//!         .sign(&social)
//!         .unwrap();
//!
//!     registry.push(&account, &event).await.unwrap();
//!     assert_eq!(
//!         registry.lookup_by_account(&account).await.unwrap(),
//!         Some(social.public_key())
//!     );
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `keylink::core` - Events, canonicalization, validation, signatures
//! - `keylink::store` - Storage abstraction and SQLite

pub mod error;
pub mod notify;
pub mod registry;

// Re-export component crates
pub use keylink_core as core;
pub use keylink_store as store;

// Re-export main types for convenience
pub use error::{RegistryError, Result};
pub use notify::{LinkNotification, NotificationBus};
pub use registry::{LinkRegistry, PushOutcome, RegistryConfig, DEFAULT_NOTIFICATION_CAPACITY};

// Re-export commonly used types
pub use keylink_core::{
    AccountId, AccountKeypair, AccountSignature, EventId, LinkingEvent, LinkingEventBuilder,
    SchnorrKeypair, SchnorrPubkey, SchnorrVerification, ValidationError,
};
pub use keylink_store::{ConflictPolicy, LinkStore, MemoryStore, SqliteStore};
