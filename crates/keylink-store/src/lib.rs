//! # keylink store
//!
//! Storage abstraction for the link registry. Provides a trait-based
//! interface for the two link tables with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The registry never touches tables directly. Every mutation is a single
//! [`LinkStore::commit_link`] or [`LinkStore::remove_link`] call, and each
//! backend makes that call atomic, so `forward` and `reverse` can never be
//! observed out of step.
//!
//! ## Key Types
//!
//! - [`LinkStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`CommitResult`] - Result of committing a link
//! - [`BijectionViolation`] - Evidence that the tables disagree
//!
//! ## Usage
//!
//! ```rust,no_run
//! use keylink_core::{AccountId, SchnorrPubkey};
//! use keylink_store::{ConflictPolicy, LinkStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("links.db").unwrap();
//!
//!     let account = AccountId::from_bytes([1; 20]);
//!     let key = SchnorrPubkey::from_bytes([2; 32]);
//!     store
//!         .commit_link(&account, &key, ConflictPolicy::LastWriterWins)
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(store.key_for_account(&account).await.unwrap(), Some(key));
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent commits**: Committing an existing pair returns `Unchanged`
//! - **Displacement**: Re-linking reports which key and which account lost their link
//! - **Conflict policy**: `Reject` refuses a key held by another account

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    BijectionViolation, CommitResult, ConflictPolicy, LinkStore, LinkStoreExt, RemoveResult,
};
