//! LinkStore trait: the abstract interface for link persistence.
//!
//! A store holds two associative tables, `forward: account -> key` and
//! `reverse: key -> account`, and must keep them a bijection. Every
//! mutation goes through [`LinkStore::commit_link`] or
//! [`LinkStore::remove_link`], each of which is atomic with respect to all
//! other calls on the same store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use keylink_core::{AccountId, SchnorrPubkey};

use crate::error::Result;

/// What to do when a key is already linked to a different account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// The newer claim wins; the previous holder's link is removed.
    #[default]
    LastWriterWins,
    /// Refuse the claim and report the current holder.
    Reject,
}

/// Result of committing a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    /// The link was written.
    Linked {
        /// Key previously linked to this account, now unlinked.
        displaced_key: Option<SchnorrPubkey>,
        /// Account that previously held this key, now unlinked.
        displaced_account: Option<AccountId>,
    },
    /// The exact pair already existed (idempotent - not an error).
    Unchanged,
    /// The key is held by another account and the policy is `Reject`.
    Conflict {
        /// The account currently holding the key.
        holder: AccountId,
    },
}

/// Result of removing a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveResult {
    /// Both edges were removed.
    Removed {
        /// The key that was linked.
        key: SchnorrPubkey,
    },
    /// The account had no link.
    NotLinked,
    /// The account is linked, but not to the expected key. Nothing changed.
    KeyMismatch {
        /// The key currently linked.
        current: SchnorrPubkey,
    },
}

/// A violation of the bijection between the two tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BijectionViolation {
    /// `forward[account] = key` but `reverse[key]` is absent or different.
    DanglingForward {
        account: AccountId,
        key: SchnorrPubkey,
        reverse: Option<AccountId>,
    },
    /// `reverse[key] = account` but `forward[account]` is absent or different.
    DanglingReverse {
        key: SchnorrPubkey,
        account: AccountId,
        forward: Option<SchnorrPubkey>,
    },
}

/// The LinkStore trait: async interface for link persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` is used internally to avoid blocking the
/// runtime.
#[async_trait]
pub trait LinkStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Link `account` to `key`, atomically.
    ///
    /// In one step, with no other writer interleaving:
    /// 1. If the pair already exists, return `Unchanged`.
    /// 2. If `key` is held by another account and `policy` is `Reject`,
    ///    return `Conflict` without changing anything.
    /// 3. Remove the reverse edge of the account's previous key, if any.
    /// 4. Remove the forward edge of the key's previous account, if any.
    /// 5. Write both edges.
    async fn commit_link(
        &self,
        account: &AccountId,
        key: &SchnorrPubkey,
        policy: ConflictPolicy,
    ) -> Result<CommitResult>;

    /// Remove the link held by `account`, atomically.
    ///
    /// If `expected` is given, the removal only happens when the account is
    /// currently linked to exactly that key.
    async fn remove_link(
        &self,
        account: &AccountId,
        expected: Option<&SchnorrPubkey>,
    ) -> Result<RemoveResult>;

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// Key linked to `account`, if any.
    async fn key_for_account(&self, account: &AccountId) -> Result<Option<SchnorrPubkey>>;

    /// Account linked to `key`, if any.
    async fn account_for_key(&self, key: &SchnorrPubkey) -> Result<Option<AccountId>>;

    /// All forward entries, sorted by account.
    async fn forward_entries(&self) -> Result<Vec<(AccountId, SchnorrPubkey)>>;

    /// All reverse entries, sorted by key.
    async fn reverse_entries(&self) -> Result<Vec<(SchnorrPubkey, AccountId)>>;

    /// Number of links.
    async fn count(&self) -> Result<usize>;
}

/// Extension trait for auditing a store.
pub trait LinkStoreExt: LinkStore {
    /// Check that forward and reverse tables mirror each other exactly.
    ///
    /// Returns every violation found; an empty vector means the invariant
    /// holds.
    fn check_bijection(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<BijectionViolation>>> + Send;
}

impl<S: LinkStore + ?Sized> LinkStoreExt for S {
    async fn check_bijection(&self) -> Result<Vec<BijectionViolation>> {
        use std::collections::HashMap;

        let forward: HashMap<AccountId, SchnorrPubkey> =
            self.forward_entries().await?.into_iter().collect();
        let reverse: HashMap<SchnorrPubkey, AccountId> =
            self.reverse_entries().await?.into_iter().collect();

        let mut violations = Vec::new();

        for (account, key) in &forward {
            let back = reverse.get(key).copied();
            if back != Some(*account) {
                violations.push(BijectionViolation::DanglingForward {
                    account: *account,
                    key: *key,
                    reverse: back,
                });
            }
        }

        for (key, account) in &reverse {
            let fwd = forward.get(account).copied();
            if fwd != Some(*key) {
                violations.push(BijectionViolation::DanglingReverse {
                    key: *key,
                    account: *account,
                    forward: fwd,
                });
            }
        }

        Ok(violations)
    }
}
