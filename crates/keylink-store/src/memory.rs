//! In-memory implementation of the LinkStore trait.
//!
//! Same semantics as SQLite, no persistence. Both tables live behind a
//! single `RwLock`, so a commit holds the write lock across its whole
//! read-modify-write and no reader ever sees half of a re-link.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use keylink_core::{AccountId, SchnorrPubkey};

use crate::error::{Result, StoreError};
use crate::traits::{CommitResult, ConflictPolicy, LinkStore, RemoveResult};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// account -> key
    forward: HashMap<AccountId, SchnorrPubkey>,

    /// key -> account
    reverse: HashMap<SchnorrPubkey, AccountId>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn commit_link(
        &self,
        account: &AccountId,
        key: &SchnorrPubkey,
        policy: ConflictPolicy,
    ) -> Result<CommitResult> {
        let mut inner = self.write()?;

        if inner.forward.get(account) == Some(key) {
            return Ok(CommitResult::Unchanged);
        }

        let holder = inner.reverse.get(key).copied();
        if let (Some(holder), ConflictPolicy::Reject) = (holder, policy) {
            return Ok(CommitResult::Conflict { holder });
        }

        // Break the account's old reverse edge
        let displaced_key = inner.forward.remove(account);
        if let Some(old_key) = displaced_key {
            inner.reverse.remove(&old_key);
        }

        // Break the key's old forward edge
        let displaced_account = inner.reverse.remove(key);
        if let Some(old_account) = displaced_account {
            inner.forward.remove(&old_account);
        }

        inner.forward.insert(*account, *key);
        inner.reverse.insert(*key, *account);

        debug!(
            account = %account,
            key = %key,
            ?displaced_key,
            ?displaced_account,
            "committed link"
        );

        Ok(CommitResult::Linked {
            displaced_key,
            displaced_account,
        })
    }

    async fn remove_link(
        &self,
        account: &AccountId,
        expected: Option<&SchnorrPubkey>,
    ) -> Result<RemoveResult> {
        let mut inner = self.write()?;

        let current = match inner.forward.get(account) {
            Some(key) => *key,
            None => return Ok(RemoveResult::NotLinked),
        };

        if let Some(expected) = expected {
            if *expected != current {
                return Ok(RemoveResult::KeyMismatch { current });
            }
        }

        inner.forward.remove(account);
        inner.reverse.remove(&current);

        debug!(account = %account, key = %current, "removed link");
        Ok(RemoveResult::Removed { key: current })
    }

    async fn key_for_account(&self, account: &AccountId) -> Result<Option<SchnorrPubkey>> {
        Ok(self.read()?.forward.get(account).copied())
    }

    async fn account_for_key(&self, key: &SchnorrPubkey) -> Result<Option<AccountId>> {
        Ok(self.read()?.reverse.get(key).copied())
    }

    async fn forward_entries(&self) -> Result<Vec<(AccountId, SchnorrPubkey)>> {
        let mut entries: Vec<_> = self
            .read()?
            .forward
            .iter()
            .map(|(a, k)| (*a, *k))
            .collect();
        entries.sort();
        Ok(entries)
    }

    async fn reverse_entries(&self) -> Result<Vec<(SchnorrPubkey, AccountId)>> {
        let mut entries: Vec<_> = self
            .read()?
            .reverse
            .iter()
            .map(|(k, a)| (*k, *a))
            .collect();
        entries.sort();
        Ok(entries)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.forward.len())
    }
}
