//! The link registry: validated, bidirectional account <-> key links.
//!
//! The registry brings together event validation, signature verification,
//! storage, and notifications. Validation is pure and runs before the
//! store is touched, so a rejected push leaves the tables unchanged. The
//! read-modify-write of a push is a single [`LinkStore::commit_link`]
//! call, which every backend makes atomic.
//!
//! Writes through one registry are serialized together with their
//! notifications, so subscribers see changes in commit order.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use keylink_core::{
    link_authorization_digest, unlink_authorization_digest, validate_linking_event,
    verify_account_signature, AccountId, AccountSignature, LinkingEvent, SchnorrPubkey,
    SchnorrVerification, ValidationPolicy, DEFAULT_SKEW_TOLERANCE_SECS,
};
use keylink_store::{
    BijectionViolation, CommitResult, ConflictPolicy, LinkStore, LinkStoreExt, RemoveResult,
    StoreError,
};

use crate::error::{RegistryError, Result};
use crate::notify::{LinkNotification, NotificationBus};

/// Default number of notifications buffered per subscriber.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 256;

/// Configuration for the registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// How far `created_at` may run ahead of the registry clock.
    pub skew_tolerance_secs: u64,
    /// How much of BIP-340 to check on the event signature.
    pub schnorr_verification: SchnorrVerification,
    /// What a push does when the key belongs to another account.
    pub conflict_policy: ConflictPolicy,
    /// Notifications buffered per subscriber before it lags.
    pub notification_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            skew_tolerance_secs: DEFAULT_SKEW_TOLERANCE_SECS,
            schnorr_verification: SchnorrVerification::default(),
            conflict_policy: ConflictPolicy::default(),
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl RegistryConfig {
    /// The validation policy events are checked against.
    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            skew_tolerance_secs: self.skew_tolerance_secs,
            schnorr: self.schnorr_verification,
        }
    }
}

/// Result of a successful push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The link was written.
    Linked {
        /// Key this account was linked to before, now released.
        displaced_key: Option<SchnorrPubkey>,
        /// Account that held this key before, now unlinked.
        displaced_account: Option<AccountId>,
    },
    /// The account was already linked to this key. Nothing changed.
    Unchanged,
}

/// The main registry struct.
///
/// Provides a unified API for:
/// - Linking an account to a Schnorr key from a signed linking event
/// - Unlinking an account
/// - Looking up either side of a link
/// - Auditing the bijection between the two tables
/// - Subscribing to link changes
pub struct LinkRegistry<S: LinkStore> {
    /// The storage backend.
    store: Arc<S>,
    /// Configuration.
    config: RegistryConfig,
    /// Where link changes are announced.
    notifications: NotificationBus,
    /// Held from a store mutation until its notifications are sent.
    write_lock: Mutex<()>,
}

impl<S: LinkStore> LinkRegistry<S> {
    /// Create a new registry over `store`.
    pub fn new(store: S, config: RegistryConfig) -> Self {
        Self::with_shared_store(Arc::new(store), config)
    }

    /// Create a registry over a store that is also used elsewhere.
    pub fn with_shared_store(store: Arc<S>, config: RegistryConfig) -> Self {
        if config.schnorr_verification == SchnorrVerification::RangeOnly {
            warn!(
                "schnorr verification is range-only: event signatures are NOT checked against their keys"
            );
        }

        let notifications = NotificationBus::with_capacity(config.notification_capacity);

        Self {
            store,
            config,
            notifications,
            write_lock: Mutex::new(()),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Subscribe to link notifications emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LinkNotification> {
        self.notifications.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Link Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Link `account` to the event's key, checking the event against the
    /// current wall-clock time.
    pub async fn push(&self, account: &AccountId, event: &LinkingEvent) -> Result<PushOutcome> {
        self.push_at(account, event, unix_now()).await
    }

    /// Link `account` to the event's key, with an explicit clock.
    ///
    /// Validation and signature checks run first; any failure returns
    /// before the store is touched.
    pub async fn push_at(
        &self,
        account: &AccountId,
        event: &LinkingEvent,
        now: u64,
    ) -> Result<PushOutcome> {
        if let Err(e) = validate_linking_event(event, account, now, &self.config.validation_policy())
        {
            warn!(account = %account, key = %event.pubkey, error = %e, "rejected linking event");
            return Err(e.into());
        }

        self.commit(account, &event.pubkey).await
    }

    /// Link `account` on behalf of a relayer.
    ///
    /// Besides the event's own Schnorr signature, `authorization` must be
    /// the account's signature over the event's link digest.
    pub async fn push_authorized(
        &self,
        account: &AccountId,
        event: &LinkingEvent,
        authorization: &AccountSignature,
    ) -> Result<PushOutcome> {
        self.push_authorized_at(account, event, authorization, unix_now())
            .await
    }

    /// [`push_authorized`](Self::push_authorized) with an explicit clock.
    pub async fn push_authorized_at(
        &self,
        account: &AccountId,
        event: &LinkingEvent,
        authorization: &AccountSignature,
        now: u64,
    ) -> Result<PushOutcome> {
        if let Err(e) = validate_linking_event(event, account, now, &self.config.validation_policy())
        {
            warn!(account = %account, key = %event.pubkey, error = %e, "rejected linking event");
            return Err(e.into());
        }

        let digest = link_authorization_digest(&event.event_id);
        if let Err(e) = verify_account_signature(&digest, authorization, account) {
            warn!(account = %account, error = %e, "rejected link authorization");
            return Err(e.into());
        }

        self.commit(account, &event.pubkey).await
    }

    /// Remove the link held by `account`.
    pub async fn pull(&self, account: &AccountId) -> Result<SchnorrPubkey> {
        self.remove(account, None).await
    }

    /// Remove the link held by `account` on behalf of a relayer.
    ///
    /// `authorization` must be the account's signature over the unlink
    /// digest for the key it is currently linked to. If that key changes
    /// before the removal lands, nothing is removed.
    pub async fn pull_authorized(
        &self,
        account: &AccountId,
        authorization: &AccountSignature,
    ) -> Result<SchnorrPubkey> {
        let authorized = self
            .store
            .key_for_account(account)
            .await?
            .ok_or(RegistryError::NoLinkFound(*account))?;

        let digest = unlink_authorization_digest(account, &authorized);
        if let Err(e) = verify_account_signature(&digest, authorization, account) {
            warn!(account = %account, error = %e, "rejected unlink authorization");
            return Err(e.into());
        }

        self.remove(account, Some(authorized)).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Key linked to `account`, if any.
    pub async fn lookup_by_account(&self, account: &AccountId) -> Result<Option<SchnorrPubkey>> {
        let key = self.store.key_for_account(account).await?;
        debug!(account = %account, found = key.is_some(), "lookup by account");
        Ok(key)
    }

    /// Account linked to `key`, if any.
    pub async fn lookup_by_key(&self, key: &SchnorrPubkey) -> Result<Option<AccountId>> {
        let account = self.store.account_for_key(key).await?;
        debug!(key = %key, found = account.is_some(), "lookup by key");
        Ok(account)
    }

    /// Number of live links.
    pub async fn link_count(&self) -> Result<usize> {
        Ok(self.store.count().await?)
    }

    /// Audit the forward and reverse tables against each other.
    ///
    /// Returns every violation found; empty means the bijection holds.
    pub async fn check_invariants(&self) -> Result<Vec<BijectionViolation>> {
        let violations = self.store.check_bijection().await?;
        if !violations.is_empty() {
            warn!(count = violations.len(), "link tables out of sync");
        }
        Ok(violations)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn commit(&self, account: &AccountId, key: &SchnorrPubkey) -> Result<PushOutcome> {
        let _guard = self.write_lock.lock().await;

        match self
            .store
            .commit_link(account, key, self.config.conflict_policy)
            .await?
        {
            CommitResult::Linked {
                displaced_key,
                displaced_account,
            } => {
                if let Some(old_key) = displaced_key {
                    self.notifications.emit(LinkNotification::Removed {
                        account: *account,
                        key: old_key,
                    });
                }
                if let Some(old_account) = displaced_account {
                    self.notifications.emit(LinkNotification::Removed {
                        account: old_account,
                        key: *key,
                    });
                }
                self.notifications.emit(LinkNotification::Created {
                    account: *account,
                    key: *key,
                });

                info!(
                    account = %account,
                    key = %key,
                    ?displaced_key,
                    ?displaced_account,
                    "linked"
                );

                Ok(PushOutcome::Linked {
                    displaced_key,
                    displaced_account,
                })
            }
            CommitResult::Unchanged => {
                debug!(account = %account, key = %key, "link already present");
                Ok(PushOutcome::Unchanged)
            }
            CommitResult::Conflict { holder } => {
                warn!(account = %account, key = %key, holder = %holder, "key held by another account");
                Err(RegistryError::ConflictingLink { key: *key, holder })
            }
        }
    }

    /// Remove the link held by `account`, only if it is still `expected`
    /// when one is given.
    async fn remove(
        &self,
        account: &AccountId,
        expected: Option<SchnorrPubkey>,
    ) -> Result<SchnorrPubkey> {
        let _guard = self.write_lock.lock().await;

        match self.store.remove_link(account, expected.as_ref()).await? {
            RemoveResult::Removed { key } => {
                self.notifications.emit(LinkNotification::Removed {
                    account: *account,
                    key,
                });
                info!(account = %account, key = %key, "unlinked");
                Ok(key)
            }
            RemoveResult::NotLinked => Err(RegistryError::NoLinkFound(*account)),
            RemoveResult::KeyMismatch { current } => match expected {
                Some(authorized) => {
                    warn!(
                        account = %account,
                        authorized = %authorized,
                        current = %current,
                        "unlink authorization went stale"
                    );
                    Err(RegistryError::StaleAuthorization {
                        account: *account,
                        authorized,
                        current,
                    })
                }
                // Backend broke the remove_link contract
                None => Err(StoreError::InvalidData(format!(
                    "unconditional removal for {} reported a key mismatch",
                    account
                ))
                .into()),
            },
        }
    }
}

/// Current unix time in seconds.
fn unix_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
