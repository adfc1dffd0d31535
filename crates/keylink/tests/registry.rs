//! End-to-end tests of the link registry over both store backends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use tokio::sync::Notify;

use keylink::core::{AccountId, SchnorrPubkey, ValidationError};
use keylink::store::{CommitResult, LinkStore, LinkStoreExt, RemoveResult};
use keylink::{
    ConflictPolicy, LinkNotification, LinkRegistry, MemoryStore, PushOutcome, RegistryConfig,
    RegistryError, SqliteStore,
};
use keylink_testkit::generators::{account_pool, keypair_pool, link_ops, LinkOp};
use keylink_testkit::{multi_party_fixtures, TestFixture, FIXTURE_NOW};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn memory_registry() -> LinkRegistry<MemoryStore> {
    LinkRegistry::new(MemoryStore::new(), RegistryConfig::default())
}

fn validation_error(err: RegistryError) -> ValidationError {
    match err {
        RegistryError::Validation(e) => e,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_link_relink_unlink_scenario() {
    init_tracing();
    let registry = memory_registry();

    let parties = multi_party_fixtures(2);
    let owner = &parties[0];
    let account = owner.account_id();
    let p1 = owner.schnorr.public_key();
    let p2 = parties[1].schnorr.public_key();

    // A -> P1
    let e1 = owner.make_link_event(FIXTURE_NOW);
    registry.push_at(&account, &e1, FIXTURE_NOW).await.unwrap();
    assert_eq!(registry.lookup_by_account(&account).await.unwrap(), Some(p1));

    // A -> P2 with a fresh event signed by P2
    let e2 = parties[1].make_link_event_for(&account, FIXTURE_NOW + 10);
    let outcome = registry.push_at(&account, &e2, FIXTURE_NOW + 10).await.unwrap();
    assert_eq!(
        outcome,
        PushOutcome::Linked {
            displaced_key: Some(p1),
            displaced_account: None
        }
    );
    assert_eq!(registry.lookup_by_account(&account).await.unwrap(), Some(p2));
    assert_eq!(registry.lookup_by_key(&p1).await.unwrap(), None);
    assert_eq!(registry.link_count().await.unwrap(), 1);

    // pull clears both sides
    assert_eq!(registry.pull(&account).await.unwrap(), p2);
    assert_eq!(registry.lookup_by_account(&account).await.unwrap(), None);
    assert_eq!(registry.lookup_by_key(&p2).await.unwrap(), None);

    let err = registry.pull(&account).await.unwrap_err();
    assert!(matches!(err, RegistryError::NoLinkFound(a) if a == account));
    assert!(registry.check_invariants().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_kind_rejected_before_signature() {
    let registry = memory_registry();
    let fixture = TestFixture::with_seed([1; 32]);
    let account = fixture.account_id();

    let mut event = fixture.make_custom_event(FIXTURE_NOW, 1, &account.to_hex());
    // A broken signature would fail too, but kind is checked first
    event.signature.truncate(10);

    let err = validation_error(registry.push_at(&account, &event, FIXTURE_NOW).await.unwrap_err());
    assert_eq!(
        err,
        ValidationError::InvalidKind {
            expected: 27235,
            got: 1
        }
    );
}

#[tokio::test]
async fn test_short_signature_rejected() {
    let registry = memory_registry();
    let fixture = TestFixture::with_seed([1; 32]);
    let account = fixture.account_id();

    let mut event = fixture.make_link_event(FIXTURE_NOW);
    event.signature.truncate(63);

    let err = validation_error(registry.push_at(&account, &event, FIXTURE_NOW).await.unwrap_err());
    assert_eq!(err, ValidationError::InvalidSignatureLength(63));
}

#[tokio::test]
async fn test_tampering_is_detected() {
    let registry = memory_registry();
    let fixture = TestFixture::with_seed([2; 32]);
    let account = fixture.account_id();
    let event = fixture.make_link_event(FIXTURE_NOW);

    // content
    let mut tampered = event.clone();
    tampered.content.replace_range(0..1, if &event.content[..1] == "0" { "1" } else { "0" });
    let err = validation_error(registry.push_at(&account, &tampered, FIXTURE_NOW).await.unwrap_err());
    assert!(matches!(err, ValidationError::ContentMismatch { .. }));

    // created_at
    let mut tampered = event.clone();
    tampered.created_at -= 1;
    let err = validation_error(registry.push_at(&account, &tampered, FIXTURE_NOW).await.unwrap_err());
    assert!(matches!(err, ValidationError::EventIdMismatch { .. }));

    // created_at with a recomputed id: the signature no longer covers it
    tampered.event_id = tampered.compute_id();
    let err = validation_error(registry.push_at(&account, &tampered, FIXTURE_NOW).await.unwrap_err());
    assert_eq!(err, ValidationError::InvalidSignature);

    // every signature byte
    for i in 0..event.signature.len() {
        let mut tampered = event.clone();
        tampered.signature[i] ^= 0x01;
        assert!(
            registry.push_at(&account, &tampered, FIXTURE_NOW).await.is_err(),
            "flipped signature byte {i} was accepted"
        );
    }

    assert_eq!(registry.link_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_replay_against_other_account_rejected() {
    let registry = memory_registry();
    let parties = multi_party_fixtures(2);

    let event = parties[0].make_link_event(FIXTURE_NOW);
    let err = validation_error(
        registry
            .push_at(&parties[1].account_id(), &event, FIXTURE_NOW)
            .await
            .unwrap_err(),
    );
    assert!(matches!(err, ValidationError::ContentMismatch { .. }));
}

#[tokio::test]
async fn test_timestamp_window() {
    let registry = memory_registry();
    let fixture = TestFixture::with_seed([3; 32]);
    let account = fixture.account_id();
    let tolerance = registry.config().skew_tolerance_secs;

    let future = fixture.make_link_event(FIXTURE_NOW + tolerance + 1);
    let err = validation_error(registry.push_at(&account, &future, FIXTURE_NOW).await.unwrap_err());
    assert_eq!(
        err,
        ValidationError::TimestampInFuture {
            created_at: FIXTURE_NOW + tolerance + 1,
            now: FIXTURE_NOW,
            tolerance
        }
    );

    let edge = fixture.make_link_event(FIXTURE_NOW + tolerance);
    registry.push_at(&account, &edge, FIXTURE_NOW).await.unwrap();

    // No lower bound
    let ancient = fixture.make_link_event(0);
    let outcome = registry.push_at(&account, &ancient, FIXTURE_NOW).await.unwrap();
    assert_eq!(outcome, PushOutcome::Unchanged);
}

#[tokio::test]
async fn test_failed_push_leaves_state_unchanged() {
    let registry = memory_registry();
    let parties = multi_party_fixtures(2);
    let account = parties[0].account_id();

    registry
        .push_at(&account, &parties[0].make_link_event(FIXTURE_NOW), FIXTURE_NOW)
        .await
        .unwrap();

    let before_forward = registry.store().forward_entries().await.unwrap();
    let before_reverse = registry.store().reverse_entries().await.unwrap();
    let mut rx = registry.subscribe();

    let mut bad = parties[1].make_link_event_for(&account, FIXTURE_NOW);
    bad.signature[63] ^= 0x80;
    assert!(registry.push_at(&account, &bad, FIXTURE_NOW).await.is_err());

    assert_eq!(registry.store().forward_entries().await.unwrap(), before_forward);
    assert_eq!(registry.store().reverse_entries().await.unwrap(), before_reverse);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_last_writer_wins_displaces_holder() {
    let registry = memory_registry();
    let parties = multi_party_fixtures(2);
    let (a, b) = (parties[0].account_id(), parties[1].account_id());
    let key = parties[0].public_key();

    registry
        .push_at(&a, &parties[0].make_link_event(FIXTURE_NOW), FIXTURE_NOW)
        .await
        .unwrap();
    let mut rx = registry.subscribe();

    // The same Schnorr key now claims account b
    let claim = parties[0].make_link_event_for(&b, FIXTURE_NOW);
    let outcome = registry.push_at(&b, &claim, FIXTURE_NOW).await.unwrap();
    assert_eq!(
        outcome,
        PushOutcome::Linked {
            displaced_key: None,
            displaced_account: Some(a)
        }
    );

    assert_eq!(registry.lookup_by_account(&a).await.unwrap(), None);
    assert_eq!(registry.lookup_by_key(&key).await.unwrap(), Some(b));

    assert_eq!(
        rx.recv().await.unwrap(),
        LinkNotification::Removed { account: a, key }
    );
    assert_eq!(
        rx.recv().await.unwrap(),
        LinkNotification::Created { account: b, key }
    );
}

#[tokio::test]
async fn test_reject_policy_surfaces_conflict() {
    let config = RegistryConfig {
        conflict_policy: ConflictPolicy::Reject,
        ..RegistryConfig::default()
    };
    let registry = LinkRegistry::new(MemoryStore::new(), config);
    let parties = multi_party_fixtures(2);
    let (a, b) = (parties[0].account_id(), parties[1].account_id());
    let key = parties[0].public_key();

    registry
        .push_at(&a, &parties[0].make_link_event(FIXTURE_NOW), FIXTURE_NOW)
        .await
        .unwrap();

    let claim = parties[0].make_link_event_for(&b, FIXTURE_NOW);
    let err = registry.push_at(&b, &claim, FIXTURE_NOW).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::ConflictingLink { key: k, holder } if k == key && holder == a
    ));
    assert_eq!(registry.lookup_by_key(&key).await.unwrap(), Some(a));

    // Re-linking one's own account is never a conflict
    let relink = parties[1].make_link_event_for(&a, FIXTURE_NOW);
    registry.push_at(&a, &relink, FIXTURE_NOW).await.unwrap();
    assert_eq!(
        registry.lookup_by_account(&a).await.unwrap(),
        Some(parties[1].public_key())
    );
}

#[tokio::test]
async fn test_notification_order_on_relink_and_pull() {
    let registry = memory_registry();
    let parties = multi_party_fixtures(2);
    let account = parties[0].account_id();
    let (p1, p2) = (parties[0].public_key(), parties[1].public_key());

    let mut rx = registry.subscribe();

    registry
        .push_at(&account, &parties[0].make_link_event(FIXTURE_NOW), FIXTURE_NOW)
        .await
        .unwrap();
    registry
        .push_at(
            &account,
            &parties[1].make_link_event_for(&account, FIXTURE_NOW),
            FIXTURE_NOW,
        )
        .await
        .unwrap();
    registry.pull(&account).await.unwrap();

    let expected = [
        LinkNotification::Created { account, key: p1 },
        LinkNotification::Removed { account, key: p1 },
        LinkNotification::Created { account, key: p2 },
        LinkNotification::Removed { account, key: p2 },
    ];
    for want in expected {
        assert_eq!(rx.recv().await.unwrap(), want);
    }
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_authorized_push_and_pull() {
    let registry = memory_registry();
    let parties = multi_party_fixtures(2);
    let owner = &parties[0];
    let account = owner.account_id();
    let event = owner.make_link_event(FIXTURE_NOW);

    // Someone else's authorization does not count
    let forged = parties[1].authorize_link(&event);
    let err = validation_error(
        registry
            .push_authorized_at(&account, &event, &forged, FIXTURE_NOW)
            .await
            .unwrap_err(),
    );
    assert_eq!(err, ValidationError::InvalidSignature);

    registry
        .push_authorized_at(&account, &event, &owner.authorize_link(&event), FIXTURE_NOW)
        .await
        .unwrap();
    assert_eq!(
        registry.lookup_by_account(&account).await.unwrap(),
        Some(owner.public_key())
    );

    let forged = parties[1].authorize_unlink(&owner.public_key());
    assert!(registry.pull_authorized(&account, &forged).await.is_err());
    assert_eq!(registry.link_count().await.unwrap(), 1);

    let key = registry
        .pull_authorized(&account, &owner.authorize_unlink(&owner.public_key()))
        .await
        .unwrap();
    assert_eq!(key, owner.public_key());

    let err = registry
        .pull_authorized(&account, &owner.authorize_unlink(&owner.public_key()))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NoLinkFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pushes_keep_bijection() {
    init_tracing();
    let registry = Arc::new(memory_registry());
    let parties = multi_party_fixtures(4);
    let accounts: Vec<_> = parties.iter().map(|p| p.account_id()).collect();

    // Every key claims every account, all at once
    let mut handles = Vec::new();
    for party in &parties {
        for account in &accounts {
            let event = party.make_link_event_for(account, FIXTURE_NOW);
            let registry = Arc::clone(&registry);
            let account = *account;
            handles.push(tokio::spawn(async move {
                registry.push_at(&account, &event, FIXTURE_NOW).await
            }));
        }
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(registry.check_invariants().await.unwrap().is_empty());
    let count = registry.link_count().await.unwrap();
    assert!((1..=4).contains(&count));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reject_policy_has_one_winner() {
    let config = RegistryConfig {
        conflict_policy: ConflictPolicy::Reject,
        ..RegistryConfig::default()
    };
    let registry = Arc::new(LinkRegistry::new(MemoryStore::new(), config));
    let claimant = TestFixture::with_seed([9; 32]);
    let accounts = account_pool(8);

    let mut handles = Vec::new();
    for account in accounts {
        let event = claimant.make_link_event_for(&account, FIXTURE_NOW);
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry.push_at(&account, &event, FIXTURE_NOW).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(RegistryError::ConflictingLink { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(registry.link_count().await.unwrap(), 1);
}

/// Memory store that parks one account's commit after it lands, until
/// released.
struct StallingStore {
    inner: MemoryStore,
    stalled: AccountId,
    committed: Notify,
    release: Notify,
}

impl StallingStore {
    fn new(stalled: AccountId) -> Self {
        Self {
            inner: MemoryStore::new(),
            stalled,
            committed: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl LinkStore for StallingStore {
    async fn commit_link(
        &self,
        account: &AccountId,
        key: &SchnorrPubkey,
        policy: ConflictPolicy,
    ) -> keylink::store::Result<CommitResult> {
        let result = self.inner.commit_link(account, key, policy).await?;
        if *account == self.stalled {
            self.committed.notify_one();
            self.release.notified().await;
        }
        Ok(result)
    }

    async fn remove_link(
        &self,
        account: &AccountId,
        expected: Option<&SchnorrPubkey>,
    ) -> keylink::store::Result<RemoveResult> {
        self.inner.remove_link(account, expected).await
    }

    async fn key_for_account(
        &self,
        account: &AccountId,
    ) -> keylink::store::Result<Option<SchnorrPubkey>> {
        self.inner.key_for_account(account).await
    }

    async fn account_for_key(
        &self,
        key: &SchnorrPubkey,
    ) -> keylink::store::Result<Option<AccountId>> {
        self.inner.account_for_key(key).await
    }

    async fn forward_entries(&self) -> keylink::store::Result<Vec<(AccountId, SchnorrPubkey)>> {
        self.inner.forward_entries().await
    }

    async fn reverse_entries(&self) -> keylink::store::Result<Vec<(SchnorrPubkey, AccountId)>> {
        self.inner.reverse_entries().await
    }

    async fn count(&self) -> keylink::store::Result<usize> {
        self.inner.count().await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_notifications_follow_commit_order_under_contention() {
    init_tracing();
    let parties = multi_party_fixtures(3);
    let claimant = &parties[0];
    let (first, second) = (parties[1].account_id(), parties[2].account_id());
    let key = claimant.public_key();

    let store = Arc::new(StallingStore::new(first));
    let registry = Arc::new(LinkRegistry::with_shared_store(
        Arc::clone(&store),
        RegistryConfig::default(),
    ));
    let mut rx = registry.subscribe();

    // First claim commits, then stalls before it can announce anything
    let first_push = {
        let registry = Arc::clone(&registry);
        let event = claimant.make_link_event_for(&first, FIXTURE_NOW);
        tokio::spawn(async move { registry.push_at(&first, &event, FIXTURE_NOW).await })
    };
    store.committed.notified().await;

    // Second claim for the same key races in while the first is parked
    let second_push = {
        let registry = Arc::clone(&registry);
        let event = claimant.make_link_event_for(&second, FIXTURE_NOW);
        tokio::spawn(async move { registry.push_at(&second, &event, FIXTURE_NOW).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(registry.lookup_by_key(&key).await.unwrap(), Some(first));

    store.release.notify_one();
    first_push.await.unwrap().unwrap();
    second_push.await.unwrap().unwrap();

    // Replaying the notifications must land on what the store holds
    let mut replayed = HashMap::new();
    while let Ok(notification) = rx.try_recv() {
        match notification {
            LinkNotification::Created { account, key } => {
                replayed.insert(account, key);
            }
            LinkNotification::Removed { account, key } => {
                assert_eq!(replayed.remove(&account), Some(key));
            }
        }
    }
    let mut replayed: Vec<_> = replayed.into_iter().collect();
    replayed.sort();

    assert_eq!(replayed, vec![(second, key)]);
    assert_eq!(store.forward_entries().await.unwrap(), replayed);
}

#[tokio::test]
async fn test_sqlite_registry_persists() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("links.db");
    let parties = multi_party_fixtures(2);
    let account = parties[0].account_id();

    {
        let registry = LinkRegistry::new(SqliteStore::open(&path)?, RegistryConfig::default());
        registry
            .push_at(&account, &parties[0].make_link_event(FIXTURE_NOW), FIXTURE_NOW)
            .await?;
        registry
            .push_at(
                &account,
                &parties[1].make_link_event_for(&account, FIXTURE_NOW),
                FIXTURE_NOW,
            )
            .await?;
    }

    let registry = LinkRegistry::new(SqliteStore::open(&path)?, RegistryConfig::default());
    assert_eq!(
        registry.lookup_by_account(&account).await?,
        Some(parties[1].public_key())
    );
    assert_eq!(registry.lookup_by_key(&parties[0].public_key()).await?, None);
    assert!(registry.check_invariants().await?.is_empty());

    registry.pull(&account).await?;
    assert_eq!(registry.link_count().await?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_concurrent_pushes_keep_bijection() -> anyhow::Result<()> {
    let registry = Arc::new(LinkRegistry::new(
        SqliteStore::open_memory()?,
        RegistryConfig::default(),
    ));
    let parties = multi_party_fixtures(3);
    let accounts: Vec<_> = parties.iter().map(|p| p.account_id()).collect();

    let mut handles = Vec::new();
    for party in &parties {
        for account in &accounts {
            let event = party.make_link_event_for(account, FIXTURE_NOW);
            let registry = Arc::clone(&registry);
            let account = *account;
            handles.push(tokio::spawn(async move {
                registry.push_at(&account, &event, FIXTURE_NOW).await
            }));
        }
    }
    for handle in handles {
        handle.await??;
    }

    assert!(registry.store().check_bijection().await?.is_empty());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_bijection_after_any_sequence(ops in link_ops(3, 3, 24)) {
        let accounts = account_pool(3);
        let keys = keypair_pool(3);
        let registry = memory_registry();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        runtime.block_on(async {
            for op in ops {
                match op {
                    LinkOp::Push { account, key } => {
                        let event = keylink::LinkingEventBuilder::new()
                            .created_at(FIXTURE_NOW)
                            .for_account(&accounts[account])
                            .sign(&keys[key])
                            .unwrap();
                        registry.push_at(&accounts[account], &event, FIXTURE_NOW).await.unwrap();
                    }
                    LinkOp::Pull { account } => {
                        let had = registry.lookup_by_account(&accounts[account]).await.unwrap();
                        match registry.pull(&accounts[account]).await {
                            Ok(key) => assert_eq!(Some(key), had),
                            Err(RegistryError::NoLinkFound(_)) => assert!(had.is_none()),
                            Err(other) => panic!("unexpected error: {other}"),
                        }
                    }
                }
            }

            assert!(registry.check_invariants().await.unwrap().is_empty());
        });
    }
}
