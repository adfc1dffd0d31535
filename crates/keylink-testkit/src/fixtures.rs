//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use keylink_core::{
    AccountId, AccountKeypair, AccountSignature, LinkingEvent, LinkingEventBuilder,
    SchnorrKeypair, SchnorrPubkey,
};
use keylink_store::MemoryStore;

/// Fixed clock used by fixtures: 2023-11-14T22:13:20Z.
pub const FIXTURE_NOW: u64 = 1_700_000_000;

/// A party with an account and a Schnorr identity, plus a memory store.
pub struct TestFixture {
    pub schnorr: SchnorrKeypair,
    pub account: AccountKeypair,
    pub store: MemoryStore,
}

impl TestFixture {
    /// Create a new test fixture with random keys.
    pub fn new() -> Self {
        Self {
            schnorr: SchnorrKeypair::generate(),
            account: AccountKeypair::generate(),
            store: MemoryStore::new(),
        }
    }

    /// Create with deterministic keys derived from `seed`.
    ///
    /// The account key uses the seed with its last byte flipped so the two
    /// identities never share a secret.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        let mut account_seed = seed;
        account_seed[31] ^= 0xff;

        Self {
            schnorr: SchnorrKeypair::from_seed(&seed).expect("fixture seed in range"),
            account: AccountKeypair::from_seed(&account_seed).expect("fixture seed in range"),
            store: MemoryStore::new(),
        }
    }

    /// The account identity.
    pub fn account_id(&self) -> AccountId {
        self.account.account()
    }

    /// The Schnorr identity.
    pub fn public_key(&self) -> SchnorrPubkey {
        self.schnorr.public_key()
    }

    /// A valid linking event for this fixture's own account.
    pub fn make_link_event(&self, created_at: u64) -> LinkingEvent {
        self.make_link_event_for(&self.account_id(), created_at)
    }

    /// A linking event signed by this fixture's key, claiming `account`.
    pub fn make_link_event_for(&self, account: &AccountId, created_at: u64) -> LinkingEvent {
        LinkingEventBuilder::new()
            .created_at(created_at)
            .for_account(account)
            .sign(&self.schnorr)
            .expect("signing a fixture event")
    }

    /// A linking event with arbitrary fields, signed by this fixture's key.
    pub fn make_custom_event(
        &self,
        created_at: u64,
        kind: u32,
        content: &str,
    ) -> LinkingEvent {
        LinkingEventBuilder::new()
            .created_at(created_at)
            .kind(kind)
            .content(content)
            .sign(&self.schnorr)
            .expect("signing a fixture event")
    }

    /// The account's authorization for pushing `event`.
    pub fn authorize_link(&self, event: &LinkingEvent) -> AccountSignature {
        self.account
            .authorize_link(&event.event_id)
            .expect("signing a fixture authorization")
    }

    /// The account's authorization for unlinking `key`.
    pub fn authorize_unlink(&self, key: &SchnorrPubkey) -> AccountSignature {
        self.account
            .authorize_unlink(key)
            .expect("signing a fixture authorization")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple test fixtures for multi-party tests.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8 + 1;
            TestFixture::with_seed(seed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use keylink_core::{validate_linking_event, ValidationPolicy};
    use keylink_store::LinkStore;

    #[test]
    fn test_fixture_event_is_valid() {
        let fixture = TestFixture::with_seed([7; 32]);
        let event = fixture.make_link_event(FIXTURE_NOW);

        validate_linking_event(
            &event,
            &fixture.account_id(),
            FIXTURE_NOW,
            &ValidationPolicy::default(),
        )
        .unwrap();
        assert_eq!(event.pubkey, fixture.public_key());
    }

    #[test]
    fn test_multi_party() {
        let parties = multi_party_fixtures(3);

        let keys: Vec<_> = parties.iter().map(|p| p.public_key()).collect();
        let accounts: Vec<_> = parties.iter().map(|p| p.account_id()).collect();
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[1], keys[2]);
        assert_ne!(keys[0], keys[2]);
        assert_ne!(accounts[0], accounts[1]);
        assert_ne!(accounts[1], accounts[2]);
    }

    #[tokio::test]
    async fn test_fixture_store_starts_empty() {
        let fixture = TestFixture::new();
        assert_eq!(fixture.store.count().await.unwrap(), 0);
    }
}
