//! Proptest generators for property-based testing.

use proptest::prelude::*;

use keylink_core::{
    AccountId, AccountKeypair, LinkingEvent, LinkingEventBuilder, SchnorrKeypair, SchnorrPubkey,
};

/// Generate a secret key that is always a valid secp256k1 scalar.
///
/// The leading byte stays below `0x7f`, which keeps the value under the
/// group order, and is never zero.
pub fn secret_key() -> impl Strategy<Value = [u8; 32]> {
    (1u8..0x7f, any::<[u8; 31]>()).prop_map(|(head, tail)| {
        let mut out = [0u8; 32];
        out[0] = head;
        out[1..].copy_from_slice(&tail);
        out
    })
}

/// Generate a random Schnorr keypair.
pub fn schnorr_keypair() -> impl Strategy<Value = SchnorrKeypair> {
    secret_key().prop_map(|seed| SchnorrKeypair::from_seed(&seed).expect("seed in range"))
}

/// Generate a random account keypair.
pub fn account_keypair() -> impl Strategy<Value = AccountKeypair> {
    secret_key().prop_map(|seed| AccountKeypair::from_seed(&seed).expect("seed in range"))
}

/// Generate a random AccountId.
pub fn account_id() -> impl Strategy<Value = AccountId> {
    any::<[u8; 20]>().prop_map(AccountId::from_bytes)
}

/// Generate a random SchnorrPubkey (not necessarily on the curve).
pub fn schnorr_pubkey() -> impl Strategy<Value = SchnorrPubkey> {
    any::<[u8; 32]>().prop_map(SchnorrPubkey::from_bytes)
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = u64> {
    0u64..=4_102_444_800 // 2100-01-01
}

/// Parameters for generating a linking event.
#[derive(Debug, Clone)]
pub struct LinkParams {
    pub schnorr: SchnorrKeypair,
    pub account: AccountId,
    pub created_at: u64,
}

impl Arbitrary for LinkParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (schnorr_keypair(), account_id(), timestamp())
            .prop_map(|(schnorr, account, created_at)| LinkParams {
                schnorr,
                account,
                created_at,
            })
            .boxed()
    }
}

/// Generate a linking event from parameters.
pub fn event_from_params(params: &LinkParams) -> LinkingEvent {
    LinkingEventBuilder::new()
        .created_at(params.created_at)
        .for_account(&params.account)
        .sign(&params.schnorr)
        .expect("signing a generated event")
}

/// One registry mutation, addressing accounts and keys by index into a
/// small pool so that sequences collide often.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOp {
    /// Link account `account` to key `key`.
    Push { account: usize, key: usize },
    /// Unlink account `account`.
    Pull { account: usize },
}

/// Generate a single operation over pools of the given sizes.
pub fn link_op(accounts: usize, keys: usize) -> impl Strategy<Value = LinkOp> {
    prop_oneof![
        3 => (0..accounts, 0..keys).prop_map(|(account, key)| LinkOp::Push { account, key }),
        1 => (0..accounts).prop_map(|account| LinkOp::Pull { account }),
    ]
}

/// Generate a sequence of up to `max_len` operations.
pub fn link_ops(accounts: usize, keys: usize, max_len: usize) -> impl Strategy<Value = Vec<LinkOp>> {
    prop::collection::vec(link_op(accounts, keys), 0..=max_len)
}

/// Deterministic account pool for op sequences.
pub fn account_pool(size: usize) -> Vec<AccountId> {
    (0..size)
        .map(|i| {
            let mut bytes = [0u8; 20];
            bytes[0] = 0xac;
            bytes[19] = i as u8;
            AccountId::from_bytes(bytes)
        })
        .collect()
}

/// Deterministic Schnorr key pool for op sequences.
pub fn keypair_pool(size: usize) -> Vec<SchnorrKeypair> {
    (0..size)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = 0x5c;
            seed[31] = i as u8;
            SchnorrKeypair::from_seed(&seed).expect("pool seed in range")
        })
        .collect()
}
