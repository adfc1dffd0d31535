//! Golden test vectors for deterministic verification.
//!
//! These vectors pin the NIP-01 serialization, the event ID, key and
//! address derivation, and a BIP-340 signature produced by an independent
//! implementation. Any client building linking events must reproduce them.

use keylink_core::{
    compute_event_id, verify_schnorr, AccountKeypair, AccountId, EventId, LinkingEvent,
    LinkingEventBuilder, SchnorrKeypair, SchnorrPubkey, SchnorrVerification, Tag,
};

/// A golden linking-event vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Schnorr secret key.
    pub schnorr_secret: [u8; 32],
    /// ECDSA secret key of the account.
    pub account_secret: [u8; 32],
    /// Event timestamp.
    pub created_at: u64,
    /// Expected x-only public key (hex).
    pub expected_pubkey: &'static str,
    /// Expected account address (hex, no prefix).
    pub expected_account: &'static str,
    /// Expected event ID (hex).
    pub expected_event_id: &'static str,
    /// Reference BIP-340 signature over the event ID, zero auxiliary randomness (hex).
    pub reference_signature: &'static str,
}

/// A golden vector for the canonical serialization alone.
#[derive(Debug, Clone)]
pub struct CanonicalVector {
    pub name: &'static str,
    pub pubkey: &'static str,
    pub created_at: u64,
    pub kind: u32,
    pub tags: &'static [&'static [&'static str]],
    pub content: &'static str,
    /// Exact serialized form.
    pub expected_canonical: &'static str,
    /// SHA-256 of `expected_canonical` (hex).
    pub expected_event_id: &'static str,
}

/// Secret key whose scalar value is `n`.
const fn scalar(n: u8) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[31] = n;
    out
}

/// Get all golden linking-event vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "small scalar keys",
            schnorr_secret: scalar(3),
            account_secret: scalar(1),
            created_at: 1_700_000_000,
            expected_pubkey: "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9",
            expected_account: "7e5f4552091a69125d5dfcb7b8c2659029395bdf",
            expected_event_id: "17b80d388aa956ee5c69fad05e0f5bca7137517e4eb9101e59e8d3040aff4363",
            reference_signature: "8b9aab1d1b76f9dc6dcd8699b98a10c6a58d3b39190130d7b22bd71058038570\
                                  908d2a2b36543b5cb7601e8192f85c12ec2cb8183380e401dc4564ad14c9446b",
        },
        GoldenVector {
            name: "repeated byte seeds",
            schnorr_secret: [0x42; 32],
            account_secret: [0x11; 32],
            created_at: 1_700_000_000,
            expected_pubkey: "24653eac434488002cc06bbfb7f10fe18991e35f9fe4302dbea6d2353dc0ab1c",
            expected_account: "19e7e376e7c213b7e7e7e46cc70a5dd086daff2a",
            expected_event_id: "e3c21849af5b9ccc7f77c7a1d1e058b11c9db64375afb3c442d32f448db900a0",
            reference_signature: "6516755c18940b1b5a7198ae790a806562e79e1055379e3e17ba5ec46c44d236\
                                  8d1a47876243680e889f6a02e3f5fd9f3a6af26f2e21a7aff93e7ef7f82952e1",
        },
    ]
}

/// Get all canonical serialization vectors.
pub fn canonical_vectors() -> Vec<CanonicalVector> {
    vec![
        CanonicalVector {
            name: "linking event",
            pubkey: "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9",
            created_at: 1_700_000_000,
            kind: 27235,
            tags: &[],
            content: "7e5f4552091a69125d5dfcb7b8c2659029395bdf",
            expected_canonical: r#"[0,"f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9",1700000000,27235,[],"7e5f4552091a69125d5dfcb7b8c2659029395bdf"]"#,
            expected_event_id: "17b80d388aa956ee5c69fad05e0f5bca7137517e4eb9101e59e8d3040aff4363",
        },
        CanonicalVector {
            name: "escapes and tags",
            pubkey: "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9",
            created_at: 1,
            kind: 1,
            tags: &[&["e", "abc"], &["t", "say \"hi\""]],
            content: "line1\nline2\ttab \\ back",
            expected_canonical: r#"[0,"f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9",1,1,[["e","abc"],["t","say \"hi\""]],"line1\nline2\ttab \\ back"]"#,
            expected_event_id: "63708c868bb51fcde43fe3c6c4592b98b2ed13ec32583daaf0798312a28f1d67",
        },
    ]
}

impl CanonicalVector {
    /// Tags as owned values.
    pub fn owned_tags(&self) -> Vec<Tag> {
        self.tags
            .iter()
            .map(|tag| tag.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    /// Parsed public key.
    pub fn public_key(&self) -> SchnorrPubkey {
        SchnorrPubkey::from_hex(self.pubkey).expect("vector pubkey is valid hex")
    }
}

/// Keys of a golden vector.
pub fn vector_keys(vector: &GoldenVector) -> (SchnorrKeypair, AccountKeypair) {
    let schnorr = SchnorrKeypair::from_seed(&vector.schnorr_secret).expect("vector secret in range");
    let account = AccountKeypair::from_seed(&vector.account_secret).expect("vector secret in range");
    (schnorr, account)
}

/// Build the linking event of a golden vector, signed by this implementation.
pub fn generate_event_from_vector(vector: &GoldenVector) -> LinkingEvent {
    let (schnorr, account) = vector_keys(vector);
    LinkingEventBuilder::new()
        .created_at(vector.created_at)
        .for_account(&account.account())
        .sign(&schnorr)
        .expect("signing a vector event")
}

/// The linking event of a golden vector carrying its reference signature.
pub fn reference_event(vector: &GoldenVector) -> LinkingEvent {
    let mut event = generate_event_from_vector(vector);
    event.signature = hex::decode(vector.reference_signature).expect("vector signature is hex");
    event
}

/// Verify all golden vectors against this implementation.
///
/// Returns `(name, matches, event_id_hex)` per vector. A vector matches
/// when key derivation, address derivation, and the event ID agree with
/// the expected values and the reference signature verifies.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let (schnorr, account) = vector_keys(v);
            let event = reference_event(v);
            let id = event.event_id;

            let signature_ok = verify_schnorr(
                &event.pubkey,
                id.as_bytes(),
                &event.signature,
                SchnorrVerification::Bip340,
            )
            .unwrap_or(false);

            let matches = schnorr.public_key().to_hex() == v.expected_pubkey
                && account.account().to_hex() == v.expected_account
                && id.to_hex() == v.expected_event_id
                && signature_ok;

            (v.name.to_string(), matches, id.to_hex())
        })
        .collect()
}

/// Recompute the event ID of a canonical vector.
pub fn canonical_vector_id(vector: &CanonicalVector) -> EventId {
    compute_event_id(
        &vector.public_key(),
        vector.created_at,
        vector.kind,
        &vector.owned_tags(),
        vector.content,
    )
}

/// Parse the expected account of a golden vector.
pub fn expected_account(vector: &GoldenVector) -> AccountId {
    AccountId::from_hex(vector.expected_account).expect("vector account is valid hex")
}

#[cfg(test)]
mod tests {
    use super::*;
    use keylink_core::canonical_event_bytes;

    #[test]
    fn test_all_vectors_match() {
        for (name, matches, id) in verify_all_vectors() {
            assert!(matches, "vector '{}' mismatched (event id {})", name, id);
        }
    }

    #[test]
    fn test_canonical_vectors() {
        for vector in canonical_vectors() {
            let bytes = canonical_event_bytes(
                &vector.public_key(),
                vector.created_at,
                vector.kind,
                &vector.owned_tags(),
                vector.content,
            );
            assert_eq!(
                String::from_utf8(bytes).unwrap(),
                vector.expected_canonical,
                "vector '{}'",
                vector.name
            );
            assert_eq!(canonical_vector_id(&vector).to_hex(), vector.expected_event_id);
        }
    }

    #[test]
    fn test_vectors_are_deterministic() {
        for vector in all_vectors() {
            let e1 = generate_event_from_vector(&vector);
            let e2 = generate_event_from_vector(&vector);
            assert_eq!(e1.event_id, e2.event_id, "vector '{}'", vector.name);
            assert_eq!(e1.content, expected_account(&vector).to_hex());
        }
    }
}
