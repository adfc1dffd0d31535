//! Cryptographic primitives for keylink.
//!
//! Wraps secp256k1 Schnorr (BIP-340) and ECDSA keys from `k256` with strong
//! types, plus the Keccak-256 digests used for account addresses and
//! account-side authorizations.

use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::{ecdsa, schnorr};
use sha3::{Digest, Keccak256};
use std::fmt;

use crate::error::{CoreError, VerificationError};
use crate::types::{AccountId, EventId, SchnorrPubkey};

/// Domain prefix for account authorizations of a new link.
pub const LINK_DOMAIN: &[u8] = b"keylink/link/v1";

/// Domain prefix for account authorizations of an unlink.
pub const UNLINK_DOMAIN: &[u8] = b"keylink/unlink/v1";

/// EIP-191 personal message prefix.
const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";

/// Length of a recoverable ECDSA signature (`r || s || v`).
pub const ACCOUNT_SIGNATURE_LEN: usize = 65;

/// Keccak-256 of the given data.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Hash a message the way wallets do for `personal_sign`.
pub fn personal_message_digest(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_MESSAGE_PREFIX);
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Digest an account signs to authorize linking the given event.
pub fn link_authorization_digest(event_id: &EventId) -> [u8; 32] {
    let mut message = Vec::with_capacity(LINK_DOMAIN.len() + 32);
    message.extend_from_slice(LINK_DOMAIN);
    message.extend_from_slice(event_id.as_bytes());
    personal_message_digest(&message)
}

/// Digest an account signs to authorize removing its link to `key`.
pub fn unlink_authorization_digest(account: &AccountId, key: &SchnorrPubkey) -> [u8; 32] {
    let mut message = Vec::with_capacity(UNLINK_DOMAIN.len() + 20 + 32);
    message.extend_from_slice(UNLINK_DOMAIN);
    message.extend_from_slice(account.as_bytes());
    message.extend_from_slice(key.as_bytes());
    personal_message_digest(&message)
}

/// Derive an account address from an ECDSA verifying key.
///
/// The address is the last 20 bytes of Keccak-256 over the uncompressed
/// point without its `0x04` tag.
pub fn account_from_verifying_key(key: &ecdsa::VerifyingKey) -> AccountId {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);

    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    AccountId(address)
}

/// A 65-byte recoverable ECDSA signature (`r || s || v`).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AccountSignature(pub [u8; ACCOUNT_SIGNATURE_LEN]);

impl AccountSignature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; ACCOUNT_SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse from a slice, rejecting any length other than 65.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, VerificationError> {
        let arr: [u8; ACCOUNT_SIGNATURE_LEN] =
            bytes
                .try_into()
                .map_err(|_| VerificationError::InvalidSignatureLength {
                    expected: ACCOUNT_SIGNATURE_LEN,
                    got: bytes.len(),
                })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; ACCOUNT_SIGNATURE_LEN] {
        &self.0
    }

    /// The `r` component.
    pub fn r(&self) -> &[u8] {
        &self.0[..32]
    }

    /// The `s` component.
    pub fn s(&self) -> &[u8] {
        &self.0[32..64]
    }

    /// The recovery byte.
    pub fn v(&self) -> u8 {
        self.0[64]
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for AccountSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountSig({}...)", &self.to_hex()[..16])
    }
}

/// A Schnorr keypair for signing linking events.
#[derive(Clone)]
pub struct SchnorrKeypair {
    signing_key: schnorr::SigningKey,
}

impl SchnorrKeypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let signing_key = schnorr::SigningKey::random(&mut rand::rngs::OsRng);
        Self { signing_key }
    }

    /// Create from a 32-byte secret. Fails for zero or out-of-range scalars.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, CoreError> {
        let signing_key =
            schnorr::SigningKey::from_bytes(seed).map_err(|_| CoreError::InvalidSecretKey)?;
        Ok(Self { signing_key })
    }

    /// Get the x-only public key.
    pub fn public_key(&self) -> SchnorrPubkey {
        SchnorrPubkey(self.signing_key.verifying_key().to_bytes().into())
    }

    /// Sign a 32-byte digest (BIP-340).
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<[u8; 64], CoreError> {
        let signature: schnorr::Signature = self
            .signing_key
            .sign_prehash(digest)
            .map_err(|_| CoreError::SigningFailed)?;
        Ok(signature.to_bytes())
    }
}

impl fmt::Debug for SchnorrKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchnorrKeypair({:?})", self.public_key())
    }
}

/// An ECDSA keypair controlling an account.
#[derive(Clone)]
pub struct AccountKeypair {
    signing_key: ecdsa::SigningKey,
}

impl AccountKeypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let signing_key = ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        Self { signing_key }
    }

    /// Create from a 32-byte secret. Fails for zero or out-of-range scalars.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, CoreError> {
        let signing_key =
            ecdsa::SigningKey::from_slice(seed).map_err(|_| CoreError::InvalidSecretKey)?;
        Ok(Self { signing_key })
    }

    /// The account address controlled by this key.
    pub fn account(&self) -> AccountId {
        account_from_verifying_key(self.signing_key.verifying_key())
    }

    /// Produce a recoverable signature over a 32-byte digest.
    ///
    /// The recovery byte is emitted in the `27`/`28` form wallets use.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<AccountSignature, CoreError> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|_| CoreError::SigningFailed)?;

        let mut bytes = [0u8; ACCOUNT_SIGNATURE_LEN];
        bytes[..64].copy_from_slice(signature.to_bytes().as_slice());
        bytes[64] = 27 + recovery_id.to_byte();
        Ok(AccountSignature(bytes))
    }

    /// Sign the authorization for linking `event_id` to this account.
    pub fn authorize_link(&self, event_id: &EventId) -> Result<AccountSignature, CoreError> {
        self.sign_digest(&link_authorization_digest(event_id))
    }

    /// Sign the authorization for removing this account's link to `key`.
    pub fn authorize_unlink(&self, key: &SchnorrPubkey) -> Result<AccountSignature, CoreError> {
        self.sign_digest(&unlink_authorization_digest(&self.account(), key))
    }
}

impl fmt::Debug for AccountKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountKeypair({:?})", self.account())
    }
}
