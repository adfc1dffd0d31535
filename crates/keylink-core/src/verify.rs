//! Signature verification for both sides of a link.
//!
//! - Schnorr (BIP-340): the social identity signed the event ID.
//! - ECDSA (recoverable): the account authorized a relayed write.
//!
//! Both verifiers reject malformed input before doing any curve
//! arithmetic: length first, then scalar ranges.

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::{ecdsa, schnorr};
use serde::{Deserialize, Serialize};

use crate::crypto::{account_from_verifying_key, AccountSignature};
use crate::error::VerificationError;
use crate::event::SCHNORR_SIGNATURE_LEN;
use crate::types::{AccountId, SchnorrPubkey};

/// secp256k1 group order n.
pub const SECP256K1_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// floor(n / 2), the largest accepted ECDSA `s` (EIP-2).
pub const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// How far Schnorr verification goes once the range checks pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchnorrVerification {
    /// Full BIP-340: lift the key, recompute the challenge, check
    /// `s·G = R + e·P`.
    #[default]
    Bip340,

    /// Stop after the `r`/`s` range checks and accept.
    ///
    /// **Insecure.** Anyone can forge a passing signature. This reproduces
    /// the behavior of the historical on-chain verifier and exists only
    /// for compatibility testing against it.
    RangeOnly,
}

/// Check that a 32-byte big-endian value lies in `(0, n)`.
pub fn is_valid_scalar(bytes: &[u8]) -> bool {
    bytes.len() == 32 && bytes.iter().any(|&b| b != 0) && bytes < &SECP256K1_ORDER[..]
}

/// Check that a 32-byte big-endian value is at most `n / 2`.
pub fn is_low_s(bytes: &[u8]) -> bool {
    bytes.len() == 32 && bytes <= &SECP256K1_HALF_ORDER[..]
}

/// Verify a BIP-340 signature over a 32-byte digest.
///
/// Returns `Ok(true)` for a valid signature and `Ok(false)` for a
/// well-formed one that fails the curve equation. Malformed input
/// (wrong length, scalar out of range, key not on the curve) is an error.
pub fn verify_schnorr(
    pubkey: &SchnorrPubkey,
    digest: &[u8; 32],
    signature: &[u8],
    mode: SchnorrVerification,
) -> Result<bool, VerificationError> {
    if signature.len() != SCHNORR_SIGNATURE_LEN {
        return Err(VerificationError::InvalidSignatureLength {
            expected: SCHNORR_SIGNATURE_LEN,
            got: signature.len(),
        });
    }

    let (r, s) = signature.split_at(32);
    if !is_valid_scalar(r) || !is_valid_scalar(s) {
        return Err(VerificationError::ScalarOutOfRange);
    }

    if mode == SchnorrVerification::RangeOnly {
        return Ok(true);
    }

    let key = schnorr::VerifyingKey::from_bytes(pubkey.as_bytes())
        .map_err(|_| VerificationError::InvalidPublicKey)?;

    // r in range but not a valid field element / x-coordinate still
    // parses here; the equation check below rejects it.
    let sig = match schnorr::Signature::try_from(signature) {
        Ok(sig) => sig,
        Err(_) => return Ok(false),
    };

    Ok(key.verify_prehash(digest, &sig).is_ok())
}

/// Recover the account that produced a recoverable ECDSA signature.
pub fn recover_account(
    digest: &[u8; 32],
    signature: &AccountSignature,
) -> Result<AccountId, VerificationError> {
    if !is_valid_scalar(signature.r()) || !is_valid_scalar(signature.s()) {
        return Err(VerificationError::ScalarOutOfRange);
    }

    if !is_low_s(signature.s()) {
        return Err(VerificationError::MalleableSignature);
    }

    let recovery_id = parse_recovery_id(signature.v())?;

    let sig = ecdsa::Signature::from_slice(&signature.as_bytes()[..64])
        .map_err(|_| VerificationError::ScalarOutOfRange)?;

    let key = ecdsa::VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|_| VerificationError::RecoveryFailed)?;

    Ok(account_from_verifying_key(&key))
}

/// Require that `signature` over `digest` was produced by `expected`.
pub fn verify_account_signature(
    digest: &[u8; 32],
    signature: &AccountSignature,
    expected: &AccountId,
) -> Result<(), VerificationError> {
    let actual = recover_account(digest, signature)?;
    if actual != *expected {
        return Err(VerificationError::SignerMismatch {
            expected: *expected,
            actual,
        });
    }
    Ok(())
}

/// Accept both raw (0/1) and wallet-style (27/28) recovery bytes.
fn parse_recovery_id(v: u8) -> Result<ecdsa::RecoveryId, VerificationError> {
    let normalized = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        _ => return Err(VerificationError::InvalidRecoveryId(v)),
    };
    ecdsa::RecoveryId::from_byte(normalized).ok_or(VerificationError::InvalidRecoveryId(v))
}
