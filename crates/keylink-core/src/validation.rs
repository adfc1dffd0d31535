//! Linking event validation: semantic checks and signature verification.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::event::{LinkingEvent, LINKING_KIND};
use crate::types::AccountId;
use crate::verify::{verify_schnorr, SchnorrVerification};

/// Default allowance for clocks running ahead of ours, in seconds.
pub const DEFAULT_SKEW_TOLERANCE_SECS: u64 = 300;

/// Parameters that control validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// How far `created_at` may be ahead of `now`.
    pub skew_tolerance_secs: u64,
    /// Schnorr verification depth.
    pub schnorr: SchnorrVerification,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            skew_tolerance_secs: DEFAULT_SKEW_TOLERANCE_SECS,
            schnorr: SchnorrVerification::Bip340,
        }
    }
}

/// Validate a linking event for `claimed_account`.
///
/// This performs:
/// - Structural checks (see [`validate_event_structure`])
/// - Schnorr signature verification over the event ID
pub fn validate_linking_event(
    event: &LinkingEvent,
    claimed_account: &AccountId,
    now: u64,
    policy: &ValidationPolicy,
) -> Result<(), ValidationError> {
    validate_event_structure(event, claimed_account, now, policy)?;
    verify_event_signature(event, policy.schnorr)
}

/// Validate a linking event without touching its signature.
///
/// Checks run cheapest first:
/// 1. Kind is the linking kind
/// 2. Tags are empty
/// 3. Content is the claimed account's lowercase hex
/// 4. `created_at` is not beyond `now + skew_tolerance_secs`
///    (there is no lower bound; old events stay valid)
/// 5. The claimed event ID matches the recomputed one
pub fn validate_event_structure(
    event: &LinkingEvent,
    claimed_account: &AccountId,
    now: u64,
    policy: &ValidationPolicy,
) -> Result<(), ValidationError> {
    // 1. Kind
    if event.kind != LINKING_KIND {
        return Err(ValidationError::InvalidKind {
            expected: LINKING_KIND,
            got: event.kind,
        });
    }

    // 2. Tags
    if !event.tags.is_empty() {
        return Err(ValidationError::TagsNotEmpty);
    }

    // 3. Content binds the claim to this account
    let expected = claimed_account.to_hex();
    if event.content != expected {
        return Err(ValidationError::ContentMismatch {
            expected,
            got: event.content.clone(),
        });
    }

    // 4. Freshness (upper bound only)
    if event.created_at > now.saturating_add(policy.skew_tolerance_secs) {
        return Err(ValidationError::TimestampInFuture {
            created_at: event.created_at,
            now,
            tolerance: policy.skew_tolerance_secs,
        });
    }

    // 5. Event ID
    let computed = event.compute_id();
    if computed != event.event_id {
        return Err(ValidationError::EventIdMismatch {
            computed,
            claimed: event.event_id,
        });
    }

    Ok(())
}

/// Verify the Schnorr signature over the event's claimed ID.
///
/// Callers must have checked the ID against the event fields first;
/// [`validate_linking_event`] does.
pub fn verify_event_signature(
    event: &LinkingEvent,
    mode: SchnorrVerification,
) -> Result<(), ValidationError> {
    match verify_schnorr(&event.pubkey, event.event_id.as_bytes(), &event.signature, mode)? {
        true => Ok(()),
        false => Err(ValidationError::InvalidSignature),
    }
}
