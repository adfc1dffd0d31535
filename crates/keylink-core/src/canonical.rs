//! Canonical NIP-01 serialization for deterministic event identifiers.
//!
//! An event is serialized as the JSON array
//!
//! ```text
//! [0,"<pubkey-hex>",<created_at>,<kind>,<tags>,"<content>"]
//! ```
//!
//! with no inserted whitespace, and its identifier is the SHA-256 of the
//! UTF-8 bytes of that string. String escaping follows NIP-01 exactly:
//! - `"` and `\` are backslash-escaped
//! - LF, CR, TAB, BS and FF use their short escapes
//! - every other character, including non-ASCII, is written verbatim
//!
//! **CRITICAL**: This encoding is a wire format. It must match every other
//! NIP-01 implementation byte for byte, or signatures stop verifying.

use sha2::{Digest, Sha256};

use crate::event::Tag;
use crate::types::{EventId, SchnorrPubkey};

/// Leading array element reserved by NIP-01.
const RESERVED_PREFIX: &str = "[0,";

/// Encode event fields to canonical bytes.
pub fn canonical_event_bytes(
    pubkey: &SchnorrPubkey,
    created_at: u64,
    kind: u32,
    tags: &[Tag],
    content: &str,
) -> Vec<u8> {
    let mut buf = String::with_capacity(128 + content.len());

    buf.push_str(RESERVED_PREFIX);
    buf.push('"');
    buf.push_str(&pubkey.to_hex());
    buf.push_str("\",");
    buf.push_str(&created_at.to_string());
    buf.push(',');
    buf.push_str(&kind.to_string());
    buf.push(',');
    encode_tags(&mut buf, tags);
    buf.push(',');
    encode_string(&mut buf, content);
    buf.push(']');

    buf.into_bytes()
}

/// Compute the event identifier: SHA-256 of the canonical bytes.
pub fn compute_event_id(
    pubkey: &SchnorrPubkey,
    created_at: u64,
    kind: u32,
    tags: &[Tag],
    content: &str,
) -> EventId {
    let bytes = canonical_event_bytes(pubkey, created_at, kind, tags, content);
    EventId(Sha256::digest(&bytes).into())
}

/// Render a tag list as a JSON array of string arrays.
pub fn canonical_tags(tags: &[Tag]) -> String {
    let mut buf = String::new();
    encode_tags(&mut buf, tags);
    buf
}

fn encode_tags(buf: &mut String, tags: &[Tag]) {
    buf.push('[');
    for (i, tag) in tags.iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        buf.push('[');
        for (j, item) in tag.iter().enumerate() {
            if j > 0 {
                buf.push(',');
            }
            encode_string(buf, item);
        }
        buf.push(']');
    }
    buf.push(']');
}

/// Encode a JSON string with NIP-01 escaping.
fn encode_string(buf: &mut String, s: &str) {
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            '\u{08}' => buf.push_str("\\b"),
            '\u{0c}' => buf.push_str("\\f"),
            other => buf.push(other),
        }
    }
    buf.push('"');
}
