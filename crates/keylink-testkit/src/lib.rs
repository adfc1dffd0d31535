//! # keylink testkit
//!
//! Testing utilities for keylink.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known events with expected IDs and reference signatures
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Parties with both identities, ready to sign linking events
//!
//! ## Golden Vectors
//!
//! Golden vectors pin the NIP-01 serialization and key derivation:
//!
//! ```rust
//! use keylink_testkit::vectors::{all_vectors, generate_event_from_vector};
//!
//! for vector in all_vectors() {
//!     let event = generate_event_from_vector(&vector);
//!     assert_eq!(event.event_id.to_hex(), vector.expected_event_id);
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use keylink_testkit::generators::{event_from_params, LinkParams};
//!
//! proptest! {
//!     #[test]
//!     fn event_id_is_deterministic(params: LinkParams) {
//!         let e1 = event_from_params(&params);
//!         let e2 = event_from_params(&params);
//!         prop_assert_eq!(e1.event_id, e2.event_id);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use keylink_testkit::fixtures::{TestFixture, FIXTURE_NOW};
//!
//! let fixture = TestFixture::new();
//! let event = fixture.make_link_event(FIXTURE_NOW);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party_fixtures, TestFixture, FIXTURE_NOW};
pub use generators::{event_from_params, LinkOp, LinkParams};
pub use vectors::{
    all_vectors, canonical_vectors, generate_event_from_vector, reference_event,
    verify_all_vectors, CanonicalVector, GoldenVector,
};
