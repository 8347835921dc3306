//! MONFUNDME Cryptography Module
//!
//! Provides cryptographic primitives using standard, audited algorithms:
//! - Ed25519 for validator attestations
//! - BLAKE3 for hashing, address derivation and digests

pub mod keys;
pub mod signing;
pub mod hashing;

pub use keys::*;
pub use signing::*;
pub use hashing::*;
