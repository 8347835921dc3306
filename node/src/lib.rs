//! MONFUNDME Node Implementation
//!
//! Composes every ledger component over one state store:
//! - Validator registry and quorum-gated proposals
//! - Campaign factory and donation escrow
//! - Genesis deployment and sled-backed persistence

mod runtime;

pub use runtime::*;
