//! MONFUNDME Governance
//!
//! Implements validator-gated campaign approval with:
//! - An administered validator registry
//! - Threshold signature quorum over (proposal, result)
//! - Time-bounded proposals executed at most once

pub mod proposal;
pub mod quorum;
pub mod validator;

pub use proposal::*;
pub use quorum::*;
pub use validator::*;
