//! Campaign Module for MONFUNDME
//!
//! Implements governance-approved fundraising with:
//! - A factory that deploys campaigns for approved proposals
//! - Per-campaign escrow accepting donations until the deadline
//! - One-time withdrawal to the owner through a payout sink
//! - Genesis deployment of the registry, factory and validators

pub mod campaign;
pub mod escrow;
pub mod factory;
pub mod genesis;
pub mod payout;

pub use campaign::*;
pub use escrow::*;
pub use factory::*;
pub use genesis::*;
pub use payout::*;
