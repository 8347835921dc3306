//! MONFUNDME Core Library
//!
//! Core types, traits, and abstractions for the MONFUNDME crowdfunding ledger.
//! This crate provides the foundation for all other MONFUNDME components.

pub mod types;
pub mod traits;
pub mod error;
pub mod config;
pub mod event;

pub use types::*;
pub use traits::*;
pub use error::*;
pub use config::*;
pub use event::*;
