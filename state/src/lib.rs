//! MONFUNDME State Management
//!
//! Provides state storage, versioning, and the serialized write path.
//! Uses a key-value model where state = { key → value }

pub mod store;
pub mod memory;
pub mod persistent;
pub mod ledger;

pub use store::*;
pub use memory::*;
pub use persistent::*;
pub use ledger::*;
