//! Core traits defining MONFUNDME interfaces
//!
//! These traits define the contracts that storage backends and time
//! sources must implement.

use crate::types::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Result type for MONFUNDME operations
pub type MonfundmeResult<T> = Result<T, crate::error::MonfundmeError>;

/// State provider trait
#[async_trait]
pub trait StateProvider: Send + Sync {
    /// Get the current state version
    async fn version(&self) -> StateVersion;

    /// Get a value by key
    async fn get(&self, key: &[u8]) -> MonfundmeResult<Option<Vec<u8>>>;

    /// Check if a key exists
    async fn exists(&self, key: &[u8]) -> MonfundmeResult<bool>;

    /// All entries whose key starts with `prefix`, in key order
    async fn scan_prefix(&self, prefix: &[u8]) -> MonfundmeResult<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// State mutator trait
#[async_trait]
pub trait StateMutator: StateProvider {
    /// Set a value
    async fn set(&self, key: &[u8], value: &[u8]) -> MonfundmeResult<()>;

    /// Delete a key
    async fn delete(&self, key: &[u8]) -> MonfundmeResult<()>;

    /// Apply a batch of changes atomically
    async fn apply_batch(&self, changes: Vec<StateChange>) -> MonfundmeResult<StateVersion>;
}

/// State change operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    Set { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Source of the ledger's notion of "now".
///
/// Deadlines and voting windows are evaluated against this, never against
/// the wall clock directly.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            secs: AtomicU64::new(start.as_secs()),
        }
    }

    pub fn set(&self, time: Timestamp) {
        self.secs.store(time.as_secs(), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_secs(self.secs.load(Ordering::SeqCst))
    }
}

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock>;
