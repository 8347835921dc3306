//! Serialized write path over a state store
//!
//! All mutations go through a [`LedgerWriter`], which holds the ledger's
//! write lock and stages changes in an overlay. Reads through the writer see
//! staged values. Nothing reaches the store until [`LedgerWriter::commit`],
//! which applies the overlay as a single batch.

use monfundme_core::{MonfundmeResult, StateChange, StateVersion};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::trace;

use crate::store::{decode_record, encode_record, StateStore};

/// Shared ledger state with a single writer at a time
pub struct Ledger<S: StateStore> {
    state: Arc<S>,
    write_lock: Mutex<()>,
}

impl<S: StateStore> Ledger<S> {
    pub fn new(state: Arc<S>) -> Self {
        Self {
            state,
            write_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> &Arc<S> {
        &self.state
    }

    pub async fn version(&self) -> StateVersion {
        self.state.version().await
    }

    /// Read a committed record
    pub async fn read<T: DeserializeOwned>(&self, key: &[u8]) -> MonfundmeResult<Option<T>> {
        match self.state.get(key).await? {
            Some(bytes) => Ok(Some(decode_record(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read all committed records under a prefix, in key order
    pub async fn scan<T: DeserializeOwned>(&self, prefix: &[u8]) -> MonfundmeResult<Vec<T>> {
        self.state
            .scan_prefix(prefix)
            .await?
            .iter()
            .map(|(_, value)| decode_record(value))
            .collect()
    }

    /// Acquire the write lock. Waits for any other writer to finish.
    pub async fn write(&self) -> LedgerWriter<'_, S> {
        let guard = self.write_lock.lock().await;
        LedgerWriter {
            ledger: self,
            _guard: guard,
            staged: BTreeMap::new(),
        }
    }
}

/// Exclusive, staged view of the ledger
pub struct LedgerWriter<'a, S: StateStore> {
    ledger: &'a Ledger<S>,
    _guard: MutexGuard<'a, ()>,
    staged: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, S: StateStore> LedgerWriter<'a, S> {
    /// Raw value, staged changes first
    pub async fn get(&self, key: &[u8]) -> MonfundmeResult<Option<Vec<u8>>> {
        match self.staged.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => self.ledger.state.get(key).await,
        }
    }

    pub async fn read<T: DeserializeOwned>(&self, key: &[u8]) -> MonfundmeResult<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(decode_record(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn exists(&self, key: &[u8]) -> MonfundmeResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Records under a prefix with staged changes merged in, in key order
    pub async fn scan<T: DeserializeOwned>(&self, prefix: &[u8]) -> MonfundmeResult<Vec<T>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .ledger
            .state
            .scan_prefix(prefix)
            .await?
            .into_iter()
            .collect();

        for (key, value) in self.staged.range(prefix.to_vec()..) {
            if !key.starts_with(prefix) {
                break;
            }
            match value {
                Some(value) => merged.insert(key.clone(), value.clone()),
                None => merged.remove(key),
            };
        }

        merged.values().map(|value| decode_record(value)).collect()
    }

    pub fn put<T: Serialize>(&mut self, key: Vec<u8>, record: &T) -> MonfundmeResult<()> {
        let value = encode_record(record)?;
        self.staged.insert(key, Some(value));
        Ok(())
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.staged.insert(key, None);
    }

    pub fn is_dirty(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Apply staged changes as one batch and clear the overlay.
    ///
    /// The write lock stays held, so a caller may commit, do more work and
    /// commit again without another writer slipping in between.
    pub async fn commit(&mut self) -> MonfundmeResult<StateVersion> {
        if self.staged.is_empty() {
            return Ok(self.ledger.state.version().await);
        }

        let changes: Vec<StateChange> = std::mem::take(&mut self.staged)
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => StateChange::Set { key, value },
                None => StateChange::Delete { key },
            })
            .collect();

        let count = changes.len();
        let version = self.ledger.state.apply_batch(changes).await?;
        trace!(changes = count, version = version.0, "Committed ledger batch");
        Ok(version)
    }

    /// Discard staged changes
    pub fn rollback(&mut self) {
        self.staged.clear();
    }
}
