//! Persistent state store using sled database

use async_trait::async_trait;
use monfundme_core::{
    MonfundmeError, MonfundmeResult, StateChange, StateMutator, StateProvider, StateVersion,
};
use parking_lot::RwLock;
use sled::{Db, Tree};
use std::path::Path;
use tracing::debug;

use crate::store::{StateEntry, StateStore};

const STATE_TREE: &str = "state";
const META_TREE: &str = "meta";
const VERSION_KEY: &[u8] = b"version";

fn storage_err(e: sled::Error) -> MonfundmeError {
    MonfundmeError::StorageError(e.to_string())
}

/// Persistent state store backed by sled database
pub struct PersistentStateStore {
    db: Db,
    state: Tree,
    meta: Tree,
    version: RwLock<StateVersion>,
}

impl PersistentStateStore {
    pub fn open<P: AsRef<Path>>(path: P) -> MonfundmeResult<Self> {
        let db = sled::open(path).map_err(storage_err)?;
        let state = db.open_tree(STATE_TREE).map_err(storage_err)?;
        let meta = db.open_tree(META_TREE).map_err(storage_err)?;

        // Load version from disk or start at 0
        let version = match meta.get(VERSION_KEY).map_err(storage_err)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    MonfundmeError::StateCorruption("version record is not 8 bytes".into())
                })?;
                StateVersion::new(u64::from_le_bytes(raw))
            }
            None => StateVersion::new(0),
        };

        debug!(version = version.0, "Opened persistent state store");

        Ok(Self {
            db,
            state,
            meta,
            version: RwLock::new(version),
        })
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

#[async_trait]
impl StateProvider for PersistentStateStore {
    async fn version(&self) -> StateVersion {
        *self.version.read()
    }

    async fn get(&self, key: &[u8]) -> MonfundmeResult<Option<Vec<u8>>> {
        self.state
            .get(key)
            .map(|opt| opt.map(|v| v.to_vec()))
            .map_err(storage_err)
    }

    async fn exists(&self, key: &[u8]) -> MonfundmeResult<bool> {
        self.state.contains_key(key).map_err(storage_err)
    }

    async fn scan_prefix(&self, prefix: &[u8]) -> MonfundmeResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.state
            .scan_prefix(prefix)
            .map(|result| result.map(|(k, v)| (k.to_vec(), v.to_vec())))
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_err)
    }
}

#[async_trait]
impl StateMutator for PersistentStateStore {
    async fn set(&self, key: &[u8], value: &[u8]) -> MonfundmeResult<()> {
        self.state.insert(key, value).map_err(storage_err)?;
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> MonfundmeResult<()> {
        self.state.remove(key).map_err(storage_err)?;
        Ok(())
    }

    async fn apply_batch(&self, changes: Vec<StateChange>) -> MonfundmeResult<StateVersion> {
        let mut version = self.version.write();
        let new_version = version.next();

        let mut batch = sled::Batch::default();
        for change in changes {
            match change {
                StateChange::Set { key, value } => batch.insert(key, value),
                StateChange::Delete { key } => batch.remove(key),
            }
        }

        self.state.apply_batch(batch).map_err(storage_err)?;
        self.meta
            .insert(VERSION_KEY, &new_version.0.to_le_bytes())
            .map_err(storage_err)?;
        self.db.flush().map_err(storage_err)?;

        *version = new_version;
        Ok(new_version)
    }
}

#[async_trait]
impl StateStore for PersistentStateStore {
    async fn all_entries(&self) -> MonfundmeResult<Vec<StateEntry>> {
        self.state
            .iter()
            .map(|result| {
                result.map(|(key, value)| StateEntry {
                    key: key.to_vec(),
                    value: value.to_vec(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_persistent_store_basic() {
        let tmp = TempDir::new().unwrap();
        let store = PersistentStateStore::open(tmp.path()).unwrap();

        store.set(b"key1", b"value1").await.unwrap();
        let value = store.get(b"key1").await.unwrap();
        assert_eq!(value, Some(b"value1".to_vec()));

        store.delete(b"key1").await.unwrap();
        let value = store.get(b"key1").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_persistent_store_reopen() {
        let tmp = TempDir::new().unwrap();

        {
            let store = PersistentStateStore::open(tmp.path()).unwrap();
            let changes = vec![
                StateChange::Set {
                    key: b"k1".to_vec(),
                    value: b"v1".to_vec(),
                },
                StateChange::Set {
                    key: b"k2".to_vec(),
                    value: b"v2".to_vec(),
                },
            ];
            store.apply_batch(changes).await.unwrap();
            store
                .apply_batch(vec![StateChange::Delete { key: b"k1".to_vec() }])
                .await
                .unwrap();
        }

        {
            let store = PersistentStateStore::open(tmp.path()).unwrap();
            assert_eq!(store.get(b"k1").await.unwrap(), None);
            assert_eq!(store.get(b"k2").await.unwrap(), Some(b"v2".to_vec()));
            assert_eq!(store.version().await.0, 2);
        }
    }

    #[tokio::test]
    async fn test_persistent_scan_prefix() {
        let tmp = TempDir::new().unwrap();
        let store = PersistentStateStore::open(tmp.path()).unwrap();

        store.set(b"a:2", b"2").await.unwrap();
        store.set(b"a:1", b"1").await.unwrap();
        store.set(b"b:1", b"x").await.unwrap();

        let entries = store.scan_prefix(b"a:").await.unwrap();
        assert_eq!(
            entries,
            vec![
                (b"a:1".to_vec(), b"1".to_vec()),
                (b"a:2".to_vec(), b"2".to_vec())
            ]
        );
        assert_eq!(store.all_entries().await.unwrap().len(), 3);
        assert_eq!(store.len(), 3);
    }
}
