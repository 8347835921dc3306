//! Core state store traits, record encoding and key layout

use async_trait::async_trait;
use monfundme_core::{
    Address, Amount, Hash, MonfundmeError, MonfundmeResult, StateMutator, StateProvider,
    StateRoot,
};
use monfundme_crypto::hashing::{hash_multiple, merkle_root};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Account balance credited by payouts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AccountState {
    pub balance: Amount,
}

impl AccountState {
    pub fn new(balance: Amount) -> Self {
        Self { balance }
    }
}

/// Encode a record for storage
pub fn encode_record<T: Serialize>(record: &T) -> MonfundmeResult<Vec<u8>> {
    bincode::serialize(record).map_err(|e| MonfundmeError::SerializationError(e.to_string()))
}

/// Decode a stored record
pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> MonfundmeResult<T> {
    bincode::deserialize(bytes).map_err(|e| MonfundmeError::DeserializationError(e.to_string()))
}

/// State entry for merkle tree computation
#[derive(Debug, Clone)]
pub struct StateEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl StateEntry {
    pub fn hash(&self) -> Hash {
        hash_multiple(&[self.key.as_slice(), self.value.as_slice()])
    }
}

/// Compute state root from entries
pub fn compute_state_root(entries: &[StateEntry]) -> StateRoot {
    if entries.is_empty() {
        return Hash::ZERO;
    }

    // Sort entries by key for deterministic ordering
    let mut sorted: Vec<_> = entries.iter().collect();
    sorted.sort_by(|a, b| a.key.cmp(&b.key));

    let leaves: Vec<Hash> = sorted.iter().map(|e| e.hash()).collect();
    merkle_root(&leaves)
}

/// Abstract state store interface
#[async_trait]
pub trait StateStore: StateProvider + StateMutator {
    /// Get account state
    async fn get_account(&self, address: &Address) -> MonfundmeResult<Option<AccountState>> {
        match self.get(&account_key(address)).await? {
            Some(bytes) => Ok(Some(decode_record(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Get balance
    async fn get_balance(&self, address: &Address) -> MonfundmeResult<Amount> {
        Ok(self
            .get_account(address)
            .await?
            .map(|a| a.balance)
            .unwrap_or_default())
    }

    /// Get all entries for state root computation
    async fn all_entries(&self) -> MonfundmeResult<Vec<StateEntry>>;

    /// Compute current state root
    async fn compute_root(&self) -> MonfundmeResult<StateRoot> {
        let entries = self.all_entries().await?;
        Ok(compute_state_root(&entries))
    }
}

// Key layout. Each table has exactly one owning component.

const ACCOUNT_PREFIX: &[u8] = b"account:";
pub const VALIDATOR_PREFIX: &[u8] = b"validator:";
pub const PROPOSAL_PREFIX: &[u8] = b"proposal:";
pub const CAMPAIGN_PREFIX: &[u8] = b"campaign:";
pub const DONATION_PREFIX: &[u8] = b"donation:";
pub const DEPLOYED_PREFIX: &[u8] = b"factory:deployed:";
const META_PREFIX: &[u8] = b"meta:";

fn prefixed(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + suffix.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(suffix);
    key
}

/// Build account key
pub fn account_key(address: &Address) -> Vec<u8> {
    prefixed(ACCOUNT_PREFIX, address.as_bytes())
}

pub fn validator_key(address: &Address) -> Vec<u8> {
    prefixed(VALIDATOR_PREFIX, address.as_bytes())
}

pub fn proposal_key(id: &Hash) -> Vec<u8> {
    prefixed(PROPOSAL_PREFIX, id.as_bytes())
}

pub fn campaign_key(id: &Address) -> Vec<u8> {
    prefixed(CAMPAIGN_PREFIX, id.as_bytes())
}

/// Donation keys sort by campaign, then by insertion index
pub fn donation_key(campaign: &Address, index: u64) -> Vec<u8> {
    let mut key = donation_prefix(campaign);
    key.extend_from_slice(&index.to_be_bytes());
    key
}

pub fn donation_prefix(campaign: &Address) -> Vec<u8> {
    prefixed(DONATION_PREFIX, campaign.as_bytes())
}

/// Deployed-list keys sort in creation order
pub fn deployed_key(index: u64) -> Vec<u8> {
    prefixed(DEPLOYED_PREFIX, &index.to_be_bytes())
}

pub fn meta_key(name: &str) -> Vec<u8> {
    prefixed(META_PREFIX, name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_roundtrip() {
        let state = AccountState::new(Amount::from_mon(5));
        let bytes = encode_record(&state).unwrap();
        let restored: AccountState = decode_record(&bytes).unwrap();
        assert_eq!(state, restored);

        let garbage: MonfundmeResult<AccountState> = decode_record(&[1, 2]);
        assert!(matches!(garbage, Err(MonfundmeError::DeserializationError(_))));
    }

    #[test]
    fn test_state_root_order_independent() {
        let a = StateEntry {
            key: b"key1".to_vec(),
            value: b"value1".to_vec(),
        };
        let b = StateEntry {
            key: b"key2".to_vec(),
            value: b"value2".to_vec(),
        };

        let root1 = compute_state_root(&[a.clone(), b.clone()]);
        let root2 = compute_state_root(&[b, a]);
        assert_eq!(root1, root2);
    }

    #[test]
    fn test_account_key() {
        let address = Address([1u8; 32]);
        let key = account_key(&address);
        assert!(key.starts_with(b"account:"));
        assert_eq!(&key[8..], address.as_bytes());
    }

    #[test]
    fn test_index_keys_sort_numerically() {
        assert!(deployed_key(2) < deployed_key(10));

        let campaign = Address([4u8; 32]);
        assert!(donation_key(&campaign, 255) < donation_key(&campaign, 256));
        assert!(donation_key(&campaign, 0).starts_with(&donation_prefix(&campaign)));
    }
}
