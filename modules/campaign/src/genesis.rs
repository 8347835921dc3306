//! Genesis deployment for MONFUNDME

use monfundme_core::{
    Address, GovernanceConfig, Hash, MonfundmeError, MonfundmeResult, SharedClock,
};
use monfundme_governance::{default_vote_executor, ProposalStore, ValidatorRegistry};
use monfundme_state::{meta_key, Ledger, StateStore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::factory::CampaignFactory;

const GENESIS_HASH_KEY: &str = "genesis_hash";

/// Deployment description applied once to a fresh ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Deployment name
    pub name: String,
    /// Registry controller and factory administrator
    pub admin: String,
    /// Initial validator addresses
    pub validators: Vec<String>,
    /// Vote executor bound in the factory; defaults to the proposal store
    #[serde(default)]
    pub vote_executor: Option<String>,
    #[serde(default)]
    pub governance: GovernanceConfig,
}

impl GenesisConfig {
    pub fn new(name: &str, admin: &Address) -> Self {
        Self {
            name: name.to_string(),
            admin: admin.to_hex(),
            validators: vec![],
            vote_executor: None,
            governance: GovernanceConfig::default(),
        }
    }

    /// Add a validator
    pub fn add_validator(mut self, address: &Address) -> Self {
        self.validators.push(address.to_hex());
        self
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.governance.threshold = threshold;
        self
    }

    pub fn parse_admin(&self) -> MonfundmeResult<Address> {
        parse_address(&self.admin)
    }

    pub fn parse_validators(&self) -> MonfundmeResult<Vec<Address>> {
        self.validators.iter().map(|v| parse_address(v)).collect()
    }

    pub fn parse_vote_executor(&self) -> MonfundmeResult<Address> {
        match &self.vote_executor {
            Some(executor) => parse_address(executor),
            None => Ok(default_vote_executor()),
        }
    }

    pub fn validate(&self) -> MonfundmeResult<()> {
        self.parse_admin()?;
        self.parse_vote_executor()?;
        let validators = self.parse_validators()?;
        self.governance.validate()?;
        if validators.len() < self.governance.threshold {
            warn!(
                "Genesis has {} validators but threshold {}; no proposal can execute yet",
                validators.len(),
                self.governance.threshold
            );
        }
        Ok(())
    }

    pub fn to_json(&self) -> MonfundmeResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MonfundmeError::SerializationError(e.to_string()))
    }

    pub fn from_json(json: &str) -> MonfundmeResult<Self> {
        serde_json::from_str(json).map_err(|e| MonfundmeError::DeserializationError(e.to_string()))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> MonfundmeResult<Self> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            MonfundmeError::ConfigError(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> MonfundmeResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

fn parse_address(s: &str) -> MonfundmeResult<Address> {
    Address::from_hex(s).map_err(|e| MonfundmeError::InvalidAddress(format!("{}: {}", s, e)))
}

/// Genesis hash over the canonical JSON form
pub fn compute_genesis_hash(config: &GenesisConfig) -> MonfundmeResult<Hash> {
    let json = config.to_json()?;
    Ok(monfundme_crypto::hashing::hash(json.as_bytes()))
}

/// Initialize genesis state
pub struct GenesisInitializer<S: StateStore> {
    ledger: Arc<Ledger<S>>,
    clock: SharedClock,
    config: GenesisConfig,
}

impl<S: StateStore + 'static> GenesisInitializer<S> {
    pub fn new(ledger: Arc<Ledger<S>>, clock: SharedClock, config: GenesisConfig) -> Self {
        Self {
            ledger,
            clock,
            config,
        }
    }

    /// Apply the deployment as one batch. Fails on an initialized ledger.
    pub async fn initialize(&self) -> MonfundmeResult<Hash> {
        self.config.validate()?;
        let admin = self.config.parse_admin()?;
        let executor = self.config.parse_vote_executor()?;
        let validators = self.config.parse_validators()?;
        let genesis_hash = compute_genesis_hash(&self.config)?;

        info!("Initializing genesis: {}", self.config.name);

        let registry = ValidatorRegistry::new(
            self.ledger.clone(),
            self.clock.clone(),
            monfundme_core::EventEmitter::disabled(),
        );

        let mut writer = self.ledger.write().await;
        if writer.exists(&meta_key(GENESIS_HASH_KEY)).await? {
            return Err(MonfundmeError::AlreadyInitialized);
        }

        ValidatorRegistry::install(&mut writer, &admin).await?;
        CampaignFactory::install(&mut writer, &admin, &executor).await?;
        for validator in &validators {
            registry.stage_add(&mut writer, &admin, validator).await?;
            info!("Genesis validator: {}", validator);
        }
        ProposalStore::install_governance(&mut writer, &self.config.governance).await?;
        writer.put(meta_key(GENESIS_HASH_KEY), &genesis_hash)?;
        writer.commit().await?;

        info!(
            "Genesis applied: admin={} executor={} validators={} threshold={}",
            admin,
            executor,
            validators.len(),
            self.config.governance.threshold
        );
        Ok(genesis_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monfundme_core::{ManualClock, Timestamp};
    use monfundme_crypto::keys::KeyPair;
    use monfundme_governance::stored_governance;
    use monfundme_state::{MemoryStateStore, PersistentStateStore};
    use tempfile::TempDir;

    fn config() -> (GenesisConfig, Vec<KeyPair>) {
        let keys: Vec<KeyPair> = (1..=3u8).map(|i| KeyPair::from_seed(&[i; 32])).collect();
        let mut config = GenesisConfig::new("devnet", &Address([0xAA; 32]));
        for key in &keys {
            config = config.add_validator(&key.address());
        }
        (config, keys)
    }

    fn clock() -> SharedClock {
        Arc::new(ManualClock::new(Timestamp::from_secs(0)))
    }

    #[test]
    fn test_genesis_json() {
        let (config, _) = config();
        let json = config.to_json().unwrap();
        let restored = GenesisConfig::from_json(&json).unwrap();

        assert_eq!(restored.validators, config.validators);
        assert_eq!(restored.parse_vote_executor().unwrap(), default_vote_executor());
        assert_eq!(restored.governance.threshold, 2);
    }

    #[test]
    fn test_bad_address_rejected() {
        let (mut config, _) = config();
        config.validators.push("0xnothex".into());
        assert!(matches!(config.validate(), Err(MonfundmeError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_genesis_initialization() {
        let (config, keys) = config();
        let ledger = Arc::new(Ledger::new(Arc::new(MemoryStateStore::new())));

        let initializer = GenesisInitializer::new(ledger.clone(), clock(), config.clone());
        initializer.initialize().await.unwrap();
        assert_eq!(ledger.version().await.0, 1);

        let registry = ValidatorRegistry::new(
            ledger.clone(),
            clock(),
            monfundme_core::EventEmitter::disabled(),
        );
        for key in &keys {
            assert!(registry.is_validator(&key.address()).await.unwrap());
        }
        assert_eq!(registry.controller().await.unwrap(), Address([0xAA; 32]));

        let stored = stored_governance(&ledger).await.unwrap();
        assert_eq!(stored, Some(config.governance.clone()));

        let again = initializer.initialize().await;
        assert!(matches!(again, Err(MonfundmeError::AlreadyInitialized)));
    }

    #[tokio::test]
    async fn test_genesis_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let (config, keys) = config();

        {
            let store = Arc::new(PersistentStateStore::open(tmp.path()).unwrap());
            let ledger = Arc::new(Ledger::new(store));
            GenesisInitializer::new(ledger, clock(), config)
                .initialize()
                .await
                .unwrap();
        }

        let store = Arc::new(PersistentStateStore::open(tmp.path()).unwrap());
        let ledger = Arc::new(Ledger::new(store));
        let registry = ValidatorRegistry::new(
            ledger.clone(),
            clock(),
            monfundme_core::EventEmitter::disabled(),
        );
        assert_eq!(registry.validators().await.unwrap().len(), keys.len());
        assert!(stored_governance(&ledger).await.unwrap().is_some());
    }
}
