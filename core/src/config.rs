//! Configuration types for MONFUNDME

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::MonfundmeError;
use crate::traits::MonfundmeResult;

/// Main node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name for logging
    pub name: String,

    /// Data directory
    pub data_dir: PathBuf,

    /// Governance configuration
    pub governance: GovernanceConfig,

    /// Logging level
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "monfundme-node".to_string(),
            data_dir: PathBuf::from("./data"),
            governance: GovernanceConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load from a JSON file; missing fields fall back to defaults
    pub fn load<P: AsRef<Path>>(path: P) -> MonfundmeResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            MonfundmeError::ConfigError(format!("{}: {}", path.as_ref().display(), e))
        })?;
        let config: NodeConfig = serde_json::from_str(&content)
            .map_err(|e| MonfundmeError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MonfundmeResult<()> {
        self.governance.validate()
    }
}

/// Governance configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Distinct validator signatures required to execute a proposal
    pub threshold: usize,

    /// Reject executions outside a proposal's voting window
    pub enforce_voting_window: bool,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            threshold: 2,
            enforce_voting_window: false,
        }
    }
}

impl GovernanceConfig {
    pub fn validate(&self) -> MonfundmeResult<()> {
        if self.threshold == 0 {
            return Err(MonfundmeError::ConfigError(
                "quorum threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
