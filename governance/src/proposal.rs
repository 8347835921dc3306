//! Proposal lifecycle
//!
//! ```text
//! Created ──execute_result──▶ Executed
//!    │
//!    └──(window enforced, now > end)──▶ Expired
//! ```
//!
//! Both terminal states reject further execution. An approved result
//! launches the proposal's campaign in the same batch that marks the
//! proposal executed.

use async_trait::async_trait;
use monfundme_core::{
    Address, CampaignId, CampaignParams, EventEmitter, GovernanceConfig, LedgerEvent,
    MonfundmeError, MonfundmeResult, ProposalId, ResultHash, SharedClock, Timestamp,
};
use monfundme_crypto::hashing::hash;
use monfundme_state::{meta_key, proposal_key, Ledger, LedgerWriter, StateStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::quorum::{approved_result, attestation_digest, verify_quorum, Attestation};
use crate::validator::ValidatorRegistry;

/// Creates a campaign inside the caller's open batch
#[async_trait]
pub trait CampaignLauncher<S: StateStore>: Send + Sync {
    async fn launch(
        &self,
        writer: &mut LedgerWriter<'_, S>,
        caller: &Address,
        params: &CampaignParams,
        origin: Option<ProposalId>,
    ) -> MonfundmeResult<CampaignId>;
}

const GOVERNANCE_KEY: &str = "governance";

/// Governance settings recorded at genesis, if the ledger was initialized
pub async fn stored_governance<S: StateStore>(
    ledger: &Ledger<S>,
) -> MonfundmeResult<Option<GovernanceConfig>> {
    ledger.read(&meta_key(GOVERNANCE_KEY)).await
}

/// Identity the proposal store acts as when launching campaigns
pub fn default_vote_executor() -> Address {
    Address::from_bytes(*hash(b"MONFUNDME_VOTE_EXECUTOR").as_bytes())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    Created,
    Executed,
    Expired,
}

/// Stored proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub id: ProposalId,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub params: CampaignParams,
    pub proposer: Address,
    pub created_at: Timestamp,
    pub executed: bool,
    pub result_hash: Option<ResultHash>,
    pub executed_at: Option<Timestamp>,
    pub campaign: Option<CampaignId>,
}

impl ProposalRecord {
    pub fn status(&self, now: Timestamp, enforce_window: bool) -> ProposalStatus {
        if self.executed {
            ProposalStatus::Executed
        } else if enforce_window && now > self.end_time {
            ProposalStatus::Expired
        } else {
            ProposalStatus::Created
        }
    }
}

/// Result of a successful execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub proposal_id: ProposalId,
    pub result: ResultHash,
    pub signers: Vec<Address>,
    pub campaign: Option<CampaignId>,
}

pub struct ProposalStore<S: StateStore> {
    ledger: Arc<Ledger<S>>,
    launcher: Arc<dyn CampaignLauncher<S>>,
    /// Used until genesis records governance settings in the ledger
    config: GovernanceConfig,
    identity: Address,
    clock: SharedClock,
    events: EventEmitter,
}

impl<S: StateStore + 'static> ProposalStore<S> {
    pub fn new(
        ledger: Arc<Ledger<S>>,
        launcher: Arc<dyn CampaignLauncher<S>>,
        config: GovernanceConfig,
        identity: Address,
        clock: SharedClock,
        events: EventEmitter,
    ) -> Self {
        Self {
            ledger,
            launcher,
            config,
            identity,
            clock,
            events,
        }
    }

    /// Address this store presents to the launcher
    pub fn identity(&self) -> Address {
        self.identity
    }

    /// Record the governance settings. Only possible once per ledger.
    pub async fn install_governance(
        writer: &mut LedgerWriter<'_, S>,
        config: &GovernanceConfig,
    ) -> MonfundmeResult<()> {
        config.validate()?;
        let key = meta_key(GOVERNANCE_KEY);
        if writer.exists(&key).await? {
            return Err(MonfundmeError::AlreadyInitialized);
        }
        writer.put(key, config)
    }

    /// Settings in force: the recorded ones, else the configured fallback
    pub async fn governance(&self) -> MonfundmeResult<GovernanceConfig> {
        Ok(stored_governance(&self.ledger)
            .await?
            .unwrap_or_else(|| self.config.clone()))
    }

    async fn governance_in(
        &self,
        writer: &LedgerWriter<'_, S>,
    ) -> MonfundmeResult<GovernanceConfig> {
        Ok(writer
            .read(&meta_key(GOVERNANCE_KEY))
            .await?
            .unwrap_or_else(|| self.config.clone()))
    }

    pub async fn create_proposal(
        &self,
        caller: &Address,
        id: ProposalId,
        start_time: Timestamp,
        end_time: Timestamp,
        params: CampaignParams,
    ) -> MonfundmeResult<()> {
        if start_time >= end_time {
            return Err(MonfundmeError::InvalidWindow {
                start: start_time.as_secs(),
                end: end_time.as_secs(),
            });
        }
        params.validate()?;

        let mut writer = self.ledger.write().await;
        let key = proposal_key(&id);
        if writer.exists(&key).await? {
            return Err(MonfundmeError::DuplicateProposal(id.to_hex()));
        }

        let record = ProposalRecord {
            id,
            start_time,
            end_time,
            params,
            proposer: *caller,
            created_at: self.clock.now(),
            executed: false,
            result_hash: None,
            executed_at: None,
            campaign: None,
        };
        writer.put(key, &record)?;
        writer.commit().await?;
        drop(writer);

        info!("Proposal created: {} by {}", id, caller);
        self.events.emit(LedgerEvent::ProposalCreated(id));
        Ok(())
    }

    /// Execute a proposal with an assembled set of attestations
    pub async fn execute_result(
        &self,
        id: &ProposalId,
        result: &ResultHash,
        attestations: &[Attestation],
    ) -> MonfundmeResult<ExecutionOutcome> {
        let mut writer = self.ledger.write().await;
        let now = self.clock.now();
        let config = self.governance_in(&writer).await?;

        let key = proposal_key(id);
        let mut record: ProposalRecord = writer
            .read(&key)
            .await?
            .ok_or_else(|| MonfundmeError::ProposalNotFound(id.to_hex()))?;

        if record.status(now, config.enforce_voting_window) != ProposalStatus::Created {
            return Err(MonfundmeError::ProposalAlreadyExecuted(id.to_hex()));
        }
        if config.enforce_voting_window && now < record.start_time {
            return Err(MonfundmeError::VotingNotStarted {
                start: record.start_time.as_secs(),
                now: now.as_secs(),
            });
        }

        let validators = ValidatorRegistry::active_set_in(&writer).await?;
        let digest = attestation_digest(id, result);
        let quorum = verify_quorum(&digest, attestations, &validators, config.threshold)?;
        debug!(
            "Quorum reached for {}: {} signers, {} rejected",
            id,
            quorum.signers.len(),
            quorum.rejected.len()
        );

        let campaign = if *result == approved_result() {
            let campaign = self
                .launcher
                .launch(&mut writer, &self.identity, &record.params, Some(*id))
                .await?;
            Some(campaign)
        } else {
            None
        };

        record.executed = true;
        record.result_hash = Some(*result);
        record.executed_at = Some(now);
        record.campaign = campaign;
        writer.put(key, &record)?;
        writer.commit().await?;
        drop(writer);

        info!("Proposal executed: {} result={}", id, result);
        if let Some(campaign) = campaign {
            self.events.emit(LedgerEvent::CampaignCreated {
                campaign,
                owner: record.params.owner,
            });
        }
        self.events.emit(LedgerEvent::ProposalExecuted {
            proposal_id: *id,
            result: *result,
            campaign,
        });

        Ok(ExecutionOutcome {
            proposal_id: *id,
            result: *result,
            signers: quorum.signers,
            campaign,
        })
    }

    pub async fn proposal(&self, id: &ProposalId) -> MonfundmeResult<ProposalRecord> {
        self.ledger
            .read(&proposal_key(id))
            .await?
            .ok_or_else(|| MonfundmeError::ProposalNotFound(id.to_hex()))
    }

    pub async fn status(&self, id: &ProposalId) -> MonfundmeResult<ProposalStatus> {
        let record = self.proposal(id).await?;
        let config = self.governance().await?;
        Ok(record.status(self.clock.now(), config.enforce_voting_window))
    }
}
