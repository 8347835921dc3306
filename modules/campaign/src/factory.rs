//! Campaign factory

use async_trait::async_trait;
use monfundme_core::{
    Address, CampaignId, CampaignParams, EventEmitter, LedgerEvent, MonfundmeError,
    MonfundmeResult, ProposalId, SharedClock,
};
use monfundme_crypto::hashing::hash_multiple;
use monfundme_governance::CampaignLauncher;
use monfundme_state::{
    campaign_key, deployed_key, meta_key, Ledger, LedgerWriter, StateStore, DEPLOYED_PREFIX,
};
use std::sync::Arc;
use tracing::info;

use crate::campaign::CampaignRecord;

const ADMIN_KEY: &str = "factory_admin";
const EXECUTOR_KEY: &str = "vote_executor";
const COUNT_KEY: &str = "factory_count";

/// Deterministic campaign id for the `index`-th deployment
pub fn campaign_id(index: u64, owner: &Address) -> CampaignId {
    let hash = hash_multiple(&[
        b"MONFUNDME_CAMPAIGN".as_slice(),
        index.to_be_bytes().as_slice(),
        owner.as_bytes().as_slice(),
    ]);
    Address::from_bytes(*hash.as_bytes())
}

/// Deploys campaigns and keeps the ordered deployment list
pub struct CampaignFactory<S: StateStore> {
    ledger: Arc<Ledger<S>>,
    clock: SharedClock,
    events: EventEmitter,
}

impl<S: StateStore + 'static> CampaignFactory<S> {
    pub fn new(ledger: Arc<Ledger<S>>, clock: SharedClock, events: EventEmitter) -> Self {
        Self {
            ledger,
            clock,
            events,
        }
    }

    /// Bind the administrator and initial vote executor. Only possible once.
    pub async fn install(
        writer: &mut LedgerWriter<'_, S>,
        admin: &Address,
        executor: &Address,
    ) -> MonfundmeResult<()> {
        let admin_key = meta_key(ADMIN_KEY);
        if writer.exists(&admin_key).await? {
            return Err(MonfundmeError::AlreadyInitialized);
        }
        writer.put(admin_key, admin)?;
        writer.put(meta_key(EXECUTOR_KEY), executor)?;
        writer.put(meta_key(COUNT_KEY), &0u64)
    }

    pub async fn admin(&self) -> MonfundmeResult<Address> {
        self.ledger
            .read(&meta_key(ADMIN_KEY))
            .await?
            .ok_or_else(|| MonfundmeError::NotInitialized("campaign factory".into()))
    }

    pub async fn vote_executor(&self) -> MonfundmeResult<Address> {
        self.ledger
            .read(&meta_key(EXECUTOR_KEY))
            .await?
            .ok_or_else(|| MonfundmeError::NotInitialized("campaign factory".into()))
    }

    pub async fn campaign_count(&self) -> MonfundmeResult<u64> {
        Ok(self.ledger.read(&meta_key(COUNT_KEY)).await?.unwrap_or(0))
    }

    /// Deployed campaign ids in creation order
    pub async fn get_deployed_campaigns(&self) -> MonfundmeResult<Vec<CampaignId>> {
        self.ledger.scan(DEPLOYED_PREFIX).await
    }

    pub async fn create_campaign(
        &self,
        caller: &Address,
        params: &CampaignParams,
    ) -> MonfundmeResult<CampaignId> {
        let mut writer = self.ledger.write().await;
        let id = self.stage_create(&mut writer, caller, params, None).await?;
        writer.commit().await?;
        drop(writer);

        self.events.emit(LedgerEvent::CampaignCreated {
            campaign: id,
            owner: params.owner,
        });
        Ok(id)
    }

    pub async fn set_vote_executor(
        &self,
        caller: &Address,
        executor: &Address,
    ) -> MonfundmeResult<()> {
        let mut writer = self.ledger.write().await;
        let admin: Address = writer
            .read(&meta_key(ADMIN_KEY))
            .await?
            .ok_or_else(|| MonfundmeError::NotInitialized("campaign factory".into()))?;
        if caller != &admin {
            return Err(MonfundmeError::Unauthorized(caller.to_hex()));
        }

        writer.put(meta_key(EXECUTOR_KEY), executor)?;
        writer.commit().await?;
        drop(writer);

        info!("Vote executor set to {}", executor);
        self.events.emit(LedgerEvent::VoteExecutorUpdated(*executor));
        Ok(())
    }

    async fn stage_create(
        &self,
        writer: &mut LedgerWriter<'_, S>,
        caller: &Address,
        params: &CampaignParams,
        origin: Option<ProposalId>,
    ) -> MonfundmeResult<CampaignId> {
        let admin: Option<Address> = writer.read(&meta_key(ADMIN_KEY)).await?;
        let executor: Option<Address> = writer.read(&meta_key(EXECUTOR_KEY)).await?;
        let admin =
            admin.ok_or_else(|| MonfundmeError::NotInitialized("campaign factory".into()))?;
        if caller != &admin && Some(*caller) != executor {
            return Err(MonfundmeError::Unauthorized(caller.to_hex()));
        }

        params.validate()?;
        let now = self.clock.now();
        if params.deadline <= now {
            return Err(MonfundmeError::InvalidDeadline {
                deadline: params.deadline.as_secs(),
                now: now.as_secs(),
            });
        }

        let index: u64 = writer.read(&meta_key(COUNT_KEY)).await?.unwrap_or(0);
        let id = campaign_id(index, &params.owner);

        writer.put(campaign_key(&id), &CampaignRecord::new(id, params, now, origin))?;
        writer.put(deployed_key(index), &id)?;
        writer.put(meta_key(COUNT_KEY), &(index + 1))?;

        info!(
            "Campaign deployed: {} owner={} target={} deadline={}",
            id, params.owner, params.target, params.deadline
        );
        Ok(id)
    }
}

#[async_trait]
impl<S: StateStore + 'static> CampaignLauncher<S> for CampaignFactory<S> {
    async fn launch(
        &self,
        writer: &mut LedgerWriter<'_, S>,
        caller: &Address,
        params: &CampaignParams,
        origin: Option<ProposalId>,
    ) -> MonfundmeResult<CampaignId> {
        self.stage_create(writer, caller, params, origin).await
    }
}
