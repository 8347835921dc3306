//! Runtime composing all ledger components over one store

use monfundme_campaign::{
    AccountPayout, CampaignEscrow, CampaignFactory, CampaignSnapshot, Donation, GenesisConfig,
    GenesisInitializer, PayoutSink,
};
use monfundme_core::{
    Address, Amount, CampaignId, CampaignParams, EventEmitter, GovernanceConfig, Hash,
    MonfundmeResult, NodeConfig, ProposalId, ResultHash, SharedClock, StateRoot, StateVersion,
    SystemClock, Timestamp,
};
use monfundme_governance::{
    default_vote_executor, stored_governance, Attestation, ExecutionOutcome, ProposalRecord,
    ProposalStatus, ProposalStore, ValidatorRecord, ValidatorRegistry,
};
use monfundme_state::{
    create_memory_store, Ledger, MemoryStateStore, PersistentStateStore, StateStore,
};
use std::sync::Arc;
use tracing::info;

/// Ledger overview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeStatus {
    pub version: StateVersion,
    pub state_root: StateRoot,
    pub validators: usize,
    pub campaigns: u64,
    pub threshold: usize,
    pub vote_executor: Option<Address>,
}

/// All ledger operations behind one handle.
///
/// Mutating calls take the caller explicitly; authorization is checked
/// against the identities bound at genesis.
pub struct MonfundmeRuntime<S: StateStore> {
    ledger: Arc<Ledger<S>>,
    registry: Arc<ValidatorRegistry<S>>,
    proposals: ProposalStore<S>,
    factory: Arc<CampaignFactory<S>>,
    escrow: CampaignEscrow<S>,
    clock: SharedClock,
}

impl<S: StateStore + 'static> MonfundmeRuntime<S> {
    pub fn new(
        state: Arc<S>,
        governance: GovernanceConfig,
        clock: SharedClock,
        events: EventEmitter,
    ) -> Self {
        Self::with_payout(state, governance, clock, events, Arc::new(AccountPayout))
    }

    pub fn with_payout(
        state: Arc<S>,
        governance: GovernanceConfig,
        clock: SharedClock,
        events: EventEmitter,
        payout: Arc<dyn PayoutSink<S>>,
    ) -> Self {
        let ledger = Arc::new(Ledger::new(state));
        let registry = Arc::new(ValidatorRegistry::new(
            ledger.clone(),
            clock.clone(),
            events.clone(),
        ));
        let factory = Arc::new(CampaignFactory::new(
            ledger.clone(),
            clock.clone(),
            events.clone(),
        ));
        let proposals = ProposalStore::new(
            ledger.clone(),
            factory.clone(),
            governance,
            default_vote_executor(),
            clock.clone(),
            events.clone(),
        );
        let escrow = CampaignEscrow::new(ledger.clone(), payout, clock.clone(), events);

        Self {
            ledger,
            registry,
            proposals,
            factory,
            escrow,
            clock,
        }
    }

    /// Apply a genesis deployment to this runtime's store
    pub async fn initialize_genesis(&self, genesis: GenesisConfig) -> MonfundmeResult<Hash> {
        let initializer = GenesisInitializer::new(self.ledger.clone(), self.clock.clone(), genesis);
        let hash = initializer.initialize().await?;
        info!("Genesis initialized, hash: {}", hash);
        Ok(hash)
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn ledger(&self) -> &Arc<Ledger<S>> {
        &self.ledger
    }

    /// Governance settings in force, recorded at genesis once applied
    pub async fn governance(&self) -> MonfundmeResult<GovernanceConfig> {
        self.proposals.governance().await
    }

    /// Identity the proposal store launches campaigns as
    pub fn vote_executor_identity(&self) -> Address {
        self.proposals.identity()
    }

    // ============ Validators ============

    pub async fn add_validator(&self, caller: &Address, address: &Address) -> MonfundmeResult<()> {
        self.registry.add_validator(caller, address).await
    }

    pub async fn remove_validator(
        &self,
        caller: &Address,
        address: &Address,
    ) -> MonfundmeResult<()> {
        self.registry.remove_validator(caller, address).await
    }

    pub async fn is_validator(&self, address: &Address) -> MonfundmeResult<bool> {
        self.registry.is_validator(address).await
    }

    pub async fn validators(&self) -> MonfundmeResult<Vec<ValidatorRecord>> {
        self.registry.validators().await
    }

    // ============ Proposals ============

    pub async fn create_proposal(
        &self,
        caller: &Address,
        id: ProposalId,
        start_time: Timestamp,
        end_time: Timestamp,
        params: CampaignParams,
    ) -> MonfundmeResult<()> {
        self.proposals
            .create_proposal(caller, id, start_time, end_time, params)
            .await
    }

    pub async fn execute_result(
        &self,
        id: &ProposalId,
        result: &ResultHash,
        attestations: &[Attestation],
    ) -> MonfundmeResult<ExecutionOutcome> {
        self.proposals.execute_result(id, result, attestations).await
    }

    pub async fn proposal(&self, id: &ProposalId) -> MonfundmeResult<ProposalRecord> {
        self.proposals.proposal(id).await
    }

    pub async fn proposal_status(&self, id: &ProposalId) -> MonfundmeResult<ProposalStatus> {
        self.proposals.status(id).await
    }

    // ============ Factory ============

    pub async fn create_campaign(
        &self,
        caller: &Address,
        params: &CampaignParams,
    ) -> MonfundmeResult<CampaignId> {
        self.factory.create_campaign(caller, params).await
    }

    pub async fn set_vote_executor(
        &self,
        caller: &Address,
        executor: &Address,
    ) -> MonfundmeResult<()> {
        self.factory.set_vote_executor(caller, executor).await
    }

    pub async fn get_deployed_campaigns(&self) -> MonfundmeResult<Vec<CampaignId>> {
        self.factory.get_deployed_campaigns().await
    }

    // ============ Escrow ============

    pub async fn donate_with_mon(
        &self,
        donor: &Address,
        campaign: &CampaignId,
        amount: Amount,
    ) -> MonfundmeResult<Amount> {
        self.escrow.donate_with_mon(donor, campaign, amount).await
    }

    pub async fn withdraw(
        &self,
        caller: &Address,
        campaign: &CampaignId,
    ) -> MonfundmeResult<Amount> {
        self.escrow.withdraw(caller, campaign).await
    }

    pub async fn campaign(&self, id: &CampaignId) -> MonfundmeResult<CampaignSnapshot> {
        self.escrow.campaign(id).await
    }

    pub async fn donations(&self, id: &CampaignId) -> MonfundmeResult<Vec<Donation>> {
        self.escrow.donations(id).await
    }

    pub async fn campaign_summaries(&self) -> MonfundmeResult<Vec<CampaignSnapshot>> {
        self.escrow.campaign_summaries().await
    }

    /// Funds credited to an address by payouts
    pub async fn balance_of(&self, address: &Address) -> MonfundmeResult<Amount> {
        self.ledger.state().get_balance(address).await
    }

    pub async fn status(&self) -> MonfundmeResult<RuntimeStatus> {
        Ok(RuntimeStatus {
            version: self.ledger.version().await,
            state_root: self.ledger.state().compute_root().await?,
            validators: self.registry.validators().await?.len(),
            campaigns: self.factory.campaign_count().await?,
            threshold: self.proposals.governance().await?.threshold,
            vote_executor: self.factory.vote_executor().await.ok(),
        })
    }
}

/// Runtime over a sled data directory
pub type PersistentRuntime = MonfundmeRuntime<PersistentStateStore>;

/// Runtime over an in-memory store
pub type MemoryRuntime = MonfundmeRuntime<MemoryStateStore>;

impl PersistentRuntime {
    /// Open the data directory from `config`.
    ///
    /// Governance settings recorded at genesis take precedence over the
    /// node config.
    pub async fn open(config: &NodeConfig, events: EventEmitter) -> MonfundmeResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;
        let store = Arc::new(PersistentStateStore::open(&config.data_dir)?);

        let reader = Ledger::new(store.clone());
        let governance = stored_governance(&reader)
            .await?
            .unwrap_or_else(|| config.governance.clone());

        info!(
            "Opened {} at {} (threshold {})",
            config.name,
            config.data_dir.display(),
            governance.threshold
        );
        Ok(Self::new(store, governance, Arc::new(SystemClock), events))
    }
}

impl MemoryRuntime {
    pub fn in_memory(governance: GovernanceConfig, clock: SharedClock) -> Self {
        Self::new(create_memory_store(), governance, clock, EventEmitter::disabled())
    }
}
