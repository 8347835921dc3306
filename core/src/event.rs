//! Ledger events

use tokio::sync::mpsc;

use crate::types::{Address, Amount, CampaignId, ProposalId, ResultHash};

/// Events emitted after a mutation commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    ValidatorAdded(Address),
    ValidatorRemoved(Address),
    ProposalCreated(ProposalId),
    ProposalExecuted {
        proposal_id: ProposalId,
        result: ResultHash,
        campaign: Option<CampaignId>,
    },
    CampaignCreated {
        campaign: CampaignId,
        owner: Address,
    },
    VoteExecutorUpdated(Address),
    DonationReceived {
        campaign: CampaignId,
        donor: Address,
        amount: Amount,
    },
    FundsWithdrawn {
        campaign: CampaignId,
        owner: Address,
        amount: Amount,
    },
}

/// Fire-and-forget event publisher.
///
/// A full or closed channel never fails the operation that emitted.
#[derive(Debug, Clone, Default)]
pub struct EventEmitter {
    tx: Option<mpsc::Sender<LedgerEvent>>,
}

impl EventEmitter {
    pub fn new(tx: mpsc::Sender<LedgerEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: LedgerEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(event);
        }
    }
}

/// Create ledger event channel
pub fn create_event_channel() -> (mpsc::Sender<LedgerEvent>, mpsc::Receiver<LedgerEvent>) {
    mpsc::channel(100)
}
