//! Campaign records

use monfundme_core::{
    Address, Amount, CampaignId, CampaignParams, Hash, ProposalId, Timestamp,
};
use monfundme_crypto::hashing::hash_multiple;
use serde::{Deserialize, Serialize};

/// Content fingerprint of a campaign's descriptive fields.
///
/// Each field is length-prefixed so that moving bytes between fields
/// changes the hash.
pub fn metadata_hash(title: &str, description: &str, image: &str) -> Hash {
    let title_len = (title.len() as u64).to_be_bytes();
    let description_len = (description.len() as u64).to_be_bytes();
    let image_len = (image.len() as u64).to_be_bytes();
    hash_multiple(&[
        title_len.as_slice(),
        title.as_bytes(),
        description_len.as_slice(),
        description.as_bytes(),
        image_len.as_slice(),
        image.as_bytes(),
    ])
}

/// Stored campaign state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub id: CampaignId,
    pub owner: Address,
    pub title: String,
    pub description: String,
    pub image: String,
    pub target: Amount,
    pub deadline: Timestamp,
    /// Total ever donated. Withdrawal does not reduce it.
    pub amount_collected: Amount,
    /// Funds still held in escrow
    pub balance: Amount,
    pub donation_count: u64,
    pub withdrawn: bool,
    pub created_at: Timestamp,
    /// Proposal that launched this campaign, if any
    pub origin: Option<ProposalId>,
}

impl CampaignRecord {
    pub fn new(
        id: CampaignId,
        params: &CampaignParams,
        created_at: Timestamp,
        origin: Option<ProposalId>,
    ) -> Self {
        Self {
            id,
            owner: params.owner,
            title: params.title.clone(),
            description: params.description.clone(),
            image: params.image.clone(),
            target: params.target,
            deadline: params.deadline,
            amount_collected: Amount::ZERO,
            balance: Amount::ZERO,
            donation_count: 0,
            withdrawn: false,
            created_at,
            origin,
        }
    }

    /// Donations are accepted strictly before the deadline
    pub fn accepts_donations(&self, now: Timestamp) -> bool {
        now < self.deadline
    }

    pub fn withdrawal_allowed(&self, now: Timestamp) -> bool {
        now >= self.deadline || self.amount_collected >= self.target
    }

    pub fn metadata_hash(&self) -> Hash {
        metadata_hash(&self.title, &self.description, &self.image)
    }

    pub fn snapshot(&self) -> CampaignSnapshot {
        CampaignSnapshot {
            id: self.id,
            owner: self.owner,
            title: self.title.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
            metadata_hash: self.metadata_hash(),
            target: self.target,
            deadline: self.deadline,
            amount_collected: self.amount_collected,
            balance: self.balance,
            donor_count: self.donation_count,
            withdrawn: self.withdrawn,
            created_at: self.created_at,
            origin: self.origin,
        }
    }
}

/// One recorded donation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub donor: Address,
    pub amount: Amount,
    pub time: Timestamp,
}

/// Read-only view of a campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSnapshot {
    pub id: CampaignId,
    pub owner: Address,
    pub title: String,
    pub description: String,
    pub image: String,
    pub metadata_hash: Hash,
    pub target: Amount,
    pub deadline: Timestamp,
    pub amount_collected: Amount,
    pub balance: Amount,
    pub donor_count: u64,
    pub withdrawn: bool,
    pub created_at: Timestamp,
    pub origin: Option<ProposalId>,
}
