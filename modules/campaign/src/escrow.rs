//! Campaign escrow: donations in, one withdrawal out

use monfundme_core::{
    Address, Amount, CampaignId, EventEmitter, LedgerEvent, MonfundmeError, MonfundmeResult,
    SharedClock,
};
use monfundme_state::{
    campaign_key, donation_key, donation_prefix, Ledger, LedgerWriter, StateStore,
    DEPLOYED_PREFIX,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::campaign::{CampaignRecord, CampaignSnapshot, Donation};
use crate::payout::PayoutSink;

pub struct CampaignEscrow<S: StateStore> {
    ledger: Arc<Ledger<S>>,
    payout: Arc<dyn PayoutSink<S>>,
    clock: SharedClock,
    events: EventEmitter,
}

impl<S: StateStore + 'static> CampaignEscrow<S> {
    pub fn new(
        ledger: Arc<Ledger<S>>,
        payout: Arc<dyn PayoutSink<S>>,
        clock: SharedClock,
        events: EventEmitter,
    ) -> Self {
        Self {
            ledger,
            payout,
            clock,
            events,
        }
    }

    /// Record a donation carrying `amount`. Returns the new collected total.
    pub async fn donate_with_mon(
        &self,
        donor: &Address,
        campaign: &CampaignId,
        amount: Amount,
    ) -> MonfundmeResult<Amount> {
        if amount.is_zero() {
            return Err(MonfundmeError::InvalidAmount(
                "donation must be greater than zero".into(),
            ));
        }

        let mut writer = self.ledger.write().await;
        let now = self.clock.now();
        let mut record = Self::load(&writer, campaign).await?;

        if !record.accepts_donations(now) {
            return Err(MonfundmeError::CampaignExpired {
                deadline: record.deadline.as_secs(),
            });
        }

        record.amount_collected = record
            .amount_collected
            .checked_add(amount)
            .ok_or(MonfundmeError::AmountOverflow)?;
        record.balance = record
            .balance
            .checked_add(amount)
            .ok_or(MonfundmeError::AmountOverflow)?;

        if record.withdrawn {
            warn!(
                "Donation to {} after its withdrawal; {} stays escrowed with no release",
                campaign,
                amount
            );
        }

        let donation = Donation {
            donor: *donor,
            amount,
            time: now,
        };
        writer.put(donation_key(campaign, record.donation_count), &donation)?;
        record.donation_count += 1;
        writer.put(campaign_key(campaign), &record)?;
        writer.commit().await?;
        drop(writer);

        info!("Donation to {}: {} from {}", campaign, amount, donor);
        self.events.emit(LedgerEvent::DonationReceived {
            campaign: *campaign,
            donor: *donor,
            amount,
        });
        Ok(record.amount_collected)
    }

    /// Release the escrowed balance to the owner. Returns the amount paid.
    ///
    /// The settled record is staged before the payout runs, and both land
    /// in one batch. A failed payout discards the batch.
    pub async fn withdraw(
        &self,
        caller: &Address,
        campaign: &CampaignId,
    ) -> MonfundmeResult<Amount> {
        let mut writer = self.ledger.write().await;
        let now = self.clock.now();
        let record = Self::load(&writer, campaign).await?;

        if caller != &record.owner {
            return Err(MonfundmeError::Unauthorized(caller.to_hex()));
        }
        if record.withdrawn {
            return Err(MonfundmeError::AlreadyWithdrawn);
        }
        if !record.withdrawal_allowed(now) {
            return Err(MonfundmeError::WithdrawalNotYetAllowed {
                deadline: record.deadline.as_secs(),
            });
        }

        let amount = record.balance;
        let mut settled = record.clone();
        settled.withdrawn = true;
        settled.balance = Amount::ZERO;
        writer.put(campaign_key(campaign), &settled)?;

        if let Err(e) = self.payout.pay(&mut writer, &record.owner, amount).await {
            warn!("Payout for {} failed, escrow untouched: {}", campaign, e);
            writer.rollback();
            return Err(MonfundmeError::TransferFailed(e.to_string()));
        }
        writer.commit().await?;
        drop(writer);

        info!("Withdrawal from {}: {} to {}", campaign, amount, record.owner);
        self.events.emit(LedgerEvent::FundsWithdrawn {
            campaign: *campaign,
            owner: record.owner,
            amount,
        });
        Ok(amount)
    }

    pub async fn campaign(&self, id: &CampaignId) -> MonfundmeResult<CampaignSnapshot> {
        self.record(id).await.map(|r| r.snapshot())
    }

    /// Donations to a campaign in the order they were made
    pub async fn donations(&self, id: &CampaignId) -> MonfundmeResult<Vec<Donation>> {
        self.record(id).await?;
        self.ledger.scan(&donation_prefix(id)).await
    }

    /// Every deployed campaign, in creation order
    pub async fn campaign_summaries(&self) -> MonfundmeResult<Vec<CampaignSnapshot>> {
        let ids: Vec<CampaignId> = self.ledger.scan(DEPLOYED_PREFIX).await?;
        let mut summaries = Vec::with_capacity(ids.len());
        for id in &ids {
            let record = self.record(id).await.map_err(|_| {
                MonfundmeError::StateCorruption(format!("deployed campaign {} has no record", id))
            })?;
            summaries.push(record.snapshot());
        }
        Ok(summaries)
    }

    async fn record(&self, id: &CampaignId) -> MonfundmeResult<CampaignRecord> {
        self.ledger
            .read(&campaign_key(id))
            .await?
            .ok_or_else(|| MonfundmeError::CampaignNotFound(id.to_hex()))
    }

    async fn load(
        writer: &LedgerWriter<'_, S>,
        id: &CampaignId,
    ) -> MonfundmeResult<CampaignRecord> {
        writer
            .read(&campaign_key(id))
            .await?
            .ok_or_else(|| MonfundmeError::CampaignNotFound(id.to_hex()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::CampaignFactory;
    use crate::payout::AccountPayout;
    use async_trait::async_trait;
    use monfundme_core::{CampaignParams, ManualClock, Timestamp};
    use monfundme_state::{MemoryStateStore, StateStore, CAMPAIGN_PREFIX};
    use parking_lot::Mutex;

    const ADMIN: Address = Address([0xAA; 32]);
    const OWNER: Address = Address([0x01; 32]);
    const DONOR: Address = Address([0x02; 32]);
    const NOW: u64 = 1_700_000_000;
    const DAY: u64 = 86_400;

    struct FailingPayout;

    #[async_trait]
    impl PayoutSink<MemoryStateStore> for FailingPayout {
        async fn pay(
            &self,
            writer: &mut LedgerWriter<'_, MemoryStateStore>,
            to: &Address,
            amount: Amount,
        ) -> MonfundmeResult<()> {
            // stage something first to prove it is discarded
            AccountPayout.pay(writer, to, amount).await?;
            Err(MonfundmeError::Internal("bank offline".into()))
        }
    }

    /// Looks at committed and staged state mid-payout, then fails
    struct ObservingPayout {
        committed: Ledger<MemoryStateStore>,
        seen: Mutex<Option<(CampaignRecord, CampaignRecord)>>,
    }

    #[async_trait]
    impl PayoutSink<MemoryStateStore> for ObservingPayout {
        async fn pay(
            &self,
            writer: &mut LedgerWriter<'_, MemoryStateStore>,
            _to: &Address,
            _amount: Amount,
        ) -> MonfundmeResult<()> {
            let outside: Vec<CampaignRecord> = self.committed.scan(CAMPAIGN_PREFIX).await?;
            let staged: Vec<CampaignRecord> = writer.scan(CAMPAIGN_PREFIX).await?;
            *self.seen.lock() = Some((outside[0].clone(), staged[0].clone()));
            Err(MonfundmeError::Internal("bank offline".into()))
        }
    }

    struct Fixture {
        escrow: CampaignEscrow<MemoryStateStore>,
        clock: Arc<ManualClock>,
        store: Arc<MemoryStateStore>,
        campaign: CampaignId,
    }

    async fn fixture_with(payout: Arc<dyn PayoutSink<MemoryStateStore>>) -> Fixture {
        fixture_on(Arc::new(MemoryStateStore::new()), payout).await
    }

    async fn fixture_on(
        store: Arc<MemoryStateStore>,
        payout: Arc<dyn PayoutSink<MemoryStateStore>>,
    ) -> Fixture {
        let ledger = Arc::new(Ledger::new(store.clone()));
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(NOW)));
        {
            let mut writer = ledger.write().await;
            CampaignFactory::install(&mut writer, &ADMIN, &ADMIN).await.unwrap();
            writer.commit().await.unwrap();
        }

        let factory = CampaignFactory::new(ledger.clone(), clock.clone(), EventEmitter::disabled());
        let params = CampaignParams::new(
            OWNER,
            "Books",
            "Library fund",
            "books.png",
            Amount::parse_mon("1.4").unwrap(),
            Timestamp::from_secs(NOW + DAY),
        )
        .unwrap();
        let campaign = factory.create_campaign(&ADMIN, &params).await.unwrap();

        let escrow = CampaignEscrow::new(ledger, payout, clock.clone(), EventEmitter::disabled());
        Fixture {
            escrow,
            clock,
            store,
            campaign,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(Arc::new(AccountPayout)).await
    }

    fn mon(s: &str) -> Amount {
        Amount::parse_mon(s).unwrap()
    }

    #[tokio::test]
    async fn test_donations_sum_exactly() {
        let fx = fixture().await;
        let amounts = ["0.1", "0.25", "0.000000000000000001", "0.3"];

        for (i, a) in amounts.iter().enumerate() {
            let donor = Address([10 + i as u8; 32]);
            fx.escrow.donate_with_mon(&donor, &fx.campaign, mon(a)).await.unwrap();
        }

        let snapshot = fx.escrow.campaign(&fx.campaign).await.unwrap();
        assert_eq!(snapshot.amount_collected, Amount::new(650_000_000_000_000_001));
        assert_eq!(snapshot.balance, snapshot.amount_collected);
        assert_eq!(snapshot.donor_count, 4);

        let donations = fx.escrow.donations(&fx.campaign).await.unwrap();
        let listed: Vec<Amount> = donations.iter().map(|d| d.amount).collect();
        let expected: Vec<Amount> = amounts.iter().map(|a| mon(a)).collect();
        assert_eq!(listed, expected);
        assert_eq!(donations[0].donor, Address([10u8; 32]));
    }

    #[tokio::test]
    async fn test_donation_rejections() {
        let fx = fixture().await;

        let zero = fx.escrow.donate_with_mon(&DONOR, &fx.campaign, Amount::ZERO).await;
        assert!(matches!(zero, Err(MonfundmeError::InvalidAmount(_))));

        let unknown = fx
            .escrow
            .donate_with_mon(&DONOR, &Address([0x55; 32]), mon("1"))
            .await;
        assert!(matches!(unknown, Err(MonfundmeError::CampaignNotFound(_))));

        fx.clock.advance(DAY);
        let late = fx.escrow.donate_with_mon(&DONOR, &fx.campaign, mon("1")).await;
        assert!(matches!(late, Err(MonfundmeError::CampaignExpired { .. })));

        let snapshot = fx.escrow.campaign(&fx.campaign).await.unwrap();
        assert_eq!(snapshot.amount_collected, Amount::ZERO);
        assert!(fx.escrow.donations(&fx.campaign).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_withdraw_rules() {
        let fx = fixture().await;
        fx.escrow.donate_with_mon(&DONOR, &fx.campaign, mon("0.1")).await.unwrap();

        let early = fx.escrow.withdraw(&OWNER, &fx.campaign).await;
        assert!(matches!(early, Err(MonfundmeError::WithdrawalNotYetAllowed { .. })));

        fx.clock.advance(DAY);
        let stranger = fx.escrow.withdraw(&DONOR, &fx.campaign).await;
        assert!(matches!(stranger, Err(MonfundmeError::Unauthorized(_))));

        let paid = fx.escrow.withdraw(&OWNER, &fx.campaign).await.unwrap();
        assert_eq!(paid, mon("0.1"));
        assert_eq!(fx.store.get_balance(&OWNER).await.unwrap(), mon("0.1"));

        let snapshot = fx.escrow.campaign(&fx.campaign).await.unwrap();
        assert!(snapshot.withdrawn);
        assert_eq!(snapshot.balance, Amount::ZERO);
        assert_eq!(snapshot.amount_collected, mon("0.1"));

        let twice = fx.escrow.withdraw(&OWNER, &fx.campaign).await;
        assert!(matches!(twice, Err(MonfundmeError::AlreadyWithdrawn)));
        assert_eq!(fx.store.get_balance(&OWNER).await.unwrap(), mon("0.1"));
    }

    #[tokio::test]
    async fn test_withdraw_once_target_met() {
        let fx = fixture().await;
        fx.escrow.donate_with_mon(&DONOR, &fx.campaign, mon("1.4")).await.unwrap();

        // target reached before the deadline
        let paid = fx.escrow.withdraw(&OWNER, &fx.campaign).await.unwrap();
        assert_eq!(paid, mon("1.4"));

        // the deadline still gates new donations, not the withdrawn flag
        let more = fx.escrow.donate_with_mon(&DONOR, &fx.campaign, mon("0.5")).await.unwrap();
        assert_eq!(more, mon("1.9"));
        let again = fx.escrow.withdraw(&OWNER, &fx.campaign).await;
        assert!(matches!(again, Err(MonfundmeError::AlreadyWithdrawn)));
    }

    #[tokio::test]
    async fn test_failed_payout_restores_record() {
        let fx = fixture_with(Arc::new(FailingPayout)).await;
        fx.escrow.donate_with_mon(&DONOR, &fx.campaign, mon("2")).await.unwrap();
        let before = fx.escrow.campaign(&fx.campaign).await.unwrap();

        let result = fx.escrow.withdraw(&OWNER, &fx.campaign).await;
        assert!(matches!(result, Err(MonfundmeError::TransferFailed(_))));

        let after = fx.escrow.campaign(&fx.campaign).await.unwrap();
        assert_eq!(before, after);
        assert!(!after.withdrawn);
        assert_eq!(fx.store.get_balance(&OWNER).await.unwrap(), Amount::ZERO);
    }

    #[tokio::test]
    async fn test_withdrawal_not_visible_until_payout_succeeds() {
        let store = Arc::new(MemoryStateStore::new());
        let payout = Arc::new(ObservingPayout {
            committed: Ledger::new(store.clone()),
            seen: Mutex::new(None),
        });
        let fx = fixture_on(store, payout.clone()).await;
        fx.escrow.donate_with_mon(&DONOR, &fx.campaign, mon("2")).await.unwrap();
        fx.clock.advance(DAY);
        let version = fx.escrow.ledger.version().await;

        let result = fx.escrow.withdraw(&OWNER, &fx.campaign).await;
        assert!(matches!(result, Err(MonfundmeError::TransferFailed(_))));

        let (outside, staged) = payout.seen.lock().clone().unwrap();
        assert!(!outside.withdrawn);
        assert_eq!(outside.balance, mon("2"));
        assert!(staged.withdrawn);
        assert_eq!(staged.balance, Amount::ZERO);

        assert_eq!(fx.escrow.ledger.version().await, version);
        assert!(!fx.escrow.campaign(&fx.campaign).await.unwrap().withdrawn);
    }

    #[tokio::test]
    async fn test_successful_withdrawal_is_one_batch() {
        let fx = fixture().await;
        fx.escrow.donate_with_mon(&DONOR, &fx.campaign, mon("1")).await.unwrap();
        fx.clock.advance(DAY);
        let version = fx.escrow.ledger.version().await;

        fx.escrow.withdraw(&OWNER, &fx.campaign).await.unwrap();
        assert_eq!(fx.escrow.ledger.version().await, version.next());
    }

    #[tokio::test]
    async fn test_deadline_checked_after_waiting_for_lock() {
        let fx = fixture().await;
        let ledger = fx.escrow.ledger.clone();

        // the deadline passes while the donation waits behind another writer
        let writer = ledger.write().await;
        let clock = fx.clock.clone();
        let release = async move {
            tokio::task::yield_now().await;
            clock.advance(DAY + 1);
            drop(writer);
        };
        let (late, ()) = tokio::join!(
            fx.escrow.donate_with_mon(&DONOR, &fx.campaign, mon("1")),
            release
        );

        assert!(matches!(late, Err(MonfundmeError::CampaignExpired { .. })));
        assert!(fx.escrow.donations(&fx.campaign).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summaries_in_creation_order() {
        let fx = fixture().await;
        let summaries = fx.escrow.campaign_summaries().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, fx.campaign);
        assert_eq!(summaries[0].title, "Books");

        let missing = fx.escrow.campaign(&Address([0x55; 32])).await;
        assert!(matches!(missing, Err(MonfundmeError::CampaignNotFound(_))));
    }
}
