//! Payout sinks for withdrawn funds

use async_trait::async_trait;
use monfundme_core::{Address, Amount, MonfundmeError, MonfundmeResult};
use monfundme_state::{account_key, AccountState, LedgerWriter, StateStore};

/// Moves withdrawn escrow to its recipient.
///
/// Called with the withdrawing writer still held. Anything staged on the
/// writer is committed only if `pay` returns `Ok`.
#[async_trait]
pub trait PayoutSink<S: StateStore>: Send + Sync {
    async fn pay(
        &self,
        writer: &mut LedgerWriter<'_, S>,
        to: &Address,
        amount: Amount,
    ) -> MonfundmeResult<()>;
}

/// Credits the recipient's account balance in the same ledger
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountPayout;

#[async_trait]
impl<S: StateStore + 'static> PayoutSink<S> for AccountPayout {
    async fn pay(
        &self,
        writer: &mut LedgerWriter<'_, S>,
        to: &Address,
        amount: Amount,
    ) -> MonfundmeResult<()> {
        let key = account_key(to);
        let mut account: AccountState = writer.read(&key).await?.unwrap_or_default();
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(MonfundmeError::AmountOverflow)?;
        writer.put(key, &account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monfundme_state::{Ledger, MemoryStateStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_account_payout_credits() {
        let ledger = Ledger::new(Arc::new(MemoryStateStore::new()));
        let owner = Address([3u8; 32]);

        let mut writer = ledger.write().await;
        AccountPayout.pay(&mut writer, &owner, Amount::from_mon(1)).await.unwrap();
        AccountPayout.pay(&mut writer, &owner, Amount::from_mon(2)).await.unwrap();
        writer.commit().await.unwrap();
        drop(writer);

        let account: AccountState = ledger.read(&account_key(&owner)).await.unwrap().unwrap();
        assert_eq!(account.balance, Amount::from_mon(3));
    }

    #[tokio::test]
    async fn test_account_payout_overflow() {
        let ledger = Ledger::new(Arc::new(MemoryStateStore::new()));
        let owner = Address([3u8; 32]);

        let mut writer = ledger.write().await;
        AccountPayout.pay(&mut writer, &owner, Amount::MAX).await.unwrap();
        let result = AccountPayout.pay(&mut writer, &owner, Amount::new(1)).await;
        assert!(matches!(result, Err(MonfundmeError::AmountOverflow)));
    }
}
