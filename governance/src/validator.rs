//! Validator registry

use monfundme_core::{
    Address, EventEmitter, LedgerEvent, MonfundmeError, MonfundmeResult, SharedClock, Timestamp,
};
use monfundme_state::{meta_key, validator_key, Ledger, LedgerWriter, StateStore, VALIDATOR_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

const CONTROLLER_KEY: &str = "registry_controller";

/// Stored validator entry. Removal deactivates, it never deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRecord {
    pub address: Address,
    pub active: bool,
    pub added_at: Timestamp,
    pub removed_at: Option<Timestamp>,
}

impl ValidatorRecord {
    pub fn new(address: Address, added_at: Timestamp) -> Self {
        Self {
            address,
            active: true,
            added_at,
            removed_at: None,
        }
    }
}

/// Set of addresses allowed to attest proposal outcomes
pub struct ValidatorRegistry<S: StateStore> {
    ledger: Arc<Ledger<S>>,
    clock: SharedClock,
    events: EventEmitter,
}

impl<S: StateStore> ValidatorRegistry<S> {
    pub fn new(ledger: Arc<Ledger<S>>, clock: SharedClock, events: EventEmitter) -> Self {
        Self {
            ledger,
            clock,
            events,
        }
    }

    /// Bind the controller. Only possible once per ledger.
    pub async fn install(
        writer: &mut LedgerWriter<'_, S>,
        controller: &Address,
    ) -> MonfundmeResult<()> {
        let key = meta_key(CONTROLLER_KEY);
        if writer.exists(&key).await? {
            return Err(MonfundmeError::AlreadyInitialized);
        }
        writer.put(key, controller)
    }

    pub async fn controller(&self) -> MonfundmeResult<Address> {
        self.ledger
            .read(&meta_key(CONTROLLER_KEY))
            .await?
            .ok_or_else(|| MonfundmeError::NotInitialized("validator registry".into()))
    }

    pub async fn add_validator(&self, caller: &Address, address: &Address) -> MonfundmeResult<()> {
        let mut writer = self.ledger.write().await;
        self.stage_add(&mut writer, caller, address).await?;
        writer.commit().await?;
        drop(writer);

        info!("Validator added: {}", address);
        self.events.emit(LedgerEvent::ValidatorAdded(*address));
        Ok(())
    }

    /// Stage an addition into an open writer without committing
    pub async fn stage_add(
        &self,
        writer: &mut LedgerWriter<'_, S>,
        caller: &Address,
        address: &Address,
    ) -> MonfundmeResult<()> {
        Self::authorize(writer, caller).await?;

        let key = validator_key(address);
        if let Some(existing) = writer.read::<ValidatorRecord>(&key).await? {
            if existing.active {
                return Err(MonfundmeError::DuplicateValidator(address.to_hex()));
            }
        }

        writer.put(key, &ValidatorRecord::new(*address, self.clock.now()))
    }

    pub async fn remove_validator(
        &self,
        caller: &Address,
        address: &Address,
    ) -> MonfundmeResult<()> {
        let mut writer = self.ledger.write().await;
        Self::authorize(&writer, caller).await?;

        let key = validator_key(address);
        let mut record = match writer.read::<ValidatorRecord>(&key).await? {
            Some(record) if record.active => record,
            _ => return Err(MonfundmeError::UnknownValidator(address.to_hex())),
        };

        record.active = false;
        record.removed_at = Some(self.clock.now());
        writer.put(key, &record)?;
        writer.commit().await?;
        drop(writer);

        info!("Validator removed: {}", address);
        self.events.emit(LedgerEvent::ValidatorRemoved(*address));
        Ok(())
    }

    pub async fn is_validator(&self, address: &Address) -> MonfundmeResult<bool> {
        Ok(self
            .ledger
            .read::<ValidatorRecord>(&validator_key(address))
            .await?
            .map(|v| v.active)
            .unwrap_or(false))
    }

    /// Active validators in address order
    pub async fn validators(&self) -> MonfundmeResult<Vec<ValidatorRecord>> {
        let all: Vec<ValidatorRecord> = self.ledger.scan(VALIDATOR_PREFIX).await?;
        Ok(all.into_iter().filter(|v| v.active).collect())
    }

    pub async fn active_set(&self) -> MonfundmeResult<HashSet<Address>> {
        Ok(self.validators().await?.into_iter().map(|v| v.address).collect())
    }

    /// Active set as seen by an open writer
    pub async fn active_set_in(writer: &LedgerWriter<'_, S>) -> MonfundmeResult<HashSet<Address>> {
        let all: Vec<ValidatorRecord> = writer.scan(VALIDATOR_PREFIX).await?;
        Ok(all
            .into_iter()
            .filter(|v| v.active)
            .map(|v| v.address)
            .collect())
    }

    async fn authorize(writer: &LedgerWriter<'_, S>, caller: &Address) -> MonfundmeResult<()> {
        let controller: Address = writer
            .read(&meta_key(CONTROLLER_KEY))
            .await?
            .ok_or_else(|| MonfundmeError::NotInitialized("validator registry".into()))?;
        if caller != &controller {
            return Err(MonfundmeError::Unauthorized(caller.to_hex()));
        }
        Ok(())
    }
}
