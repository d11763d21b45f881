//! In-memory trade store.

use crate::domain::error::TradeStoreError;
use crate::domain::trade::{NewTrade, RecordId, TradeRecord};
use crate::ports::trade_store_port::TradeStorePort;
use chrono::NaiveDate;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Records kept in insertion order; nothing survives a restart.
#[derive(Default)]
pub struct InMemoryTradeStore {
    records: RwLock<Vec<TradeRecord>>,
}

impl InMemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Result<Vec<TradeRecord>, TradeStoreError> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<TradeRecord>>, TradeStoreError> {
        self.records.read().map_err(|e| TradeStoreError::Database {
            reason: e.to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<TradeRecord>>, TradeStoreError> {
        self.records.write().map_err(|e| TradeStoreError::Database {
            reason: e.to_string(),
        })
    }
}

impl TradeStorePort for InMemoryTradeStore {
    fn insert(&self, trade: NewTrade) -> Result<TradeRecord, TradeStoreError> {
        let record = trade.with_id(RecordId::new());
        self.write()?.push(record.clone());
        Ok(record)
    }

    fn find_latest_by_trade_id(
        &self,
        trade_id: &str,
    ) -> Result<Option<TradeRecord>, TradeStoreError> {
        let records = self.read()?;
        // max_by_key returns the last maximum, i.e. the newest among equal versions.
        Ok(records
            .iter()
            .filter(|r| r.trade_id == trade_id)
            .max_by_key(|r| r.version)
            .cloned())
    }

    fn find_matured_unexpired(
        &self,
        as_of: NaiveDate,
    ) -> Result<Vec<TradeRecord>, TradeStoreError> {
        let records = self.read()?;
        Ok(records
            .iter()
            .filter(|r| r.is_matured(as_of))
            .cloned()
            .collect())
    }

    fn update(&self, record: &TradeRecord) -> Result<(), TradeStoreError> {
        let mut records = self.write()?;
        let slot = records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| TradeStoreError::RecordNotFound {
                id: record.id.to_string(),
            })?;
        slot.expired = record.expired;
        Ok(())
    }

    fn find_by_trade_id(&self, trade_id: &str) -> Result<Vec<TradeRecord>, TradeStoreError> {
        let records = self.read()?;
        let mut history: Vec<TradeRecord> = records
            .iter()
            .filter(|r| r.trade_id == trade_id)
            .cloned()
            .collect();
        history.sort_by_key(|r| r.version);
        Ok(history)
    }
}
