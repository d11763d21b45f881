#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tradestore::adapters::memory_store::InMemoryTradeStore;
use tradestore::domain::admission::TradeAdmission;
use tradestore::domain::error::TradeStoreError;
use tradestore::domain::sweeper::ExpirationSweeper;
use tradestore::domain::trade::{NewTrade, TradeRecord, TradeSubmission};
use tradestore::ports::clock_port::FixedClock;
use tradestore::ports::trade_store_port::TradeStorePort;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// The calendar date every fixture runs against.
pub fn today() -> NaiveDate {
    date("2025-07-15")
}

pub fn days_from_today(offset: i64) -> NaiveDate {
    today() + Duration::days(offset)
}

pub fn submission(trade_id: &str, version: i64, maturity_date: NaiveDate) -> TradeSubmission {
    TradeSubmission {
        trade_id: trade_id.to_string(),
        version,
        counter_party_id: format!("CP-{version}"),
        book_id: "B1".to_string(),
        maturity_date,
    }
}

pub fn stored(trade_id: &str, version: i64, maturity_date: NaiveDate) -> NewTrade {
    NewTrade {
        trade_id: trade_id.to_string(),
        version,
        counter_party_id: format!("CP-{version}"),
        book_id: "B1".to_string(),
        maturity_date,
        created_date: date("2025-01-01"),
        expired: false,
    }
}

/// In-memory store that counts writes.
#[derive(Default)]
pub struct CountingStore {
    pub inner: InMemoryTradeStore,
    pub inserts: AtomicUsize,
    pub updates: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn all(&self) -> Vec<TradeRecord> {
        self.inner.all().unwrap()
    }
}

impl TradeStorePort for CountingStore {
    fn insert(&self, trade: NewTrade) -> Result<TradeRecord, TradeStoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(trade)
    }

    fn find_latest_by_trade_id(
        &self,
        trade_id: &str,
    ) -> Result<Option<TradeRecord>, TradeStoreError> {
        self.inner.find_latest_by_trade_id(trade_id)
    }

    fn find_matured_unexpired(&self, as_of: NaiveDate) -> Result<Vec<TradeRecord>, TradeStoreError> {
        self.inner.find_matured_unexpired(as_of)
    }

    fn update(&self, record: &TradeRecord) -> Result<(), TradeStoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update(record)
    }

    fn find_by_trade_id(&self, trade_id: &str) -> Result<Vec<TradeRecord>, TradeStoreError> {
        self.inner.find_by_trade_id(trade_id)
    }
}

pub struct Harness {
    pub store: Arc<CountingStore>,
    pub admission: Arc<TradeAdmission>,
}

impl Harness {
    pub fn new() -> Self {
        Self::at(today())
    }

    pub fn at(as_of: NaiveDate) -> Self {
        let store = Arc::new(CountingStore::new());
        let admission = Arc::new(TradeAdmission::new(
            store.clone(),
            Arc::new(FixedClock(as_of)),
        ));
        Self { store, admission }
    }

    pub fn sweeper_at(&self, as_of: NaiveDate) -> ExpirationSweeper {
        ExpirationSweeper::new(self.store.clone(), Arc::new(FixedClock(as_of)))
    }
}
