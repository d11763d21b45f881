//! Expiration sweep: flags every live record whose maturity date has passed.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::domain::admission::{SharedClock, SharedStore};
use crate::domain::error::TradeStoreError;

/// Outcome of one sweep invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub matched: usize,
    pub expired: usize,
    pub failed: usize,
    /// Another sweep was already running; nothing was queried.
    pub skipped: bool,
}

pub struct ExpirationSweeper {
    store: SharedStore,
    clock: SharedClock,
    running: AtomicBool,
}

impl ExpirationSweeper {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self {
            store,
            clock,
            running: AtomicBool::new(false),
        }
    }

    /// Runs one sweep against today's date.
    ///
    /// Per-record update failures are logged and counted; only a failed query
    /// aborts the run.
    pub fn sweep(&self) -> Result<SweepReport, TradeStoreError> {
        let Some(_running) = RunningGuard::acquire(&self.running) else {
            tracing::debug!("sweep already in progress, skipping");
            return Ok(SweepReport {
                skipped: true,
                ..SweepReport::default()
            });
        };

        self.sweep_matured()
    }

    fn sweep_matured(&self) -> Result<SweepReport, TradeStoreError> {
        let today = self.clock.today();
        let matured = self.store.find_matured_unexpired(today)?;

        let mut report = SweepReport {
            matched: matured.len(),
            ..SweepReport::default()
        };

        for mut record in matured {
            record.expired = true;
            match self.store.update(&record) {
                Ok(()) => {
                    report.expired += 1;
                    tracing::info!(
                        trade_id = %record.trade_id,
                        version = record.version,
                        record_id = %record.id,
                        maturity_date = %record.maturity_date,
                        "trade marked expired"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        trade_id = %record.trade_id,
                        record_id = %record.id,
                        error = %e,
                        "failed to mark trade expired"
                    );
                }
            }
        }

        tracing::info!(
            as_of = %today,
            matched = report.matched,
            expired = report.expired,
            failed = report.failed,
            "expiration sweep finished"
        );
        Ok(report)
    }
}

/// Holds the in-progress flag; clears it on drop, unwinding included.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::InMemoryTradeStore;
    use crate::domain::trade::{NewTrade, TradeRecord};
    use crate::ports::clock_port::FixedClock;
    use crate::ports::trade_store_port::TradeStorePort;
    use chrono::NaiveDate;
    use std::panic::AssertUnwindSafe;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_trade(trade_id: &str, version: i64, maturity: NaiveDate) -> NewTrade {
        NewTrade {
            trade_id: trade_id.to_string(),
            version,
            counter_party_id: "CP-1".to_string(),
            book_id: "B1".to_string(),
            maturity_date: maturity,
            created_date: date(2024, 1, 1),
            expired: false,
        }
    }

    /// Counts updates and fails them for one trade id.
    struct FlakyStore {
        inner: InMemoryTradeStore,
        fail_trade_id: Option<String>,
        updates: AtomicUsize,
        gate: Option<Arc<Barrier>>,
        panic_next_query: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: InMemoryTradeStore::new(),
                fail_trade_id: None,
                updates: AtomicUsize::new(0),
                gate: None,
                panic_next_query: AtomicBool::new(false),
            }
        }
    }

    impl TradeStorePort for FlakyStore {
        fn insert(&self, trade: NewTrade) -> Result<TradeRecord, TradeStoreError> {
            self.inner.insert(trade)
        }
        fn find_latest_by_trade_id(
            &self,
            trade_id: &str,
        ) -> Result<Option<TradeRecord>, TradeStoreError> {
            self.inner.find_latest_by_trade_id(trade_id)
        }
        fn find_matured_unexpired(
            &self,
            as_of: NaiveDate,
        ) -> Result<Vec<TradeRecord>, TradeStoreError> {
            if let Some(gate) = &self.gate {
                gate.wait();
                gate.wait();
            }
            if self.panic_next_query.swap(false, Ordering::SeqCst) {
                panic!("store connection lost mid-query");
            }
            self.inner.find_matured_unexpired(as_of)
        }
        fn update(&self, record: &TradeRecord) -> Result<(), TradeStoreError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            if self.fail_trade_id.as_deref() == Some(record.trade_id.as_str()) {
                return Err(TradeStoreError::DatabaseQuery {
                    reason: "write conflict".into(),
                });
            }
            self.inner.update(record)
        }
        fn find_by_trade_id(&self, trade_id: &str) -> Result<Vec<TradeRecord>, TradeStoreError> {
            self.inner.find_by_trade_id(trade_id)
        }
    }

    #[test]
    fn matured_record_is_expired_once() {
        let store = Arc::new(FlakyStore::new());
        store.insert(new_trade("T4", 1, date(2025, 7, 14))).unwrap();
        let sweeper = ExpirationSweeper::new(store.clone(), Arc::new(FixedClock(date(2025, 7, 15))));

        let first = sweeper.sweep().unwrap();
        assert_eq!(first.matched, 1);
        assert_eq!(first.expired, 1);
        assert!(store.find_latest_by_trade_id("T4").unwrap().unwrap().expired);

        let second = sweeper.sweep().unwrap();
        assert_eq!(second, SweepReport::default());
        assert_eq!(store.updates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn maturity_on_sweep_date_is_untouched() {
        let store = Arc::new(FlakyStore::new());
        store.insert(new_trade("T1", 1, date(2025, 7, 15))).unwrap();
        store.insert(new_trade("T2", 1, date(2025, 8, 1))).unwrap();
        let sweeper = ExpirationSweeper::new(store.clone(), Arc::new(FixedClock(date(2025, 7, 15))));

        let report = sweeper.sweep().unwrap();
        assert_eq!(report.matched, 0);
        assert!(!store.find_latest_by_trade_id("T1").unwrap().unwrap().expired);
        assert!(!store.find_latest_by_trade_id("T2").unwrap().unwrap().expired);
    }

    #[test]
    fn historical_versions_are_flagged_independently() {
        let store = Arc::new(FlakyStore::new());
        store.insert(new_trade("T1", 1, date(2025, 1, 1))).unwrap();
        store.insert(new_trade("T1", 2, date(2025, 2, 1))).unwrap();
        let sweeper = ExpirationSweeper::new(store.clone(), Arc::new(FixedClock(date(2025, 7, 15))));

        let report = sweeper.sweep().unwrap();
        assert_eq!(report.expired, 2);
        assert!(store.find_by_trade_id("T1").unwrap().iter().all(|r| r.expired));
    }

    #[test]
    fn update_failure_does_not_stop_the_batch() {
        let mut flaky = FlakyStore::new();
        flaky.fail_trade_id = Some("BAD".to_string());
        let store = Arc::new(flaky);
        store.insert(new_trade("A", 1, date(2025, 1, 1))).unwrap();
        store.insert(new_trade("BAD", 1, date(2025, 1, 1))).unwrap();
        store.insert(new_trade("C", 1, date(2025, 1, 1))).unwrap();
        let sweeper = ExpirationSweeper::new(store.clone(), Arc::new(FixedClock(date(2025, 7, 15))));

        let report = sweeper.sweep().unwrap();
        assert_eq!(report.matched, 3);
        assert_eq!(report.expired, 2);
        assert_eq!(report.failed, 1);
        assert!(store.find_latest_by_trade_id("A").unwrap().unwrap().expired);
        assert!(!store.find_latest_by_trade_id("BAD").unwrap().unwrap().expired);
        assert!(store.find_latest_by_trade_id("C").unwrap().unwrap().expired);
    }

    #[test]
    fn overlapping_sweep_is_skipped() {
        let gate = Arc::new(Barrier::new(2));
        let mut gated = FlakyStore::new();
        gated.gate = Some(gate.clone());
        let store = Arc::new(gated);
        store.insert(new_trade("T1", 1, date(2025, 1, 1))).unwrap();
        let sweeper = Arc::new(ExpirationSweeper::new(
            store.clone(),
            Arc::new(FixedClock(date(2025, 7, 15))),
        ));

        let background = {
            let sweeper = Arc::clone(&sweeper);
            std::thread::spawn(move || sweeper.sweep().unwrap())
        };

        // First wait: the background sweep is inside its query.
        gate.wait();
        let overlapping = sweeper.sweep().unwrap();
        gate.wait();

        assert!(overlapping.skipped);
        let finished = background.join().unwrap();
        assert!(!finished.skipped);
        assert_eq!(finished.expired, 1);
    }

    #[test]
    fn panicking_sweep_does_not_block_the_next_one() {
        let store = Arc::new(FlakyStore::new());
        store.insert(new_trade("T4", 1, date(2025, 7, 14))).unwrap();
        store.panic_next_query.store(true, Ordering::SeqCst);
        let sweeper = ExpirationSweeper::new(store.clone(), Arc::new(FixedClock(date(2025, 7, 15))));

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| sweeper.sweep()));
        assert!(outcome.is_err());

        let report = sweeper.sweep().unwrap();
        assert!(!report.skipped);
        assert_eq!(report.expired, 1);
        assert!(store.find_latest_by_trade_id("T4").unwrap().unwrap().expired);
    }
}
