//! Trade admission: the accept/reject/version decision for one submission.
//!
//! Both intake paths call [`TradeAdmission::admit`]. The read-latest-then-insert
//! sequence runs under a lock keyed by trade id, so two submissions for the
//! same trade can never both pass the version check against the same latest
//! record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;

use crate::domain::error::TradeStoreError;
use crate::domain::trade::{NewTrade, TradeSubmission, TradeView};
use crate::ports::clock_port::ClockPort;
use crate::ports::trade_store_port::TradeStorePort;

pub type SharedStore = Arc<dyn TradeStorePort + Send + Sync>;
pub type SharedClock = Arc<dyn ClockPort + Send + Sync>;

pub struct TradeAdmission {
    store: SharedStore,
    clock: SharedClock,
    locks: KeyedLocks,
}

impl TradeAdmission {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self {
            store,
            clock,
            locks: KeyedLocks::default(),
        }
    }

    /// Admits a structurally valid submission.
    ///
    /// Rejects with `PastMaturity` when the maturity date is before today and
    /// with `StaleVersion` when a higher version is already stored. An equal
    /// version is accepted and stored as a new record.
    pub fn admit(&self, submission: &TradeSubmission) -> Result<TradeView, TradeStoreError> {
        let today = self.clock.today();

        if submission.maturity_date < today {
            tracing::warn!(
                trade_id = %submission.trade_id,
                version = submission.version,
                maturity_date = %submission.maturity_date,
                "rejected trade with past maturity date"
            );
            return Err(TradeStoreError::PastMaturity {
                trade_id: submission.trade_id.clone(),
                maturity_date: submission.maturity_date,
                today,
            });
        }

        self.locks.with_lock(&submission.trade_id, || {
            self.check_version_and_insert(submission, today)
        })
    }

    fn check_version_and_insert(
        &self,
        submission: &TradeSubmission,
        today: NaiveDate,
    ) -> Result<TradeView, TradeStoreError> {
        if let Some(latest) = self.store.find_latest_by_trade_id(&submission.trade_id)? {
            if submission.version < latest.version {
                tracing::warn!(
                    trade_id = %submission.trade_id,
                    version = submission.version,
                    latest_version = latest.version,
                    "rejected stale trade version"
                );
                return Err(TradeStoreError::StaleVersion {
                    trade_id: submission.trade_id.clone(),
                    submitted: submission.version,
                    latest: latest.version,
                });
            }
        }

        let record = self
            .store
            .insert(NewTrade::from_submission(submission, today))?;

        tracing::info!(
            trade_id = %record.trade_id,
            version = record.version,
            record_id = %record.id,
            "trade admitted"
        );

        Ok(record.view())
    }

    /// Number of trade ids with an admission currently in flight.
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }
}

/// Lock table keyed by trade id. An entry lives only while some caller
/// holds or waits on it.
#[derive(Default)]
struct KeyedLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    fn with_lock<R>(&self, key: &str, f: impl FnOnce() -> R) -> R {
        let entry = self.checkout(key);
        let _held = lock_ignoring_poison(&entry.slot);
        f()
    }

    fn checkout<'a>(&'a self, key: &'a str) -> LockEntry<'a> {
        let mut table = lock_ignoring_poison(&self.table);
        let slot = Arc::clone(table.entry(key.to_string()).or_default());
        LockEntry {
            table: &self.table,
            key,
            slot,
        }
    }

    fn len(&self) -> usize {
        lock_ignoring_poison(&self.table).len()
    }
}

/// One caller's claim on a table entry. Dropping it, on return or unwind,
/// prunes the entry once no other caller holds it.
struct LockEntry<'a> {
    table: &'a Mutex<HashMap<String, Arc<Mutex<()>>>>,
    key: &'a str,
    slot: Arc<Mutex<()>>,
}

impl Drop for LockEntry<'_> {
    fn drop(&mut self) {
        let mut table = lock_ignoring_poison(self.table);
        // The table holds one reference and this entry the other.
        let unshared = table
            .get(self.key)
            .is_some_and(|slot| Arc::ptr_eq(slot, &self.slot) && Arc::strong_count(slot) == 2);
        if unshared {
            table.remove(self.key);
        }
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
