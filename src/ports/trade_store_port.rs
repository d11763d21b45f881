//! Trade persistence port trait.

use crate::domain::error::TradeStoreError;
use crate::domain::trade::{NewTrade, TradeRecord};
use chrono::NaiveDate;

/// Record store keyed by storage identity, queried by trade id.
///
/// Every insert creates a new record; nothing here overwrites business fields
/// or deletes history.
pub trait TradeStorePort {
    /// Writes a new record and returns it with its generated [`RecordId`].
    ///
    /// [`RecordId`]: crate::domain::trade::RecordId
    fn insert(&self, trade: NewTrade) -> Result<TradeRecord, TradeStoreError>;

    /// Highest version for `trade_id`. Equal versions resolve to the most
    /// recently inserted record.
    fn find_latest_by_trade_id(&self, trade_id: &str)
    -> Result<Option<TradeRecord>, TradeStoreError>;

    /// Every record with `expired = false` and `maturity_date < as_of`,
    /// historical versions included.
    fn find_matured_unexpired(&self, as_of: NaiveDate) -> Result<Vec<TradeRecord>, TradeStoreError>;

    /// Persists the mutable fields of an existing record.
    fn update(&self, record: &TradeRecord) -> Result<(), TradeStoreError>;

    /// Full version history, oldest version first.
    fn find_by_trade_id(&self, trade_id: &str) -> Result<Vec<TradeRecord>, TradeStoreError>;
}
