//! Trade records and their wire shapes.
//!
//! A logical trade is identified by `trade_id`; every accepted submission is
//! stored as its own [`TradeRecord`], so one trade id maps to a version history.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use uuid::Uuid;

/// Years whose ISO dates have exactly four digits, so text order equals day order.
pub const STORABLE_YEARS: RangeInclusive<i32> = 1..=9999;

/// Storage-level identity of one record, distinct from `trade_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn parse(value: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(value).map(Self)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for RecordId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An incoming booking, as received from either intake path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSubmission {
    pub trade_id: String,
    pub version: i64,
    pub counter_party_id: String,
    pub book_id: String,
    pub maturity_date: NaiveDate,
}

/// A record accepted by admission but not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrade {
    pub trade_id: String,
    pub version: i64,
    pub counter_party_id: String,
    pub book_id: String,
    pub maturity_date: NaiveDate,
    pub created_date: NaiveDate,
    pub expired: bool,
}

impl NewTrade {
    pub fn from_submission(submission: &TradeSubmission, today: NaiveDate) -> Self {
        Self {
            trade_id: submission.trade_id.clone(),
            version: submission.version,
            counter_party_id: submission.counter_party_id.clone(),
            book_id: submission.book_id.clone(),
            maturity_date: submission.maturity_date,
            created_date: today,
            expired: false,
        }
    }

    pub fn with_id(self, id: RecordId) -> TradeRecord {
        TradeRecord {
            id,
            trade_id: self.trade_id,
            version: self.version,
            counter_party_id: self.counter_party_id,
            book_id: self.book_id,
            maturity_date: self.maturity_date,
            created_date: self.created_date,
            expired: self.expired,
        }
    }
}

/// A persisted trade record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRecord {
    pub id: RecordId,
    pub trade_id: String,
    pub version: i64,
    pub counter_party_id: String,
    pub book_id: String,
    pub maturity_date: NaiveDate,
    pub created_date: NaiveDate,
    pub expired: bool,
}

impl TradeRecord {
    /// True when the record is still live but its maturity date is behind `today`.
    pub fn is_matured(&self, today: NaiveDate) -> bool {
        !self.expired && self.maturity_date < today
    }

    pub fn view(&self) -> TradeView {
        TradeView::from(self)
    }
}

/// Public projection of a record. `expired` is rendered as `"Y"` or `"N"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeView {
    pub trade_id: String,
    pub version: i64,
    pub counter_party_id: String,
    pub book_id: String,
    pub maturity_date: NaiveDate,
    pub created_date: NaiveDate,
    pub expired: String,
}

impl From<&TradeRecord> for TradeView {
    fn from(record: &TradeRecord) -> Self {
        Self {
            trade_id: record.trade_id.clone(),
            version: record.version,
            counter_party_id: record.counter_party_id.clone(),
            book_id: record.book_id.clone(),
            maturity_date: record.maturity_date,
            created_date: record.created_date,
            expired: expired_flag(record.expired).to_string(),
        }
    }
}

pub fn expired_flag(expired: bool) -> &'static str {
    if expired { "Y" } else { "N" }
}

pub fn parse_expired_flag(flag: &str) -> Option<bool> {
    match flag {
        "Y" => Some(true),
        "N" => Some(false),
        _ => None,
    }
}
