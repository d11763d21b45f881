//! SQLite trade store.

use crate::domain::error::TradeStoreError;
use crate::domain::trade::{
    NewTrade, RecordId, STORABLE_YEARS, TradeRecord, expired_flag, parse_expired_flag,
};
use crate::ports::trade_store_port::TradeStorePort;
use chrono::{Datelike, NaiveDate};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Row, params};

const DATE_FORMAT: &str = "%Y-%m-%d";

const SELECT_COLUMNS: &str =
    "SELECT id, trade_id, version, counter_party_id, book_id, maturity_date, created_date, expired
     FROM trades";

pub struct SqliteTradeStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteTradeStore {
    pub fn open(path: &str, pool_size: u32) -> Result<Self, TradeStoreError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| TradeStoreError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, TradeStoreError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| TradeStoreError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), TradeStoreError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trades (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                trade_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                counter_party_id TEXT NOT NULL,
                book_id TEXT NOT NULL,
                maturity_date TEXT NOT NULL,
                created_date TEXT NOT NULL,
                expired TEXT NOT NULL DEFAULT 'N'
            );
            CREATE INDEX IF NOT EXISTS idx_trades_trade_id_version ON trades(trade_id, version);
            CREATE INDEX IF NOT EXISTS idx_trades_expired_maturity ON trades(expired, maturity_date);",
        )
        .map_err(query_error)?;

        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TradeStoreError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| TradeStoreError::Database {
                reason: e.to_string(),
            })
    }

    fn query_records(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<TradeRecord>, TradeStoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(query_error)?;
        let rows = stmt.query_map(args, map_row).map_err(query_error)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(query_error)?);
        }
        Ok(records)
    }
}

impl TradeStorePort for SqliteTradeStore {
    fn insert(&self, trade: NewTrade) -> Result<TradeRecord, TradeStoreError> {
        let maturity_date = format_date(trade.maturity_date)?;
        let created_date = format_date(trade.created_date)?;
        let record = trade.with_id(RecordId::new());
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO trades (id, trade_id, version, counter_party_id, book_id, maturity_date, created_date, expired)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id.to_string(),
                record.trade_id,
                record.version,
                record.counter_party_id,
                record.book_id,
                maturity_date,
                created_date,
                expired_flag(record.expired),
            ],
        )
        .map_err(query_error)?;

        Ok(record)
    }

    fn find_latest_by_trade_id(
        &self,
        trade_id: &str,
    ) -> Result<Option<TradeRecord>, TradeStoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE trade_id = ?1 ORDER BY version DESC, seq DESC LIMIT 1");
        Ok(self.query_records(&sql, &[&trade_id])?.into_iter().next())
    }

    fn find_matured_unexpired(
        &self,
        as_of: NaiveDate,
    ) -> Result<Vec<TradeRecord>, TradeStoreError> {
        let as_of = format_date(as_of)?;
        let sql = format!("{SELECT_COLUMNS} WHERE expired = 'N' AND maturity_date < ?1 ORDER BY seq ASC");
        self.query_records(&sql, &[&as_of])
    }

    fn update(&self, record: &TradeRecord) -> Result<(), TradeStoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE trades SET expired = ?1 WHERE id = ?2",
                params![expired_flag(record.expired), record.id.to_string()],
            )
            .map_err(query_error)?;

        if changed == 0 {
            return Err(TradeStoreError::RecordNotFound {
                id: record.id.to_string(),
            });
        }
        Ok(())
    }

    fn find_by_trade_id(&self, trade_id: &str) -> Result<Vec<TradeRecord>, TradeStoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE trade_id = ?1 ORDER BY version ASC, seq ASC");
        self.query_records(&sql, &[&trade_id])
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<TradeRecord> {
    let id: String = row.get(0)?;
    let expired: String = row.get(7)?;
    Ok(TradeRecord {
        id: RecordId::parse(&id).map_err(|e| conversion_error(0, e))?,
        trade_id: row.get(1)?,
        version: row.get(2)?,
        counter_party_id: row.get(3)?,
        book_id: row.get(4)?,
        maturity_date: parse_date(row, 5)?,
        created_date: parse_date(row, 6)?,
        expired: parse_expired_flag(&expired).ok_or_else(|| {
            conversion_error(7, std::io::Error::other(format!("bad expired flag '{expired}'")))
        })?,
    })
}

/// Dates are compared as text, which only matches day order for four-digit years.
fn format_date(date: NaiveDate) -> Result<String, TradeStoreError> {
    if !STORABLE_YEARS.contains(&date.year()) {
        return Err(TradeStoreError::DatabaseQuery {
            reason: format!("date {date} is outside the storable year range"),
        });
    }
    Ok(date.format(DATE_FORMAT).to_string())
}

fn parse_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let date_str: String = row.get(idx)?;
    NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn query_error(e: rusqlite::Error) -> TradeStoreError {
    TradeStoreError::DatabaseQuery {
        reason: e.to_string(),
    }
}
