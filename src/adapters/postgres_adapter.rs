//! PostgreSQL trade store.

use crate::domain::error::TradeStoreError;
use crate::domain::trade::{
    NewTrade, RecordId, TradeRecord, expired_flag, parse_expired_flag,
};
use crate::ports::trade_store_port::TradeStorePort;
use chrono::NaiveDate;
use postgres::NoTls;
use postgres::types::ToSql;
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;
use uuid::Uuid;

const SELECT_COLUMNS: &str =
    "SELECT id, trade_id, version, counter_party_id, book_id, maturity_date, created_date, expired \
     FROM public.trades";

type Manager = PostgresConnectionManager<NoTls>;

pub struct PostgresTradeStore {
    pool: Pool<Manager>,
}

impl PostgresTradeStore {
    pub fn connect(connection_string: &str, pool_size: u32) -> Result<Self, TradeStoreError> {
        let config: postgres::Config = connection_string
            .parse()
            .map_err(|e: postgres::Error| TradeStoreError::Database {
                reason: e.to_string(),
            })?;
        let manager = PostgresConnectionManager::new(config, NoTls);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| TradeStoreError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), TradeStoreError> {
        let mut client = self.conn()?;
        client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS public.trades (
                    seq BIGSERIAL PRIMARY KEY,
                    id UUID NOT NULL UNIQUE,
                    trade_id TEXT NOT NULL,
                    version BIGINT NOT NULL,
                    counter_party_id TEXT NOT NULL,
                    book_id TEXT NOT NULL,
                    maturity_date DATE NOT NULL,
                    created_date DATE NOT NULL,
                    expired CHAR(1) NOT NULL DEFAULT 'N'
                );
                CREATE INDEX IF NOT EXISTS idx_trades_trade_id_version ON public.trades(trade_id, version);
                CREATE INDEX IF NOT EXISTS idx_trades_expired_maturity ON public.trades(expired, maturity_date);",
            )
            .map_err(query_error)
    }

    fn conn(&self) -> Result<PooledConnection<Manager>, TradeStoreError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| TradeStoreError::Database {
                reason: e.to_string(),
            })
    }

    fn query_records(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<TradeRecord>, TradeStoreError> {
        let rows = self.conn()?.query(sql, params).map_err(query_error)?;
        rows.iter().map(map_row).collect()
    }
}

impl TradeStorePort for PostgresTradeStore {
    fn insert(&self, trade: NewTrade) -> Result<TradeRecord, TradeStoreError> {
        let record = trade.with_id(RecordId::new());
        let id = record.id.as_uuid();
        let expired = expired_flag(record.expired);

        let params: &[&(dyn ToSql + Sync)] = &[
            &id,
            &record.trade_id,
            &record.version,
            &record.counter_party_id,
            &record.book_id,
            &record.maturity_date,
            &record.created_date,
            &expired,
        ];
        self.conn()?
            .execute(
                "INSERT INTO public.trades \
                 (id, trade_id, version, counter_party_id, book_id, maturity_date, created_date, expired) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                params,
            )
            .map_err(query_error)?;

        Ok(record)
    }

    fn find_latest_by_trade_id(
        &self,
        trade_id: &str,
    ) -> Result<Option<TradeRecord>, TradeStoreError> {
        let sql =
            format!("{SELECT_COLUMNS} WHERE trade_id = $1 ORDER BY version DESC, seq DESC LIMIT 1");
        Ok(self.query_records(&sql, &[&trade_id])?.into_iter().next())
    }

    fn find_matured_unexpired(
        &self,
        as_of: NaiveDate,
    ) -> Result<Vec<TradeRecord>, TradeStoreError> {
        let sql =
            format!("{SELECT_COLUMNS} WHERE expired = 'N' AND maturity_date < $1 ORDER BY seq ASC");
        self.query_records(&sql, &[&as_of])
    }

    fn update(&self, record: &TradeRecord) -> Result<(), TradeStoreError> {
        let id = record.id.as_uuid();
        let expired = expired_flag(record.expired);
        let changed = self
            .conn()?
            .execute(
                "UPDATE public.trades SET expired = $1 WHERE id = $2",
                &[&expired, &id],
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
        let sql = format!("{SELECT_COLUMNS} WHERE trade_id = $1 ORDER BY version ASC, seq ASC");
        self.query_records(&sql, &[&trade_id])
    }
}

fn map_row(row: &postgres::Row) -> Result<TradeRecord, TradeStoreError> {
    let id: Uuid = row.get(0);
    let expired: String = row.get(7);
    let expired = parse_expired_flag(&expired).ok_or_else(|| TradeStoreError::DatabaseQuery {
        reason: format!("bad expired flag '{expired}'"),
    })?;
    Ok(TradeRecord {
        id: RecordId::from(id),
        trade_id: row.get(1),
        version: row.get(2),
        counter_party_id: row.get(3),
        book_id: row.get(4),
        maturity_date: row.get(5),
        created_date: row.get(6),
        expired,
    })
}

fn query_error(e: postgres::Error) -> TradeStoreError {
    TradeStoreError::DatabaseQuery {
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_rejects_malformed_connection_string() {
        match PostgresTradeStore::connect("host=localhost port=not-a-port", 1) {
            Err(TradeStoreError::Database { .. }) => {}
            Err(other) => panic!("expected Database error, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }
}
