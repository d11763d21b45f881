//! Service settings, validated from the INI configuration.

use crate::domain::error::TradeStoreError;
use crate::ports::config_port::ConfigPort;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_QUEUE_PARTITIONS: usize = 4;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u32 = 3600;
pub const DEFAULT_POOL_SIZE: u32 = 4;

#[derive(Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite { path: String, pool_size: u32 },
    Postgres {
        connection_string: String,
        pool_size: u32,
    },
}

impl StoreBackend {
    /// The `[store] backend` value that selects this variant.
    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Sqlite { .. } => "sqlite",
            StoreBackend::Postgres { .. } => "postgres",
        }
    }
}

// Connection strings carry credentials.
impl std::fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Memory => f.write_str("Memory"),
            StoreBackend::Sqlite { path, pool_size } => f
                .debug_struct("Sqlite")
                .field("path", path)
                .field("pool_size", pool_size)
                .finish(),
            StoreBackend::Postgres { pool_size, .. } => f
                .debug_struct("Postgres")
                .field("connection_string", &"<redacted>")
                .field("pool_size", pool_size)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub capacity: usize,
    pub partitions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSettings {
    pub interval: Duration,
    pub run_on_start: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub store: StoreBackend,
    pub listen: SocketAddr,
    pub queue: QueueSettings,
    pub sweep: SweepSettings,
    pub log_filter: String,
}

impl ServiceSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradeStoreError> {
        Ok(Self {
            store: store_backend(config)?,
            listen: listen_addr(config)?,
            queue: QueueSettings {
                capacity: config.get_positive_usize("queue", "capacity", DEFAULT_QUEUE_CAPACITY)?,
                partitions: config.get_positive_usize(
                    "queue",
                    "partitions",
                    DEFAULT_QUEUE_PARTITIONS,
                )?,
            },
            sweep: SweepSettings {
                interval: Duration::from_secs(u64::from(config.get_positive_u32(
                    "sweeper",
                    "interval_secs",
                    DEFAULT_SWEEP_INTERVAL_SECS,
                )?)),
                run_on_start: config.get_bool("sweeper", "run_on_start", false),
            },
            log_filter: config
                .get_string("logging", "filter")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "info".to_string()),
        })
    }
}

pub fn store_backend(config: &dyn ConfigPort) -> Result<StoreBackend, TradeStoreError> {
    let backend = config
        .get_string("store", "backend")
        .unwrap_or_else(|| "memory".to_string())
        .trim()
        .to_lowercase();

    match backend.as_str() {
        "memory" => Ok(StoreBackend::Memory),
        "sqlite" => {
            let path = config
                .get_string("sqlite", "path")
                .ok_or_else(|| TradeStoreError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;
            let pool_size = config.get_positive_u32("sqlite", "pool_size", DEFAULT_POOL_SIZE)?;
            Ok(StoreBackend::Sqlite { path, pool_size })
        }
        "postgres" => {
            let connection_string = config
                .get_string("postgres", "connection_string")
                .ok_or_else(|| TradeStoreError::ConfigMissing {
                    section: "postgres".into(),
                    key: "connection_string".into(),
                })?;
            let pool_size = config.get_positive_u32("postgres", "pool_size", DEFAULT_POOL_SIZE)?;
            Ok(StoreBackend::Postgres {
                connection_string,
                pool_size,
            })
        }
        other => Err(TradeStoreError::ConfigInvalid {
            section: "store".into(),
            key: "backend".into(),
            reason: format!("unknown backend '{other}' (expected memory, sqlite or postgres)"),
        }),
    }
}

fn listen_addr(config: &dyn ConfigPort) -> Result<SocketAddr, TradeStoreError> {
    let raw = config
        .get_string("web", "listen")
        .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
    raw.trim()
        .parse()
        .map_err(|_| TradeStoreError::ConfigInvalid {
            section: "web".into(),
            key: "listen".into(),
            reason: format!("'{raw}' is not a socket address"),
        })
}
