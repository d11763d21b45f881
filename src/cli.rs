//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::memory_store::InMemoryTradeStore;
use crate::domain::admission::{SharedClock, SharedStore, TradeAdmission};
use crate::domain::error::TradeStoreError;
use crate::domain::settings::{ServiceSettings, StoreBackend};
use crate::domain::sweeper::{ExpirationSweeper, SweepReport};
use crate::domain::trade::TradeSubmission;
use crate::domain::validation::validate_submission;
use crate::ports::clock_port::{FixedClock, SystemClock};

#[derive(Parser, Debug)]
#[command(name = "tradestore", about = "Versioned trade booking store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API, queue consumers and expiration schedule
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Create the trade schema for the configured SQL backend
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run one expiration sweep and print the report
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        /// Sweep as if today were this date (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Admit one trade directly
    Submit {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        trade_id: String,
        #[arg(long)]
        version: i64,
        #[arg(long)]
        counter_party_id: String,
        #[arg(long)]
        book_id: String,
        /// YYYY-MM-DD
        #[arg(long)]
        maturity_date: NaiveDate,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Serve { config } => run_serve(&config),
        Command::InitDb { config } => run_init_db(&config),
        Command::Sweep { config, as_of } => run_sweep(&config, as_of),
        Command::Submit {
            config,
            trade_id,
            version,
            counter_party_id,
            book_id,
            maturity_date,
        } => run_submit(
            &config,
            TradeSubmission {
                trade_id,
                version,
                counter_party_id,
                book_id,
                maturity_date,
            },
        ),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

pub fn load_settings(path: &PathBuf) -> Result<ServiceSettings, ExitCode> {
    let config = load_config(path)?;
    let settings = ServiceSettings::from_config(&config).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    init_logging(&settings.log_filter);
    Ok(settings)
}

/// Installs the fmt subscriber. `RUST_LOG` takes precedence over the configured filter.
pub fn init_logging(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Ignore the error when a subscriber is already installed (tests, repeated calls).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Opens the configured store, creating its schema when missing.
pub fn open_store(backend: &StoreBackend) -> Result<SharedStore, TradeStoreError> {
    match backend {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory trade store; records are lost on exit");
            Ok(Arc::new(InMemoryTradeStore::new()))
        }
        #[cfg(feature = "sqlite")]
        StoreBackend::Sqlite { path, pool_size } => {
            use crate::adapters::sqlite_adapter::SqliteTradeStore;

            let store = SqliteTradeStore::open(path, *pool_size)?;
            store.initialize_schema()?;
            tracing::info!(path = %path, pool_size, "opened sqlite trade store");
            Ok(Arc::new(store))
        }
        #[cfg(feature = "postgres")]
        StoreBackend::Postgres {
            connection_string,
            pool_size,
        } => {
            use crate::adapters::postgres_adapter::PostgresTradeStore;

            let store = PostgresTradeStore::connect(connection_string, *pool_size)?;
            store.initialize_schema()?;
            tracing::info!(pool_size, "opened postgres trade store");
            Ok(Arc::new(store))
        }
        #[allow(unreachable_patterns)]
        other => Err(TradeStoreError::ConfigInvalid {
            section: "store".into(),
            key: "backend".into(),
            reason: format!("{} support was not compiled in", other.name()),
        }),
    }
}

fn run_init_db(config_path: &PathBuf) -> ExitCode {
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    if settings.store == StoreBackend::Memory {
        eprintln!("memory backend has no schema to create");
        return ExitCode::SUCCESS;
    }

    match open_store(&settings.store) {
        Ok(_) => {
            eprintln!("Trade schema ready");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_sweep(config_path: &PathBuf, as_of: Option<NaiveDate>) -> ExitCode {
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    match sweep(&settings, as_of) {
        Ok(report) => {
            match serde_json::to_string(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("warning: could not render report: {e}"),
            }
            if report.failed > 0 {
                eprintln!("{} record(s) could not be expired", report.failed);
                ExitCode::from(3)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Runs one sweep against `as_of`, or the local date when absent.
pub fn sweep(
    settings: &ServiceSettings,
    as_of: Option<NaiveDate>,
) -> Result<SweepReport, TradeStoreError> {
    let store = open_store(&settings.store)?;
    let clock: SharedClock = match as_of {
        Some(date) => Arc::new(FixedClock(date)),
        None => Arc::new(SystemClock),
    };
    ExpirationSweeper::new(store, clock).sweep()
}

fn run_submit(config_path: &PathBuf, submission: TradeSubmission) -> ExitCode {
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    match submit(&settings, &submission) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Validates and admits one submission, returning the projection as JSON.
pub fn submit(
    settings: &ServiceSettings,
    submission: &TradeSubmission,
) -> Result<String, TradeStoreError> {
    validate_submission(submission)?;
    let store = open_store(&settings.store)?;
    let admission = TradeAdmission::new(store, Arc::new(SystemClock));
    let view = admission.admit(submission)?;
    serde_json::to_string(&view).map_err(|e| TradeStoreError::Io(e.into()))
}

fn run_serve(config_path: &PathBuf) -> ExitCode {
    #[cfg(feature = "web")]
    {
        let settings = match load_settings(config_path) {
            Ok(s) => s,
            Err(code) => return code,
        };

        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                eprintln!("error: failed to start runtime: {e}");
                return ExitCode::from(1);
            }
        };

        match runtime.block_on(serve(settings)) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {e}");
                (&e).into()
            }
        }
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        eprintln!("error: web feature is required for serve");
        ExitCode::from(1)
    }
}

#[cfg(feature = "web")]
pub async fn serve(settings: ServiceSettings) -> Result<(), TradeStoreError> {
    use crate::adapters::queue;
    use crate::adapters::scheduler::run_sweep_schedule;
    use crate::adapters::web::{AppState, build_router};
    use tokio::sync::watch;

    let backend = settings.store.clone();
    let store = tokio::task::spawn_blocking(move || open_store(&backend))
        .await
        .map_err(|e| TradeStoreError::Io(std::io::Error::other(e)))??;

    let clock: SharedClock = Arc::new(SystemClock);
    let admission = Arc::new(TradeAdmission::new(Arc::clone(&store), Arc::clone(&clock)));
    let sweeper = Arc::new(ExpirationSweeper::new(Arc::clone(&store), clock));

    let (publisher, receivers) = queue::channel(&settings.queue);
    let consumers = queue::spawn_consumers(receivers, Arc::clone(&admission));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let schedule = tokio::spawn(run_sweep_schedule(
        sweeper,
        settings.sweep.clone(),
        shutdown_rx,
    ));

    let router = build_router(AppState {
        admission,
        publisher: Arc::new(publisher),
        store,
    });

    let listener = tokio::net::TcpListener::bind(settings.listen).await?;
    tracing::info!(addr = %settings.listen, partitions = settings.queue.partitions, "tradestore listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown requested");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = schedule.await {
        tracing::error!(error = %e, "expiration schedule task failed");
    }

    // The router owned the only publisher; consumers drain what is left and stop.
    for consumer in consumers {
        if let Err(e) = consumer.await {
            tracing::error!(error = %e, "queue consumer task failed");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_submit_arguments() {
        let cli = Cli::try_parse_from([
            "tradestore",
            "submit",
            "--config",
            "service.ini",
            "--trade-id",
            "T1",
            "--version",
            "2",
            "--counter-party-id",
            "CP-1",
            "--book-id",
            "B1",
            "--maturity-date",
            "2030-05-20",
        ])
        .unwrap();

        match cli.command {
            Command::Submit {
                trade_id,
                version,
                maturity_date,
                ..
            } => {
                assert_eq!(trade_id, "T1");
                assert_eq!(version, 2);
                assert_eq!(maturity_date, NaiveDate::from_ymd_opt(2030, 5, 20).unwrap());
            }
            other => panic!("expected Submit, got: {other:?}"),
        }
    }

    #[test]
    fn parses_sweep_with_as_of() {
        let cli = Cli::try_parse_from([
            "tradestore",
            "sweep",
            "-c",
            "service.ini",
            "--as-of",
            "2025-07-15",
        ])
        .unwrap();
        match cli.command {
            Command::Sweep { as_of, .. } => {
                assert_eq!(as_of, NaiveDate::from_ymd_opt(2025, 7, 15));
            }
            other => panic!("expected Sweep, got: {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_maturity_date() {
        let result = Cli::try_parse_from([
            "tradestore",
            "submit",
            "-c",
            "service.ini",
            "--trade-id",
            "T1",
            "--version",
            "1",
            "--counter-party-id",
            "CP-1",
            "--book-id",
            "B1",
            "--maturity-date",
            "20-05-2030",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn open_memory_store() {
        assert!(open_store(&StoreBackend::Memory).is_ok());
    }

    #[cfg(not(feature = "postgres"))]
    #[test]
    fn missing_backend_error_hides_connection_string() {
        let backend = StoreBackend::Postgres {
            connection_string: "host=db user=trader password=hunter2".into(),
            pool_size: 1,
        };
        match open_store(&backend) {
            Err(e @ TradeStoreError::ConfigInvalid { .. }) => {
                let message = e.to_string();
                assert!(message.contains("postgres support was not compiled in"));
                assert!(!message.contains("hunter2"));
            }
            Err(other) => panic!("expected ConfigInvalid, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }
}
