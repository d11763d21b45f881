//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for tradestore.
#[derive(Debug, thiserror::Error)]
pub enum TradeStoreError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("trade rejected: maturity date {maturity_date} is in the past (today is {today})")]
    PastMaturity {
        trade_id: String,
        maturity_date: NaiveDate,
        today: NaiveDate,
    },

    #[error("trade rejected: lower version received for {trade_id} (got {submitted}, latest is {latest})")]
    StaleVersion {
        trade_id: String,
        submitted: i64,
        latest: i64,
    },

    #[error("trade record {id} not found")]
    RecordNotFound { id: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("trade queue unavailable: {reason}")]
    QueueUnavailable { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TradeStoreError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Business-rule rejections. These are terminal: the submission is
    /// reported back (or logged) and never retried.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TradeStoreError::PastMaturity { .. } | TradeStoreError::StaleVersion { .. }
        )
    }
}

impl From<&TradeStoreError> for std::process::ExitCode {
    fn from(err: &TradeStoreError) -> Self {
        let code: u8 = match err {
            TradeStoreError::Io(_) | TradeStoreError::QueueUnavailable { .. } => 1,
            TradeStoreError::ConfigParse { .. }
            | TradeStoreError::ConfigMissing { .. }
            | TradeStoreError::ConfigInvalid { .. } => 2,
            TradeStoreError::Database { .. }
            | TradeStoreError::DatabaseQuery { .. }
            | TradeStoreError::RecordNotFound { .. } => 3,
            TradeStoreError::Validation { .. } => 4,
            TradeStoreError::PastMaturity { .. } | TradeStoreError::StaleVersion { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
