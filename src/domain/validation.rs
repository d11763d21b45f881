//! Structural checks on a submission, run by the intake adapters before admission.

use chrono::Datelike;

use crate::domain::error::TradeStoreError;
use crate::domain::trade::{STORABLE_YEARS, TradeSubmission};

pub fn validate_submission(submission: &TradeSubmission) -> Result<(), TradeStoreError> {
    require_non_blank("tradeId", &submission.trade_id)?;
    if submission.version < 1 {
        return Err(TradeStoreError::validation(
            "version",
            "version must be at least 1",
        ));
    }
    require_non_blank("counterPartyId", &submission.counter_party_id)?;
    require_non_blank("bookId", &submission.book_id)?;
    if !STORABLE_YEARS.contains(&submission.maturity_date.year()) {
        return Err(TradeStoreError::validation(
            "maturityDate",
            format!(
                "year must be between {} and {}",
                STORABLE_YEARS.start(),
                STORABLE_YEARS.end()
            ),
        ));
    }
    Ok(())
}

fn require_non_blank(field: &str, value: &str) -> Result<(), TradeStoreError> {
    if value.trim().is_empty() {
        return Err(TradeStoreError::validation(field, "must not be blank"));
    }
    Ok(())
}
