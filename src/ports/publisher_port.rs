//! Queued intake port trait.

use crate::domain::error::TradeStoreError;
use crate::domain::trade::TradeSubmission;

/// Hands a submission to the queue without waiting for it to be persisted.
pub trait TradePublisherPort {
    fn publish(&self, submission: TradeSubmission) -> Result<(), TradeStoreError>;
}
