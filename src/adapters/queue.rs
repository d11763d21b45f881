//! In-process trade queue.
//!
//! Submissions are routed to one of N bounded partitions by a hash of their
//! trade id, so all versions of one trade are consumed in publish order by the
//! same worker. Consumers log every outcome and drop failures: there is no
//! retry and no dead-letter queue.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::task::JoinHandle;

use crate::domain::admission::TradeAdmission;
use crate::domain::error::TradeStoreError;
use crate::domain::settings::QueueSettings;
use crate::domain::trade::{TradeSubmission, TradeView};
use crate::domain::validation::validate_submission;
use crate::ports::publisher_port::TradePublisherPort;

#[derive(Clone)]
pub struct ChannelPublisher {
    partitions: Vec<Sender<TradeSubmission>>,
}

/// Builds the publisher and one receiver per partition.
pub fn channel(settings: &QueueSettings) -> (ChannelPublisher, Vec<Receiver<TradeSubmission>>) {
    let (senders, receivers): (Vec<_>, Vec<_>) = (0..settings.partitions.max(1))
        .map(|_| mpsc::channel(settings.capacity.max(1)))
        .unzip();
    (ChannelPublisher { partitions: senders }, receivers)
}

pub fn partition_for(trade_id: &str, partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    trade_id.hash(&mut hasher);
    (hasher.finish() % partitions.max(1) as u64) as usize
}

impl TradePublisherPort for ChannelPublisher {
    fn publish(&self, submission: TradeSubmission) -> Result<(), TradeStoreError> {
        let partition = partition_for(&submission.trade_id, self.partitions.len());
        let trade_id = submission.trade_id.clone();

        self.partitions[partition]
            .try_send(submission)
            .map_err(|e| match e {
                TrySendError::Full(_) => TradeStoreError::QueueUnavailable {
                    reason: format!("partition {partition} is full"),
                },
                TrySendError::Closed(_) => TradeStoreError::QueueUnavailable {
                    reason: "queue is closed".to_string(),
                },
            })?;

        tracing::debug!(trade_id = %trade_id, partition, "trade queued");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: usize,
    pub admitted: usize,
    pub rejected: usize,
    pub failed: usize,
}

/// Validates and admits one dequeued submission.
pub fn process_submission(
    admission: &TradeAdmission,
    submission: &TradeSubmission,
) -> Result<TradeView, TradeStoreError> {
    validate_submission(submission)?;
    admission.admit(submission)
}

pub fn spawn_consumers(
    receivers: Vec<Receiver<TradeSubmission>>,
    admission: Arc<TradeAdmission>,
) -> Vec<JoinHandle<ConsumerStats>> {
    receivers
        .into_iter()
        .enumerate()
        .map(|(partition, rx)| tokio::spawn(consume(partition, rx, Arc::clone(&admission))))
        .collect()
}

/// Drains one partition until every publisher is dropped.
pub async fn consume(
    partition: usize,
    mut rx: Receiver<TradeSubmission>,
    admission: Arc<TradeAdmission>,
) -> ConsumerStats {
    let mut stats = ConsumerStats::default();

    while let Some(submission) = rx.recv().await {
        stats.received += 1;
        tracing::info!(
            trade_id = %submission.trade_id,
            version = submission.version,
            partition,
            "received trade from queue"
        );

        let admission = Arc::clone(&admission);
        let trade_id = submission.trade_id.clone();
        let outcome =
            tokio::task::spawn_blocking(move || process_submission(&admission, &submission)).await;

        match outcome {
            Ok(Ok(_)) => stats.admitted += 1,
            Ok(Err(e)) if e.is_rejection() || matches!(e, TradeStoreError::Validation { .. }) => {
                stats.rejected += 1;
                tracing::warn!(trade_id = %trade_id, partition, error = %e, "queued trade rejected");
            }
            Ok(Err(e)) => {
                stats.failed += 1;
                tracing::error!(trade_id = %trade_id, partition, error = %e, "failed to save queued trade");
            }
            Err(e) => {
                stats.failed += 1;
                tracing::error!(trade_id = %trade_id, partition, error = %e, "queued trade worker panicked");
            }
        }
    }

    tracing::info!(
        partition,
        received = stats.received,
        admitted = stats.admitted,
        rejected = stats.rejected,
        failed = stats.failed,
        "queue consumer stopped"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::InMemoryTradeStore;
    use crate::ports::clock_port::FixedClock;
    use crate::ports::trade_store_port::TradeStorePort;
    use chrono::{Duration, NaiveDate};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 15).unwrap()
    }

    fn submission(trade_id: &str, version: i64, offset_days: i64) -> TradeSubmission {
        TradeSubmission {
            trade_id: trade_id.to_string(),
            version,
            counter_party_id: format!("CP-{trade_id}"),
            book_id: "B1".to_string(),
            maturity_date: today() + Duration::days(offset_days),
        }
    }

    fn admission(store: Arc<InMemoryTradeStore>) -> Arc<TradeAdmission> {
        Arc::new(TradeAdmission::new(store, Arc::new(FixedClock(today()))))
    }

    fn total(stats: &[ConsumerStats]) -> ConsumerStats {
        stats.iter().fold(ConsumerStats::default(), |acc, s| ConsumerStats {
            received: acc.received + s.received,
            admitted: acc.admitted + s.admitted,
            rejected: acc.rejected + s.rejected,
            failed: acc.failed + s.failed,
        })
    }

    #[test]
    fn partition_is_stable_per_trade_id() {
        let p = partition_for("T42", 4);
        assert!(p < 4);
        assert_eq!(partition_for("T42", 4), p);
        assert_eq!(partition_for("anything", 1), 0);
    }

    #[tokio::test]
    async fn consumers_admit_every_queued_trade() {
        let store = Arc::new(InMemoryTradeStore::new());
        let (publisher, receivers) = channel(&QueueSettings {
            capacity: 128,
            partitions: 3,
        });
        let handles = spawn_consumers(receivers, admission(store.clone()));

        for i in 1..=100 {
            publisher.publish(submission(&format!("T{i}"), 1, i)).unwrap();
        }
        drop(publisher);

        let mut stats = Vec::new();
        for handle in handles {
            stats.push(handle.await.unwrap());
        }
        let total = total(&stats);
        assert_eq!(total.received, 100);
        assert_eq!(total.admitted, 100);
        assert_eq!(store.len(), 100);
    }

    #[tokio::test]
    async fn rejections_are_logged_and_dropped() {
        let store = Arc::new(InMemoryTradeStore::new());
        let (publisher, receivers) = channel(&QueueSettings {
            capacity: 16,
            partitions: 2,
        });
        let handles = spawn_consumers(receivers, admission(store.clone()));

        publisher.publish(submission("T2", 2, 10)).unwrap();
        publisher.publish(submission("T2", 1, 10)).unwrap();
        publisher.publish(submission("T3", 3, -1)).unwrap();
        publisher.publish(submission("", 1, 10)).unwrap();
        drop(publisher);

        let mut stats = Vec::new();
        for handle in handles {
            stats.push(handle.await.unwrap());
        }
        let total = total(&stats);
        assert_eq!(total.received, 4);
        assert_eq!(total.admitted, 1);
        assert_eq!(total.rejected, 3);
        assert_eq!(store.find_by_trade_id("T2").unwrap().len(), 1);
        assert!(store.find_by_trade_id("T3").unwrap().is_empty());
    }

    #[tokio::test]
    async fn full_partition_reports_unavailable() {
        let (publisher, _receivers) = channel(&QueueSettings {
            capacity: 1,
            partitions: 1,
        });
        publisher.publish(submission("T1", 1, 1)).unwrap();
        match publisher.publish(submission("T1", 2, 1)) {
            Err(TradeStoreError::QueueUnavailable { reason }) => assert!(reason.contains("full")),
            other => panic!("expected QueueUnavailable, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_queue_reports_unavailable() {
        let (publisher, receivers) = channel(&QueueSettings {
            capacity: 4,
            partitions: 1,
        });
        drop(receivers);
        assert!(matches!(
            publisher.publish(submission("T1", 1, 1)),
            Err(TradeStoreError::QueueUnavailable { .. })
        ));
    }
}
