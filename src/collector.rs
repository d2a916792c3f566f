//! # Feature: Message Collector
//!
//! Periodic sweep that deletes messages older than their chat's timeout.

use crate::config_store::ConfigStore;
use crate::messenger::{DeleteOutcome, Messenger};
use crate::models::MessageRecord;
use crate::registry::MessageRegistry;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Counters for one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub outdated: usize,
    pub evicted: usize,
    /// Outdated records kept because the remote delete failed
    pub retained: usize,
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scanned {}, outdated {}, evicted {}, retained {}",
            self.scanned, self.outdated, self.evicted, self.retained
        )
    }
}

/// Delete a message remotely and drop its record once the platform confirms it is gone.
/// Returns whether the record was evicted.
pub async fn evict(
    messenger: &dyn Messenger,
    registry: &MessageRegistry,
    record: &MessageRecord,
) -> bool {
    let outcome = messenger
        .delete_message(record.chat_id, record.message_id)
        .await;

    match &outcome {
        DeleteOutcome::Deleted => {}
        DeleteOutcome::NotFound => debug!("Message {record} already gone"),
        DeleteOutcome::Failed(reason) => error!("Failed to delete message {record}: {reason}"),
    }

    if !outcome.is_gone() {
        return false;
    }

    match registry
        .delete_record(record.chat_id, record.message_id)
        .await
    {
        Ok(()) => true,
        Err(e) => {
            error!("{e:#}");
            false
        }
    }
}

pub struct Collector {
    configs: ConfigStore,
    registry: MessageRegistry,
    messenger: Arc<dyn Messenger>,
    interval: Duration,
}

impl Collector {
    pub fn new(
        configs: ConfigStore,
        registry: MessageRegistry,
        messenger: Arc<dyn Messenger>,
        interval: Duration,
    ) -> Self {
        Collector {
            configs,
            registry,
            messenger,
            interval,
        }
    }

    /// Sweep forever, sleeping `interval` between runs
    pub async fn run(self) {
        info!("Collector started, sweeping every {}s", self.interval.as_secs());

        loop {
            let report = self.sweep(Utc::now().timestamp()).await;
            if report.outdated > 0 {
                info!("Sweep finished: {report}");
            } else {
                debug!("Sweep finished: {report}");
            }

            tokio::time::sleep(self.interval).await;
        }
    }

    /// One pass over every tracked message, as of `now` (unix seconds)
    pub async fn sweep(&self, now: i64) -> SweepReport {
        let mut report = SweepReport::default();

        let configs = self.configs.snapshot().await;
        if configs.is_empty() {
            return report;
        }

        let records = match self.registry.list_all(&configs).await {
            Ok(records) => records,
            Err(e) => {
                error!("Sweep aborted: {e:#}");
                return report;
            }
        };
        report.scanned = records.len();

        for (record, config) in records {
            if !record.is_outdated(&config, now) {
                continue;
            }
            report.outdated += 1;

            if evict(self.messenger.as_ref(), &self.registry, &record).await {
                report.evicted += 1;
            } else {
                warn!("Keeping message {record} for the next sweep");
                report.retained += 1;
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::messenger::MockMessenger;
    use mockall::predicate::eq;

    const NOW: i64 = 1_700_000_000;

    async fn setup(timeout: u64) -> (ConfigStore, MessageRegistry) {
        let db = Arc::new(Database::new(":memory:").await.unwrap());
        let configs = ConfigStore::new(db.clone(), 604800);
        configs.create(1, "chat", 3600).await.unwrap();
        configs.change_timeout(1, timeout).await.unwrap();
        (configs, MessageRegistry::new(db))
    }

    fn collector(
        configs: &ConfigStore,
        registry: &MessageRegistry,
        messenger: MockMessenger,
    ) -> Collector {
        Collector::new(
            configs.clone(),
            registry.clone(),
            Arc::new(messenger),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_outdated_record_deleted_once() {
        let (configs, registry) = setup(60).await;
        registry.record_message(1, 10, NOW - 61).await.unwrap();
        registry.record_message(1, 11, NOW - 59).await.unwrap();

        let mut messenger = MockMessenger::new();
        messenger
            .expect_delete_message()
            .with(eq(1), eq(10))
            .times(1)
            .returning(|_, _| DeleteOutcome::Deleted);

        let report = collector(&configs, &registry, messenger).sweep(NOW).await;
        assert_eq!(
            report,
            SweepReport {
                scanned: 2,
                outdated: 1,
                evicted: 1,
                retained: 0
            }
        );

        let left = registry.list_by_chat(1).await.unwrap();
        assert_eq!(left, vec![MessageRecord::new(1, 11, NOW - 59)]);
    }

    #[tokio::test]
    async fn test_mixed_ages_single_outdated() {
        let (configs, registry) = setup(3600).await;
        registry.record_message(1, 1, NOW - 10).await.unwrap();
        registry.record_message(1, 2, NOW - 3700).await.unwrap();
        registry.record_message(1, 3, NOW - 5).await.unwrap();

        let mut messenger = MockMessenger::new();
        messenger
            .expect_delete_message()
            .with(eq(1), eq(2))
            .times(1)
            .returning(|_, _| DeleteOutcome::NotFound);

        let report = collector(&configs, &registry, messenger).sweep(NOW).await;
        assert_eq!(report.outdated, 1);
        assert_eq!(report.evicted, 1);
        assert_eq!(registry.list_by_chat(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_record() {
        let (configs, registry) = setup(60).await;
        registry.record_message(1, 10, NOW - 120).await.unwrap();
        registry.record_message(1, 11, NOW - 120).await.unwrap();

        let mut messenger = MockMessenger::new();
        messenger
            .expect_delete_message()
            .with(eq(1), eq(10))
            .times(1)
            .returning(|_, _| DeleteOutcome::Failed("HTTP 500".to_string()));
        messenger
            .expect_delete_message()
            .with(eq(1), eq(11))
            .times(1)
            .returning(|_, _| DeleteOutcome::Deleted);

        let report = collector(&configs, &registry, messenger).sweep(NOW).await;
        assert_eq!(report.evicted, 1);
        assert_eq!(report.retained, 1);
        assert_eq!(
            registry.list_by_chat(1).await.unwrap(),
            vec![MessageRecord::new(1, 10, NOW - 120)]
        );
    }

    #[tokio::test]
    async fn test_orphans_and_empty_set_are_skipped() {
        let db = Arc::new(Database::new(":memory:").await.unwrap());
        let configs = ConfigStore::new(db.clone(), 604800);
        let registry = MessageRegistry::new(db);
        registry.record_message(2, 20, NOW - 100_000).await.unwrap();

        let mut messenger = MockMessenger::new();
        messenger.expect_delete_message().never();
        let collector = collector(&configs, &registry, messenger);

        assert_eq!(collector.sweep(NOW).await, SweepReport::default());

        configs.create(1, "other", 3600).await.unwrap();
        let report = collector.sweep(NOW).await;
        assert_eq!(report.scanned, 0);
        assert_eq!(registry.list_by_chat(2).await.unwrap().len(), 1);
    }
}
