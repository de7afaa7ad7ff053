//! Consumer topology lifecycle under control-plane events

use super::{test_settings, RecordingAdmin, ScriptedFactory, SuccessHandler};
use crate::core::sync::lock;
use crate::engine::manager::{ManagerEvent, QueueConsumerManager};
use crate::partition::{QueueKey, ServiceType, TenantId, TopicPartitionInfo};
use crate::stats::{ConsumerStats, DEFAULT_MAX_EXCEPTION_LEN};
use std::sync::Arc;

struct Fixture {
    manager: Arc<QueueConsumerManager>,
    factory: Arc<ScriptedFactory>,
    admin: Arc<RecordingAdmin>,
}

fn fixture(partitions: u32, consumer_per_partition: bool) -> Fixture {
    let factory = Arc::new(ScriptedFactory::default());
    let admin = Arc::new(RecordingAdmin::default());
    let manager = QueueConsumerManager::new(
        QueueKey::new(ServiceType::RuleEngine, TenantId::new("t1"), "Main"),
        Arc::new(test_settings(partitions, consumer_per_partition)),
        factory.clone(),
        Arc::new(SuccessHandler::default()),
        admin.clone(),
        Arc::new(ConsumerStats::new(DEFAULT_MAX_EXCEPTION_LEN)),
    );
    Fixture {
        manager,
        factory,
        admin,
    }
}

fn tpis(indices: &[u32]) -> Vec<TopicPartitionInfo> {
    indices
        .iter()
        .map(|&p| TopicPartitionInfo::new("pf_rule_engine.main", TenantId::new("t1"), p))
        .collect()
}

#[tokio::test]
async fn test_per_partition_mode_starts_one_consumer_per_partition() {
    let f = fixture(3, true);
    f.manager.enqueue(ManagerEvent::PartitionChange {
        partitions: tpis(&[0, 1, 2]),
    });
    f.manager.drain_events().await;

    assert_eq!(f.manager.consumer_count().await, 3);
    assert_eq!(f.factory.created_count(), 3);
    for state in lock(&f.factory.created).iter() {
        assert_eq!(state.last_subscription().len(), 1);
    }
}

#[tokio::test]
async fn test_single_mode_starts_one_consumer_for_all_partitions() {
    let f = fixture(3, false);
    f.manager.enqueue(ManagerEvent::PartitionChange {
        partitions: tpis(&[0, 1, 2]),
    });
    f.manager.drain_events().await;

    assert_eq!(f.manager.consumer_count().await, 1);
    assert_eq!(f.factory.created_count(), 1);
    assert_eq!(lock(&f.factory.created)[0].last_subscription().len(), 3);
}

#[tokio::test]
async fn test_single_mode_resubscribes_on_partition_change() {
    let f = fixture(3, false);
    f.manager.enqueue(ManagerEvent::PartitionChange {
        partitions: tpis(&[0, 1, 2]),
    });
    f.manager.drain_events().await;
    f.manager.enqueue(ManagerEvent::PartitionChange {
        partitions: tpis(&[0, 1]),
    });
    f.manager.drain_events().await;

    // Same consumer, new subscription
    assert_eq!(f.factory.created_count(), 1);
    assert_eq!(f.manager.consumer_count().await, 1);
    assert_eq!(lock(&f.factory.created)[0].last_subscription().len(), 2);
}

#[tokio::test]
async fn test_per_partition_diff_stops_removed_and_starts_added() {
    let f = fixture(4, true);
    f.manager.enqueue(ManagerEvent::PartitionChange {
        partitions: tpis(&[0, 1, 2]),
    });
    f.manager.drain_events().await;
    f.manager.enqueue(ManagerEvent::PartitionChange {
        partitions: tpis(&[1, 2, 3]),
    });
    f.manager.drain_events().await;

    assert_eq!(f.manager.consumer_count().await, 3);
    // 3 initial + 1 for the added partition; the kept ones were not restarted
    assert_eq!(f.factory.created_count(), 4);
    let created = lock(&f.factory.created);
    assert!(created[0].unsubscribed.load(std::sync::atomic::Ordering::Acquire));
    assert!(!created[1].unsubscribed.load(std::sync::atomic::Ordering::Acquire));
}

#[tokio::test]
async fn test_settings_update_without_mode_flip_keeps_consumers() {
    let f = fixture(2, false);
    f.manager.enqueue(ManagerEvent::PartitionChange {
        partitions: tpis(&[0, 1]),
    });
    f.manager.drain_events().await;

    let mut updated = test_settings(2, false);
    updated.poll_interval_ms = 500;
    f.manager.enqueue(ManagerEvent::ConfigUpdate { settings: updated });
    f.manager.drain_events().await;

    assert_eq!(f.factory.created_count(), 1);
    assert_eq!(f.manager.consumer_count().await, 1);
    assert_eq!(f.manager.config().poll_interval_ms, 500);
}

#[tokio::test]
async fn test_mode_flip_restarts_topology() {
    let f = fixture(3, false);
    f.manager.enqueue(ManagerEvent::PartitionChange {
        partitions: tpis(&[0, 1, 2]),
    });
    f.manager.drain_events().await;
    assert_eq!(f.manager.consumer_count().await, 1);

    f.manager.enqueue(ManagerEvent::ConfigUpdate {
        settings: test_settings(3, true),
    });
    f.manager.drain_events().await;

    assert_eq!(f.manager.consumer_count().await, 3);
    assert_eq!(f.factory.created_count(), 4);
    assert!(lock(&f.factory.created)[0]
        .unsubscribed
        .load(std::sync::atomic::Ordering::Acquire));
}

#[tokio::test]
async fn test_queued_events_apply_in_order_in_one_drain() {
    let f = fixture(4, true);
    // All queued before any is applied; one processing run works through
    // the whole backlog, stopping and starting tasks between pops.
    f.manager.enqueue(ManagerEvent::PartitionChange {
        partitions: tpis(&[0, 1, 2, 3]),
    });
    f.manager.enqueue(ManagerEvent::PartitionChange {
        partitions: tpis(&[0, 1]),
    });
    let mut updated = test_settings(4, true);
    updated.poll_interval_ms = 250;
    f.manager.enqueue(ManagerEvent::ConfigUpdate { settings: updated });
    f.manager.drain_events().await;

    assert_eq!(f.manager.consumer_count().await, 2);
    assert_eq!(f.manager.config().poll_interval_ms, 250);
}

#[tokio::test]
async fn test_stop_drains_and_ignores_later_events() {
    let f = fixture(2, true);
    f.manager.enqueue(ManagerEvent::PartitionChange {
        partitions: tpis(&[0, 1]),
    });
    f.manager.drain_events().await;

    f.manager.enqueue(ManagerEvent::Stop);
    f.manager.drain_events().await;
    assert_eq!(f.manager.consumer_count().await, 0);

    f.manager.enqueue(ManagerEvent::PartitionChange {
        partitions: tpis(&[0, 1]),
    });
    f.manager.drain_events().await;
    assert_eq!(f.manager.consumer_count().await, 0);
    assert_eq!(f.factory.created_count(), 2);
}

#[tokio::test]
async fn test_delete_stops_consumers_and_removes_topic() {
    let f = fixture(2, false);
    f.manager.enqueue(ManagerEvent::PartitionChange {
        partitions: tpis(&[0, 1]),
    });
    f.manager.drain_events().await;

    f.manager.enqueue(ManagerEvent::Delete);
    f.manager.drain_events().await;

    assert_eq!(f.manager.consumer_count().await, 0);
    assert_eq!(
        *lock(&f.admin.deleted),
        vec!["pf_rule_engine.main".to_string()]
    );
}
