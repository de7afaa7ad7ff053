//! Deterministic partition resolution
//!
//! Maps a `(service type, queue, tenant, entity key)` tuple onto partition
//! indices. Resolution reads one settings snapshot per call, so a partition
//! count change or a duplicate-mode toggle is observed atomically by the
//! next resolution, never half-applied within one.

use crate::config::{ConfigError, ConfigResult, QueueConfigStore, QueueSettings};
use crate::partition::{QueueKey, ServiceType, TenantId, TopicPartitionInfo};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Stable hash of (tenant, entity key) into `[0, partitions)`
///
/// SHA-256 over both identifiers, first 8 big-endian bytes modulo the
/// partition count. Any stable, reasonably uniform hash satisfies the
/// contract; this one is also cheap to reason about across versions.
pub fn partition_index(tenant_id: &TenantId, entity_key: &str, partitions: u32) -> u32 {
    debug_assert!(partitions > 0, "partition count validated at config time");
    let mut hasher = Sha256::new();
    hasher.update(tenant_id.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(entity_key.as_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % partitions as u64) as u32
}

/// Resolves messages onto queue partitions using the current config snapshot
pub struct PartitionResolver {
    store: Arc<QueueConfigStore>,
}

impl PartitionResolver {
    pub fn new(store: Arc<QueueConfigStore>) -> Self {
        Self { store }
    }

    /// Resolve the partition set for one message originator
    ///
    /// Returns a single partition in normal mode, or every partition of the
    /// queue when duplicate-to-all-partitions is enabled in the snapshot.
    pub fn resolve(
        &self,
        service_type: ServiceType,
        queue_name: &str,
        tenant_id: &TenantId,
        entity_key: &str,
    ) -> ConfigResult<Vec<TopicPartitionInfo>> {
        let key = QueueKey::new(service_type, tenant_id.clone(), queue_name);
        let settings = self.store.get(&key).ok_or_else(|| ConfigError::NotFound {
            name: queue_name.to_string(),
        })?;
        Ok(Self::resolve_with(settings.as_ref(), tenant_id, entity_key))
    }

    /// Resolve against an explicit settings snapshot
    pub fn resolve_with(
        settings: &QueueSettings,
        tenant_id: &TenantId,
        entity_key: &str,
    ) -> Vec<TopicPartitionInfo> {
        if settings.duplicate_msg_to_all_partitions() {
            all_partitions(settings, tenant_id)
        } else {
            let partition = partition_index(tenant_id, entity_key, settings.partitions);
            vec![TopicPartitionInfo::new(
                settings.topic.clone(),
                tenant_id.clone(),
                partition,
            )]
        }
    }
}

/// The full partition set `[0, partitions)` of a queue
pub fn all_partitions(settings: &QueueSettings, tenant_id: &TenantId) -> Vec<TopicPartitionInfo> {
    (0..settings.partitions)
        .map(|p| TopicPartitionInfo::new(settings.topic.clone(), tenant_id.clone(), p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProcessingSettings, QueueSettings, SubmitSettings};
    use std::collections::HashSet;

    fn settings(partitions: u32) -> QueueSettings {
        QueueSettings {
            name: "Main".to_string(),
            topic: "pf_rule_engine.main".to_string(),
            partitions,
            poll_interval_ms: 25,
            pack_processing_timeout_ms: 2000,
            consumer_per_partition: false,
            submit_strategy: SubmitSettings::burst(),
            processing_strategy: ProcessingSettings::skip_all_failures(),
            additional_info: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let tenant = TenantId::new("tenant-1");
        let first = partition_index(&tenant, "device-42", 10);
        for _ in 0..100 {
            assert_eq!(partition_index(&tenant, "device-42", 10), first);
        }
        assert!(first < 10);
    }

    #[test]
    fn test_resolution_spreads_entities() {
        let tenant = TenantId::new("tenant-1");
        let hit: HashSet<u32> = (0..1000)
            .map(|i| partition_index(&tenant, &format!("device-{}", i), 10))
            .collect();
        // 1000 distinct keys over 10 partitions should touch every one
        assert_eq!(hit.len(), 10);
    }

    #[test]
    fn test_single_partition_without_duplicate_mode() {
        let settings = settings(10);
        let tenant = TenantId::new("tenant-1");
        let resolved = PartitionResolver::resolve_with(&settings, &tenant, "device-1");
        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].partition.unwrap() < 10);
        assert_eq!(resolved[0].topic, "pf_rule_engine.main");
    }

    #[test]
    fn test_duplicate_mode_covers_every_partition_once() {
        let mut settings = settings(7);
        settings.set_duplicate_msg_to_all_partitions(true);
        let tenant = TenantId::new("tenant-1");

        let resolved = PartitionResolver::resolve_with(&settings, &tenant, "device-1");
        let partitions: HashSet<u32> = resolved.iter().map(|tpi| tpi.partition.unwrap()).collect();
        assert_eq!(resolved.len(), 7);
        assert_eq!(partitions, (0..7).collect());
    }

    #[test]
    fn test_toggle_observed_on_next_snapshot() {
        let store = Arc::new(QueueConfigStore::new());
        let tenant = TenantId::new("tenant-1");
        let mut initial = settings(5);
        initial.set_duplicate_msg_to_all_partitions(true);
        let (key, _) = store
            .create(ServiceType::RuleEngine, tenant.clone(), initial.clone())
            .unwrap();

        let resolver = PartitionResolver::new(store.clone());
        let resolved = resolver
            .resolve(ServiceType::RuleEngine, "Main", &tenant, "device-1")
            .unwrap();
        assert_eq!(resolved.len(), 5);

        let mut updated = initial;
        updated.set_duplicate_msg_to_all_partitions(false);
        store.update(&key, updated).unwrap();

        let resolved = resolver
            .resolve(ServiceType::RuleEngine, "Main", &tenant, "device-1")
            .unwrap();
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_unknown_queue_is_an_error() {
        let resolver = PartitionResolver::new(Arc::new(QueueConfigStore::new()));
        let err = resolver
            .resolve(ServiceType::RuleEngine, "Missing", &TenantId::system(), "x")
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }
}
