//! Partition topology types and deterministic partition resolution
//!
//! A queue is a named, partitioned channel scoped to a tenant and service
//! type. These types identify a queue (`QueueKey`) and one consumable shard
//! of it (`TopicPartitionInfo`); `resolver` maps message originators onto
//! partitions.

mod resolver;

pub use resolver::{all_partitions, partition_index, PartitionResolver};

use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{Display, EnumString};

/// Service type owning a set of queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum ServiceType {
    RuleEngine,
    Core,
}

/// Tenant identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The system tenant owning non-isolated queues
    pub fn system() -> Self {
        Self("system".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a queue within a service type and tenant scope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueKey {
    pub service_type: ServiceType,
    pub tenant_id: TenantId,
    pub queue_name: String,
}

impl QueueKey {
    pub fn new(service_type: ServiceType, tenant_id: TenantId, queue_name: impl Into<String>) -> Self {
        Self {
            service_type,
            tenant_id,
            queue_name: queue_name.into(),
        }
    }

    /// Identifier of the stats entity that time-series points for this
    /// queue are written against
    pub fn stats_entity_id(&self) -> String {
        format!("{}.{}.{}", self.service_type, self.tenant_id, self.queue_name)
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.service_type, self.tenant_id, self.queue_name)
    }
}

/// One independently consumable shard of a queue's message stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPartitionInfo {
    pub topic: String,
    pub tenant_id: TenantId,
    pub partition: Option<u32>,
}

impl TopicPartitionInfo {
    pub fn new(topic: impl Into<String>, tenant_id: TenantId, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            tenant_id,
            partition: Some(partition),
        }
    }

    /// Topic name as seen by the transport, partition suffix included
    pub fn full_topic_name(&self) -> String {
        match self.partition {
            Some(partition) => format!("{}.{}", self.topic, partition),
            None => self.topic.clone(),
        }
    }
}

impl fmt::Display for TopicPartitionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_topic_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_topic_name_includes_partition() {
        let tpi = TopicPartitionInfo::new("pf_rule_engine.main", TenantId::system(), 3);
        assert_eq!(tpi.full_topic_name(), "pf_rule_engine.main.3");
    }

    #[test]
    fn test_queue_key_display_and_stats_entity() {
        let key = QueueKey::new(ServiceType::RuleEngine, TenantId::new("t1"), "Main");
        assert_eq!(key.to_string(), "RuleEngine|t1|Main");
        assert_eq!(key.stats_entity_id(), "RuleEngine.t1.Main");
    }

    #[test]
    fn test_service_type_round_trip() {
        use std::str::FromStr;
        assert_eq!(ServiceType::from_str("RuleEngine").unwrap(), ServiceType::RuleEngine);
        assert_eq!(ServiceType::Core.to_string(), "Core");
    }
}
