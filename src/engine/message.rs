//! Message envelope and per-pack processing outcome

use crate::partition::{TenantId, TopicPartitionInfo};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static DELIVERY_SEQ: AtomicU64 = AtomicU64::new(1);
static CORRELATION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Unique identity of one delivery attempt of a message
///
/// Duplicating a message to several partitions produces several envelopes,
/// each with its own delivery id, sharing one correlation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryId(u64);

impl DeliveryId {
    pub fn next() -> Self {
        Self(DELIVERY_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared identity across all duplicated copies of one logical message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub fn next() -> Self {
        Self(CORRELATION_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One message as handed to the processing pipeline
#[derive(Debug, Clone)]
pub struct MsgEnvelope {
    pub id: DeliveryId,
    pub correlation_id: CorrelationId,
    pub tenant_id: TenantId,
    /// Originator entity key, the input to partition resolution
    pub originator: String,
    pub msg_type: String,
    /// Partition this delivery was resolved onto, if already assigned
    pub partition: Option<u32>,
    pub payload: String,
}

impl MsgEnvelope {
    pub fn new(
        tenant_id: TenantId,
        originator: impl Into<String>,
        msg_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id: DeliveryId::next(),
            correlation_id: CorrelationId::next(),
            tenant_id,
            originator: originator.into(),
            msg_type: msg_type.into(),
            partition: None,
            payload: payload.into(),
        }
    }

    /// Fan this message out to a resolved partition set
    ///
    /// Every copy gets a fresh delivery id while keeping the correlation id,
    /// so retries and stats never conflate copies with redeliveries.
    pub fn duplicate_to_partitions(self, partitions: &[TopicPartitionInfo]) -> Vec<MsgEnvelope> {
        partitions
            .iter()
            .map(|tpi| {
                let mut copy = self.clone();
                copy.id = DeliveryId::next();
                copy.partition = tpi.partition;
                copy
            })
            .collect()
    }
}

/// Outcome of one processing pass over a pack of messages
///
/// Every delivery of the pack lands in exactly one of the three maps.
/// `pending` holds deliveries whose handler had not reported back when the
/// pack timeout fired.
#[derive(Debug, Default)]
pub struct ProcessingResult {
    pub queue_name: String,
    pub timed_out: bool,
    pub success: HashMap<DeliveryId, MsgEnvelope>,
    pub failed: HashMap<DeliveryId, MsgEnvelope>,
    pub pending: HashMap<DeliveryId, MsgEnvelope>,
    /// Last failure message seen per tenant during this pass
    pub exceptions: HashMap<TenantId, String>,
}

impl ProcessingResult {
    pub fn total(&self) -> usize {
        self.success.len() + self.failed.len() + self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::TopicPartitionInfo;

    #[test]
    fn test_delivery_ids_are_unique() {
        let a = DeliveryId::next();
        let b = DeliveryId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_duplication_keeps_correlation_and_renews_delivery() {
        let msg = MsgEnvelope::new(TenantId::new("t1"), "device-1", "TELEMETRY", "{}");
        let correlation = msg.correlation_id;
        let partitions: Vec<_> = (0..3)
            .map(|p| TopicPartitionInfo::new("pf_rule_engine.main", TenantId::new("t1"), p))
            .collect();

        let copies = msg.duplicate_to_partitions(&partitions);
        assert_eq!(copies.len(), 3);
        let mut ids: Vec<_> = copies.iter().map(|m| m.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
        for (copy, tpi) in copies.iter().zip(&partitions) {
            assert_eq!(copy.correlation_id, correlation);
            assert_eq!(copy.partition, tpi.partition);
        }
    }

    #[test]
    fn test_result_total_counts_all_buckets() {
        let mut result = ProcessingResult {
            queue_name: "Main".to_string(),
            ..ProcessingResult::default()
        };
        let msg = MsgEnvelope::new(TenantId::new("t1"), "d1", "TELEMETRY", "{}");
        result.success.insert(msg.id, msg.clone());
        let msg2 = MsgEnvelope::new(TenantId::new("t1"), "d2", "TELEMETRY", "{}");
        result.pending.insert(msg2.id, msg2);
        assert_eq!(result.total(), 2);
    }
}
