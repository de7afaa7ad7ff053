//! Consumer statistics accumulation and periodic reporting
//!
//! Poll loops record pack outcomes into a shared [`ConsumerStats`] per
//! queue key; the [`StatsReporter`] flushes every queue's counters and the
//! last exception per tenant to a [`TimeseriesSink`] on a schedule.

mod consumer;
mod error;
mod reporter;

pub use consumer::{truncate_exception, ConsumerStats, StatsSnapshot, DEFAULT_MAX_EXCEPTION_LEN};
pub use error::{StatsError, StatsResult};
pub use reporter::{
    StaticProfileProvider, StatsReporter, TenantProfile, TenantProfileProvider, TimeseriesSink,
    TsPoint, TsValue,
};

use crate::core::sync::{lock, read_lock, write_lock};
use crate::partition::QueueKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Shared registry of per-queue stats accumulators
pub struct StatsRegistry {
    max_exception_len: usize,
    stats: RwLock<HashMap<QueueKey, Arc<ConsumerStats>>>,
    /// Final snapshots of removed queues, held until the next flush
    retired: Mutex<Vec<(QueueKey, StatsSnapshot)>>,
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::with_max_exception_len(DEFAULT_MAX_EXCEPTION_LEN)
    }
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_exception_len(max_exception_len: usize) -> Self {
        Self {
            max_exception_len,
            stats: RwLock::new(HashMap::new()),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Accumulator for a queue key, created on first use
    pub fn get_or_create(&self, key: &QueueKey) -> Arc<ConsumerStats> {
        if let Some(stats) = read_lock(&self.stats).get(key) {
            return stats.clone();
        }
        write_lock(&self.stats)
            .entry(key.clone())
            .or_insert_with(|| Arc::new(ConsumerStats::new(self.max_exception_len)))
            .clone()
    }

    /// Drop the accumulator of a deleted queue, keeping anything it
    /// accumulated since the last flush for the next report
    pub fn remove(&self, key: &QueueKey) {
        let removed = write_lock(&self.stats).remove(key);
        if let Some(stats) = removed {
            let snapshot = stats.report();
            if !snapshot.is_empty() {
                lock(&self.retired).push((key.clone(), snapshot));
            }
        }
    }

    /// Take the final snapshots of queues removed since the last flush
    pub fn drain_retired(&self) -> Vec<(QueueKey, StatsSnapshot)> {
        std::mem::take(&mut *lock(&self.retired))
    }

    pub fn snapshot(&self) -> Vec<(QueueKey, Arc<ConsumerStats>)> {
        read_lock(&self.stats)
            .iter()
            .map(|(key, stats)| (key.clone(), stats.clone()))
            .collect()
    }
}
