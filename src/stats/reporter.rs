//! Periodic persistence of consumer stats to a time-series sink

use crate::core::shutdown::ShutdownCoordinator;
use crate::core::time::TimeProvider;
use crate::partition::{QueueKey, TenantId};
use crate::stats::error::StatsResult;
use crate::stats::{StatsRegistry, StatsSnapshot};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const SECONDS_PER_DAY: u64 = 86_400;

/// Retention settings looked up per tenant when writing stats
#[derive(Debug, Clone, Copy)]
pub struct TenantProfile {
    pub queue_stats_ttl_days: u64,
    pub exceptions_ttl_days: u64,
}

impl Default for TenantProfile {
    fn default() -> Self {
        Self {
            queue_stats_ttl_days: 30,
            exceptions_ttl_days: 7,
        }
    }
}

pub trait TenantProfileProvider: Send + Sync {
    fn profile(&self, tenant_id: &TenantId) -> TenantProfile;
}

/// Provider returning the same profile for every tenant
pub struct StaticProfileProvider(pub TenantProfile);

impl TenantProfileProvider for StaticProfileProvider {
    fn profile(&self, _tenant_id: &TenantId) -> TenantProfile {
        self.0
    }
}

/// One time-series sample written by a stats report
#[derive(Debug, Clone)]
pub struct TsPoint {
    pub tenant_id: TenantId,
    pub entity_id: String,
    pub key: String,
    pub value: TsValue,
    pub ts_ms: i64,
    pub ttl_s: u64,
}

#[derive(Debug, Clone)]
pub enum TsValue {
    Long(i64),
    Str(String),
}

#[async_trait]
pub trait TimeseriesSink: Send + Sync {
    async fn save(&self, point: TsPoint) -> StatsResult<()>;
}

/// Flushes every registered queue's stats on a fixed interval
pub struct StatsReporter {
    registry: Arc<StatsRegistry>,
    sink: Arc<dyn TimeseriesSink>,
    profiles: Arc<dyn TenantProfileProvider>,
    time: Arc<dyn TimeProvider>,
    interval: Duration,
}

impl StatsReporter {
    pub fn new(
        registry: Arc<StatsRegistry>,
        sink: Arc<dyn TimeseriesSink>,
        profiles: Arc<dyn TenantProfileProvider>,
        time: Arc<dyn TimeProvider>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            sink,
            profiles,
            time,
            interval,
        }
    }

    /// Run until shutdown, flushing once per interval
    pub fn spawn(self: Arc<Self>, shutdown: &ShutdownCoordinator) -> tokio::task::JoinHandle<()> {
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.report_once().await,
                    _ = shutdown_rx.recv() => {
                        // Final flush so counters accumulated since the last
                        // tick are not lost on shutdown.
                        self.report_once().await;
                        break;
                    }
                }
            }
            log::debug!("Stats reporter stopped");
        })
    }

    /// Flush every queue that accumulated anything since the last report,
    /// including final snapshots of queues deleted in the meantime. Each
    /// sample is written independently; one sink failure never blocks the
    /// rest of the report.
    pub async fn report_once(&self) {
        let ts_ms = self.time.epoch_millis();
        for (key, snapshot) in self.registry.drain_retired() {
            self.flush(&key, snapshot, ts_ms).await;
        }
        for (key, stats) in self.registry.snapshot() {
            let snapshot = stats.report();
            if snapshot.is_empty() {
                continue;
            }
            self.flush(&key, snapshot, ts_ms).await;
        }
    }

    async fn flush(&self, key: &QueueKey, snapshot: StatsSnapshot, ts_ms: i64) {
        log::info!("[{}] Stats: {}", key, snapshot.summary());

        let profile = self.profiles.profile(&key.tenant_id);
        let stats_ttl_s = profile.queue_stats_ttl_days * SECONDS_PER_DAY;
        let entity_id = key.stats_entity_id();
        let counters = [
            ("totalMsgs", snapshot.total),
            ("successfulMsgs", snapshot.successful),
            ("failedMsgs", snapshot.failed),
            ("timedOutMsgs", snapshot.timed_out),
            ("tmpFailedMsgs", snapshot.tmp_failed),
            ("tmpTimedOutMsgs", snapshot.tmp_timed_out),
        ];
        for (counter_key, value) in counters {
            let point = TsPoint {
                tenant_id: key.tenant_id.clone(),
                entity_id: entity_id.clone(),
                key: counter_key.to_string(),
                value: TsValue::Long(value as i64),
                ts_ms,
                ttl_s: stats_ttl_s,
            };
            if let Err(e) = self.sink.save(point).await {
                log::warn!("[{}] Failed to persist {}: {}", key, counter_key, e);
            }
        }

        let exceptions_ttl_s = profile.exceptions_ttl_days * SECONDS_PER_DAY;
        for (tenant_id, message) in snapshot.exceptions {
            let point = TsPoint {
                tenant_id: tenant_id.clone(),
                entity_id: entity_id.clone(),
                key: "ruleEngineException".to_string(),
                value: TsValue::Str(message),
                ts_ms,
                ttl_s: exceptions_ttl_s,
            };
            if let Err(e) = self.sink.save(point).await {
                log::warn!(
                    "[{}] Failed to persist exception for tenant {}: {}",
                    key,
                    tenant_id,
                    e
                );
            }
        }
    }
}
