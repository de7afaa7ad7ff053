//! Daemon wiring and lifecycle
//!
//! Loads queue definitions from a TOML file, stands up the in-memory
//! transport with a logging message handler and stats sink, and runs until
//! a shutdown signal arrives.

use crate::app::cli::CliArgs;
use crate::common::logging::init_logging;
use crate::config::{ConfigResult, QueueConfigStore, QueueSettings};
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::time::SystemTimeProvider;
use crate::engine::{
    EngineContext, InMemoryConsumerFactory, InMemoryTransport, MessageHandler, MsgCallback,
    MsgEnvelope, QueueConsumerService,
};
use crate::partition::{ServiceType, TenantId};
use crate::stats::{
    StaticProfileProvider, StatsRegistry, StatsReporter, TenantProfile, TimeseriesSink, TsPoint,
    TsValue,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// One queue definition from the daemon config file
#[derive(Debug, Deserialize)]
pub struct QueueDef {
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(flatten)]
    pub settings: QueueSettings,
}

/// Daemon configuration loaded from TOML
#[derive(Debug, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_stats_interval_s")]
    pub stats_interval_s: u64,
    #[serde(default, rename = "queue")]
    pub queues: Vec<QueueDef>,
}

fn default_stats_interval_s() -> u64 {
    60
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        let config: DaemonConfig =
            toml::from_str(&raw).map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }
}

/// Handler that logs each delivery and acknowledges it
struct LoggingHandler;

#[async_trait]
impl MessageHandler for LoggingHandler {
    async fn handle(&self, msg: MsgEnvelope, callback: MsgCallback) {
        log::debug!(
            "Handling {} msg {} from {} (tenant {})",
            msg.msg_type,
            msg.id,
            msg.originator,
            msg.tenant_id
        );
        callback.on_success();
    }
}

/// Sink that writes stats samples to the log
struct LoggingSink;

#[async_trait]
impl TimeseriesSink for LoggingSink {
    async fn save(&self, point: TsPoint) -> crate::stats::StatsResult<()> {
        let value = match &point.value {
            TsValue::Long(v) => v.to_string(),
            TsValue::Str(v) => format!("{:?}", v),
        };
        log::debug!(
            "ts[{}] {}={} (ttl {}s)",
            point.entity_id,
            point.key,
            value,
            point.ttl_s
        );
        Ok(())
    }
}

fn register_queues(service: &QueueConsumerService, config: &DaemonConfig) -> ConfigResult<usize> {
    for def in &config.queues {
        let tenant = def
            .tenant
            .as_ref()
            .map(|t| TenantId::new(t.clone()))
            .unwrap_or_else(TenantId::system);
        let key = service.create_queue(ServiceType::RuleEngine, tenant, def.settings.clone())?;
        log::info!("[{}] Queue registered from config", key);
    }
    Ok(config.queues.len())
}

/// Run the daemon until interrupted
pub async fn run(args: CliArgs) -> Result<(), Box<dyn Error>> {
    let _logger = init_logging(args.verbosity(), args.log_file.as_deref())?;
    log::info!("packflow starting");

    let config = DaemonConfig::load(&args.config)?;

    let transport = InMemoryTransport::new();
    let store = Arc::new(QueueConfigStore::new());
    let stats = Arc::new(StatsRegistry::new());
    let service = Arc::new(QueueConsumerService::new(EngineContext {
        store: store.clone(),
        factory: Arc::new(InMemoryConsumerFactory::new(transport.clone())),
        handler: Arc::new(LoggingHandler),
        admin: transport.clone(),
        stats: stats.clone(),
    }));

    let registered = register_queues(&service, &config)?;
    log::info!("{} queue(s) running", registered);

    let (shutdown, mut shutdown_rx) = ShutdownCoordinator::new();
    shutdown.install_signal_handler();

    let reporter = Arc::new(StatsReporter::new(
        stats,
        Arc::new(LoggingSink),
        Arc::new(StaticProfileProvider(TenantProfile::default())),
        Arc::new(SystemTimeProvider),
        Duration::from_secs(config.stats_interval_s),
    ));
    let reporter_handle = reporter.spawn(&shutdown);

    let _ = shutdown_rx.recv().await;
    log::info!("Shutdown requested, draining consumers");

    service.stop_all().await;
    if let Err(e) = reporter_handle.await {
        log::warn!("Stats reporter ended abnormally: {}", e);
    }
    log::info!("packflow stopped");
    Ok(())
}
