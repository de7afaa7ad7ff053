//! Queue administration facade tying the config store to running consumers
//!
//! The service owns one [`QueueConsumerManager`] per registered queue and
//! translates administrative changes into manager events. This node owns
//! every partition of every queue it serves, so a create or a partition
//! count change always assigns the full partition set.

use crate::config::{ConfigError, ConfigResult, QueueConfigStore, QueueSettings};
use crate::core::sync::{lock, read_lock, write_lock};
use crate::engine::manager::{ManagerEvent, QueueConsumerManager};
use crate::engine::traits::{MessageHandler, QueueAdmin, QueueConsumerFactory};
use crate::partition::{all_partitions, QueueKey, ServiceType, TenantId};
use crate::stats::StatsRegistry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Shared collaborators every queue's consumers are built from
pub struct EngineContext {
    pub store: Arc<QueueConfigStore>,
    pub factory: Arc<dyn QueueConsumerFactory>,
    pub handler: Arc<dyn MessageHandler>,
    pub admin: Arc<dyn QueueAdmin>,
    pub stats: Arc<StatsRegistry>,
}

/// Administers queues and their consumer managers
pub struct QueueConsumerService {
    ctx: EngineContext,
    managers: RwLock<HashMap<QueueKey, Arc<QueueConsumerManager>>>,
    stopped: Mutex<bool>,
}

impl QueueConsumerService {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            ctx,
            managers: RwLock::new(HashMap::new()),
            stopped: Mutex::new(false),
        }
    }

    pub fn store(&self) -> &Arc<QueueConfigStore> {
        &self.ctx.store
    }

    /// Register a queue and start consuming its full partition set
    pub fn create_queue(
        &self,
        service_type: ServiceType,
        tenant_id: TenantId,
        settings: QueueSettings,
    ) -> ConfigResult<QueueKey> {
        if *lock(&self.stopped) {
            return Err(ConfigError::Validation {
                message: "Service is stopped".to_string(),
            });
        }
        let (key, snapshot) = self
            .ctx
            .store
            .create(service_type, tenant_id.clone(), settings)?;
        let manager = QueueConsumerManager::new(
            key.clone(),
            snapshot.clone(),
            self.ctx.factory.clone(),
            self.ctx.handler.clone(),
            self.ctx.admin.clone(),
            self.ctx.stats.get_or_create(&key),
        );
        manager.enqueue(ManagerEvent::PartitionChange {
            partitions: all_partitions(&snapshot, &tenant_id),
        });
        write_lock(&self.managers).insert(key.clone(), manager);
        Ok(key)
    }

    /// Apply new settings to a running queue
    pub fn update_queue(&self, key: &QueueKey, settings: QueueSettings) -> ConfigResult<()> {
        let manager = self.manager(key)?;
        let old = self.ctx.store.get(key).ok_or_else(|| ConfigError::NotFound {
            name: key.queue_name.clone(),
        })?;
        let snapshot = self.ctx.store.update(key, settings)?;
        manager.enqueue(ManagerEvent::ConfigUpdate {
            settings: (*snapshot).clone(),
        });
        if old.partitions != snapshot.partitions {
            manager.enqueue(ManagerEvent::PartitionChange {
                partitions: all_partitions(&snapshot, &key.tenant_id),
            });
        }
        Ok(())
    }

    /// Stop a queue's consumers and remove it with its backing topic
    pub fn delete_queue(&self, key: &QueueKey) -> ConfigResult<()> {
        self.ctx.store.delete(key)?;
        if let Some(manager) = write_lock(&self.managers).remove(key) {
            manager.enqueue(ManagerEvent::Delete);
        }
        self.ctx.stats.remove(key);
        Ok(())
    }

    pub fn manager(&self, key: &QueueKey) -> ConfigResult<Arc<QueueConsumerManager>> {
        read_lock(&self.managers)
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::NotFound {
                name: key.queue_name.clone(),
            })
    }

    /// Stop every queue's consumers, draining in-flight packs
    pub async fn stop_all(&self) {
        *lock(&self.stopped) = true;
        let managers: Vec<_> = read_lock(&self.managers).values().cloned().collect();
        for manager in &managers {
            manager.enqueue(ManagerEvent::Stop);
        }
        for manager in &managers {
            manager.drain_events().await;
        }
        log::info!("All queue consumers stopped");
    }
}
