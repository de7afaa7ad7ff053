//! Queue configuration store with atomically swapped snapshots
//!
//! Poll loops and the partition resolver never hold a settings reference
//! across cycles; they re-fetch an `Arc<QueueSettings>` snapshot each time.
//! Updates validate first, then swap the snapshot and bump the version, so
//! a reader observes either the whole old config or the whole new one.

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::types::QueueSettings;
use crate::config::validation::validate_queue_settings;
use crate::core::sync::{read_lock, write_lock};
use crate::partition::{QueueKey, ServiceType, TenantId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Page request for queue listings
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self { page, page_size }
    }
}

/// One page of queue listings
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

struct QueueEntry {
    settings: Arc<QueueSettings>,
    version: u64,
}

/// Registry of queue settings keyed by (service type, tenant, name)
#[derive(Default)]
pub struct QueueConfigStore {
    queues: RwLock<HashMap<QueueKey, QueueEntry>>,
}

impl QueueConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new queue; rejects invalid settings and duplicates
    pub fn create(
        &self,
        service_type: ServiceType,
        tenant_id: TenantId,
        settings: QueueSettings,
    ) -> ConfigResult<(QueueKey, Arc<QueueSettings>)> {
        validate_queue_settings(&settings)?;
        let key = QueueKey::new(service_type, tenant_id, settings.name.clone());

        let mut queues = write_lock(&self.queues);
        if queues.contains_key(&key) {
            return Err(ConfigError::AlreadyExists {
                name: settings.name,
            });
        }
        let snapshot = Arc::new(settings);
        queues.insert(
            key.clone(),
            QueueEntry {
                settings: snapshot.clone(),
                version: 1,
            },
        );
        log::info!("[{}] Queue created", key);
        Ok((key, snapshot))
    }

    /// Replace the settings of an existing queue, bumping the snapshot
    /// version; the new snapshot is visible to the next reader
    pub fn update(&self, key: &QueueKey, settings: QueueSettings) -> ConfigResult<Arc<QueueSettings>> {
        validate_queue_settings(&settings)?;
        if settings.name != key.queue_name {
            return Err(ConfigError::Validation {
                message: format!(
                    "Queue name cannot be changed from '{}' to '{}'",
                    key.queue_name, settings.name
                ),
            });
        }

        let mut queues = write_lock(&self.queues);
        let entry = queues.get_mut(key).ok_or_else(|| ConfigError::NotFound {
            name: key.queue_name.clone(),
        })?;
        let snapshot = Arc::new(settings);
        entry.settings = snapshot.clone();
        entry.version += 1;
        log::info!("[{}] Queue updated to version {}", key, entry.version);
        Ok(snapshot)
    }

    /// Remove a queue, returning its last settings snapshot
    pub fn delete(&self, key: &QueueKey) -> ConfigResult<Arc<QueueSettings>> {
        let mut queues = write_lock(&self.queues);
        let entry = queues.remove(key).ok_or_else(|| ConfigError::NotFound {
            name: key.queue_name.clone(),
        })?;
        log::info!("[{}] Queue deleted", key);
        Ok(entry.settings)
    }

    /// Fetch the current settings snapshot for a queue
    pub fn get(&self, key: &QueueKey) -> Option<Arc<QueueSettings>> {
        read_lock(&self.queues).get(key).map(|e| e.settings.clone())
    }

    /// Current snapshot version, bumped on every update
    pub fn version(&self, key: &QueueKey) -> Option<u64> {
        read_lock(&self.queues).get(key).map(|e| e.version)
    }

    /// List queues of a service type, ordered by tenant then name
    pub fn list(&self, service_type: ServiceType, page: PageRequest) -> Page<(QueueKey, Arc<QueueSettings>)> {
        let queues = read_lock(&self.queues);
        let mut items: Vec<_> = queues
            .iter()
            .filter(|(key, _)| key.service_type == service_type)
            .map(|(key, entry)| (key.clone(), entry.settings.clone()))
            .collect();
        items.sort_by(|(a, _), (b, _)| {
            (&a.tenant_id, &a.queue_name).cmp(&(&b.tenant_id, &b.queue_name))
        });

        let total = items.len();
        let items = items
            .into_iter()
            .skip(page.page * page.page_size)
            .take(page.page_size)
            .collect();
        Page { items, total }
    }
}
