//! Lifecycle manager for one queue's consumers
//!
//! All control-plane changes arrive as events. Events queue up in order
//! and are processed under a single state lock; if another task holds the
//! lock, processing is rescheduled instead of blocking the caller. A
//! stopped manager ignores every later event.
//!
//! Data-plane settings changes (poll interval, strategies, duplication
//! flag) never restart consumers; loops pick them up from the shared
//! snapshot on their next cycle. Only a partition change or a flip of
//! `consumer_per_partition` touches the topology.

use crate::config::QueueSettings;
use crate::core::sync::{lock, write_lock};
use crate::engine::consumer::{ConfigHandle, ConsumerLoopCtx, ConsumerTask};
use crate::engine::traits::{MessageHandler, QueueAdmin, QueueConsumer, QueueConsumerFactory};
use crate::partition::{QueueKey, TopicPartitionInfo};
use crate::stats::ConsumerStats;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

const EVENT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Control-plane event for one queue
#[derive(Debug)]
pub enum ManagerEvent {
    /// Settings changed; topology restarts only on a consumer mode flip
    ConfigUpdate { settings: QueueSettings },
    /// This node's partition assignment changed
    PartitionChange { partitions: Vec<TopicPartitionInfo> },
    /// Stop consuming, drain in-flight packs
    Stop,
    /// Stop and remove the backing topic
    Delete,
}

enum Topology {
    /// One consumer subscribed to every assigned partition
    Single { task: Option<ConsumerTask> },
    /// One consumer per assigned partition
    PerPartition {
        tasks: HashMap<TopicPartitionInfo, ConsumerTask>,
    },
}

struct ManagerState {
    partitions: Vec<TopicPartitionInfo>,
    topology: Topology,
    stopped: bool,
}

/// Owns the consumers of one queue and applies control-plane events to them
pub struct QueueConsumerManager {
    key: QueueKey,
    config: ConfigHandle,
    events: Mutex<VecDeque<ManagerEvent>>,
    state: tokio::sync::Mutex<ManagerState>,
    factory: Arc<dyn QueueConsumerFactory>,
    handler: Arc<dyn MessageHandler>,
    admin: Arc<dyn QueueAdmin>,
    stats: Arc<ConsumerStats>,
}

impl QueueConsumerManager {
    pub fn new(
        key: QueueKey,
        settings: Arc<QueueSettings>,
        factory: Arc<dyn QueueConsumerFactory>,
        handler: Arc<dyn MessageHandler>,
        admin: Arc<dyn QueueAdmin>,
        stats: Arc<ConsumerStats>,
    ) -> Arc<Self> {
        let topology = if settings.consumer_per_partition {
            Topology::PerPartition {
                tasks: HashMap::new(),
            }
        } else {
            Topology::Single { task: None }
        };
        Arc::new(Self {
            key,
            config: Arc::new(RwLock::new(settings)),
            events: Mutex::new(VecDeque::new()),
            state: tokio::sync::Mutex::new(ManagerState {
                partitions: Vec::new(),
                topology,
                stopped: false,
            }),
            factory,
            handler,
            admin,
            stats,
        })
    }

    pub fn key(&self) -> &QueueKey {
        &self.key
    }

    /// Current settings snapshot handle shared with the poll loops
    pub fn config(&self) -> Arc<QueueSettings> {
        crate::core::sync::read_lock(&self.config).clone()
    }

    /// Queue an event and process it as soon as the state lock is free
    pub fn enqueue(self: &Arc<Self>, event: ManagerEvent) {
        lock(&self.events).push_back(event);
        self.try_process();
    }

    fn try_process(self: &Arc<Self>) {
        let this = self.clone();
        tokio::spawn(async move {
            match this.state.try_lock() {
                Ok(mut state) => this.process_events(&mut state).await,
                Err(_) => {
                    // Another task is applying events; retry shortly so
                    // ordering is preserved without blocking the caller.
                    tokio::time::sleep(EVENT_RETRY_DELAY).await;
                    this.try_process();
                }
            }
        });
    }

    async fn process_events(self: &Arc<Self>, state: &mut ManagerState) {
        loop {
            // Drop the queue guard before applying the event; the handlers
            // below await while stopping and starting consumer tasks.
            let event = match lock(&self.events).pop_front() {
                Some(event) => event,
                None => break,
            };
            if state.stopped {
                log::debug!("[{}] Ignoring event after stop: {:?}", self.key, event);
                continue;
            }
            match event {
                ManagerEvent::ConfigUpdate { settings } => {
                    self.apply_config(state, settings).await;
                }
                ManagerEvent::PartitionChange { partitions } => {
                    self.apply_partitions(state, partitions).await;
                }
                ManagerEvent::Stop => {
                    log::info!("[{}] Stopping consumers", self.key);
                    self.stop_all(state).await;
                    state.stopped = true;
                }
                ManagerEvent::Delete => {
                    log::info!("[{}] Deleting queue", self.key);
                    self.stop_all(state).await;
                    state.stopped = true;
                    let topic = self.config().topic.clone();
                    if let Err(e) = self.admin.delete_topic(&topic).await {
                        log::warn!("[{}] Failed to delete topic {}: {}", self.key, topic, e);
                    }
                }
            }
        }
    }

    async fn apply_config(self: &Arc<Self>, state: &mut ManagerState, settings: QueueSettings) {
        let old = self.config();
        let mode_flipped = old.consumer_per_partition != settings.consumer_per_partition;
        *write_lock(&self.config) = Arc::new(settings);
        if !mode_flipped {
            log::debug!("[{}] Settings updated in place", self.key);
            return;
        }
        log::info!(
            "[{}] Consumer mode changed, restarting topology (per-partition: {})",
            self.key,
            self.config().consumer_per_partition
        );
        self.stop_all(state).await;
        state.topology = if self.config().consumer_per_partition {
            Topology::PerPartition {
                tasks: HashMap::new(),
            }
        } else {
            Topology::Single { task: None }
        };
        let partitions = state.partitions.clone();
        self.launch(state, partitions).await;
    }

    async fn apply_partitions(
        self: &Arc<Self>,
        state: &mut ManagerState,
        partitions: Vec<TopicPartitionInfo>,
    ) {
        if state.partitions == partitions {
            return;
        }
        log::info!(
            "[{}] Partition assignment changed: {} -> {} partitions",
            self.key,
            state.partitions.len(),
            partitions.len()
        );
        self.launch(state, partitions).await;
    }

    /// Reconcile running consumers with the given assignment
    async fn launch(self: &Arc<Self>, state: &mut ManagerState, partitions: Vec<TopicPartitionInfo>) {
        state.partitions = partitions.clone();
        match &mut state.topology {
            Topology::Single { task } => {
                if partitions.is_empty() {
                    if let Some(task) = task.take() {
                        task.stop_and_await().await;
                    }
                    return;
                }
                match task {
                    Some(task) => task.consumer().subscribe(partitions),
                    None => match self.start_task(partitions, "main".to_string()) {
                        Ok(started) => *task = Some(started),
                        Err(e) => log::error!("[{}] Failed to start consumer: {}", self.key, e),
                    },
                }
            }
            Topology::PerPartition { tasks } => {
                let keep: std::collections::HashSet<_> = partitions.iter().cloned().collect();
                let removed: Vec<_> = tasks
                    .keys()
                    .filter(|tpi| !keep.contains(tpi))
                    .cloned()
                    .collect();
                for tpi in removed {
                    if let Some(task) = tasks.remove(&tpi) {
                        task.stop_and_await().await;
                    }
                }
                for tpi in partitions {
                    if tasks.contains_key(&tpi) {
                        continue;
                    }
                    let label = tpi.full_topic_name();
                    match self.start_task(vec![tpi.clone()], label) {
                        Ok(task) => {
                            tasks.insert(tpi, task);
                        }
                        Err(e) => log::error!("[{}] Failed to start consumer: {}", self.key, e),
                    }
                }
            }
        }
    }

    fn start_task(
        self: &Arc<Self>,
        partitions: Vec<TopicPartitionInfo>,
        label: String,
    ) -> crate::engine::error::EngineResult<ConsumerTask> {
        let consumer: Arc<dyn QueueConsumer> =
            Arc::from(self.factory.create(&self.config().topic)?);
        consumer.subscribe(partitions);
        let ctx = ConsumerLoopCtx {
            key: self.key.clone(),
            config: self.config.clone(),
            handler: self.handler.clone(),
            stats: self.stats.clone(),
        };
        Ok(ConsumerTask::launch(ctx, consumer, label))
    }

    async fn stop_all(&self, state: &mut ManagerState) {
        match &mut state.topology {
            Topology::Single { task } => {
                if let Some(task) = task.take() {
                    task.stop_and_await().await;
                }
            }
            Topology::PerPartition { tasks } => {
                for (_, task) in tasks.drain() {
                    task.stop_and_await().await;
                }
            }
        }
    }

    /// Number of running consumer tasks, for tests and introspection
    pub async fn consumer_count(&self) -> usize {
        let state = self.state.lock().await;
        match &state.topology {
            Topology::Single { task } => usize::from(task.is_some()),
            Topology::PerPartition { tasks } => tasks.len(),
        }
    }

    /// Wait until all queued events have been applied
    pub async fn drain_events(&self) {
        loop {
            {
                let _state = self.state.lock().await;
                if lock(&self.events).is_empty() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
