//! Engine test suites
//!
//! `manager` covers consumer topology lifecycle against scripted
//! collaborators; `pipeline` runs the whole engine end to end over the
//! in-memory transport.

mod manager;

use crate::config::{ProcessingSettings, QueueSettings, SubmitSettings};
use crate::core::sync::lock;
use crate::engine::error::EngineResult;
use crate::engine::message::MsgEnvelope;
use crate::engine::pack::MsgCallback;
use crate::engine::traits::{MessageHandler, QueueAdmin, QueueConsumer, QueueConsumerFactory};
use crate::partition::TopicPartitionInfo;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) fn test_settings(partitions: u32, consumer_per_partition: bool) -> QueueSettings {
    QueueSettings {
        name: "Main".to_string(),
        topic: "pf_rule_engine.main".to_string(),
        partitions,
        poll_interval_ms: 10,
        pack_processing_timeout_ms: 1000,
        consumer_per_partition,
        submit_strategy: SubmitSettings::burst(),
        processing_strategy: ProcessingSettings::skip_all_failures(),
        additional_info: serde_json::Map::new(),
    }
}

/// Observable state of one scripted consumer
#[derive(Default)]
pub(crate) struct ScriptedConsumerState {
    pub subscriptions: Mutex<Vec<Vec<TopicPartitionInfo>>>,
    pub unsubscribed: AtomicBool,
}

impl ScriptedConsumerState {
    pub fn last_subscription(&self) -> Vec<TopicPartitionInfo> {
        lock(&self.subscriptions).last().cloned().unwrap_or_default()
    }
}

/// Consumer that records subscriptions and never yields messages
pub(crate) struct ScriptedConsumer {
    state: Arc<ScriptedConsumerState>,
}

#[async_trait]
impl QueueConsumer for ScriptedConsumer {
    fn subscribe(&self, partitions: Vec<TopicPartitionInfo>) {
        lock(&self.state.subscriptions).push(partitions);
    }

    async fn poll(&self, poll_interval: Duration) -> EngineResult<Vec<MsgEnvelope>> {
        tokio::time::sleep(poll_interval).await;
        Ok(Vec::new())
    }

    async fn commit(&self) -> EngineResult<()> {
        Ok(())
    }

    fn unsubscribe(&self) {
        self.state.unsubscribed.store(true, Ordering::Release);
    }
}

/// Factory exposing every consumer it created
#[derive(Default)]
pub(crate) struct ScriptedFactory {
    pub created: Mutex<Vec<Arc<ScriptedConsumerState>>>,
}

impl ScriptedFactory {
    pub fn created_count(&self) -> usize {
        lock(&self.created).len()
    }
}

impl QueueConsumerFactory for ScriptedFactory {
    fn create(&self, _topic: &str) -> EngineResult<Box<dyn QueueConsumer>> {
        let state = Arc::new(ScriptedConsumerState::default());
        lock(&self.created).push(state.clone());
        Ok(Box::new(ScriptedConsumer { state }))
    }
}

/// Handler acknowledging every delivery immediately
#[derive(Default)]
pub(crate) struct SuccessHandler {
    pub handled: AtomicUsize,
}

#[async_trait]
impl MessageHandler for SuccessHandler {
    async fn handle(&self, _msg: MsgEnvelope, callback: MsgCallback) {
        self.handled.fetch_add(1, Ordering::Relaxed);
        callback.on_success();
    }
}

/// Admin recording topic deletions
#[derive(Default)]
pub(crate) struct RecordingAdmin {
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl QueueAdmin for RecordingAdmin {
    async fn delete_topic(&self, topic: &str) -> EngineResult<()> {
        lock(&self.deleted).push(topic.to_string());
        Ok(())
    }
}
