//! In-memory transport backing the built-in queue consumers
//!
//! Topics are keyed by their full per-partition name. Publishing wakes any
//! consumer blocked in a poll. Polled messages stay in flight on the
//! consumer until committed; an unsubscribe without a commit pushes them
//! back for redelivery, mirroring how an offset-based transport would
//! behave across a rebalance.

use crate::core::sync::{lock, read_lock, write_lock};
use crate::engine::error::EngineResult;
use crate::engine::message::MsgEnvelope;
use crate::engine::traits::{QueueAdmin, QueueConsumer, QueueConsumerFactory};
use crate::partition::TopicPartitionInfo;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::Notify;

const MAX_POLL_MESSAGES: usize = 1000;

/// Shared message buffers, one per full topic name
#[derive(Default)]
pub struct InMemoryTransport {
    topics: RwLock<HashMap<String, Arc<Mutex<VecDeque<MsgEnvelope>>>>>,
    published: Notify,
}

impl InMemoryTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn publish(&self, tpi: &TopicPartitionInfo, mut msg: MsgEnvelope) {
        msg.partition = tpi.partition;
        let buffer = self.buffer(&tpi.full_topic_name());
        lock(&buffer).push_back(msg);
        self.published.notify_waiters();
    }

    fn buffer(&self, full_topic: &str) -> Arc<Mutex<VecDeque<MsgEnvelope>>> {
        if let Some(buffer) = read_lock(&self.topics).get(full_topic) {
            return buffer.clone();
        }
        write_lock(&self.topics)
            .entry(full_topic.to_string())
            .or_default()
            .clone()
    }

    fn requeue_front(&self, full_topic: &str, msgs: Vec<MsgEnvelope>) {
        let buffer = self.buffer(full_topic);
        let mut queue = lock(&buffer);
        for msg in msgs.into_iter().rev() {
            queue.push_front(msg);
        }
    }

    fn consumer(self: &Arc<Self>) -> InMemoryConsumer {
        InMemoryConsumer {
            transport: self.clone(),
            partitions: Mutex::new(Vec::new()),
            in_flight: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl QueueAdmin for InMemoryTransport {
    async fn delete_topic(&self, topic: &str) -> EngineResult<()> {
        let prefix = format!("{}.", topic);
        write_lock(&self.topics).retain(|name, _| name != topic && !name.starts_with(&prefix));
        log::info!("[{}] Topic deleted", topic);
        Ok(())
    }
}

/// Consumer over a subscribed set of in-memory partitions
pub struct InMemoryConsumer {
    transport: Arc<InMemoryTransport>,
    partitions: Mutex<Vec<TopicPartitionInfo>>,
    /// Polled but not yet committed, keyed by full topic of origin
    in_flight: Mutex<Vec<(String, Vec<MsgEnvelope>)>>,
}

impl InMemoryConsumer {
    fn drain_once(&self) -> Vec<MsgEnvelope> {
        let partitions = lock(&self.partitions).clone();
        let mut polled = Vec::new();
        let mut in_flight = lock(&self.in_flight);
        for tpi in &partitions {
            if polled.len() >= MAX_POLL_MESSAGES {
                break;
            }
            let full_topic = tpi.full_topic_name();
            let buffer = self.transport.buffer(&full_topic);
            let mut queue = lock(&buffer);
            let take = (MAX_POLL_MESSAGES - polled.len()).min(queue.len());
            if take == 0 {
                continue;
            }
            let batch: Vec<MsgEnvelope> = queue.drain(..take).collect();
            polled.extend(batch.iter().cloned());
            in_flight.push((full_topic, batch));
        }
        polled
    }
}

#[async_trait]
impl QueueConsumer for InMemoryConsumer {
    fn subscribe(&self, partitions: Vec<TopicPartitionInfo>) {
        *lock(&self.partitions) = partitions;
    }

    async fn poll(&self, poll_interval: Duration) -> EngineResult<Vec<MsgEnvelope>> {
        let deadline = tokio::time::Instant::now() + poll_interval;
        loop {
            // Register for the wakeup before checking the buffers, so a
            // publish landing in between is not missed.
            let notified = self.transport.published.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let polled = self.drain_once();
            if !polled.is_empty() {
                return Ok(polled);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn commit(&self) -> EngineResult<()> {
        lock(&self.in_flight).clear();
        Ok(())
    }

    fn unsubscribe(&self) {
        let in_flight: Vec<_> = std::mem::take(&mut *lock(&self.in_flight));
        for (full_topic, msgs) in in_flight {
            self.transport.requeue_front(&full_topic, msgs);
        }
        lock(&self.partitions).clear();
    }
}

/// Factory handed to the consumer manager
pub struct InMemoryConsumerFactory {
    transport: Arc<InMemoryTransport>,
}

impl InMemoryConsumerFactory {
    pub fn new(transport: Arc<InMemoryTransport>) -> Self {
        Self { transport }
    }
}

impl QueueConsumerFactory for InMemoryConsumerFactory {
    fn create(&self, _topic: &str) -> EngineResult<Box<dyn QueueConsumer>> {
        Ok(Box::new(self.transport.consumer()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::TenantId;

    fn tpi(partition: u32) -> TopicPartitionInfo {
        TopicPartitionInfo::new("pf_rule_engine.main", TenantId::new("t1"), partition)
    }

    fn msg(originator: &str) -> MsgEnvelope {
        MsgEnvelope::new(TenantId::new("t1"), originator, "TELEMETRY", "{}")
    }

    #[tokio::test]
    async fn test_poll_only_subscribed_partitions() {
        let transport = InMemoryTransport::new();
        transport.publish(&tpi(0), msg("a"));
        transport.publish(&tpi(1), msg("b"));

        let consumer = transport.consumer();
        consumer.subscribe(vec![tpi(0)]);
        let polled = consumer.poll(Duration::from_millis(10)).await.unwrap();
        assert_eq!(polled.len(), 1);
        assert_eq!(polled[0].originator, "a");
        assert_eq!(polled[0].partition, Some(0));
    }

    #[tokio::test]
    async fn test_publish_wakes_blocked_poll() {
        let transport = InMemoryTransport::new();
        let consumer = transport.consumer();
        consumer.subscribe(vec![tpi(0)]);

        let poller = tokio::spawn({
            let transport = transport.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                transport.publish(&tpi(0), msg("late"));
            }
        });
        let polled = consumer.poll(Duration::from_secs(5)).await.unwrap();
        assert_eq!(polled.len(), 1);
        poller.await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_poll_returns_after_interval() {
        let transport = InMemoryTransport::new();
        let consumer = transport.consumer();
        consumer.subscribe(vec![tpi(0)]);
        let polled = consumer.poll(Duration::from_millis(5)).await.unwrap();
        assert!(polled.is_empty());
    }

    #[tokio::test]
    async fn test_uncommitted_messages_redelivered_after_unsubscribe() {
        let transport = InMemoryTransport::new();
        transport.publish(&tpi(0), msg("a"));

        let consumer = transport.consumer();
        consumer.subscribe(vec![tpi(0)]);
        assert_eq!(consumer.poll(Duration::from_millis(10)).await.unwrap().len(), 1);
        consumer.unsubscribe();

        let second = transport.consumer();
        second.subscribe(vec![tpi(0)]);
        let polled = second.poll(Duration::from_millis(10)).await.unwrap();
        assert_eq!(polled.len(), 1);
        assert_eq!(polled[0].originator, "a");
    }

    #[tokio::test]
    async fn test_commit_prevents_redelivery() {
        let transport = InMemoryTransport::new();
        transport.publish(&tpi(0), msg("a"));

        let consumer = transport.consumer();
        consumer.subscribe(vec![tpi(0)]);
        assert_eq!(consumer.poll(Duration::from_millis(10)).await.unwrap().len(), 1);
        consumer.commit().await.unwrap();
        consumer.unsubscribe();

        let second = transport.consumer();
        second.subscribe(vec![tpi(0)]);
        assert!(second.poll(Duration::from_millis(5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_topic_drops_all_partitions() {
        let transport = InMemoryTransport::new();
        transport.publish(&tpi(0), msg("a"));
        transport.publish(&tpi(3), msg("b"));
        transport.delete_topic("pf_rule_engine.main").await.unwrap();

        let consumer = transport.consumer();
        consumer.subscribe(vec![tpi(0), tpi(3)]);
        assert!(consumer.poll(Duration::from_millis(5)).await.unwrap().is_empty());
    }
}
