//! Seams between the consumption engine and its transport and handler
//!
//! The engine is transport-agnostic: anything that can subscribe to a
//! partition set, poll, and commit can drive it. `inmem` provides the
//! built-in implementation; tests script their own.

use crate::engine::error::EngineResult;
use crate::engine::message::MsgEnvelope;
use crate::engine::pack::MsgCallback;
use crate::partition::TopicPartitionInfo;
use async_trait::async_trait;
use std::time::Duration;

/// One consumer of a queue's message stream
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Replace the consumed partition set. Takes effect on the next poll.
    fn subscribe(&self, partitions: Vec<TopicPartitionInfo>);

    /// Fetch the next pack, waiting at most `poll_interval`
    async fn poll(&self, poll_interval: Duration) -> EngineResult<Vec<MsgEnvelope>>;

    /// Acknowledge everything returned by the last poll
    async fn commit(&self) -> EngineResult<()>;

    fn unsubscribe(&self);
}

/// Creates consumers for a queue's topic
pub trait QueueConsumerFactory: Send + Sync {
    fn create(&self, topic: &str) -> EngineResult<Box<dyn QueueConsumer>>;
}

/// Downstream processor of individual messages
///
/// Implementations report the outcome through the callback, possibly from
/// another task; not reporting before the pack deadline counts the delivery
/// as timed out.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, msg: MsgEnvelope, callback: MsgCallback);
}

/// Administrative access to the transport, for queue deletion
#[async_trait]
pub trait QueueAdmin: Send + Sync {
    async fn delete_topic(&self, topic: &str) -> EngineResult<()>;
}
