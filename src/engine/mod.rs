//! Partitioned queue consumption engine
//!
//! Messages flow through the engine in packs: a consumer polls a pack from
//! its subscribed partitions, the submit plan releases the pack to the
//! handler in waves, the processing strategy turns the pack's outcome into
//! a commit or a retry, and stats record every terminal outcome exactly
//! once per delivery.
//!
//! The control plane is event driven: [`QueueConsumerService`] turns
//! administrative changes into [`ManagerEvent`]s which each queue's
//! [`QueueConsumerManager`] applies to its consumer topology. Data-plane
//! settings reach running poll loops through a shared snapshot, without a
//! restart.

mod consumer;
mod error;
mod inmem;
mod manager;
mod message;
mod pack;
mod processing;
mod service;
mod submit;
mod traits;

#[cfg(test)]
mod tests;

pub use consumer::{ConfigHandle, ConsumerLoopCtx, ConsumerTask};
pub use error::{EngineError, EngineResult};
pub use inmem::{InMemoryConsumer, InMemoryConsumerFactory, InMemoryTransport};
pub use manager::{ManagerEvent, QueueConsumerManager};
pub use message::{CorrelationId, DeliveryId, MsgEnvelope, ProcessingResult};
pub use pack::{MsgCallback, PackContext};
pub use processing::{Decision, PackProcessingStrategy};
pub use service::{EngineContext, QueueConsumerService};
pub use submit::plan_waves;
pub use traits::{MessageHandler, QueueAdmin, QueueConsumer, QueueConsumerFactory};
