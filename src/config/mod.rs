//! Queue configuration: data model, validation and the snapshot store
//!
//! Queue settings are administered through [`QueueConfigStore`]; every
//! consumer of a configuration reads an immutable `Arc` snapshot, never a
//! shared mutable object. Validation happens at admin time so a
//! misconfigured queue is rejected with a descriptive error instead of
//! failing silently during polling.

mod error;
mod store;
mod types;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use store::{Page, PageRequest, QueueConfigStore};
pub use types::{
    ProcessingSettings, ProcessingStrategyType, QueueSettings, SubmitSettings, SubmitStrategyType,
    DUPLICATE_MSG_TO_ALL_PARTITIONS,
};
pub use validation::{validate_queue_settings, RESERVED_QUEUE_NAMES};
