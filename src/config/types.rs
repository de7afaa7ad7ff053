//! Queue settings data model
//!
//! `QueueSettings` is the immutable description of a logical queue. It is
//! fully serde round-trippable: persisting and reading a settings object
//! back yields an identical value. Free-form deployment flags live in
//! `additional_info`; the engine only interprets
//! `duplicate_msg_to_all_partitions`.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Flag key in `additional_info` enabling duplicate-to-all-partitions mode
pub const DUPLICATE_MSG_TO_ALL_PARTITIONS: &str = "duplicate_msg_to_all_partitions";

/// Policy for ordering/batching messages handed to processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmitStrategyType {
    Burst,
    SequentialByOriginator,
    Sequential,
    Batch,
}

/// Policy for retry, skip and escalation of failed/pending messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStrategyType {
    RetryAll,
    RetryFailedAndTimedOut,
    SkipAllFailures,
    SkipAllFailuresAndTimedOut,
}

/// Submit strategy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitSettings {
    pub strategy: SubmitStrategyType,
    /// Messages per processing unit; only meaningful for `Batch`
    #[serde(default)]
    pub batch_size: usize,
}

impl SubmitSettings {
    pub fn burst() -> Self {
        Self {
            strategy: SubmitStrategyType::Burst,
            batch_size: 0,
        }
    }

    pub fn batch(batch_size: usize) -> Self {
        Self {
            strategy: SubmitStrategyType::Batch,
            batch_size,
        }
    }
}

/// Processing strategy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSettings {
    pub strategy: ProcessingStrategyType,
    /// Retry passes before escalation; 0 means unlimited
    pub retries: u32,
    /// Failure percentage (0-100) above which continued retrying stops;
    /// 0 means zero tolerance (retry on any failure)
    pub failure_percentage: f64,
    pub pause_between_retries_s: u64,
    pub max_pause_between_retries_s: u64,
}

impl ProcessingSettings {
    pub fn skip_all_failures() -> Self {
        Self {
            strategy: ProcessingStrategyType::SkipAllFailures,
            retries: 0,
            failure_percentage: 0.0,
            pause_between_retries_s: 0,
            max_pause_between_retries_s: 0,
        }
    }

    pub fn retry_all(retries: u32, failure_percentage: f64, pause_s: u64, max_pause_s: u64) -> Self {
        Self {
            strategy: ProcessingStrategyType::RetryAll,
            retries,
            failure_percentage,
            pause_between_retries_s: pause_s,
            max_pause_between_retries_s: max_pause_s,
        }
    }
}

/// Immutable description of a logical queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Queue name, unique within its (service type, tenant) scope
    pub name: String,
    /// Transport topic the queue's partitions hang off
    pub topic: String,
    /// Partition count, must be positive
    pub partitions: u32,
    pub poll_interval_ms: u64,
    pub pack_processing_timeout_ms: u64,
    /// One poll loop per partition instead of one for the whole queue
    #[serde(default)]
    pub consumer_per_partition: bool,
    pub submit_strategy: SubmitSettings,
    pub processing_strategy: ProcessingSettings,
    /// Free-form deployment flags
    #[serde(default)]
    pub additional_info: serde_json::Map<String, serde_json::Value>,
}

impl QueueSettings {
    /// Whether every message should be duplicated to all partitions
    pub fn duplicate_msg_to_all_partitions(&self) -> bool {
        self.additional_info
            .get(DUPLICATE_MSG_TO_ALL_PARTITIONS)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn set_duplicate_msg_to_all_partitions(&mut self, enabled: bool) {
        self.additional_info.insert(
            DUPLICATE_MSG_TO_ALL_PARTITIONS.to_string(),
            serde_json::Value::Bool(enabled),
        );
    }
}
