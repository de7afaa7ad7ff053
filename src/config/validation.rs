//! Admin-time validation of queue settings
//!
//! Every rule here is enforced synchronously when a queue is created or
//! updated, so misconfiguration never reaches a poll loop.

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::types::{QueueSettings, SubmitStrategyType};

/// Queue names reserved for internally managed queues, rejected for any
/// tenant and service type
pub const RESERVED_QUEUE_NAMES: &[&str] = &["CalculatedFields", "CalculatedFieldStates"];

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

fn validate_label(value: &str, what: &str) -> ConfigResult<()> {
    if value.is_empty() {
        return Err(invalid(format!("Queue {} must be specified", what)));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(invalid(format!(
            "Queue {} '{}' may only contain alphanumeric characters, '_', '-' and '.'",
            what, value
        )));
    }
    Ok(())
}

/// Validate a settings object; returns a descriptive error naming the
/// offending field on the first violation
pub fn validate_queue_settings(settings: &QueueSettings) -> ConfigResult<()> {
    validate_label(&settings.name, "name")?;

    if RESERVED_QUEUE_NAMES.contains(&settings.name.as_str()) {
        return Err(invalid(format!(
            "Queue name '{}' is reserved for internal use",
            settings.name
        )));
    }

    validate_label(&settings.topic, "topic")?;

    if settings.partitions == 0 {
        return Err(invalid("Queue partitions must be a positive integer"));
    }
    if settings.poll_interval_ms == 0 {
        return Err(invalid("Queue poll_interval_ms must be positive"));
    }
    if settings.pack_processing_timeout_ms == 0 {
        return Err(invalid("Queue pack_processing_timeout_ms must be positive"));
    }

    if settings.submit_strategy.strategy == SubmitStrategyType::Batch
        && settings.submit_strategy.batch_size == 0
    {
        return Err(invalid(
            "Submit strategy batch_size must be positive for the BATCH strategy",
        ));
    }

    let processing = &settings.processing_strategy;
    if !(0.0..=100.0).contains(&processing.failure_percentage) {
        return Err(invalid(
            "Processing strategy failure_percentage must be between 0 and 100",
        ));
    }
    if processing.pause_between_retries_s > processing.max_pause_between_retries_s {
        return Err(invalid(
            "Processing strategy pause_between_retries_s cannot exceed max_pause_between_retries_s",
        ));
    }

    Ok(())
}
