//! Retry/skip decision machine applied after each processing pass
//!
//! One [`PackProcessingStrategy`] is created per pack and fed the result of
//! every pass over that pack. It decides whether the pack is done (commit
//! the consumer offset) or which deliveries get another pass, and how long
//! to pause before it.

use crate::config::{ProcessingSettings, ProcessingStrategyType};
use crate::engine::message::{MsgEnvelope, ProcessingResult};
use std::time::Duration;

/// Verdict for one processing pass
#[derive(Debug)]
pub enum Decision {
    /// Pack is finished, commit offsets. Any remaining failures are terminal.
    Commit,
    /// Run another pass over `reprocess` after waiting `pause`.
    Retry {
        reprocess: Vec<MsgEnvelope>,
        pause: Duration,
    },
}

impl Decision {
    pub fn is_commit(&self) -> bool {
        matches!(self, Decision::Commit)
    }
}

/// Per-pack retry state machine
pub struct PackProcessingStrategy {
    settings: ProcessingSettings,
    retry_count: u32,
    /// Size of the pack on its first pass, the denominator of the failure ratio
    initial_total: usize,
    next_pause_s: u64,
}

impl PackProcessingStrategy {
    pub fn new(settings: ProcessingSettings) -> Self {
        let next_pause_s = settings.pause_between_retries_s;
        Self {
            settings,
            retry_count: 0,
            initial_total: 0,
            next_pause_s,
        }
    }

    /// Whether timed-out pending deliveries are dropped instead of retried
    pub fn skip_timed_out(&self) -> bool {
        self.settings.strategy == ProcessingStrategyType::SkipAllFailuresAndTimedOut
    }

    pub fn analyze(&mut self, result: &ProcessingResult) -> Decision {
        let reprocess = self.select_reprocess(result);
        if reprocess.is_empty() {
            return Decision::Commit;
        }
        if self.initial_total == 0 {
            self.initial_total = result.total();
        }
        self.retry_count += 1;

        if self.settings.retries > 0 && self.retry_count > self.settings.retries {
            log::debug!(
                "[{}] Retry attempts exhausted after {} passes, {} deliveries failed permanently",
                result.queue_name,
                self.retry_count,
                reprocess.len()
            );
            return Decision::Commit;
        }

        // The first failing pass always gets one retry. From the second
        // failing pass on, a failure ratio above the configured percentage
        // stops further retrying.
        if self.settings.failure_percentage > 0.0 && self.retry_count > 1 {
            let ratio = (result.failed.len() + result.pending.len()) as f64
                / self.initial_total.max(1) as f64;
            if ratio * 100.0 > self.settings.failure_percentage {
                log::debug!(
                    "[{}] Failure ratio {:.1}% exceeds allowed {:.1}%, giving up after {} passes",
                    result.queue_name,
                    ratio * 100.0,
                    self.settings.failure_percentage,
                    self.retry_count
                );
                return Decision::Commit;
            }
        }

        let pause = Duration::from_secs(self.next_pause_s);
        self.next_pause_s = (self.next_pause_s * 2).min(self.settings.max_pause_between_retries_s);
        log::debug!(
            "[{}] Scheduling retry pass {} for {} deliveries in {:?}",
            result.queue_name,
            self.retry_count,
            reprocess.len(),
            pause
        );
        Decision::Retry { reprocess, pause }
    }

    fn select_reprocess(&self, result: &ProcessingResult) -> Vec<MsgEnvelope> {
        match self.settings.strategy {
            ProcessingStrategyType::RetryAll | ProcessingStrategyType::RetryFailedAndTimedOut => {
                result
                    .failed
                    .values()
                    .chain(result.pending.values())
                    .cloned()
                    .collect()
            }
            // Failures are acknowledged and dropped; timed-out pending
            // deliveries still get another chance.
            ProcessingStrategyType::SkipAllFailures => result.pending.values().cloned().collect(),
            ProcessingStrategyType::SkipAllFailuresAndTimedOut => Vec::new(),
        }
    }
}
