//! Per-queue consumer statistics
//!
//! Counters are plain atomics so every poll loop of a queue can record
//! outcomes without coordination. `report()` swaps each counter to zero,
//! so an increment lands either in the snapshot being taken or in the next
//! one, never in both and never nowhere.

use crate::core::sync::lock;
use crate::engine::ProcessingResult;
use crate::partition::TenantId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Default cap on a stored exception message, in characters
pub const DEFAULT_MAX_EXCEPTION_LEN: usize = 4096;

/// Cap `message` at `max_len` characters, appending a marker that records
/// exactly how many characters were dropped.
pub fn truncate_exception(message: &str, max_len: usize) -> String {
    let total = message.chars().count();
    if total <= max_len {
        return message.to_string();
    }
    let kept: String = message.chars().take(max_len).collect();
    format!("{}...[truncated {} symbols]", kept, total - max_len)
}

/// Running counters for one queue key
#[derive(Default)]
pub struct ConsumerStats {
    max_exception_len: usize,
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    tmp_failed: AtomicU64,
    tmp_timed_out: AtomicU64,
    successful_iterations: AtomicU64,
    failed_iterations: AtomicU64,
    exceptions: Mutex<HashMap<TenantId, String>>,
}

impl ConsumerStats {
    pub fn new(max_exception_len: usize) -> Self {
        Self {
            max_exception_len,
            ..Self::default()
        }
    }

    /// Record the outcome of one processing pass.
    ///
    /// `final_pass` is true when the pack was committed after this pass;
    /// failures of non-final passes count as temporary, they may still
    /// succeed on retry.
    pub fn log(&self, result: &ProcessingResult, final_pass: bool) {
        let success = result.success.len() as u64;
        let failed = result.failed.len() as u64;
        let pending = result.pending.len() as u64;
        self.total.fetch_add(success + failed + pending, Ordering::Relaxed);
        self.successful.fetch_add(success, Ordering::Relaxed);

        if final_pass {
            if failed + pending > 0 {
                self.failed.fetch_add(failed, Ordering::Relaxed);
                self.timed_out.fetch_add(pending, Ordering::Relaxed);
                self.failed_iterations.fetch_add(1, Ordering::Relaxed);
            } else {
                self.successful_iterations.fetch_add(1, Ordering::Relaxed);
            }
        } else {
            self.failed_iterations.fetch_add(1, Ordering::Relaxed);
            self.tmp_failed.fetch_add(failed, Ordering::Relaxed);
            self.tmp_timed_out.fetch_add(pending, Ordering::Relaxed);
        }

        if !result.exceptions.is_empty() {
            let mut exceptions = lock(&self.exceptions);
            for (tenant, message) in &result.exceptions {
                exceptions.insert(
                    tenant.clone(),
                    truncate_exception(message, self.max_exception_len),
                );
            }
        }
    }

    /// Take a snapshot and reset all counters
    pub fn report(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.swap(0, Ordering::Relaxed),
            successful: self.successful.swap(0, Ordering::Relaxed),
            failed: self.failed.swap(0, Ordering::Relaxed),
            timed_out: self.timed_out.swap(0, Ordering::Relaxed),
            tmp_failed: self.tmp_failed.swap(0, Ordering::Relaxed),
            tmp_timed_out: self.tmp_timed_out.swap(0, Ordering::Relaxed),
            successful_iterations: self.successful_iterations.swap(0, Ordering::Relaxed),
            failed_iterations: self.failed_iterations.swap(0, Ordering::Relaxed),
            exceptions: std::mem::take(&mut *lock(&self.exceptions)),
        }
    }
}

/// Counter values flushed by one report, already reset from the source
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub tmp_failed: u64,
    pub tmp_timed_out: u64,
    pub successful_iterations: u64,
    pub failed_iterations: u64,
    pub exceptions: HashMap<TenantId, String>,
}

impl StatsSnapshot {
    pub fn is_empty(&self) -> bool {
        self.total == 0 && self.exceptions.is_empty()
    }

    /// One-line summary for the periodic stats log
    pub fn summary(&self) -> String {
        format!(
            "total [{}] successful [{}] failed [{}] timedOut [{}] tmpFailed [{}] tmpTimedOut [{}] successfulIterations [{}] failedIterations [{}]",
            self.total,
            self.successful,
            self.failed,
            self.timed_out,
            self.tmp_failed,
            self.tmp_timed_out,
            self.successful_iterations,
            self.failed_iterations
        )
    }
}
