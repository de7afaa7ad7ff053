//! Shared state of one in-flight pack of messages
//!
//! The consumer loop hands each delivery to the message handler together
//! with a [`MsgCallback`]; handler outcomes move deliveries out of the
//! pending set and wake the loop, which waits with a pack-wide deadline.
//! Whatever is still pending when the deadline fires is treated as timed
//! out by the processing strategy.

use crate::core::sync::lock;
use crate::engine::message::{DeliveryId, MsgEnvelope, ProcessingResult};
use crate::partition::TenantId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Default)]
struct PackState {
    pending: HashMap<DeliveryId, MsgEnvelope>,
    success: HashMap<DeliveryId, MsgEnvelope>,
    failed: HashMap<DeliveryId, MsgEnvelope>,
    exceptions: HashMap<TenantId, String>,
}

/// Completion tracking for one pack
pub struct PackContext {
    state: Mutex<PackState>,
    notify: Notify,
}

impl PackContext {
    pub fn new(msgs: &[MsgEnvelope]) -> Arc<Self> {
        let pending = msgs.iter().map(|m| (m.id, m.clone())).collect();
        Arc::new(Self {
            state: Mutex::new(PackState {
                pending,
                ..PackState::default()
            }),
            notify: Notify::new(),
        })
    }

    /// Callback handle for one delivery, passed to the message handler
    pub fn callback(self: &Arc<Self>, id: DeliveryId) -> MsgCallback {
        MsgCallback {
            ctx: self.clone(),
            id,
        }
    }

    fn on_success(&self, id: DeliveryId) {
        {
            let mut state = lock(&self.state);
            if let Some(msg) = state.pending.remove(&id) {
                state.success.insert(id, msg);
            }
        }
        self.notify.notify_waiters();
    }

    fn on_failure(&self, id: DeliveryId, error: String) {
        {
            let mut state = lock(&self.state);
            if let Some(msg) = state.pending.remove(&id) {
                state.exceptions.insert(msg.tenant_id.clone(), error);
                state.failed.insert(id, msg);
            }
        }
        self.notify.notify_waiters();
    }

    /// Wait until every one of `ids` has resolved or the deadline fires.
    /// Returns false on deadline expiry with at least one still pending.
    pub async fn await_ids(&self, ids: &[DeliveryId], deadline: Instant) -> bool {
        loop {
            // Register for the wakeup before checking, so a callback firing
            // in between is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = lock(&self.state);
                if ids.iter().all(|id| !state.pending.contains_key(id)) {
                    return true;
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let state = lock(&self.state);
                return ids.iter().all(|id| !state.pending.contains_key(id));
            }
        }
    }

    /// Wait for the whole pack with a deadline
    pub async fn await_all(&self, deadline: Instant) -> bool {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if lock(&self.state).pending.is_empty() {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return lock(&self.state).pending.is_empty();
            }
        }
    }

    /// Drain the pack into a processing result
    pub fn to_result(&self, queue_name: &str, timed_out: bool) -> ProcessingResult {
        let mut state = lock(&self.state);
        ProcessingResult {
            queue_name: queue_name.to_string(),
            timed_out,
            success: std::mem::take(&mut state.success),
            failed: std::mem::take(&mut state.failed),
            pending: std::mem::take(&mut state.pending),
            exceptions: std::mem::take(&mut state.exceptions),
        }
    }
}

/// Handler-side completion reporter for one delivery
#[derive(Clone)]
pub struct MsgCallback {
    ctx: Arc<PackContext>,
    id: DeliveryId,
}

impl MsgCallback {
    pub fn on_success(&self) {
        self.ctx.on_success(self.id);
    }

    pub fn on_failure(&self, error: impl Into<String>) {
        self.ctx.on_failure(self.id, error.into());
    }
}
