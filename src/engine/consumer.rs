//! Poll loop of one queue consumer
//!
//! Each loop iteration re-reads the current settings snapshot, polls a
//! pack, submits it wave by wave under the pack deadline, runs the retry
//! machine to a terminal decision, records stats and commits. The loop
//! notices its stop flag between packs, so stopping drains the in-flight
//! pack instead of cancelling it.

use crate::config::QueueSettings;
use crate::core::sync::{lock, read_lock};
use crate::engine::message::MsgEnvelope;
use crate::engine::pack::PackContext;
use crate::engine::processing::{Decision, PackProcessingStrategy};
use crate::engine::submit::plan_waves;
use crate::engine::traits::{MessageHandler, QueueConsumer};
use crate::partition::QueueKey;
use crate::stats::ConsumerStats;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Shared handle to the queue's current settings snapshot
pub type ConfigHandle = Arc<RwLock<Arc<QueueSettings>>>;

/// Everything one poll loop needs, shared with the manager
#[derive(Clone)]
pub struct ConsumerLoopCtx {
    pub key: QueueKey,
    pub config: ConfigHandle,
    pub handler: Arc<dyn MessageHandler>,
    pub stats: Arc<ConsumerStats>,
}

/// A running poll loop and its stop control
pub struct ConsumerTask {
    consumer: Arc<dyn QueueConsumer>,
    stop: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ConsumerTask {
    /// Spawn a poll loop over an already subscribed consumer
    pub fn launch(ctx: ConsumerLoopCtx, consumer: Arc<dyn QueueConsumer>, label: String) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(consumer_loop(ctx, consumer.clone(), stop.clone(), label));
        Self {
            consumer,
            stop,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn consumer(&self) -> &Arc<dyn QueueConsumer> {
        &self.consumer
    }

    /// Request stop and wait for the loop to drain its in-flight pack
    pub async fn stop_and_await(&self) {
        self.stop.store(true, Ordering::Release);
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log::warn!("Consumer loop ended abnormally: {}", e);
            }
        }
    }
}

async fn consumer_loop(
    ctx: ConsumerLoopCtx,
    consumer: Arc<dyn QueueConsumer>,
    stop: Arc<AtomicBool>,
    label: String,
) {
    log::info!("[{}] Consumer started: {}", ctx.key, label);
    while !stop.load(Ordering::Acquire) {
        let settings = read_lock(&ctx.config).clone();
        let poll_interval = Duration::from_millis(settings.poll_interval_ms);
        let msgs = match consumer.poll(poll_interval).await {
            Ok(msgs) => msgs,
            Err(e) => {
                log::warn!("[{}] Poll failed: {}", ctx.key, e);
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };
        if msgs.is_empty() {
            continue;
        }
        process_pack(&ctx, &settings, msgs, &stop).await;
        if let Err(e) = consumer.commit().await {
            log::warn!("[{}] Commit failed: {}", ctx.key, e);
        }
    }
    consumer.unsubscribe();
    log::info!("[{}] Consumer stopped: {}", ctx.key, label);
}

/// Drive one pack through submission, retries and stats to a commit
async fn process_pack(
    ctx: &ConsumerLoopCtx,
    settings: &QueueSettings,
    msgs: Vec<MsgEnvelope>,
    stop: &AtomicBool,
) {
    let mut strategy = PackProcessingStrategy::new(settings.processing_strategy.clone());
    let mut current = msgs;
    loop {
        let pack = PackContext::new(&current);
        let deadline =
            Instant::now() + Duration::from_millis(settings.pack_processing_timeout_ms);
        let mut timed_out = false;
        for wave in plan_waves(&settings.submit_strategy, current) {
            let ids: Vec<_> = wave.iter().map(|m| m.id).collect();
            for msg in wave {
                let callback = pack.callback(msg.id);
                let supervisor = callback.clone();
                let handler = ctx.handler.clone();
                let key = ctx.key.clone();
                // Handler runs in its own task so a panic becomes a
                // failure of that delivery, not of the poll loop.
                let join = tokio::spawn(async move { handler.handle(msg, callback).await });
                // Supervised detached: the wave waits on the pack deadline
                // below, never on the handler task itself.
                tokio::spawn(async move {
                    if let Err(e) = join.await {
                        if e.is_panic() {
                            log::error!("[{}] Message handler panicked", key);
                            supervisor.on_failure("Message handler panicked");
                        }
                    }
                });
            }
            if !pack.await_ids(&ids, deadline).await {
                // Later waves were never submitted and stay pending.
                timed_out = true;
                break;
            }
        }

        let result = pack.to_result(&ctx.key.queue_name, timed_out);
        if timed_out && strategy.skip_timed_out() {
            log::debug!(
                "[{}] Dropping {} timed-out deliveries",
                ctx.key,
                result.pending.len()
            );
        }
        let decision = strategy.analyze(&result);
        ctx.stats.log(&result, decision.is_commit());
        match decision {
            Decision::Commit => return,
            Decision::Retry { reprocess, pause } => {
                if stop.load(Ordering::Acquire) {
                    log::info!(
                        "[{}] Stop requested, abandoning retries for {} deliveries",
                        ctx.key,
                        reprocess.len()
                    );
                    return;
                }
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
                current = reprocess;
            }
        }
    }
}
