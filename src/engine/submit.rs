//! Submission planning: how a polled pack is released to the handler
//!
//! A plan is a sequence of waves. Messages within one wave may run
//! concurrently; the next wave starts only after the previous one has fully
//! resolved. Planning is pure reordering and grouping, it never drops or
//! duplicates a delivery.

use crate::config::{SubmitSettings, SubmitStrategyType};
use crate::engine::message::MsgEnvelope;
use std::collections::HashMap;

/// Plan the release order of one pack of messages
pub fn plan_waves(settings: &SubmitSettings, msgs: Vec<MsgEnvelope>) -> Vec<Vec<MsgEnvelope>> {
    if msgs.is_empty() {
        return Vec::new();
    }
    match settings.strategy {
        SubmitStrategyType::Burst => vec![msgs],
        SubmitStrategyType::Sequential => msgs.into_iter().map(|m| vec![m]).collect(),
        SubmitStrategyType::SequentialByOriginator => by_originator(msgs),
        SubmitStrategyType::Batch => {
            let batch_size = settings.batch_size.max(1);
            let mut waves = Vec::with_capacity(msgs.len().div_ceil(batch_size));
            let mut iter = msgs.into_iter().peekable();
            while iter.peek().is_some() {
                waves.push(iter.by_ref().take(batch_size).collect());
            }
            waves
        }
    }
}

/// Wave k holds the k-th message of every originator, preserving arrival
/// order per originator while letting distinct originators run concurrently.
fn by_originator(msgs: Vec<MsgEnvelope>) -> Vec<Vec<MsgEnvelope>> {
    let mut per_originator: HashMap<String, Vec<MsgEnvelope>> = HashMap::new();
    let mut arrival: Vec<String> = Vec::new();
    for msg in msgs {
        let queue = per_originator.entry(msg.originator.clone()).or_default();
        if queue.is_empty() {
            arrival.push(msg.originator.clone());
        }
        queue.push(msg);
    }

    let depth = per_originator.values().map(Vec::len).max().unwrap_or(0);
    let mut waves: Vec<Vec<MsgEnvelope>> = Vec::with_capacity(depth);
    for wave_idx in 0..depth {
        let mut wave = Vec::new();
        for originator in &arrival {
            if let Some(queue) = per_originator.get_mut(originator) {
                if wave_idx < queue.len() {
                    wave.push(queue[wave_idx].clone());
                }
            }
        }
        waves.push(wave);
    }
    waves
}
