//! packflow: a partitioned message-queue consumption engine
//!
//! Queues are named, partitioned, tenant-scoped channels. The engine
//! resolves message originators onto partitions, consumes each partition
//! through configurable submit and retry strategies, and reports per-queue
//! statistics to a time-series sink.

pub mod app;
pub mod common;
pub mod config;
pub mod core;
pub mod engine;
pub mod partition;
pub mod stats;
