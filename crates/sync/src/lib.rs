//! Lagged NBBO / trade synchronization.
//!
//! This crate provides:
//! - Forward-only, order-checking stream cursors
//! - The symbol/time catch-up merge of snapshots against trades
//! - End-to-end pipeline wiring from raw record sources

pub mod cursor;
pub mod pipeline;
pub mod synchronizer;

pub use pipeline::{synchronize, synchronize_files, Pipeline};
pub use synchronizer::{MaterializedSnapshots, StreamSynchronizer, SyncPhase, SyncStats};
