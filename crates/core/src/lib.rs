//! Core types and configuration for the NBBO / trade synchronization workspace.
//!
//! This crate provides shared types used across all other crates:
//! - Record types (quotes, trades, NBBO snapshots, merged rows)
//! - The (date, symbol, time) stream key
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
