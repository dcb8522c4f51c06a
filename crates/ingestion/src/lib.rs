//! Quote and trade ingestion for the NBBO / trade synchronization workspace.
//!
//! This crate handles:
//! - Venue label to slot mapping
//! - Per-symbol exchange books
//! - NBBO reconstruction (crossed-market recovery, gap fill)
//! - Trade eligibility filtering and same-second collapse
//! - Line-delimited JSON record sources

pub mod book;
pub mod exchange;
pub mod nbbo;
pub mod source;
pub mod trade_filter;

pub use book::{BookTop, ExchangeBook};
pub use exchange::{ExchangeCodec, ExchangeSlot};
pub use nbbo::{AggregationStats, NbboStream, QuoteAggregator};
pub use source::JsonLinesSource;
pub use trade_filter::{FilterStats, TradeFilter, TradeStream};
