//! Core data types for the NBBO / trade synchronization workspace.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Time of day in whole seconds after midnight.
pub type TimeSec = i64;

/// Share quantity.
pub type Size = u64;

/// Borrowed (date, symbol, time) sort key shared by every record stream.
///
/// Field order gives the stream order: date, then symbol compared
/// lexicographically, then time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecordKey<'a> {
    pub date: NaiveDate,
    pub symbol: &'a str,
    pub time: TimeSec,
}

impl RecordKey<'_> {
    /// Compare only the (date, symbol) series part of two keys.
    #[inline]
    pub fn series_cmp(&self, other: &RecordKey<'_>) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.symbol.cmp(other.symbol))
    }

    /// Whether two keys belong to the same (date, symbol) series.
    #[inline]
    pub fn same_series(&self, other: &RecordKey<'_>) -> bool {
        self.series_cmp(other) == Ordering::Equal
    }
}

impl fmt::Display for RecordKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.date, self.symbol, self.time)
    }
}

/// Anything carried in a (date, symbol, time) ordered stream.
pub trait Keyed {
    fn key(&self) -> RecordKey<'_>;
}

/// A raw per-exchange quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub date: NaiveDate,
    pub symbol: String,
    pub time: TimeSec,
    /// Single-character venue label.
    pub exchange: char,
    pub bid: f64,
    pub bid_size: Size,
    pub offer: f64,
    pub offer_size: Size,
    /// Quote condition / eligibility mode.
    pub mode: i32,
}

impl QuoteRecord {
    /// Calculate mid price.
    #[inline]
    pub fn mid(&self) -> f64 {
        (self.bid + self.offer) / 2.0
    }

    /// Calculate spread.
    #[inline]
    pub fn spread(&self) -> f64 {
        self.offer - self.bid
    }
}

impl Keyed for QuoteRecord {
    fn key(&self) -> RecordKey<'_> {
        RecordKey {
            date: self.date,
            symbol: &self.symbol,
            time: self.time,
        }
    }
}

/// A raw trade print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub symbol: String,
    pub time: TimeSec,
    pub price: f64,
    pub size: Size,
    /// Correction indicator (0 = regular, 1/2 = original later corrected).
    pub correction: i32,
}

impl Keyed for TradeRecord {
    fn key(&self) -> RecordKey<'_> {
        RecordKey {
            date: self.date,
            symbol: &self.symbol,
            time: self.time,
        }
    }
}

/// Consolidated best bid and offer for one symbol at one second.
///
/// `time` is the raw quote second. Matching against trades happens at
/// `time + lag` (see [`NbboSnapshot::lagged_time`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NbboSnapshot {
    pub date: NaiveDate,
    pub symbol: String,
    pub time: TimeSec,
    pub best_bid: f64,
    pub best_offer: f64,
    /// Aggregate size across venues quoting the best bid.
    pub best_bid_size: Size,
    /// Aggregate size across venues quoting the best offer.
    pub best_offer_size: Size,
    pub total_size: Size,
    /// ln(best_bid_size) + ln(best_offer_size).
    pub total_log_size: f64,
    pub min_best_size: Size,
    /// Size-weighted price between bid and offer.
    pub implied_price: f64,
    /// Implied price modulo the tick unit.
    pub implied_price_frac: f64,
    /// Equal-width bin of `implied_price_frac` across one tick.
    pub implied_price_bin: u32,
}

impl NbboSnapshot {
    /// Time at which a trade is matched against this snapshot.
    #[inline]
    pub fn lagged_time(&self, lag: TimeSec) -> TimeSec {
        self.time + lag
    }

    /// Copy of this snapshot re-stamped at another second.
    pub fn at(&self, time: TimeSec) -> Self {
        Self {
            time,
            ..self.clone()
        }
    }
}

impl Keyed for NbboSnapshot {
    fn key(&self) -> RecordKey<'_> {
        RecordKey {
            date: self.date,
            symbol: &self.symbol,
            time: self.time,
        }
    }
}

/// A trade joined with the lagged NBBO in force when it printed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub date: NaiveDate,
    pub symbol: String,
    pub quote_time: TimeSec,
    pub trade_time: TimeSec,
    pub best_bid: f64,
    pub best_offer: f64,
    pub best_bid_size: Size,
    pub best_offer_size: Size,
    pub trade_price: f64,
    pub trade_size: Size,
    pub implied_price: f64,
    /// Position of the implied price inside its tick, in [0, 1).
    pub implied_price_dec: f64,
}

impl MergedRecord {
    /// Join a snapshot with the trade it was matched to.
    pub fn join(snapshot: &NbboSnapshot, trade: &TradeRecord, tick_unit: f64) -> Self {
        Self {
            date: trade.date,
            symbol: trade.symbol.clone(),
            quote_time: snapshot.time,
            trade_time: trade.time,
            best_bid: snapshot.best_bid,
            best_offer: snapshot.best_offer,
            best_bid_size: snapshot.best_bid_size,
            best_offer_size: snapshot.best_offer_size,
            trade_price: trade.price,
            trade_size: trade.size,
            implied_price: snapshot.implied_price,
            implied_price_dec: snapshot.implied_price_frac / tick_unit,
        }
    }

    /// Signed distance of the trade from the implied price.
    #[inline]
    pub fn price_deviation(&self) -> f64 {
        self.trade_price - self.implied_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn key(d: u32, symbol: &str, time: TimeSec) -> RecordKey<'_> {
        RecordKey {
            date: date(d),
            symbol,
            time,
        }
    }

    #[test]
    fn test_key_ordering() {
        assert!(key(2, "AAA", 100) < key(2, "AAA", 101));
        assert!(key(2, "AAA", 500) < key(2, "AAB", 1));
        assert!(key(2, "ZZZ", 500) < key(3, "AAA", 1));
        assert!(key(2, "AAA", 1).same_series(&key(2, "AAA", 9)));
        assert_eq!(
            key(2, "AAA", 1).series_cmp(&key(2, "BBB", 0)),
            Ordering::Less
        );
    }

    #[test]
    fn test_key_display() {
        assert_eq!(key(2, "AAA", 100).to_string(), "2024-01-02 AAA 100");
    }

    #[test]
    fn test_quote_mid_spread() {
        let quote = QuoteRecord {
            date: date(2),
            symbol: "AAA".to_string(),
            time: 100,
            exchange: 'N',
            bid: 10.00,
            bid_size: 100,
            offer: 10.04,
            offer_size: 100,
            mode: 12,
        };
        assert_relative_eq!(quote.mid(), 10.02, epsilon = 1e-10);
        assert_relative_eq!(quote.spread(), 0.04, epsilon = 1e-10);
    }

    #[test]
    fn test_merged_join() {
        let snapshot = NbboSnapshot {
            date: date(2),
            symbol: "AAA".to_string(),
            time: 103,
            best_bid: 10.00,
            best_offer: 10.02,
            best_bid_size: 300,
            best_offer_size: 100,
            total_size: 400,
            total_log_size: (300f64).ln() + (100f64).ln(),
            min_best_size: 100,
            implied_price: 10.015,
            implied_price_frac: 0.005,
            implied_price_bin: 10,
        };
        let trade = TradeRecord {
            date: date(2),
            symbol: "AAA".to_string(),
            time: 105,
            price: 10.02,
            size: 200,
            correction: 0,
        };
        let merged = MergedRecord::join(&snapshot, &trade, 0.01);
        assert_eq!(merged.quote_time, 103);
        assert_eq!(merged.trade_time, 105);
        assert_eq!(snapshot.lagged_time(2), merged.trade_time);
        assert_relative_eq!(merged.implied_price_dec, 0.5, epsilon = 1e-9);
        assert_relative_eq!(merged.price_deviation(), 0.005, epsilon = 1e-9);
    }

    #[test]
    fn test_snapshot_serde_dates() {
        let trade = TradeRecord {
            date: date(2),
            symbol: "AAA".to_string(),
            time: 34_200,
            price: 10.0,
            size: 100,
            correction: 0,
        };
        let json = serde_json::to_string(&trade).unwrap();
        assert!(json.contains("\"2024-01-02\""));
        let back: TradeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trade);
    }
}
