//! Configuration structures for the NBBO / trade synchronization pass.

use crate::error::{Error, Result};
use crate::types::TimeSec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for one batch pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Trading window, lag and symbol universe.
    pub session: SessionConfig,
    /// Quote validity rules.
    pub quotes: QuoteFilterConfig,
    /// Trade eligibility rules.
    pub trades: TradeFilterConfig,
    /// Tick grid used for implied price fractions.
    pub price_grid: PriceGridConfig,
}

impl Config {
    /// Parse a configuration from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check the cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let s = &self.session;
        if s.end_time < s.start_time {
            return Err(Error::config(format!(
                "end_time {} precedes start_time {}",
                s.end_time, s.start_time
            )));
        }
        if s.lag_seconds < 0 {
            return Err(Error::config(format!(
                "lag_seconds must be non-negative, got {}",
                s.lag_seconds
            )));
        }
        if s.lag_seconds > s.end_time - s.start_time {
            return Err(Error::config(format!(
                "lag_seconds {} exceeds the trading window",
                s.lag_seconds
            )));
        }
        if !(self.price_grid.tick_unit > 0.0) {
            return Err(Error::config("tick_unit must be positive"));
        }
        if self.price_grid.bin_count == 0 {
            return Err(Error::config("bin_count must be at least 1"));
        }
        if self.quotes.min_bid < 0.0 {
            return Err(Error::config("min_bid must be non-negative"));
        }
        if let Some(frac) = self.quotes.max_spread_frac {
            if !(frac > 0.0) {
                return Err(Error::config("max_spread_frac must be positive"));
            }
        }
        Ok(())
    }
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// First second of the trading window (seconds after midnight, inclusive).
    pub start_time: TimeSec,
    /// Last second of the trading window (inclusive).
    pub end_time: TimeSec,
    /// Quote information latency in seconds.
    pub lag_seconds: TimeSec,
    /// Symbols to process. Empty means every symbol.
    pub symbols: Vec<String>,
}

impl SessionConfig {
    /// Whether a symbol is in the configured universe.
    pub fn includes(&self, symbol: &str) -> bool {
        self.symbols.is_empty() || self.symbols.iter().any(|s| s == symbol)
    }

    /// Latest raw quote time whose lagged snapshot can still meet a trade.
    pub fn last_quote_time(&self) -> TimeSec {
        self.end_time - self.lag_seconds
    }

    /// Earliest trade time that has a lagged quote inside the window.
    pub fn first_trade_time(&self) -> TimeSec {
        self.start_time + self.lag_seconds
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start_time: 9 * 3600 + 30 * 60,
            end_time: 16 * 3600,
            lag_seconds: 0,
            symbols: Vec::new(),
        }
    }
}

/// Quote validity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteFilterConfig {
    /// Bids must be strictly above this price.
    pub min_bid: f64,
    /// Accepted quote condition modes. Empty accepts every mode.
    pub allowed_modes: Vec<i32>,
    /// Reject quotes whose spread is at least this fraction of the midpoint.
    pub max_spread_frac: Option<f64>,
    /// Replicate the last NBBO up to the end of the window at symbol boundaries.
    pub fill_to_window_end: bool,
}

impl Default for QuoteFilterConfig {
    fn default() -> Self {
        Self {
            min_bid: 0.01,
            allowed_modes: vec![1, 2, 6, 10, 12, 23],
            max_spread_frac: Some(0.10),
            fill_to_window_end: true,
        }
    }
}

/// Trade eligibility configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeFilterConfig {
    /// Accepted correction codes.
    pub allowed_corrections: Vec<i32>,
}

impl Default for TradeFilterConfig {
    fn default() -> Self {
        Self {
            allowed_corrections: vec![0, 1, 2],
        }
    }
}

/// Tick grid for the implied price fraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceGridConfig {
    /// Minimum price increment.
    pub tick_unit: f64,
    /// Number of equal-width bins across one tick.
    pub bin_count: u32,
}

impl Default for PriceGridConfig {
    fn default() -> Self {
        Self {
            tick_unit: 0.01,
            bin_count: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session.start_time, 34_200);
        assert_eq!(config.session.end_time, 57_600);
        assert_eq!(config.price_grid.bin_count, 20);
        assert_eq!(config.trades.allowed_corrections, vec![0, 1, 2]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = Config::from_json_str(
            r#"{ "session": { "lag_seconds": 2, "symbols": ["AAA", "CCC"] } }"#,
        )
        .unwrap();
        assert_eq!(config.session.lag_seconds, 2);
        assert_eq!(config.session.start_time, 34_200);
        assert!(config.session.includes("AAA"));
        assert!(!config.session.includes("BBB"));
        assert_eq!(config.session.first_trade_time(), 34_202);
        assert_eq!(config.session.last_quote_time(), 57_598);
    }

    #[test]
    fn test_empty_universe_includes_everything() {
        let session = SessionConfig::default();
        assert!(session.includes("ZZZ"));
    }

    #[test]
    fn test_rejects_inverted_window() {
        let err = Config::from_json_str(
            r#"{ "session": { "start_time": 100, "end_time": 50 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_negative_lag_and_bad_grid() {
        let mut config = Config::default();
        config.session.lag_seconds = -1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.price_grid.tick_unit = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.price_grid.bin_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        let err = Config::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
