//! Trade eligibility filtering.
//!
//! Drops trades that fail the price/size/correction/window predicates and
//! collapses trades printing in the same second down to the last one, matching
//! the one-NBBO-per-second granularity of the quote side.

use chrono::NaiveDate;
use taq_core::config::{SessionConfig, TradeFilterConfig};
use taq_core::{Config, Error, Keyed, Result, TimeSec, TradeRecord};
use tracing::{debug, trace, warn};

/// Statistics about trade filtering.
#[derive(Debug, Clone, Default)]
pub struct FilterStats {
    /// Trades read from the source.
    pub total_trades: u64,
    /// Trades passing the predicate.
    pub accepted_trades: u64,
    /// Trades failing the predicate.
    pub rejected_trades: u64,
    /// Accepted trades replaced by a later trade in the same second.
    pub collapsed_trades: u64,
    /// Trades handed downstream.
    pub emitted_trades: u64,
}

/// Selection predicate plus same-second collapse.
pub struct TradeFilter {
    session: SessionConfig,
    rules: TradeFilterConfig,
    /// Last accepted trade, held until a later key arrives.
    pending: Option<TradeRecord>,
    /// Key of the last trade read, for order checks.
    prev: Option<(NaiveDate, String, TimeSec)>,
    stats: FilterStats,
}

impl TradeFilter {
    /// Create a new trade filter from a validated configuration.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            session: config.session.clone(),
            rules: config.trades.clone(),
            pending: None,
            prev: None,
            stats: FilterStats::default(),
        })
    }

    /// Whether a trade passes the selection predicate.
    pub fn accepts(&self, trade: &TradeRecord) -> bool {
        trade.price.is_finite()
            && trade.price > 0.0
            && trade.size > 0
            && self.rules.allowed_corrections.contains(&trade.correction)
            && self.session.includes(&trade.symbol)
            && trade.time >= self.session.first_trade_time()
            && trade.time <= self.session.end_time
    }

    /// Feed the next trade in stream order.
    ///
    /// Returns the previously held trade once it is known to be the last of
    /// its second.
    pub fn push(&mut self, trade: TradeRecord) -> Result<Option<TradeRecord>> {
        self.check_order(&trade)?;
        self.stats.total_trades += 1;

        if !self.accepts(&trade) {
            self.stats.rejected_trades += 1;
            trace!(key = %trade.key(), price = trade.price, size = trade.size, "rejected trade");
            return Ok(None);
        }
        self.stats.accepted_trades += 1;

        match self.pending.take() {
            Some(held) if held.key() == trade.key() => {
                self.stats.collapsed_trades += 1;
                self.pending = Some(trade);
                Ok(None)
            }
            held => {
                self.pending = Some(trade);
                if held.is_some() {
                    self.stats.emitted_trades += 1;
                }
                Ok(held)
            }
        }
    }

    /// Release the held trade at end of input.
    pub fn finish(&mut self) -> Option<TradeRecord> {
        let held = self.pending.take();
        if held.is_some() {
            self.stats.emitted_trades += 1;
        }
        debug!(
            total = self.stats.total_trades,
            emitted = self.stats.emitted_trades,
            rejected = self.stats.rejected_trades,
            collapsed = self.stats.collapsed_trades,
            "trade filtering finished"
        );
        held
    }

    /// Filter an in-memory batch.
    pub fn filter_batch(&mut self, trades: Vec<TradeRecord>) -> Result<Vec<TradeRecord>> {
        let mut result = Vec::with_capacity(trades.len());
        for trade in trades {
            if let Some(done) = self.push(trade)? {
                result.push(done);
            }
        }
        result.extend(self.finish());
        Ok(result)
    }

    /// Get filtering statistics.
    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    fn check_order(&mut self, trade: &TradeRecord) -> Result<()> {
        if let Some((date, symbol, time)) = &self.prev {
            let prev = taq_core::RecordKey {
                date: *date,
                symbol,
                time: *time,
            };
            if trade.key() < prev {
                warn!(previous = %prev, next = %trade.key(), "trade stream out of order");
                return Err(Error::ordering("trade", prev, trade.key()));
            }
        }
        self.prev = Some((trade.date, trade.symbol.clone(), trade.time));
        Ok(())
    }
}

/// Lazy filtered trade stream over an ordered trade source.
pub struct TradeStream<I>
where
    I: Iterator<Item = Result<TradeRecord>>,
{
    source: I,
    filter: TradeFilter,
    done: bool,
}

impl<I> TradeStream<I>
where
    I: Iterator<Item = Result<TradeRecord>>,
{
    pub fn new(source: impl IntoIterator<IntoIter = I>, config: &Config) -> Result<Self> {
        Ok(Self {
            source: source.into_iter(),
            filter: TradeFilter::new(config)?,
            done: false,
        })
    }

    /// Get filtering statistics so far.
    pub fn stats(&self) -> &FilterStats {
        self.filter.stats()
    }
}

impl<I> Iterator for TradeStream<I>
where
    I: Iterator<Item = Result<TradeRecord>>,
{
    type Item = Result<TradeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.source.next() {
                None => {
                    self.done = true;
                    return self.filter.finish().map(Ok);
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(trade)) => match self.filter.push(trade) {
                    Ok(Some(done)) => return Some(Ok(done)),
                    Ok(None) => {}
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                },
            }
        }
        None
    }
}
