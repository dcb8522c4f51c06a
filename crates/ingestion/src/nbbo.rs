//! NBBO reconstruction from per-exchange quotes.
//!
//! Quotes arrive ordered by (date, symbol, time) and are consumed one second
//! at a time. Each second updates the series' [`ExchangeBook`], and exactly one
//! [`NbboSnapshot`] is produced for every second between the first accepted
//! NBBO of a series and its last quote (or the end of the window, with close
//! fill enabled).

use crate::book::{BookTop, ExchangeBook, SlotQuote};
use crate::exchange::ExchangeCodec;
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::iter::Peekable;
use taq_core::config::{PriceGridConfig, QuoteFilterConfig, SessionConfig};
use taq_core::{Config, Error, Keyed, NbboSnapshot, QuoteRecord, Result, TimeSec};
use tracing::{debug, trace, warn};

/// Tolerance used when snapping prices onto the tick grid.
const GRID_EPSILON: f64 = 1e-9;

/// Position of `price` inside its tick, as a fraction in [0, 1).
///
/// Prices within `GRID_EPSILON` ticks of a grid line snap to 0.
pub fn tick_position(price: f64, tick_unit: f64) -> f64 {
    let scaled = price / tick_unit;
    let pos = scaled - scaled.floor();
    if pos < GRID_EPSILON || pos > 1.0 - GRID_EPSILON {
        0.0
    } else {
        pos
    }
}

/// Equal-width bin of a tick position, in `0..bin_count`.
pub fn position_bin(position: f64, bin_count: u32) -> u32 {
    let bin = (position * bin_count as f64 + GRID_EPSILON).floor() as u32;
    bin.min(bin_count.saturating_sub(1))
}

/// Counters for one aggregation pass.
#[derive(Debug, Clone, Default)]
pub struct AggregationStats {
    /// Second groups ingested.
    pub groups: u64,
    /// Groups skipped because their symbol is outside the universe.
    pub groups_skipped: u64,
    /// Quote records applied to a book.
    pub records_accepted: u64,
    /// Quote records failing validation.
    pub records_rejected: u64,
    /// Seconds whose book came out locked or crossed.
    pub crossed_seconds: u64,
    /// Seconds that reused the previous NBBO (crossed or empty book).
    pub carried_seconds: u64,
    /// Snapshots replicated into gaps or up to the close.
    pub filled_seconds: u64,
    /// Snapshots handed downstream.
    pub snapshots_emitted: u64,
    /// Distinct (date, symbol) series seen.
    pub series: u64,
}

/// Owned copy of the last ingested group key, for order checks.
#[derive(Debug, Clone)]
struct GroupKey {
    date: NaiveDate,
    symbol: String,
    time: TimeSec,
}

/// Per-series NBBO state machine.
pub struct QuoteAggregator {
    session: SessionConfig,
    filter: QuoteFilterConfig,
    grid: PriceGridConfig,
    codec: ExchangeCodec,
    /// Venue state of the current series.
    book: Option<ExchangeBook>,
    /// Last accepted NBBO of the current series.
    last: Option<NbboSnapshot>,
    /// Raw second the current series last advanced to.
    last_time: Option<TimeSec>,
    prev_key: Option<GroupKey>,
    stats: AggregationStats,
}

impl QuoteAggregator {
    /// Create an aggregator from a validated configuration.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            session: config.session.clone(),
            filter: config.quotes.clone(),
            grid: config.price_grid.clone(),
            codec: ExchangeCodec::new(),
            book: None,
            last: None,
            last_time: None,
            prev_key: None,
            stats: AggregationStats::default(),
        })
    }

    /// Whether a quote passes the validity rules.
    pub fn accepts(&self, q: &QuoteRecord) -> bool {
        if !(q.bid.is_finite() && q.offer.is_finite()) {
            return false;
        }
        if q.bid <= self.filter.min_bid || q.offer <= q.bid {
            return false;
        }
        if q.bid_size == 0 || q.offer_size == 0 {
            return false;
        }
        if !self.filter.allowed_modes.is_empty() && !self.filter.allowed_modes.contains(&q.mode) {
            return false;
        }
        match self.filter.max_spread_frac {
            Some(frac) => q.spread() < frac * q.mid(),
            None => true,
        }
    }

    /// Ingest every quote sharing one (date, symbol, time) key.
    ///
    /// Returns the snapshots that became final: gap fill for skipped seconds,
    /// the close fill of a finished series, and this second's NBBO.
    pub fn ingest_second_group(&mut self, group: &[QuoteRecord]) -> Result<Vec<NbboSnapshot>> {
        let Some(first) = group.first() else {
            return Ok(Vec::new());
        };
        let key = first.key();
        if let Some(stray) = group.iter().find(|q| q.key() != key) {
            return Err(Error::data(format!(
                "quote group for {} contains {}",
                key,
                stray.key()
            )));
        }
        self.check_order(first)?;
        self.stats.groups += 1;

        if !self.session.includes(&first.symbol) {
            self.stats.groups_skipped += 1;
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        let same_series = self
            .book
            .as_ref()
            .is_some_and(|b| b.is_for(first.date, &first.symbol));
        if !same_series {
            self.finish_series(&mut out);
            debug!(date = %first.date, symbol = %first.symbol, "starting quote series");
            self.book = Some(ExchangeBook::new(first.date, first.symbol.clone()));
            self.stats.series += 1;
        }

        self.fill_until(first.time, &mut out);

        let mut book = match self.book.take() {
            Some(book) => book,
            None => ExchangeBook::new(first.date, first.symbol.clone()),
        };
        for q in group {
            if self.accepts(q) {
                book.update(self.codec.map(q.exchange), SlotQuote::from(q));
                self.stats.records_accepted += 1;
            } else {
                self.stats.records_rejected += 1;
                trace!(key = %q.key(), bid = q.bid, offer = q.offer, "rejected quote");
            }
        }

        let snapshot = match book.top() {
            Some(top) if !top.is_locked_or_crossed() => {
                Some(self.snapshot(first.date, &first.symbol, first.time, top))
            }
            Some(top) => {
                self.stats.crossed_seconds += 1;
                debug!(
                    key = %key,
                    bid = top.bid,
                    offer = top.offer,
                    "locked or crossed book, carrying previous NBBO"
                );
                book.clear();
                self.carry(first.time)
            }
            None => self.carry(first.time),
        };
        self.book = Some(book);

        if let Some(snapshot) = snapshot {
            self.last = Some(snapshot.clone());
            self.emit(snapshot, &mut out);
        }
        self.last_time = Some(first.time);

        Ok(out)
    }

    /// Flush the current series at end of input.
    pub fn finish(&mut self) -> Vec<NbboSnapshot> {
        let mut out = Vec::new();
        self.finish_series(&mut out);
        debug!(
            series = self.stats.series,
            emitted = self.stats.snapshots_emitted,
            rejected = self.stats.records_rejected,
            crossed = self.stats.crossed_seconds,
            "quote aggregation finished"
        );
        out
    }

    /// Get aggregation statistics.
    pub fn stats(&self) -> &AggregationStats {
        &self.stats
    }

    /// Current series' book, if any.
    pub fn book(&self) -> Option<&ExchangeBook> {
        self.book.as_ref()
    }

    fn check_order(&mut self, first: &QuoteRecord) -> Result<()> {
        if let Some(prev) = &self.prev_key {
            let prev_key = taq_core::RecordKey {
                date: prev.date,
                symbol: &prev.symbol,
                time: prev.time,
            };
            if first.key() <= prev_key {
                warn!(previous = %prev_key, next = %first.key(), "quote stream out of order");
                return Err(Error::ordering("quote", prev_key, first.key()));
            }
        }
        self.prev_key = Some(GroupKey {
            date: first.date,
            symbol: first.symbol.clone(),
            time: first.time,
        });
        Ok(())
    }

    /// Close out the current series, replicating up to the window end if
    /// configured.
    fn finish_series(&mut self, out: &mut Vec<NbboSnapshot>) {
        if self.book.is_none() {
            return;
        }
        if self.filter.fill_to_window_end {
            self.fill_until(self.session.last_quote_time() + 1, out);
        }
        self.book = None;
        self.last = None;
        self.last_time = None;
    }

    /// Replicate the last NBBO for every second strictly between the last
    /// processed second and `time`, clipped to the emission window.
    fn fill_until(&mut self, time: TimeSec, out: &mut Vec<NbboSnapshot>) {
        let (Some(last), Some(last_time)) = (self.last.clone(), self.last_time) else {
            return;
        };
        let from = (last_time + 1).max(self.session.start_time);
        let to = time.min(self.session.last_quote_time() + 1);
        for t in from..to {
            self.stats.filled_seconds += 1;
            self.emit(last.at(t), out);
        }
    }

    fn carry(&mut self, time: TimeSec) -> Option<NbboSnapshot> {
        let last = self.last.as_ref()?;
        self.stats.carried_seconds += 1;
        Some(last.at(time))
    }

    fn emit(&mut self, snapshot: NbboSnapshot, out: &mut Vec<NbboSnapshot>) {
        let last_quote_time = self.session.last_quote_time();
        if snapshot.time < self.session.start_time || snapshot.time > last_quote_time {
            return;
        }
        self.stats.snapshots_emitted += 1;
        out.push(snapshot);
    }

    fn snapshot(&self, date: NaiveDate, symbol: &str, time: TimeSec, top: BookTop) -> NbboSnapshot {
        let bid_size = top.bid_size as f64;
        let offer_size = top.offer_size as f64;
        let implied_price = (top.offer * bid_size + top.bid * offer_size) / (bid_size + offer_size);
        let position = tick_position(implied_price, self.grid.tick_unit);

        NbboSnapshot {
            date,
            symbol: symbol.to_string(),
            time,
            best_bid: top.bid,
            best_offer: top.offer,
            best_bid_size: top.bid_size,
            best_offer_size: top.offer_size,
            total_size: top.bid_size + top.offer_size,
            total_log_size: bid_size.ln() + offer_size.ln(),
            min_best_size: top.bid_size.min(top.offer_size),
            implied_price,
            implied_price_frac: position * self.grid.tick_unit,
            implied_price_bin: position_bin(position, self.grid.bin_count),
        }
    }
}

/// Lazy NBBO stream over an ordered quote source.
pub struct NbboStream<I>
where
    I: Iterator<Item = Result<QuoteRecord>>,
{
    source: Peekable<I>,
    aggregator: QuoteAggregator,
    pending: VecDeque<NbboSnapshot>,
    group: Vec<QuoteRecord>,
    done: bool,
}

impl<I> NbboStream<I>
where
    I: Iterator<Item = Result<QuoteRecord>>,
{
    pub fn new(source: impl IntoIterator<IntoIter = I>, config: &Config) -> Result<Self> {
        Ok(Self {
            source: source.into_iter().peekable(),
            aggregator: QuoteAggregator::new(config)?,
            pending: VecDeque::new(),
            group: Vec::new(),
            done: false,
        })
    }

    /// Get aggregation statistics so far.
    pub fn stats(&self) -> &AggregationStats {
        self.aggregator.stats()
    }

    /// Pull the next full second group from the source into `self.group`.
    fn next_group(&mut self) -> Option<Result<()>> {
        let first = match self.source.next()? {
            Ok(q) => q,
            Err(e) => return Some(Err(e)),
        };
        self.group.clear();
        self.group.push(first);
        while let Some(Ok(q)) = self
            .source
            .next_if(|r| matches!(r, Ok(q) if q.key() == self.group[0].key()))
        {
            self.group.push(q);
        }
        Some(Ok(()))
    }
}

impl<I> Iterator for NbboStream<I>
where
    I: Iterator<Item = Result<QuoteRecord>>,
{
    type Item = Result<NbboSnapshot>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(snapshot) = self.pending.pop_front() {
                return Some(Ok(snapshot));
            }
            if self.done {
                return None;
            }
            match self.next_group() {
                None => {
                    self.done = true;
                    self.pending.extend(self.aggregator.finish());
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(())) => match self.aggregator.ingest_second_group(&self.group) {
                    Ok(out) => self.pending.extend(out),
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                },
            }
        }
    }
}
