//! Lagged merge-join of NBBO snapshots against filtered trades.
//!
//! Both inputs are ordered by (date, symbol, time) but cover different symbol
//! sets and different active seconds, so the join runs two catch-up phases:
//!
//! 1. **Symbol catch-up**: while the cursors sit on different (date, symbol)
//!    series, the one holding the smaller series advances. Trades skipped here
//!    have no quote data and are dropped.
//! 2. **Time catch-up**: with series aligned,
//!    `diff = trade.time - (quote.time + lag)`. A positive diff advances the
//!    snapshot cursor, a negative one drops the trade, and zero emits a
//!    [`MergedRecord`].
//!
//! Only exact lagged-time equality produces a row. Snapshots arrive gap-filled,
//! so an in-window trade normally finds its second.

use crate::cursor::Cursor;
use chrono::NaiveDate;
use std::cmp::Ordering;
use taq_core::{Config, Error, Keyed, MergedRecord, NbboSnapshot, Result, TimeSec, TradeRecord};
use tracing::{debug, trace, warn};

/// Which catch-up loop the synchronizer last ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Cursors not yet positioned.
    Idle,
    /// Advancing whichever cursor holds the smaller (date, symbol).
    SymbolCatchUp,
    /// Series aligned, advancing by lagged time.
    TimeCatchUp,
    /// Both streams consumed (or a fatal error stopped the pass).
    Finished,
}

/// Counters for one synchronization pass.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Rows emitted.
    pub matched: u64,
    /// Trades passed over without a matching snapshot.
    pub trades_dropped: u64,
    /// Trades dropped because no snapshot series existed for their symbol.
    pub trades_without_quotes: u64,
    /// Snapshots read.
    pub snapshots_read: u64,
    /// Trades read.
    pub trades_read: u64,
}

impl SyncStats {
    /// Fraction of trades that produced a row.
    pub fn match_rate(&self) -> f64 {
        if self.trades_read > 0 {
            self.matched as f64 / self.trades_read as f64
        } else {
            0.0
        }
    }
}

/// One decision of the catch-up loop.
enum Step {
    AdvanceQuotes,
    DropTrade { no_series: bool },
    Emit(MergedRecord),
    Drain,
}

/// Snapshot stream backed by an in-memory vector.
pub type MaterializedSnapshots =
    std::iter::Map<std::vec::IntoIter<NbboSnapshot>, fn(NbboSnapshot) -> Result<NbboSnapshot>>;

/// Lazy iterator of merged rows over a snapshot stream and a trade stream.
pub struct StreamSynchronizer<Q, T>
where
    Q: Iterator<Item = Result<NbboSnapshot>>,
    T: Iterator<Item = Result<TradeRecord>>,
{
    quotes: Cursor<Q, NbboSnapshot>,
    trades: Cursor<T, TradeRecord>,
    lag: TimeSec,
    tick_unit: f64,
    phase: SyncPhase,
    /// (date, symbol) of the last snapshot stepped past.
    last_series: Option<(NaiveDate, String)>,
    /// The trade under the cursor was emitted; step past it on the next pull.
    matched_pending: bool,
    stats: SyncStats,
}

impl<Q, T> StreamSynchronizer<Q, T>
where
    Q: Iterator<Item = Result<NbboSnapshot>>,
    T: Iterator<Item = Result<TradeRecord>>,
{
    /// Join a snapshot stream (live or materialized) with a trade stream.
    pub fn new(
        snapshots: impl IntoIterator<IntoIter = Q>,
        trades: impl IntoIterator<IntoIter = T>,
        config: &Config,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            quotes: Cursor::new("snapshot", snapshots.into_iter()),
            trades: Cursor::new("trade", trades.into_iter()),
            lag: config.session.lag_seconds,
            tick_unit: config.price_grid.tick_unit,
            phase: SyncPhase::Idle,
            last_series: None,
            matched_pending: false,
            stats: SyncStats::default(),
        })
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Get synchronization statistics so far.
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    fn advance_quotes(&mut self) -> Result<()> {
        if let Some(q) = self.quotes.current() {
            if !self.had_snapshots(q.date, &q.symbol) {
                self.last_series = Some((q.date, q.symbol.clone()));
            }
        }
        self.quotes.advance()?;
        self.stats.snapshots_read = self.quotes.read();
        Ok(())
    }

    fn advance_trades(&mut self) -> Result<()> {
        self.trades.advance()?;
        self.stats.trades_read = self.trades.read();
        Ok(())
    }

    fn next_step(&mut self) -> Step {
        let (Some(q), Some(t)) = (self.quotes.current(), self.trades.current()) else {
            return Step::Drain;
        };
        match q.key().series_cmp(&t.key()) {
            Ordering::Less => {
                self.phase = SyncPhase::SymbolCatchUp;
                Step::AdvanceQuotes
            }
            Ordering::Greater => {
                self.phase = SyncPhase::SymbolCatchUp;
                Step::DropTrade { no_series: true }
            }
            Ordering::Equal => {
                self.phase = SyncPhase::TimeCatchUp;
                let diff = t.time - q.lagged_time(self.lag);
                match diff.cmp(&0) {
                    Ordering::Greater => Step::AdvanceQuotes,
                    Ordering::Less => Step::DropTrade { no_series: false },
                    Ordering::Equal => Step::Emit(MergedRecord::join(q, t, self.tick_unit)),
                }
            }
        }
    }

    /// Whether the snapshot stream's last series is (date, symbol).
    fn had_snapshots(&self, date: NaiveDate, symbol: &str) -> bool {
        self.last_series
            .as_ref()
            .is_some_and(|(d, s)| *d == date && s == symbol)
    }

    /// Consume whatever remains of both streams once either is exhausted.
    fn drain(&mut self) -> Result<()> {
        while let Some(t) = self.trades.current() {
            self.stats.trades_dropped += 1;
            if !self.had_snapshots(t.date, &t.symbol) {
                self.stats.trades_without_quotes += 1;
            }
            self.advance_trades()?;
        }
        while self.quotes.current().is_some() {
            self.advance_quotes()?;
        }
        Ok(())
    }

    fn fail(&mut self, err: Error) -> Option<Result<MergedRecord>> {
        warn!(error = %err, "synchronization aborted");
        self.phase = SyncPhase::Finished;
        Some(Err(err))
    }
}

impl<T> StreamSynchronizer<MaterializedSnapshots, T>
where
    T: Iterator<Item = Result<TradeRecord>>,
{
    /// Join a fully precomputed snapshot set with a trade stream.
    pub fn from_snapshots(
        snapshots: Vec<NbboSnapshot>,
        trades: impl IntoIterator<IntoIter = T>,
        config: &Config,
    ) -> Result<Self> {
        let snapshots: MaterializedSnapshots =
            snapshots.into_iter().map(Ok as fn(NbboSnapshot) -> Result<NbboSnapshot>);
        Self::new(snapshots, trades, config)
    }
}

impl<Q, T> Iterator for StreamSynchronizer<Q, T>
where
    Q: Iterator<Item = Result<NbboSnapshot>>,
    T: Iterator<Item = Result<TradeRecord>>,
{
    type Item = Result<MergedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.phase {
            SyncPhase::Finished => return None,
            SyncPhase::Idle => {
                if let Err(e) = self.advance_quotes().and_then(|_| self.advance_trades()) {
                    return self.fail(e);
                }
            }
            SyncPhase::SymbolCatchUp | SyncPhase::TimeCatchUp => {}
        }
        if std::mem::take(&mut self.matched_pending) {
            if let Err(e) = self.advance_trades() {
                return self.fail(e);
            }
        }

        loop {
            let moved = match self.next_step() {
                Step::AdvanceQuotes => self.advance_quotes(),
                Step::DropTrade { no_series } => {
                    self.stats.trades_dropped += 1;
                    if no_series {
                        self.stats.trades_without_quotes += 1;
                    }
                    if let Some(t) = self.trades.current() {
                        trace!(
                            key = %t.key(),
                            no_series,
                            "trade dropped without a lagged quote"
                        );
                    }
                    self.advance_trades()
                }
                Step::Emit(row) => {
                    self.stats.matched += 1;
                    self.matched_pending = true;
                    return Some(Ok(row));
                }
                Step::Drain => {
                    if let Err(e) = self.drain() {
                        return self.fail(e);
                    }
                    self.phase = SyncPhase::Finished;
                    debug!(
                        matched = self.stats.matched,
                        dropped = self.stats.trades_dropped,
                        without_quotes = self.stats.trades_without_quotes,
                        snapshots = self.stats.snapshots_read,
                        "synchronization finished"
                    );
                    return None;
                }
            };
            if let Err(e) = moved {
                return self.fail(e);
            }
        }
    }
}
