//! Per-symbol exchange book.
//!
//! Holds the last valid quote seen from each venue for one (date, symbol)
//! series. A new book is created at the first quote of a series and dropped at
//! the next series boundary.

use crate::exchange::{ExchangeSlot, SLOT_COUNT};
use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use taq_core::{QuoteRecord, Size};

/// Last quote held for one venue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotQuote {
    pub bid: f64,
    pub bid_size: Size,
    pub offer: f64,
    pub offer_size: Size,
}

impl From<&QuoteRecord> for SlotQuote {
    fn from(q: &QuoteRecord) -> Self {
        Self {
            bid: q.bid,
            bid_size: q.bid_size,
            offer: q.offer,
            offer_size: q.offer_size,
        }
    }
}

/// Best prices across venues with their aggregate sizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookTop {
    pub bid: f64,
    pub bid_size: Size,
    pub offer: f64,
    pub offer_size: Size,
}

impl BookTop {
    /// Locked (bid == offer) or crossed (bid > offer).
    #[inline]
    pub fn is_locked_or_crossed(&self) -> bool {
        self.bid >= self.offer
    }
}

/// Slot-indexed venue state for one (date, symbol) series.
#[derive(Debug, Clone)]
pub struct ExchangeBook {
    date: NaiveDate,
    symbol: String,
    slots: [Option<SlotQuote>; SLOT_COUNT],
}

impl ExchangeBook {
    /// Create an empty book for a series.
    pub fn new(date: NaiveDate, symbol: impl Into<String>) -> Self {
        Self {
            date,
            symbol: symbol.into(),
            slots: [None; SLOT_COUNT],
        }
    }

    /// Whether this book belongs to the given series.
    pub fn is_for(&self, date: NaiveDate, symbol: &str) -> bool {
        self.date == date && self.symbol == symbol
    }

    /// Overwrite a venue's slot.
    pub fn update(&mut self, slot: ExchangeSlot, quote: SlotQuote) {
        self.slots[slot.index()] = Some(quote);
    }

    /// Current quote for a venue.
    pub fn get(&self, slot: ExchangeSlot) -> Option<&SlotQuote> {
        self.slots[slot.index()].as_ref()
    }

    /// Forget every venue's quote.
    pub fn clear(&mut self) {
        self.slots = [None; SLOT_COUNT];
    }

    /// Number of venues with a known quote.
    pub fn active_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Best bid/offer over known slots with sizes summed across every venue
    /// quoting at the best price. `None` while the book is empty.
    pub fn top(&self) -> Option<BookTop> {
        let known = || self.slots.iter().flatten();

        let bid = known().map(|s| OrderedFloat(s.bid)).max()?.0;
        let offer = known().map(|s| OrderedFloat(s.offer)).min()?.0;

        let bid_size = known().filter(|s| s.bid == bid).map(|s| s.bid_size).sum();
        let offer_size = known()
            .filter(|s| s.offer == offer)
            .map(|s| s.offer_size)
            .sum();

        Some(BookTop {
            bid,
            bid_size,
            offer,
            offer_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeCodec;

    fn book() -> ExchangeBook {
        ExchangeBook::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), "AAA")
    }

    fn quote(bid: f64, bid_size: Size, offer: f64, offer_size: Size) -> SlotQuote {
        SlotQuote {
            bid,
            bid_size,
            offer,
            offer_size,
        }
    }

    #[test]
    fn test_empty_book_has_no_top() {
        let b = book();
        assert!(b.top().is_none());
        assert_eq!(b.active_slots(), 0);
    }

    #[test]
    fn test_best_prices_across_venues() {
        let codec = ExchangeCodec::new();
        let mut b = book();
        b.update(codec.map('A'), quote(10.00, 100, 10.05, 200));
        b.update(codec.map('B'), quote(10.01, 50, 10.06, 100));

        let top = b.top().unwrap();
        assert_eq!(top.bid, 10.01);
        assert_eq!(top.bid_size, 50);
        assert_eq!(top.offer, 10.05);
        assert_eq!(top.offer_size, 200);
        assert!(!top.is_locked_or_crossed());
    }

    #[test]
    fn test_sizes_summed_at_best() {
        let codec = ExchangeCodec::new();
        let mut b = book();
        b.update(codec.map('N'), quote(20.00, 300, 20.02, 100));
        b.update(codec.map('P'), quote(20.00, 200, 20.02, 400));
        b.update(codec.map('Z'), quote(19.99, 900, 20.03, 900));

        let top = b.top().unwrap();
        assert_eq!(top.bid_size, 500);
        assert_eq!(top.offer_size, 500);
    }

    #[test]
    fn test_overflow_slot_participates() {
        let codec = ExchangeCodec::new();
        let mut b = book();
        b.update(codec.map('N'), quote(20.00, 100, 20.05, 100));
        b.update(codec.map('?'), quote(20.01, 10, 20.04, 10));

        let top = b.top().unwrap();
        assert_eq!(top.bid, 20.01);
        assert_eq!(top.offer, 20.04);
        assert!(b.get(ExchangeSlot::OVERFLOW).is_some());
    }

    #[test]
    fn test_crossed_detection_and_clear() {
        let codec = ExchangeCodec::new();
        let mut b = book();
        b.update(codec.map('N'), quote(20.00, 100, 20.05, 100));
        b.update(codec.map('P'), quote(20.05, 100, 20.10, 100));
        assert!(b.top().unwrap().is_locked_or_crossed());

        b.clear();
        assert!(b.top().is_none());
        assert!(b.is_for(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), "AAA"));
    }
}
