//! Forward-only cursor over an ordered record stream.

use taq_core::{Error, Keyed, Result};

/// Holds the current record of a stream and re-checks ordering on every step.
pub struct Cursor<I, T> {
    stream: &'static str,
    source: I,
    current: Option<T>,
    read: u64,
}

impl<I, T> Cursor<I, T>
where
    I: Iterator<Item = Result<T>>,
    T: Keyed,
{
    /// Wrap a source. Nothing is read until the first [`Cursor::advance`].
    pub fn new(stream: &'static str, source: I) -> Self {
        Self {
            stream,
            source,
            current: None,
            read: 0,
        }
    }

    /// Record under the cursor, `None` once exhausted (or before the first advance).
    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// Records pulled from the source.
    pub fn read(&self) -> u64 {
        self.read
    }

    /// Step to the next record.
    ///
    /// A record keyed below its predecessor is an [`Error::Ordering`].
    pub fn advance(&mut self) -> Result<()> {
        let next = match self.source.next() {
            None => {
                self.current = None;
                return Ok(());
            }
            Some(item) => item?,
        };
        self.read += 1;
        if let Some(prev) = &self.current {
            if next.key() < prev.key() {
                return Err(Error::ordering(self.stream, prev.key(), next.key()));
            }
        }
        self.current = Some(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use taq_core::TradeRecord;

    fn trade(symbol: &str, time: i64) -> TradeRecord {
        TradeRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            symbol: symbol.to_string(),
            time,
            price: 10.0,
            size: 100,
            correction: 0,
        }
    }

    #[test]
    fn test_walks_and_exhausts() {
        let trades = vec![trade("AAA", 1), trade("AAA", 1), trade("BBB", 0)];
        let mut cursor = Cursor::new("trade", trades.into_iter().map(Ok));
        assert!(cursor.current().is_none());

        cursor.advance().unwrap();
        assert_eq!(cursor.current().unwrap().time, 1);
        cursor.advance().unwrap();
        cursor.advance().unwrap();
        assert_eq!(cursor.current().unwrap().symbol, "BBB");
        cursor.advance().unwrap();
        assert!(cursor.current().is_none());
        assert_eq!(cursor.read(), 3);
    }

    #[test]
    fn test_regression_is_rejected() {
        let trades = vec![trade("BBB", 5), trade("AAA", 9)];
        let mut cursor = Cursor::new("trade", trades.into_iter().map(Ok));
        cursor.advance().unwrap();
        let err = cursor.advance().unwrap_err();
        assert!(err.is_ordering());
        assert!(err.to_string().contains("trade stream"));
    }
}
