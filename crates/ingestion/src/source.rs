//! Line-delimited JSON record sources.
//!
//! Each non-blank line holds one record. Read and decode failures are fatal:
//! the iterator yields the error once and then stops.

use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::marker::PhantomData;
use std::path::Path;
use taq_core::{Error, QuoteRecord, Result, TradeRecord};

/// Iterator over JSON-lines records.
pub struct JsonLinesSource<R, T> {
    reader: R,
    line: String,
    line_no: u64,
    failed: bool,
    _record: PhantomData<fn() -> T>,
}

impl<R: BufRead, T: DeserializeOwned> JsonLinesSource<R, T> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_no: 0,
            failed: false,
            _record: PhantomData,
        }
    }

    /// Number of lines consumed so far.
    pub fn line_no(&self) -> u64 {
        self.line_no
    }
}

impl<R: BufRead, T: DeserializeOwned> Iterator for JsonLinesSource<R, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_no += 1;
                    let text = self.line.trim();
                    if text.is_empty() {
                        continue;
                    }
                    return match serde_json::from_str(text) {
                        Ok(record) => Some(Ok(record)),
                        Err(e) => {
                            self.failed = true;
                            Some(Err(Error::data(format!("line {}: {}", self.line_no, e))))
                        }
                    };
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(Error::Io(e)));
                }
            }
        }
    }
}

/// Buffered file source.
pub type FileSource<T> = JsonLinesSource<BufReader<File>, T>;

/// Open a quote file.
pub fn open_quotes(path: impl AsRef<Path>) -> Result<FileSource<QuoteRecord>> {
    Ok(JsonLinesSource::new(BufReader::new(File::open(path)?)))
}

/// Open a trade file.
pub fn open_trades(path: impl AsRef<Path>) -> Result<FileSource<TradeRecord>> {
    Ok(JsonLinesSource::new(BufReader::new(File::open(path)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUOTES: &str = r#"
{"date":"2024-01-02","symbol":"AAA","time":100,"exchange":"N","bid":10.0,"bid_size":100,"offer":10.05,"offer_size":200,"mode":12}

{"date":"2024-01-02","symbol":"AAA","time":101,"exchange":"P","bid":10.01,"bid_size":50,"offer":10.06,"offer_size":100,"mode":12}
"#;

    #[test]
    fn test_reads_records_skipping_blank_lines() {
        let source: JsonLinesSource<_, QuoteRecord> = JsonLinesSource::new(Cursor::new(QUOTES));
        let quotes: Vec<QuoteRecord> = source.collect::<Result<_>>().unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].exchange, 'N');
        assert_eq!(quotes[1].time, 101);
        assert_eq!(quotes[1].offer_size, 100);
    }

    #[test]
    fn test_decode_error_is_fatal() {
        let text = concat!(
            r#"{"date":"2024-01-02","symbol":"AAA","time":1,"price":1.0,"size":1,"correction":0}"#,
            "\nnot json\n{}\n"
        );
        let mut source: JsonLinesSource<_, TradeRecord> = JsonLinesSource::new(Cursor::new(text));
        assert!(source.next().unwrap().is_ok());
        let err = source.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(source.next().is_none());
        assert_eq!(source.line_no(), 2);
    }

    #[test]
    fn test_missing_file() {
        let err = open_trades("/nonexistent/trades.jsonl").err().unwrap();
        assert!(matches!(err, Error::Io(_)));
    }
}
