//! Error types for the NBBO / trade synchronization workspace.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the workspace.
///
/// Record-level rejections (bad prices, crossed markets, unknown venues) are
/// filtered silently and never produce an `Error`. Only conditions that make
/// the rest of the pass meaningless are surfaced here.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (invalid or inconsistent input).
    #[error("Data error: {0}")]
    Data(String),

    /// An input stream was not sorted by (date, symbol, time).
    #[error("Ordering violation in {stream} stream: {previous} followed by {next}")]
    Ordering {
        /// Which stream tripped the check ("quote", "trade", "snapshot").
        stream: &'static str,
        /// Key of the previous record.
        previous: String,
        /// Key of the offending record.
        next: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create an ordering violation from the two offending keys.
    pub fn ordering(
        stream: &'static str,
        previous: impl std::fmt::Display,
        next: impl std::fmt::Display,
    ) -> Self {
        Error::Ordering {
            stream,
            previous: previous.to_string(),
            next: next.to_string(),
        }
    }

    /// Whether this error is an ordering violation.
    pub fn is_ordering(&self) -> bool {
        matches!(self, Error::Ordering { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_message() {
        let err = Error::ordering("trade", "2024-01-02 AAA 100", "2024-01-02 AAA 99");
        assert!(err.is_ordering());
        assert_eq!(
            err.to_string(),
            "Ordering violation in trade stream: 2024-01-02 AAA 100 followed by 2024-01-02 AAA 99"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_ordering());
    }
}
