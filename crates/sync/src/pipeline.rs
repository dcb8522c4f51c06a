//! End-to-end wiring: raw quotes and trades in, merged rows out.

use crate::synchronizer::StreamSynchronizer;
use std::path::Path;
use taq_core::{Config, QuoteRecord, Result, TradeRecord};
use taq_ingestion::source::{open_quotes, open_trades, FileSource};
use taq_ingestion::{NbboStream, TradeStream};

/// Synchronizer over live NBBO reconstruction and trade filtering.
pub type Pipeline<QI, TI> = StreamSynchronizer<NbboStream<QI>, TradeStream<TI>>;

/// Pipeline reading both inputs from JSON-lines files.
pub type FilePipeline = Pipeline<FileSource<QuoteRecord>, FileSource<TradeRecord>>;

/// Build the full pass over two ordered raw record sources.
///
/// Fails with [`taq_core::Error::Config`] before reading anything if the
/// configuration does not validate.
pub fn synchronize<QS, TS>(
    quotes: QS,
    trades: TS,
    config: &Config,
) -> Result<Pipeline<QS::IntoIter, TS::IntoIter>>
where
    QS: IntoIterator<Item = Result<QuoteRecord>>,
    TS: IntoIterator<Item = Result<TradeRecord>>,
{
    StreamSynchronizer::new(
        NbboStream::new(quotes, config)?,
        TradeStream::new(trades, config)?,
        config,
    )
}

/// Build the full pass over two JSON-lines files.
pub fn synchronize_files(
    quotes: impl AsRef<Path>,
    trades: impl AsRef<Path>,
    config: &Config,
) -> Result<FilePipeline> {
    config.validate()?;
    synchronize(open_quotes(quotes)?, open_trades(trades)?, config)
}
