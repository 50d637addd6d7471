use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the pure [`crate::accounting`] functions.
///
/// These never panic; a function that cannot produce a meaningful number
/// returns one of these instead.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum AccountingError {
    #[error("no conversion path from quote currency {quote} to account currency {account}")]
    NoConversion { quote: String, account: String },

    #[error("degenerate input: {0}")]
    DegenerateInput(String),
}

/// Errors raised by [`crate::journal`] sinks.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal csv failure: {0}")]
    Csv(#[from] csv::Error),

    #[error("journal serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by [`crate::engine::Engine`] operations.
///
/// Variants map onto the taxonomy described by the system's error handling
/// design: failures are grouped by kind, not by the specific call site that
/// produced them.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unknown instrument in the registry, or no quote available for an
    /// instrument the operation requires.
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("no price available for instrument: {0}")]
    NoPrice(String),

    /// Close requested on a non-existent or already-closed trade.
    #[error("trade not found: {0}")]
    TradeNotFound(String),

    #[error("trade already closed: {0}")]
    TradeAlreadyClosed(String),

    /// Zero units, zero stop distance, non-finite numeric, inverted price
    /// relationships.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// No path to convert from an instrument's quote currency to the
    /// account currency.
    #[error("conversion unavailable: {0}")]
    ConversionUnavailable(#[from] AccountingError),

    /// Journal write or file read failed.
    #[error("io failure: {0}")]
    IoFailure(#[from] JournalError),

    /// Reserved: cancellation is accepted at operation entry but is not yet
    /// propagated inside the locked region.
    #[error("operation cancelled")]
    CancelRequested,
}

impl From<std::io::Error> for EngineError {
    fn from(value: std::io::Error) -> Self {
        Self::IoFailure(JournalError::Io(value))
    }
}

impl From<csv::Error> for EngineError {
    fn from(value: csv::Error) -> Self {
        Self::IoFailure(JournalError::Csv(value))
    }
}
