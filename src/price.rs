//! Thread-safe mapping from instrument symbol to latest [`Quote`].
//!
//! See `SPEC_FULL.md` §4.2. The store does not validate monotonicity; the
//! [`crate::engine::Engine`] tolerates out-of-order updates by simply using
//! whatever was last written.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A bid/ask quote for one instrument at a point in time.
///
/// Invariant: `ask >= bid`. This is not enforced by the store itself (callers
/// may feed degenerate data); the engine treats this as the caller's
/// responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    pub fn new(bid: f64, ask: f64, timestamp: DateTime<Utc>) -> Self {
        Self { bid, ask, timestamp }
    }

    /// `(bid + ask) / 2`.
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Side-correct mark price for a position of the given signed `units`:
    /// `bid` for long (`units > 0`), `ask` for short (`units < 0`).
    pub fn mark_for(&self, units: f64) -> f64 {
        if units > 0.0 {
            self.bid
        } else {
            self.ask
        }
    }
}

/// Multi-reader/single-writer map from instrument symbol to its latest
/// [`Quote`].
#[derive(Debug, Default)]
pub struct PriceStore {
    quotes: RwLock<IndexMap<String, Quote>>,
}

impl PriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally overwrites the stored quote for `quote`'s instrument.
    pub fn set(&self, instrument: &str, quote: Quote) {
        self.quotes.write().insert(instrument.to_string(), quote);
    }

    /// Returns the latest quote for `symbol`.
    ///
    /// # Errors
    /// Returns [`EngineError::NoPrice`] if no quote has ever been set for
    /// `symbol`.
    pub fn get(&self, symbol: &str) -> Result<Quote, EngineError> {
        self.quotes
            .read()
            .get(symbol)
            .copied()
            .ok_or_else(|| EngineError::NoPrice(symbol.to_string()))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.quotes.read().contains_key(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn get_before_set_is_no_price() {
        let store = PriceStore::new();
        assert!(matches!(store.get("EUR_USD"), Err(EngineError::NoPrice(_))));
    }

    #[test]
    fn set_then_get_returns_latest() {
        let store = PriceStore::new();
        store.set("EUR_USD", Quote::new(1.1000, 1.1002, ts()));
        store.set(
            "EUR_USD",
            Quote::new(1.1010, 1.1012, crate::test_utils::time_plus_millis(ts(), 500)),
        );
        let quote = store.get("EUR_USD").unwrap();
        assert_eq!(quote.bid, 1.1010);
        assert_eq!(quote.ask, 1.1012);
    }

    #[test]
    fn mark_for_is_side_correct() {
        let quote = Quote::new(1.1000, 1.1002, ts());
        assert_eq!(quote.mark_for(100.0), 1.1000);
        assert_eq!(quote.mark_for(-100.0), 1.1002);
    }
}
