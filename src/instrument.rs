//! Static, process-wide table of tradable instruments.
//!
//! An [`InstrumentRegistry`] is built once at startup and never mutated
//! afterwards; all lookups are read-only. See `SPEC_FULL.md` §4.1.

use crate::error::EngineError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A currency code, e.g. `"USD"`, `"JPY"`, `"EUR"`.
pub type Currency = String;

/// Immutable metadata describing a tradable FX instrument (a currency pair).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Instrument {
    /// Exchange/display-facing symbol, e.g. `"EUR_USD"`.
    pub symbol: String,

    /// Human readable name, e.g. `"Euro / US Dollar"`.
    pub name: String,

    /// Base currency of the pair (the "EUR" in "EUR_USD").
    pub base: Currency,

    /// Quote currency of the pair (the "USD" in "EUR_USD").
    pub quote: Currency,

    /// Exponent such that `pip_size = 10^pip_location`. `-4` for most pairs,
    /// `-2` for JPY-quoted pairs.
    pub pip_location: i32,

    /// Fractional notional required as margin, e.g. `0.02` for 2%.
    pub margin_rate: f64,
}

impl Instrument {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        base: impl Into<String>,
        quote: impl Into<String>,
        pip_location: i32,
        margin_rate: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            base: base.into(),
            quote: quote.into(),
            pip_location,
            margin_rate,
        }
    }

    /// `10^pip_location`.
    pub fn pip_size(&self) -> f64 {
        crate::accounting::pip_size(self.pip_location)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.symbol, self.base, self.quote)
    }
}

/// Read-only, startup-time table of [`Instrument`]s keyed by symbol.
///
/// No mutation after construction; concurrent reads are always safe since
/// the table is never written to again.
#[derive(Debug, Clone, Default)]
pub struct InstrumentRegistry {
    instruments: IndexMap<String, Instrument>,
}

impl InstrumentRegistry {
    /// Builds a registry from a set of instruments. Later entries with a
    /// duplicate symbol overwrite earlier ones.
    pub fn new(instruments: impl IntoIterator<Item = Instrument>) -> Self {
        let instruments = instruments
            .into_iter()
            .map(|instrument| (instrument.symbol.clone(), instrument))
            .collect();
        Self { instruments }
    }

    /// Looks up an instrument by symbol.
    ///
    /// # Errors
    /// Returns [`EngineError::UnknownInstrument`] if `symbol` is not present.
    pub fn lookup(&self, symbol: &str) -> Result<&Instrument, EngineError> {
        self.instruments
            .get(symbol)
            .ok_or_else(|| EngineError::UnknownInstrument(symbol.to_string()))
    }

    /// Returns `true` if `symbol` is registered.
    pub fn contains(&self, symbol: &str) -> bool {
        self.instruments.contains_key(symbol)
    }

    /// Iterates all registered instruments in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.values()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}
