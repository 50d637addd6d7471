#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # fx-sim
//! An event-driven FX trading simulator: a deterministic engine that consumes a monotonic
//! stream of bid/ask quotes and exposes a broker-like interface for placing and closing
//! market orders while continuously maintaining an account's balance, equity, margin
//! utilization and open-trade ledger. See `SPEC_FULL.md` for the full specification.
//!
//! * **Deterministic**: pure accounting functions, single-lock `Engine` state machine.
//! * **Side-correct**: bid/ask discipline, quote-to-account currency conversion.
//! * **Risk-aware**: integer-unit position sizing and pre-trade policy gating.
//!
//! At a high level, it provides:
//! * [`instrument::InstrumentRegistry`] — static, process-wide instrument metadata table.
//! * [`price::PriceStore`] — thread-safe symbol → latest [`price::Quote`] mapping.
//! * [`ledger::TradeLedger`] — insertion-ordered keyed collection of open/closed trades.
//! * [`accounting`] — pure P&L, margin and currency-conversion functions.
//! * [`engine::Engine`] — the price-driven state machine tying the above together.
//! * [`risk`] — the Risk Sizer and Risk Policy Evaluator.
//! * [`journal`] — trade/equity journal sinks (in-memory, CSV).
//! * [`backtest`] — CSV quote/candle ingestion and scripted-event replay.

/// Account state: balance, equity, margin utilization, and invariants.
pub mod account;

/// Pure FX P&L and margin accounting functions.
pub mod accounting;

/// CSV quote/candle ingestion and scripted-event replay driving an [`engine::Engine`].
pub mod backtest;

/// Minimal declarative construction of an [`engine::Engine`].
pub mod config;

/// The price-driven state machine: order placement, price updates, triggers, liquidation.
pub mod engine;

/// Defines all possible errors raised by this crate's components.
pub mod error;

/// Static, process-wide table of tradable instruments.
pub mod instrument;

/// Trade/equity journal sinks.
pub mod journal;

/// Keyed collection of open and closed trades, insertion order preserved.
pub mod ledger;

/// Default tracing logging initialisers for a surrounding CLI/backtest harness.
pub mod logging;

/// Thread-safe mapping from instrument symbol to latest quote.
pub mod price;

/// Risk Sizer and Risk Policy Evaluator.
pub mod risk;

/// Trade data model and lifecycle.
pub mod trade;

/// Shared test helpers, used by this crate's own unit/integration tests.
#[cfg(test)]
pub mod test_utils {
    use chrono::{DateTime, Days, TimeDelta, Utc};

    pub fn f64_is_eq(actual: f64, expected: f64, epsilon: f64) -> bool {
        if actual.is_nan() && expected.is_nan() {
            true
        } else if actual.is_infinite() && expected.is_infinite() {
            actual.is_sign_positive() == expected.is_sign_positive()
        } else if actual.is_nan()
            || expected.is_nan()
            || actual.is_infinite()
            || expected.is_infinite()
        {
            false
        } else {
            (actual - expected).abs() < epsilon
        }
    }

    pub fn time_plus_days(base: DateTime<Utc>, plus: u64) -> DateTime<Utc> {
        base.checked_add_days(Days::new(plus)).unwrap()
    }

    pub fn time_plus_secs(base: DateTime<Utc>, plus: i64) -> DateTime<Utc> {
        base.checked_add_signed(TimeDelta::seconds(plus)).unwrap()
    }

    pub fn time_plus_millis(base: DateTime<Utc>, plus: i64) -> DateTime<Utc> {
        base.checked_add_signed(TimeDelta::milliseconds(plus))
            .unwrap()
    }
}
