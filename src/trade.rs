//! Trade data model and lifecycle. See `SPEC_FULL.md` §3, §4.7.

use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display, From};
use serde::{Deserialize, Serialize};

/// Time-sortable unique identifier for a [`Trade`].
///
/// Backed by a UUIDv7 so that ledger iteration order and id ordering agree,
/// which the forced-liquidation tie-break (`SPEC_FULL.md` §4.5.3) relies on
/// alongside insertion order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, From, Serialize, Deserialize)]
pub struct TradeId(uuid::Uuid);

impl TradeId {
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }
}

impl Default for TradeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for TradeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

/// The reason a trade was closed.
#[derive(Debug, Clone, Eq, PartialEq, Display, Serialize, Deserialize)]
pub enum CloseReason {
    #[display("StopLoss")]
    StopLoss,
    #[display("TakeProfit")]
    TakeProfit,
    #[display("LIQUIDATION")]
    Liquidation,
    /// Manual close, carrying the caller-supplied reason string.
    #[display("{_0}")]
    Manual(String),
}

/// A request to open a position at the current market price.
#[derive(Debug, Clone, PartialEq, Constructor, Serialize, Deserialize)]
pub struct OrderRequest {
    pub instrument: String,
    /// Signed unit count; positive is long, negative is short. Never zero.
    pub units: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

/// The result of a successful [`crate::engine::Engine::create_market_order`]
/// call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFill {
    pub trade_id: TradeId,
    pub instrument: String,
    pub units: f64,
    pub fill_price: f64,
    pub open_time: DateTime<Utc>,
}

/// An open or closed position.
///
/// Created by `CreateMarketOrder` (`open = true`, no realized fields
/// populated); transitions exactly once to closed (`open = false`, all
/// realized fields populated). Closed trades are retained for journal
/// queries — they are never removed from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub instrument: String,
    /// Signed unit count; positive is long, negative is short. Never zero.
    pub units: f64,
    pub entry_price: f64,
    pub open_time: DateTime<Utc>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub close_price: Option<f64>,
    pub close_time: Option<DateTime<Utc>>,
    pub realized_pl: Option<f64>,
    pub close_reason: Option<CloseReason>,
    pub open: bool,
}

impl Trade {
    pub fn open(
        id: TradeId,
        instrument: impl Into<String>,
        units: f64,
        entry_price: f64,
        open_time: DateTime<Utc>,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Self {
        Self {
            id,
            instrument: instrument.into(),
            units,
            entry_price,
            open_time,
            stop_loss,
            take_profit,
            close_price: None,
            close_time: None,
            realized_pl: None,
            close_reason: None,
            open: true,
        }
    }

    pub fn is_long(&self) -> bool {
        self.units > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.units < 0.0
    }

    /// Side-correct mark price for this trade given its instrument's latest
    /// quote: `bid` for long, `ask` for short.
    pub fn mark(&self, quote: &crate::price::Quote) -> f64 {
        quote.mark_for(self.units)
    }

    /// Writes the closing fields. Write-once: callers must only invoke this
    /// on a trade that is still open (`SPEC_FULL.md` invariant 6).
    pub fn close(
        &mut self,
        close_price: f64,
        close_time: DateTime<Utc>,
        realized_pl: f64,
        reason: CloseReason,
    ) {
        debug_assert!(self.open, "a closed trade must never be reclosed");
        self.close_price = Some(close_price);
        self.close_time = Some(close_time);
        self.realized_pl = Some(realized_pl);
        self.close_reason = Some(reason);
        self.open = false;
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
    fn trade_ids_are_unique_and_time_sortable() {
        let a = TradeId::new();
        let b = TradeId::new();
        assert_ne!(a, b);
        assert!(a <= b);
    }

    #[test]
    fn close_populates_all_realized_fields_once() {
        let mut trade = Trade::open(TradeId::new(), "EUR_USD", 1000.0, 1.1000, ts(), None, None);
        assert!(trade.open);
        let close_time = crate::test_utils::time_plus_secs(ts(), 30);
        trade.close(1.1010, close_time, 10.0, CloseReason::Manual("EOD".into()));
        assert!(!trade.open);
        assert_eq!(trade.close_time, Some(close_time));
        assert_eq!(trade.close_price, Some(1.1010));
        assert_eq!(trade.realized_pl, Some(10.0));
    }

    #[test]
    fn direction_helpers() {
        let long = Trade::open(TradeId::new(), "EUR_USD", 1000.0, 1.1, ts(), None, None);
        let short = Trade::open(TradeId::new(), "EUR_USD", -1000.0, 1.1, ts(), None, None);
        assert!(long.is_long() && !long.is_short());
        assert!(short.is_short() && !short.is_long());
    }
}
