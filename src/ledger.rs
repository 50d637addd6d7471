//! Keyed collection of open and closed trades. See `SPEC_FULL.md` §4.4.
//!
//! Owned exclusively by the [`crate::engine::Engine`]; no other component
//! mutates it. Backed by an [`IndexMap`] so that insertion order is
//! preserved for deterministic iteration (trigger scans, liquidation
//! tie-breaks).

use crate::trade::{Trade, TradeId};
use indexmap::IndexMap;

/// Insertion-ordered collection of trades keyed by [`TradeId`].
#[derive(Debug, Default)]
pub struct TradeLedger {
    trades: IndexMap<TradeId, Trade>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a newly opened trade.
    pub fn insert(&mut self, trade: Trade) {
        self.trades.insert(trade.id, trade);
    }

    pub fn get(&self, id: TradeId) -> Option<&Trade> {
        self.trades.get(&id)
    }

    pub fn get_mut(&mut self, id: TradeId) -> Option<&mut Trade> {
        self.trades.get_mut(&id)
    }

    /// Iterates every trade (open and closed) in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Trade> {
        self.trades.values()
    }

    /// Iterates currently open trades in insertion order.
    pub fn open_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.values().filter(|trade| trade.open)
    }

    /// Iterates currently open trades for a specific instrument, in
    /// insertion order.
    pub fn open_trades_for(&self, instrument: &str) -> impl Iterator<Item = &Trade> {
        self.trades
            .values()
            .filter(move |trade| trade.open && trade.instrument == instrument)
    }

    /// Mutable variant of [`Self::open_trades_for`], used by the trigger
    /// scan and liquidation loop to close matching trades in place.
    pub fn open_trade_ids_for(&self, instrument: &str) -> Vec<TradeId> {
        self.open_trades_for(instrument).map(|t| t.id).collect()
    }

    pub fn open_trade_ids(&self) -> Vec<TradeId> {
        self.open_trades().map(|t| t.id).collect()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn open_count(&self) -> usize {
        self.open_trades().count()
    }
}
