//! The price-driven state machine. See `SPEC_FULL.md` §4.5.
//!
//! `Engine` owns the [`Account`], [`TradeLedger`], [`PriceStore`],
//! [`InstrumentRegistry`] and an [`Arc<dyn Journal>`] reference as a single
//! aggregate guarded by one [`parking_lot::Mutex`]. Every public operation
//! takes that lock for its full duration (`SPEC_FULL.md` §5): there is no
//! parallelism inside the Engine, only contention at the boundary.

use crate::{
    account::{Account, AccountSnapshot},
    accounting,
    error::EngineError,
    instrument::InstrumentRegistry,
    journal::{EquitySnapshot, Journal, TradeRecord},
    ledger::TradeLedger,
    price::{PriceStore, Quote},
    trade::{CloseReason, OrderFill, OrderRequest, Trade, TradeId},
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::{panic::AssertUnwindSafe, sync::Arc};
use tracing::{debug, info, warn};

/// Reserved cancellation/deadline context for future graceful-shutdown
/// signaling. Individual operations are uninterruptible today: once
/// started, an operation runs to completion or fails atomically
/// (`SPEC_FULL.md` §5).
#[derive(Debug, Clone, Copy, Default)]
pub struct Context {
    pub deadline: Option<DateTime<Utc>>,
}

/// A single incoming quote, paired with the instrument it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingQuote {
    pub instrument: String,
    pub bid: f64,
    pub ask: f64,
    pub timestamp: DateTime<Utc>,
}

impl IncomingQuote {
    pub fn new(instrument: impl Into<String>, bid: f64, ask: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            instrument: instrument.into(),
            bid,
            ask,
            timestamp,
        }
    }

    fn quote(&self) -> Quote {
        Quote::new(self.bid, self.ask, self.timestamp)
    }
}

type TradeClosedListener = dyn Fn(&[Trade]) + Send + Sync;

struct EngineInner {
    registry: InstrumentRegistry,
    prices: PriceStore,
    ledger: TradeLedger,
    account: Account,
    journal: Arc<dyn Journal>,
}

/// The event-driven FX trading simulator's core state machine.
pub struct Engine {
    state: Mutex<EngineInner>,
    listener: Mutex<Option<Arc<TradeClosedListener>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(account: Account, registry: InstrumentRegistry, journal: Arc<dyn Journal>) -> Self {
        Self {
            state: Mutex::new(EngineInner {
                registry,
                prices: PriceStore::new(),
                ledger: TradeLedger::new(),
                account,
                journal,
            }),
            listener: Mutex::new(None),
        }
    }

    /// Registers a single callback invoked after the lock is released, once
    /// per engine-initiated close (stop-loss, take-profit, liquidation).
    /// Manual closes do not invoke the listener. A previously registered
    /// listener is replaced.
    pub fn set_trade_closed_listener<F>(&self, listener: F)
    where
        F: Fn(&[Trade]) + Send + Sync + 'static,
    {
        *self.listener.lock() = Some(Arc::new(listener));
    }

    /// Test-only hook to seed the ledger with a trade that was never opened
    /// through [`Self::create_market_order`] — used to exercise
    /// `close_all`'s price pre-flight against an instrument that has no
    /// quote, a state a normal engine can otherwise never reach since
    /// opening a trade always requires an existing quote.
    #[cfg(test)]
    pub(crate) fn test_insert_trade(&self, trade: Trade) {
        self.state.lock().ledger.insert(trade);
    }

    pub fn get_account(&self, _ctx: &Context) -> AccountSnapshot {
        self.state.lock().account.snapshot()
    }

    pub fn get_price(&self, _ctx: &Context, symbol: &str) -> Result<Quote, EngineError> {
        self.state.lock().prices.get(symbol)
    }

    /// Recomputes equity only, without writing a snapshot. Diagnostic.
    pub fn revalue(&self, _ctx: &Context) -> Result<AccountSnapshot, EngineError> {
        let mut inner = self.state.lock();
        Self::revalue_and_margin(&mut inner)?;
        Ok(inner.account.snapshot())
    }

    /// Opens a position at the current market price. Fill price is the
    /// current `ask` for `units > 0`, `bid` for `units < 0`. Does not
    /// revalue — a fresh trade has zero unrealized P&L at its own fill
    /// price on its own side.
    pub fn create_market_order(
        &self,
        _ctx: &Context,
        request: OrderRequest,
    ) -> Result<OrderFill, EngineError> {
        if request.units == 0.0 || !request.units.is_finite() {
            return Err(EngineError::DegenerateInput(
                "order units must be non-zero and finite".to_string(),
            ));
        }

        let mut inner = self.state.lock();
        inner.registry.lookup(&request.instrument)?;
        let quote = inner.prices.get(&request.instrument)?;
        let fill_price = if request.units > 0.0 { quote.ask } else { quote.bid };
        let open_time = quote.timestamp;
        let trade_id = TradeId::new();

        let trade = Trade::open(
            trade_id,
            request.instrument.clone(),
            request.units,
            fill_price,
            open_time,
            request.stop_loss,
            request.take_profit,
        );
        inner.ledger.insert(trade);

        debug!(
            trade_id = %trade_id,
            instrument = %request.instrument,
            units = request.units,
            fill_price,
            "opened market order"
        );

        Ok(OrderFill {
            trade_id,
            instrument: request.instrument,
            units: request.units,
            fill_price,
            open_time,
        })
    }

    /// Manually closes one open trade at the current quote (long closes on
    /// bid, short on ask). Runs revalue -> margin -> snapshot -> enforce.
    /// Does not itself notify the trade-closed listener (the caller already
    /// knows); any subsequent forced liquidations during enforce do.
    pub fn close_trade(
        &self,
        _ctx: &Context,
        trade_id: TradeId,
        reason: impl Into<String>,
    ) -> Result<Trade, EngineError> {
        let mut inner = self.state.lock();

        let trade = inner
            .ledger
            .get(trade_id)
            .ok_or_else(|| EngineError::TradeNotFound(trade_id.to_string()))?;
        if !trade.open {
            return Err(EngineError::TradeAlreadyClosed(trade_id.to_string()));
        }
        let instrument_symbol = trade.instrument.clone();
        let units = trade.units;

        let quote = inner.prices.get(&instrument_symbol)?;
        let close_price = quote.mark_for(units);
        let close_time = quote.timestamp;

        Self::close_trade_internal(
            &mut inner,
            trade_id,
            close_price,
            close_time,
            CloseReason::Manual(reason.into()),
        )?;
        Self::revalue_and_margin(&mut inner)?;
        Self::emit_snapshot(&mut inner, close_time)?;

        let mut liquidated = Vec::new();
        Self::enforce(&mut inner, &mut liquidated)?;

        let result = inner
            .ledger
            .get(trade_id)
            .cloned()
            .expect("trade just closed above must still be present");
        drop(inner);

        self.notify_listener(&liquidated);
        Ok(result)
    }

    /// Closes every currently open trade using each instrument's current
    /// quote. Pre-flights that every required instrument has a price;
    /// if any is missing, fails atomically and closes nothing. A no-op
    /// (no mutation, no journal writes) when no trades are open.
    pub fn close_all(&self, _ctx: &Context, reason: impl Into<String>) -> Result<Vec<Trade>, EngineError> {
        let reason = reason.into();
        let mut inner = self.state.lock();

        let open_ids = inner.ledger.open_trade_ids();
        if open_ids.is_empty() {
            return Ok(Vec::new());
        }

        // Pre-flight: every required instrument must have a price before
        // anything is mutated.
        for id in &open_ids {
            let trade = inner.ledger.get(*id).expect("id came from ledger");
            inner.prices.get(&trade.instrument)?;
        }

        let mut closed = Vec::with_capacity(open_ids.len());
        let mut last_close_time = None;
        for id in &open_ids {
            let trade = inner.ledger.get(*id).expect("id came from ledger");
            let quote = inner
                .prices
                .get(&trade.instrument)
                .expect("pre-flighted above");
            let close_price = quote.mark_for(trade.units);
            let close_time = quote.timestamp;
            Self::close_trade_internal(
                &mut inner,
                *id,
                close_price,
                close_time,
                CloseReason::Manual(reason.clone()),
            )?;
            last_close_time = Some(close_time);
            closed.push(
                inner
                    .ledger
                    .get(*id)
                    .cloned()
                    .expect("trade just closed above"),
            );
        }

        Self::revalue_and_margin(&mut inner)?;
        if let Some(close_time) = last_close_time {
            Self::emit_snapshot(&mut inner, close_time)?;
        }

        let mut liquidated = Vec::new();
        Self::enforce(&mut inner, &mut liquidated)?;
        drop(inner);

        self.notify_listener(&liquidated);
        Ok(closed)
    }

    /// The canonical driver. Writes `quote` to the price store, scans open
    /// trades on that instrument for stop-loss/take-profit triggers
    /// (stop checked before take-profit), revalues equity, recomputes
    /// margin, emits one equity snapshot, then enforces margin via forced
    /// liquidation if necessary.
    pub fn update_price(&self, _ctx: &Context, incoming: IncomingQuote) -> Result<(), EngineError> {
        let mut inner = self.state.lock();

        let quote = incoming.quote();
        inner.prices.set(&incoming.instrument, quote);

        debug!(
            instrument = %incoming.instrument,
            bid = incoming.bid,
            ask = incoming.ask,
            "price update received"
        );

        let mut closed = Vec::new();
        Self::trigger_scan(&mut inner, &incoming.instrument, quote, &mut closed)?;
        Self::revalue_and_margin(&mut inner)?;
        Self::emit_snapshot(&mut inner, incoming.timestamp)?;
        Self::enforce(&mut inner, &mut closed)?;
        drop(inner);

        self.notify_listener(&closed);
        Ok(())
    }

    fn notify_listener(&self, closed: &[Trade]) {
        if closed.is_empty() {
            return;
        }
        let Some(listener) = self.listener.lock().clone() else {
            return;
        };
        // A listener failure must never affect engine state: we've already
        // released the lock, and we swallow panics here too.
        if std::panic::catch_unwind(AssertUnwindSafe(|| listener(closed))).is_err() {
            warn!(
                closed_trade_count = closed.len(),
                "trade-closed listener panicked; engine state unaffected"
            );
        }
    }

    /// Iterates open trades on `instrument` in ledger order; closes the
    /// first one whose stop-loss or take-profit is hit at the current mark
    /// (stop-loss wins if both would trigger).
    fn trigger_scan(
        inner: &mut EngineInner,
        instrument: &str,
        quote: Quote,
        closed: &mut Vec<Trade>,
    ) -> Result<(), EngineError> {
        for trade_id in inner.ledger.open_trade_ids_for(instrument) {
            let trade = match inner.ledger.get(trade_id) {
                Some(trade) if trade.open => trade,
                _ => continue,
            };
            let mark = trade.mark(&quote);
            let long = trade.is_long();

            let stop_hit = trade
                .stop_loss
                .is_some_and(|stop| if long { mark <= stop } else { mark >= stop });
            let take_profit_hit = trade
                .take_profit
                .is_some_and(|tp| if long { mark >= tp } else { mark <= tp });

            let reason = if stop_hit {
                CloseReason::StopLoss
            } else if take_profit_hit {
                CloseReason::TakeProfit
            } else {
                continue;
            };

            Self::close_trade_internal(inner, trade_id, mark, quote.timestamp, reason)?;
            closed.push(
                inner
                    .ledger
                    .get(trade_id)
                    .cloned()
                    .expect("trade just closed above"),
            );
        }
        Ok(())
    }

    /// While `margin_used > 0` and `equity < margin_used`: closes the open
    /// trade with the most negative unrealized P&L (earliest ledger order
    /// breaks ties), revalues, and repeats. Terminates because each
    /// iteration closes a trade from a finite set.
    fn enforce(inner: &mut EngineInner, closed: &mut Vec<Trade>) -> Result<(), EngineError> {
        loop {
            if inner.account.margin_used <= 0.0 || inner.account.equity >= inner.account.margin_used {
                return Ok(());
            }
            let Some(worst_id) = Self::worst_open_trade(inner)? else {
                return Ok(());
            };

            warn!(
                equity = inner.account.equity,
                margin_used = inner.account.margin_used,
                trade_id = %worst_id,
                "margin enforcement: liquidating worst open trade"
            );

            let trade = inner.ledger.get(worst_id).expect("id came from ledger");
            let quote = inner.prices.get(&trade.instrument)?;
            let mark = trade.mark(&quote);

            Self::close_trade_internal(inner, worst_id, mark, quote.timestamp, CloseReason::Liquidation)?;
            closed.push(
                inner
                    .ledger
                    .get(worst_id)
                    .cloned()
                    .expect("trade just closed above"),
            );
            Self::revalue_and_margin(inner)?;
        }
    }

    fn worst_open_trade(inner: &EngineInner) -> Result<Option<TradeId>, EngineError> {
        let mut worst: Option<(TradeId, f64)> = None;
        for trade in inner.ledger.open_trades() {
            let quote = inner.prices.get(&trade.instrument)?;
            let rate = Self::quote_to_account_rate(inner, &trade.instrument)?;
            let pl = accounting::unrealized_pl(trade.units, trade.entry_price, trade.mark(&quote), rate);
            match worst {
                Some((_, worst_pl)) if pl >= worst_pl => {}
                _ => worst = Some((trade.id, pl)),
            }
        }
        Ok(worst.map(|(id, _)| id))
    }

    /// Recomputes equity and margin_used from scratch across every open
    /// trade, each valued at its own side-correct mark.
    fn revalue_and_margin(inner: &mut EngineInner) -> Result<(), EngineError> {
        let mut sum_unrealized_pl = 0.0;
        let mut margin_used = 0.0;

        for trade in inner.ledger.open_trades() {
            let quote = inner.prices.get(&trade.instrument)?;
            let instrument = inner.registry.lookup(&trade.instrument)?;
            let rate = accounting::quote_to_account_rate(
                &trade.instrument,
                &instrument.base,
                &instrument.quote,
                &inner.account.currency,
                &inner.registry,
                &inner.prices,
            )?;
            sum_unrealized_pl += accounting::unrealized_pl(trade.units, trade.entry_price, trade.mark(&quote), rate);
            margin_used += accounting::trade_margin(trade.units, quote.mid(), instrument.margin_rate, rate);
        }

        inner.account.revalue(sum_unrealized_pl, margin_used);
        Ok(())
    }

    fn quote_to_account_rate(inner: &EngineInner, instrument_symbol: &str) -> Result<f64, EngineError> {
        let instrument = inner.registry.lookup(instrument_symbol)?;
        Ok(accounting::quote_to_account_rate(
            instrument_symbol,
            &instrument.base,
            &instrument.quote,
            &inner.account.currency,
            &inner.registry,
            &inner.prices,
        )?)
    }

    /// Closes a trade in place: computes realized P&L at `close_price`,
    /// writes the closing fields, credits the account balance, and emits
    /// exactly one trade journal record.
    fn close_trade_internal(
        inner: &mut EngineInner,
        trade_id: TradeId,
        close_price: f64,
        close_time: DateTime<Utc>,
        reason: CloseReason,
    ) -> Result<(), EngineError> {
        let trade = inner
            .ledger
            .get(trade_id)
            .ok_or_else(|| EngineError::TradeNotFound(trade_id.to_string()))?;
        let instrument_symbol = trade.instrument.clone();
        let units = trade.units;
        let entry_price = trade.entry_price;
        let open_time = trade.open_time;

        let rate = Self::quote_to_account_rate(inner, &instrument_symbol)?;
        let realized_pl = accounting::unrealized_pl(units, entry_price, close_price, rate);

        let reason_label = reason.to_string();
        let trade = inner
            .ledger
            .get_mut(trade_id)
            .expect("trade looked up immutably above");
        trade.close(close_price, close_time, realized_pl, reason);

        inner.account.credit_realized_pl(realized_pl);

        info!(
            trade_id = %trade_id,
            instrument = %instrument_symbol,
            reason = %reason_label,
            realized_pl,
            "trade closed"
        );

        inner.journal.record_trade(&TradeRecord {
            trade_id,
            instrument: instrument_symbol,
            units,
            entry_price,
            exit_price: close_price,
            open_time,
            close_time,
            realized_pl,
            reason: reason_label,
        })?;

        Ok(())
    }

    fn emit_snapshot(inner: &mut EngineInner, time: DateTime<Utc>) -> Result<(), EngineError> {
        inner.journal.record_equity(&EquitySnapshot {
            time,
            balance: inner.account.balance,
            equity: inner.account.equity,
            margin_used: inner.account.margin_used,
            free_margin: inner.account.free_margin,
            margin_level: inner.account.margin_level,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
