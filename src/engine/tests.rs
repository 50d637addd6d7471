//! End-to-end scenario tests grounded on `SPEC_FULL.md` §8.3 (S1-S6).

use super::*;
use crate::{
    account::Account,
    instrument::{Instrument, InstrumentRegistry},
    journal::InMemoryJournal,
    trade::OrderRequest,
};
use chrono::{TimeZone, Utc};
use std::sync::Arc;

fn ts(secs: i64) -> DateTime<Utc> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    crate::test_utils::time_plus_secs(base, secs)
}

fn registry() -> InstrumentRegistry {
    InstrumentRegistry::new([
        Instrument::new("EUR_USD", "Euro/US Dollar", "EUR", "USD", -4, 0.02),
        Instrument::new("USD_JPY", "US Dollar/Yen", "USD", "JPY", -2, 0.02),
    ])
}

fn engine(starting_balance: f64) -> (Engine, Arc<InMemoryJournal>) {
    let journal = Arc::new(InMemoryJournal::new());
    let account = Account::new("acc-1", "USD", starting_balance);
    let engine = Engine::new(account, registry(), journal.clone());
    (engine, journal)
}

#[test]
fn s1_eur_usd_long_unrealized_gain() {
    let (engine, _journal) = engine(100_000.0);
    let ctx = Context::default();

    engine
        .update_price(&ctx, IncomingQuote::new("EUR_USD", 1.1000, 1.1002, ts(0)))
        .unwrap();
    let fill = engine
        .create_market_order(&ctx, OrderRequest::new("EUR_USD", 100_000.0, None, None))
        .unwrap();
    assert!(crate::test_utils::f64_is_eq(fill.fill_price, 1.1002, 1e-9));

    engine
        .update_price(&ctx, IncomingQuote::new("EUR_USD", 1.1010, 1.1012, ts(1)))
        .unwrap();

    let account = engine.get_account(&ctx);
    assert!(crate::test_utils::f64_is_eq(account.equity, 100_080.0, 1e-6));
    assert!(crate::test_utils::f64_is_eq(
        account.balance,
        100_000.0,
        1e-6
    ));
}

#[test]
fn s2_usd_jpy_long_with_quote_conversion() {
    let (engine, _journal) = engine(100_000.0);
    let ctx = Context::default();

    engine
        .update_price(&ctx, IncomingQuote::new("USD_JPY", 150.00, 150.02, ts(0)))
        .unwrap();
    engine
        .create_market_order(&ctx, OrderRequest::new("USD_JPY", 100_000.0, None, None))
        .unwrap();

    engine
        .update_price(&ctx, IncomingQuote::new("USD_JPY", 150.22, 150.24, ts(1)))
        .unwrap();

    let account = engine.get_account(&ctx);
    assert!(crate::test_utils::f64_is_eq(
        account.equity,
        100_133.12,
        1e-2
    ));
}

#[test]
fn s3_long_stop_loss_closes_on_bid() {
    let (engine, journal) = engine(100_000.0);
    let ctx = Context::default();

    engine
        .update_price(&ctx, IncomingQuote::new("EUR_USD", 1.1000, 1.1002, ts(0)))
        .unwrap();
    engine
        .create_market_order(
            &ctx,
            OrderRequest::new("EUR_USD", 100_000.0, Some(1.0990), None),
        )
        .unwrap();

    engine
        .update_price(&ctx, IncomingQuote::new("EUR_USD", 1.0990, 1.0992, ts(1)))
        .unwrap();

    let account = engine.get_account(&ctx);
    assert!(crate::test_utils::f64_is_eq(account.balance, 99_880.0, 1e-6));
    assert!(crate::test_utils::f64_is_eq(
        account.equity,
        account.balance,
        1e-9
    ));
    assert_eq!(account.margin_used, 0.0);

    let records = journal.trades();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reason, "StopLoss");
    assert!(crate::test_utils::f64_is_eq(
        records[0].exit_price,
        1.0990,
        1e-9
    ));
    assert!(crate::test_utils::f64_is_eq(
        records[0].realized_pl,
        -120.0,
        1e-6
    ));
}

#[test]
fn s4_short_take_profit_closes_on_ask() {
    let (engine, journal) = engine(100_000.0);
    let ctx = Context::default();

    engine
        .update_price(&ctx, IncomingQuote::new("EUR_USD", 1.1000, 1.1002, ts(0)))
        .unwrap();
    engine
        .create_market_order(
            &ctx,
            OrderRequest::new("EUR_USD", -100_000.0, None, Some(1.0980)),
        )
        .unwrap();

    engine
        .update_price(&ctx, IncomingQuote::new("EUR_USD", 1.0978, 1.0980, ts(1)))
        .unwrap();

    let records = journal.trades();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reason, "TakeProfit");
    assert!(crate::test_utils::f64_is_eq(
        records[0].exit_price,
        1.0980,
        1e-9
    ));
    assert!(crate::test_utils::f64_is_eq(
        records[0].realized_pl,
        200.0,
        1e-6
    ));
}

#[test]
fn s5_forced_liquidation_picks_worst_trade_first() {
    let (engine, journal) = engine(1_000.0);
    let ctx = Context::default();

    engine
        .update_price(&ctx, IncomingQuote::new("EUR_USD", 1.1000, 1.1002, ts(0)))
        .unwrap();
    engine
        .create_market_order(&ctx, OrderRequest::new("EUR_USD", 100_000.0, None, None))
        .unwrap();

    engine
        .update_price(&ctx, IncomingQuote::new("USD_JPY", 150.00, 150.02, ts(1)))
        .unwrap();
    engine
        .create_market_order(&ctx, OrderRequest::new("USD_JPY", 100_000.0, None, None))
        .unwrap();

    engine
        .update_price(&ctx, IncomingQuote::new("EUR_USD", 1.0500, 1.0502, ts(2)))
        .unwrap();
    engine
        .update_price(&ctx, IncomingQuote::new("USD_JPY", 149.98, 150.00, ts(3)))
        .unwrap();

    let account = engine.get_account(&ctx);
    assert!(account.equity >= account.margin_used || account.margin_used == 0.0);

    let records = journal.trades();
    let liquidations: Vec<_> = records.iter().filter(|r| r.reason == "LIQUIDATION").collect();
    assert!(!liquidations.is_empty());
    assert_eq!(liquidations[0].instrument, "EUR_USD");
}

#[test]
fn s6_close_all_atomic_on_missing_price() {
    let (engine, journal) = engine(100_000.0);
    let ctx = Context::default();

    engine
        .update_price(&ctx, IncomingQuote::new("EUR_USD", 1.1000, 1.1002, ts(0)))
        .unwrap();
    engine
        .create_market_order(&ctx, OrderRequest::new("EUR_USD", 100_000.0, None, None))
        .unwrap();

    // A USD_JPY trade is seeded directly into the ledger without ever
    // calling update_price for USD_JPY: opening a trade through the public
    // API always requires an existing quote, so this is the only way to
    // reach the state CloseAll's pre-flight guards against.
    engine.test_insert_trade(crate::trade::Trade::open(
        crate::trade::TradeId::new(),
        "USD_JPY",
        50_000.0,
        150.00,
        ts(1),
        None,
        None,
    ));

    let before = engine.get_account(&ctx);
    let result = engine.close_all(&ctx, "EOD");
    assert!(result.is_err());

    let after = engine.get_account(&ctx);
    assert_eq!(before, after);
    assert!(journal.trades().is_empty());
    assert_eq!(engine.get_account(&ctx).balance, 100_000.0);
}
