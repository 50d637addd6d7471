//! Pure, total, side-effect-free FX P&L and margin functions.
//!
//! See `SPEC_FULL.md` §4.3. None of these functions panic; degenerate input
//! is signalled via [`AccountingError`].

use crate::{error::AccountingError, instrument::InstrumentRegistry, price::PriceStore};
use tracing::warn;

/// `10^pip_location`.
///
/// # Arguments
/// * `pip_location` - exponent such that pip size is `10^pip_location`
///   (e.g. `-4` for most pairs, `-2` for JPY pairs).
pub fn pip_size(pip_location: i32) -> f64 {
    10f64.powi(pip_location)
}

/// Unrealized (or, at close, realized) P&L of a position in account currency.
///
/// `units * (mark_price - entry_price) * quote_to_account_rate`. Sign
/// follows `units`: negative is loss, positive is gain.
///
/// # Arguments
/// * `units` - signed unit count, positive long / negative short
/// * `entry_price` - the price the position was opened at
/// * `mark_price` - the side-correct price to value the position at
/// * `quote_to_account_rate` - conversion factor from the instrument's quote
///   currency into the account's reporting currency
pub fn unrealized_pl(units: f64, entry_price: f64, mark_price: f64, quote_to_account_rate: f64) -> f64 {
    units * (mark_price - entry_price) * quote_to_account_rate
}

/// Margin required to back a position, in account currency.
///
/// `|units| * mid_price * quote_to_account_rate * margin_rate`.
///
/// # Arguments
/// * `units` - signed unit count; only the magnitude matters
/// * `mid_price` - `(bid + ask) / 2` of the instrument's latest quote
/// * `margin_rate` - the instrument's fractional margin requirement
/// * `quote_to_account_rate` - conversion factor into account currency
pub fn trade_margin(units: f64, mid_price: f64, margin_rate: f64, quote_to_account_rate: f64) -> f64 {
    units.abs() * mid_price * quote_to_account_rate * margin_rate
}

/// Derives the conversion factor from an instrument's quote currency into
/// the account's reporting currency.
///
/// - If the instrument's quote currency equals the account currency, the
///   rate is `1.0`.
/// - Else if the instrument's base currency equals the account currency
///   (the common JPY-account case), the rate is `1.0 / mid` of that same
///   instrument's latest quote.
/// - Else, attempts to bridge via a registered cross pair `{quote}_{account}`
///   or `{account}_{quote}` using its current mid price.
/// - Else falls back to `1.0`, logging a `tracing::warn!` — this never fails.
///
/// Known limitation (`SPEC_FULL.md` §9 Open Question 2): cross-currency
/// conversion outside a direct same-currency or base-currency-bridge case
/// depends on a registered bridging instrument existing with a live quote.
/// Lacking that, this falls back to `1.0` rather than failing the caller's
/// operation — almost certainly wrong for a production platform, but this is
/// the source's documented behavior, preserved here deliberately rather than
/// silently "fixed". Every other failure mode (a matched bridge whose price
/// is missing, or a zero mid) still returns [`AccountingError`].
pub fn quote_to_account_rate(
    instrument_symbol: &str,
    instrument_base: &str,
    instrument_quote: &str,
    account_currency: &str,
    registry: &InstrumentRegistry,
    prices: &PriceStore,
) -> Result<f64, AccountingError> {
    if instrument_quote == account_currency {
        return Ok(1.0);
    }

    if instrument_base == account_currency {
        let mid = prices
            .get(instrument_symbol)
            .map_err(|_| no_conversion(instrument_quote, account_currency))?
            .mid();
        if mid == 0.0 {
            return Err(AccountingError::DegenerateInput(format!(
                "instrument {instrument_symbol} has a zero mid price"
            )));
        }
        return Ok(1.0 / mid);
    }

    for bridge_symbol in [
        format!("{instrument_quote}_{account_currency}"),
        format!("{account_currency}_{instrument_quote}"),
    ] {
        let Ok(bridge) = registry.lookup(&bridge_symbol) else {
            continue;
        };
        let Ok(quote) = prices.get(&bridge_symbol) else {
            continue;
        };
        let mid = quote.mid();
        if mid == 0.0 {
            continue;
        }
        return Ok(if bridge.quote == account_currency {
            1.0 / mid
        } else {
            mid
        });
    }

    warn!(
        instrument = instrument_symbol,
        quote_currency = instrument_quote,
        account_currency,
        "no registered bridge to account currency; falling back to 1.0 conversion rate"
    );
    Ok(1.0)
}

fn no_conversion(quote: &str, account: &str) -> AccountingError {
    AccountingError::NoConversion {
        quote: quote.to_string(),
        account: account.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{instrument::Instrument, price::Quote};
    use chrono::{TimeZone, Utc};

    fn ts() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn pip_size_negative_exponent() {
        assert!(crate::test_utils::f64_is_eq(pip_size(-4), 0.0001, 1e-12));
        assert!(crate::test_utils::f64_is_eq(pip_size(-2), 0.01, 1e-12));
    }

    #[test]
    fn unrealized_pl_sign_follows_units() {
        let long_gain = unrealized_pl(100_000.0, 1.1002, 1.1010, 1.0);
        assert!(crate::test_utils::f64_is_eq(long_gain, 80.0, 1e-6));

        let short_loss = unrealized_pl(-100_000.0, 1.1000, 1.1010, 1.0);
        assert!(crate::test_utils::f64_is_eq(short_loss, -100.0, 1e-6));
    }

    #[test]
    fn trade_margin_uses_absolute_units() {
        let margin = trade_margin(-100_000.0, 1.1, 0.02, 1.0);
        assert!(crate::test_utils::f64_is_eq(margin, 2200.0, 1e-6));
    }

    #[test]
    fn quote_to_account_rate_same_currency_is_one() {
        let registry = InstrumentRegistry::new([]);
        let prices = PriceStore::new();
        let rate =
            quote_to_account_rate("EUR_USD", "EUR", "USD", "USD", &registry, &prices).unwrap();
        assert_eq!(rate, 1.0);
    }

    #[test]
    fn quote_to_account_rate_base_bridge_inverts_mid() {
        let registry = InstrumentRegistry::new([]);
        let prices = PriceStore::new();
        prices.set("USD_JPY", Quote::new(150.00, 150.02, ts()));
        let rate =
            quote_to_account_rate("USD_JPY", "USD", "JPY", "USD", &registry, &prices).unwrap();
        assert!(crate::test_utils::f64_is_eq(rate, 1.0 / 150.01, 1e-9));
    }

    #[test]
    fn quote_to_account_rate_no_path_falls_back_to_one() {
        let registry = InstrumentRegistry::new([]);
        let prices = PriceStore::new();
        let rate = quote_to_account_rate("EUR_GBP", "EUR", "GBP", "USD", &registry, &prices)
            .expect("falls back rather than failing");
        assert_eq!(rate, 1.0);
    }

    #[test]
    fn quote_to_account_rate_base_bridge_missing_price_errors() {
        let registry = InstrumentRegistry::new([]);
        let prices = PriceStore::new();
        let result = quote_to_account_rate("USD_JPY", "USD", "JPY", "USD", &registry, &prices);
        assert!(matches!(result, Err(AccountingError::NoConversion { .. })));
    }

    #[test]
    fn quote_to_account_rate_bridges_via_registered_cross_pair() {
        let registry = InstrumentRegistry::new([Instrument::new(
            "GBP_USD", "Pound/Dollar", "GBP", "USD", -4, 0.02,
        )]);
        let prices = PriceStore::new();
        prices.set("GBP_USD", Quote::new(1.2500, 1.2502, ts()));
        let rate =
            quote_to_account_rate("EUR_GBP", "EUR", "GBP", "USD", &registry, &prices).unwrap();
        assert!(crate::test_utils::f64_is_eq(rate, 1.2501, 1e-9));
    }
}
