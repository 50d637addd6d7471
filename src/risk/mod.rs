//! Risk Sizer and Risk Policy Evaluator. See `SPEC_FULL.md` §4.6.
//!
//! Both are pure: neither mutates engine state. The sizer turns
//! (equity, risk %, stop distance, pip scale, quote-rate) into an integer
//! unit count; the evaluator gates an intended trade against a policy,
//! collecting every violation rather than failing fast on the first one.

use derive_more::Constructor;
use serde::{Deserialize, Serialize};

/// Simple risk checks over scalar inputs.
///
/// See [`check::CheckHigherThan`] for a concrete example.
pub mod check;

use crate::error::EngineError;
pub use check::{
    MarginPercentCheck, MaxOpenTradesCheck, MinRiskRewardCheck, RealizedLossCheck, RiskCheck,
    RiskPercentCheck,
};

/// Result of [`size_position`].
#[derive(Debug, Clone, Copy, PartialEq, Constructor, Serialize, Deserialize)]
pub struct RiskSize {
    /// Whole unit count. Callers apply sign by direction.
    pub units: u64,
    pub stop_pips: f64,
    pub risk_amount: f64,
}

/// Translates (equity, risk %, stop distance, instrument pip scale,
/// quote-currency rate) into an integer unit size.
///
/// 1. `pip = 10^pip_location`
/// 2. `stop_pips = |entry - stop| / pip`
/// 3. `risk_amount = equity * risk_percent`
/// 4. `pip_value_per_unit = pip * quote_to_account_rate`
/// 5. `raw_units = risk_amount / (stop_pips * pip_value_per_unit)`
/// 6. `units = floor(raw_units)` — floored toward zero, which guarantees
///    risk per trade never exceeds `equity * risk_percent`.
///
/// # Errors
/// Returns [`EngineError::DegenerateInput`] if `stop_pips` or
/// `pip_value_per_unit` are zero (or the inputs are non-finite) — callers
/// should reject these before sizing.
pub fn size_position(
    equity: f64,
    risk_percent: f64,
    entry_price: f64,
    stop_price: f64,
    pip_location: i32,
    quote_to_account_rate: f64,
) -> Result<RiskSize, EngineError> {
    let pip = crate::accounting::pip_size(pip_location);
    let stop_pips = (entry_price - stop_price).abs() / pip;
    let risk_amount = equity * risk_percent;
    let pip_value_per_unit = pip * quote_to_account_rate;

    if !stop_pips.is_finite() || !pip_value_per_unit.is_finite() || !risk_amount.is_finite() {
        return Err(EngineError::DegenerateInput(
            "non-finite input to position sizing".to_string(),
        ));
    }
    if stop_pips == 0.0 {
        return Err(EngineError::DegenerateInput(
            "stop distance is zero pips".to_string(),
        ));
    }
    if pip_value_per_unit == 0.0 {
        return Err(EngineError::DegenerateInput(
            "pip value per unit is zero".to_string(),
        ));
    }

    let raw_units = risk_amount / (stop_pips * pip_value_per_unit);
    let units = raw_units.max(0.0).floor() as u64;

    Ok(RiskSize {
        units,
        stop_pips,
        risk_amount,
    })
}

/// The facts about an intended trade that the [`RiskPolicyEvaluator`] checks
/// against configured limits. Computed by the caller before invoking
/// `CreateMarketOrder`.
#[derive(Debug, Clone, Copy, PartialEq, Constructor, Serialize, Deserialize)]
pub struct IntendedTrade {
    /// Fraction of equity risked by this trade (e.g. `0.01` for 1%).
    pub risk_percent: f64,
    /// Reward distance divided by risk distance, if a take-profit is set.
    pub risk_reward: Option<f64>,
    /// Number of currently open trades, including this one if opened.
    pub open_trades_after: usize,
    /// Projected aggregate margin utilization (margin_used / equity) after
    /// opening this trade.
    pub projected_margin_percent: f64,
    /// Realized loss booked so far today, as a positive magnitude.
    pub daily_realized_loss: f64,
    /// Realized loss booked so far this week, as a positive magnitude.
    pub weekly_realized_loss: f64,
}

/// Configured limits a [`RiskPolicyEvaluator`] gates intended trades against.
#[derive(Debug, Clone, Copy, PartialEq, Constructor, Serialize, Deserialize)]
pub struct RiskPolicy {
    pub max_risk_percent: f64,
    pub min_risk_reward: f64,
    pub max_open_trades: usize,
    pub max_margin_percent: f64,
    pub max_daily_loss: f64,
    pub max_weekly_loss: f64,
}

/// A single violated policy limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum PolicyViolation {
    #[error("risk percent {actual} exceeds max {limit}")]
    RiskPercent { actual: f64, limit: f64 },
    #[error("risk/reward {actual} below min {limit}")]
    RiskReward { actual: f64, limit: f64 },
    #[error("open trade count {actual} would exceed max {limit}")]
    MaxOpenTrades { actual: usize, limit: usize },
    #[error("projected margin percent {actual} exceeds max {limit}")]
    MarginPercent { actual: f64, limit: f64 },
    #[error("daily realized loss {actual} exceeds max {limit}")]
    DailyLoss { actual: f64, limit: f64 },
    #[error("weekly realized loss {actual} exceeds max {limit}")]
    WeeklyLoss { actual: f64, limit: f64 },
}

/// Accept/reject decision for an intended trade, with every violated limit
/// itemized (not just the first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub accepted: bool,
    pub violations: Vec<PolicyViolation>,
}

/// Gates an intended trade against a [`RiskPolicy`], collecting every
/// violation rather than failing fast. Does not mutate state; consumers
/// treat any violation as a pre-trade rejection.
#[derive(Debug, Clone, Copy, Constructor)]
pub struct RiskPolicyEvaluator {
    policy: RiskPolicy,
}

impl RiskPolicyEvaluator {
    pub fn evaluate(&self, trade: &IntendedTrade) -> PolicyDecision {
        let mut violations = Vec::new();

        if let Err(violation) =
            RiskPercentCheck::new(self.policy.max_risk_percent).check(&trade.risk_percent)
        {
            violations.push(violation);
        }
        if let Some(risk_reward) = trade.risk_reward {
            if let Err(violation) =
                MinRiskRewardCheck::new(self.policy.min_risk_reward).check(&risk_reward)
            {
                violations.push(violation);
            }
        }
        if let Err(violation) =
            MaxOpenTradesCheck::new(self.policy.max_open_trades).check(&trade.open_trades_after)
        {
            violations.push(violation);
        }
        if let Err(violation) = MarginPercentCheck::new(self.policy.max_margin_percent)
            .check(&trade.projected_margin_percent)
        {
            violations.push(violation);
        }
        if let Err(violation) =
            RealizedLossCheck::daily(self.policy.max_daily_loss).check(&trade.daily_realized_loss)
        {
            violations.push(violation);
        }
        if let Err(violation) = RealizedLossCheck::weekly(self.policy.max_weekly_loss)
            .check(&trade.weekly_realized_loss)
        {
            violations.push(violation);
        }

        PolicyDecision {
            accepted: violations.is_empty(),
            violations,
        }
    }
}
