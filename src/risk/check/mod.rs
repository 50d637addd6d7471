use super::PolicyViolation;
use derive_more::Constructor;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// General interface for implementing simple RiskManager checks.
///
/// See [`CheckHigherThan`] for a simple generic example, and
/// [`RiskPercentCheck`] etc. below for the concrete checks the
/// [`super::RiskPolicyEvaluator`] composes.
///
/// # Associated Types
/// * `Input` - The type of data being validated (e.g., `f64` for percent checks)
/// * `Error` - The error type returned when validation fails
pub trait RiskCheck {
    type Input;
    type Error;

    /// Returns the name of the risk check.
    fn name() -> &'static str;

    /// Performs the risk check on the provided `Input`.
    fn check(&self, input: &Self::Input) -> Result<(), Self::Error>;
}

/// General risk check that validates if an input value exceeds an upper limit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Deserialize, Serialize, Constructor)]
pub struct CheckHigherThan<T> {
    /// The upper limit value; check passes if input is <= limit.
    pub limit: T,
}

impl<T> RiskCheck for CheckHigherThan<T>
where
    T: Copy + PartialOrd,
{
    type Input = T;
    type Error = CheckFailHigherThan<T>;

    fn name() -> &'static str {
        "CheckHigherThan"
    }

    fn check(&self, input: &Self::Input) -> Result<(), Self::Error> {
        if *input <= self.limit {
            Ok(())
        } else {
            Err(CheckFailHigherThan {
                limit: self.limit,
                input: *input,
            })
        }
    }
}

/// Error returned when a [`CheckHigherThan`] validation fails.
#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd, Deserialize, Serialize, Constructor, Error,
)]
#[error("CheckHigherThanFailed: input {input} > limit {limit}")]
pub struct CheckFailHigherThan<T: std::fmt::Display> {
    /// The limit value that was exceeded.
    pub limit: T,

    /// The input value that caused the check to fail.
    pub input: T,
}

/// Caps the fraction of equity an intended trade may risk.
#[derive(Debug, Clone, Copy, Constructor)]
pub struct RiskPercentCheck {
    limit: f64,
}

impl RiskCheck for RiskPercentCheck {
    type Input = f64;
    type Error = PolicyViolation;

    fn name() -> &'static str {
        "RiskPercentCheck"
    }

    fn check(&self, input: &Self::Input) -> Result<(), Self::Error> {
        if *input <= self.limit {
            Ok(())
        } else {
            Err(PolicyViolation::RiskPercent {
                actual: *input,
                limit: self.limit,
            })
        }
    }
}

/// Floors the reward-to-risk ratio an intended trade must offer.
#[derive(Debug, Clone, Copy, Constructor)]
pub struct MinRiskRewardCheck {
    limit: f64,
}

impl RiskCheck for MinRiskRewardCheck {
    type Input = f64;
    type Error = PolicyViolation;

    fn name() -> &'static str {
        "MinRiskRewardCheck"
    }

    fn check(&self, input: &Self::Input) -> Result<(), Self::Error> {
        if *input >= self.limit {
            Ok(())
        } else {
            Err(PolicyViolation::RiskReward {
                actual: *input,
                limit: self.limit,
            })
        }
    }
}

/// Caps the number of simultaneously open trades.
#[derive(Debug, Clone, Copy, Constructor)]
pub struct MaxOpenTradesCheck {
    limit: usize,
}

impl RiskCheck for MaxOpenTradesCheck {
    type Input = usize;
    type Error = PolicyViolation;

    fn name() -> &'static str {
        "MaxOpenTradesCheck"
    }

    fn check(&self, input: &Self::Input) -> Result<(), Self::Error> {
        if *input <= self.limit {
            Ok(())
        } else {
            Err(PolicyViolation::MaxOpenTrades {
                actual: *input,
                limit: self.limit,
            })
        }
    }
}

/// Caps the projected aggregate margin utilization (`margin_used / equity`).
#[derive(Debug, Clone, Copy, Constructor)]
pub struct MarginPercentCheck {
    limit: f64,
}

impl RiskCheck for MarginPercentCheck {
    type Input = f64;
    type Error = PolicyViolation;

    fn name() -> &'static str {
        "MarginPercentCheck"
    }

    fn check(&self, input: &Self::Input) -> Result<(), Self::Error> {
        if *input <= self.limit {
            Ok(())
        } else {
            Err(PolicyViolation::MarginPercent {
                actual: *input,
                limit: self.limit,
            })
        }
    }
}

/// Caps realized losses booked within a rolling window (daily or weekly).
#[derive(Debug, Clone, Copy)]
pub struct RealizedLossCheck {
    limit: f64,
    window: LossWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LossWindow {
    Daily,
    Weekly,
}

impl RealizedLossCheck {
    pub fn daily(limit: f64) -> Self {
        Self {
            limit,
            window: LossWindow::Daily,
        }
    }

    pub fn weekly(limit: f64) -> Self {
        Self {
            limit,
            window: LossWindow::Weekly,
        }
    }
}

impl RiskCheck for RealizedLossCheck {
    type Input = f64;
    type Error = PolicyViolation;

    fn name() -> &'static str {
        "RealizedLossCheck"
    }

    fn check(&self, input: &Self::Input) -> Result<(), Self::Error> {
        if *input <= self.limit {
            return Ok(());
        }
        Err(match self.window {
            LossWindow::Daily => PolicyViolation::DailyLoss {
                actual: *input,
                limit: self.limit,
            },
            LossWindow::Weekly => PolicyViolation::WeeklyLoss {
                actual: *input,
                limit: self.limit,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_higher_than_passes_at_limit() {
        let check = CheckHigherThan::new(10.0);
        assert!(check.check(&10.0).is_ok());
        assert!(check.check(&10.1).is_err());
    }

    #[test]
    fn risk_percent_check_rejects_over_limit() {
        let check = RiskPercentCheck::new(0.02);
        assert!(check.check(&0.02).is_ok());
        assert!(matches!(
            check.check(&0.03),
            Err(PolicyViolation::RiskPercent { .. })
        ));
    }

    #[test]
    fn realized_loss_check_tags_window() {
        let daily = RealizedLossCheck::daily(500.0);
        assert!(matches!(
            daily.check(&600.0),
            Err(PolicyViolation::DailyLoss { .. })
        ));
        let weekly = RealizedLossCheck::weekly(1500.0);
        assert!(matches!(
            weekly.check(&2000.0),
            Err(PolicyViolation::WeeklyLoss { .. })
        ));
    }
}
