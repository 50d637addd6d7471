//! Account state: balance, equity, margin utilization. See `SPEC_FULL.md` §3.

use serde::{Deserialize, Serialize};

/// Mutable account state, owned exclusively by the
/// [`crate::engine::Engine`]. External observers only ever see
/// [`AccountSnapshot`] copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub currency: String,
    pub balance: f64,
    pub equity: f64,
    pub margin_used: f64,
    pub free_margin: f64,
    pub margin_level: f64,
}

impl Account {
    pub fn new(id: impl Into<String>, currency: impl Into<String>, starting_balance: f64) -> Self {
        Self {
            id: id.into(),
            currency: currency.into(),
            balance: starting_balance,
            equity: starting_balance,
            margin_used: 0.0,
            free_margin: starting_balance,
            margin_level: 0.0,
        }
    }

    /// Credits (or debits, if negative) realized P&L to the balance.
    pub fn credit_realized_pl(&mut self, realized_pl: f64) {
        self.balance += realized_pl;
    }

    /// Recomputes `equity`, `free_margin` and `margin_level` from `balance`,
    /// the supplied sum of unrealized P&L, and `margin_used`.
    ///
    /// Enforces `SPEC_FULL.md` invariants 1-3:
    /// 1. `equity = balance + sum(unrealized_pl)`
    /// 2. `free_margin = equity - margin_used`
    /// 3. `margin_level = equity / margin_used` when `margin_used > 0`, else `0`
    pub fn revalue(&mut self, sum_unrealized_pl: f64, margin_used: f64) {
        self.equity = self.balance + sum_unrealized_pl;
        self.margin_used = margin_used;
        self.free_margin = self.equity - self.margin_used;
        self.margin_level = if self.margin_used > 0.0 {
            self.equity / self.margin_used
        } else {
            0.0
        };
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            id: self.id.clone(),
            currency: self.currency.clone(),
            balance: self.balance,
            equity: self.equity,
            margin_used: self.margin_used,
            free_margin: self.free_margin,
            margin_level: self.margin_level,
        }
    }
}

/// Read-only snapshot of [`Account`] returned to external callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub id: String,
    pub currency: String,
    pub balance: f64,
    pub equity: f64,
    pub margin_used: f64,
    pub free_margin: f64,
    pub margin_level: f64,
}

impl From<&Account> for AccountSnapshot {
    fn from(value: &Account) -> Self {
        value.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revalue_computes_dependent_fields() {
        let mut account = Account::new("acc-1", "USD", 100_000.0);
        account.revalue(80.0, 2200.0);
        assert!(crate::test_utils::f64_is_eq(account.equity, 100_080.0, 1e-6));
        assert!(crate::test_utils::f64_is_eq(
            account.free_margin,
            97_880.0,
            1e-6
        ));
        assert!(crate::test_utils::f64_is_eq(
            account.margin_level,
            100_080.0 / 2200.0,
            1e-9
        ));
    }

    #[test]
    fn margin_level_is_zero_with_no_margin_used() {
        let mut account = Account::new("acc-1", "USD", 100_000.0);
        account.revalue(0.0, 0.0);
        assert_eq!(account.margin_level, 0.0);
    }

    #[test]
    fn credit_realized_pl_mutates_balance_only() {
        let mut account = Account::new("acc-1", "USD", 100_000.0);
        account.credit_realized_pl(-120.0);
        assert!(crate::test_utils::f64_is_eq(account.balance, 99_880.0, 1e-6));
    }
}
