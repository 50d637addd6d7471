//! Journal storage: trade records, equity snapshots, and backtest-run
//! metadata. See `SPEC_FULL.md` §6.3.
//!
//! The [`Engine`](crate::engine::Engine) holds an `Arc<dyn Journal>` but
//! never opens or closes the underlying resource itself — sinks acquire
//! file/database handles at construction and release them on an explicit
//! `close`, per `SPEC_FULL.md` §5's resource policy.

use crate::{error::JournalError, trade::TradeId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{fs::File, path::Path};

/// One row of the `trades` table: written exactly once, at trade close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: TradeId,
    pub instrument: String,
    pub units: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub realized_pl: f64,
    pub reason: String,
}

/// One row of the `equity` table: written once per Engine state-changing
/// operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub time: DateTime<Utc>,
    pub balance: f64,
    pub equity: f64,
    pub margin_used: f64,
    pub free_margin: f64,
    pub margin_level: f64,
}

/// Metadata header for a single backtest invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRunRecord {
    pub run_id: String,
    pub strategy: String,
    pub instrument: String,
    pub timeframe: String,
    pub dataset_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// Opaque serialized configuration blob (e.g. JSON).
    pub config: String,
    /// Opaque serialized aggregate statistics blob (e.g. JSON).
    pub stats: String,
}

impl BacktestRunRecord {
    /// Builds a record from any `Serialize` config/stats pair, JSON-encoding
    /// each into this record's opaque blob fields.
    pub fn new(
        run_id: impl Into<String>,
        strategy: impl Into<String>,
        instrument: impl Into<String>,
        timeframe: impl Into<String>,
        dataset_id: impl Into<String>,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        config: &impl Serialize,
        stats: &impl Serialize,
    ) -> Result<Self, JournalError> {
        Ok(Self {
            run_id: run_id.into(),
            strategy: strategy.into(),
            instrument: instrument.into(),
            timeframe: timeframe.into(),
            dataset_id: dataset_id.into(),
            period_start,
            period_end,
            config: serde_json::to_string(config)?,
            stats: serde_json::to_string(stats)?,
        })
    }
}

/// Extension point for persisting journal rows. Implementations must be
/// safe to call while the Engine's internal lock is held — writes are
/// synchronous and on the hot path (`SPEC_FULL.md` §5).
pub trait Journal: Send + Sync + std::fmt::Debug {
    fn record_trade(&self, record: &TradeRecord) -> Result<(), JournalError>;
    fn record_equity(&self, record: &EquitySnapshot) -> Result<(), JournalError>;
    fn record_backtest_run(&self, record: &BacktestRunRecord) -> Result<(), JournalError>;
}

/// In-memory [`Journal`], convenient for tests and quick backtests that
/// don't need durable output.
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    trades: Mutex<Vec<TradeRecord>>,
    equity: Mutex<Vec<EquitySnapshot>>,
    runs: Mutex<Vec<BacktestRunRecord>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trades(&self) -> Vec<TradeRecord> {
        self.trades.lock().clone()
    }

    pub fn equity(&self) -> Vec<EquitySnapshot> {
        self.equity.lock().clone()
    }

    pub fn runs(&self) -> Vec<BacktestRunRecord> {
        self.runs.lock().clone()
    }
}

impl Journal for InMemoryJournal {
    fn record_trade(&self, record: &TradeRecord) -> Result<(), JournalError> {
        self.trades.lock().push(record.clone());
        Ok(())
    }

    fn record_equity(&self, record: &EquitySnapshot) -> Result<(), JournalError> {
        self.equity.lock().push(*record);
        Ok(())
    }

    fn record_backtest_run(&self, record: &BacktestRunRecord) -> Result<(), JournalError> {
        self.runs.lock().push(record.clone());
        Ok(())
    }
}

/// CSV-file-backed [`Journal`]. Opens one writer per table at construction;
/// the caller must invoke [`CsvJournal::close`] to flush and release the
/// file handles — the Engine that holds this journal does not do so.
#[derive(Debug)]
pub struct CsvJournal {
    trades: Mutex<csv::Writer<File>>,
    equity: Mutex<csv::Writer<File>>,
    runs: Mutex<csv::Writer<File>>,
}

impl CsvJournal {
    pub fn create(
        trades_path: impl AsRef<Path>,
        equity_path: impl AsRef<Path>,
        runs_path: impl AsRef<Path>,
    ) -> Result<Self, JournalError> {
        Ok(Self {
            trades: Mutex::new(csv::Writer::from_path(trades_path)?),
            equity: Mutex::new(csv::Writer::from_path(equity_path)?),
            runs: Mutex::new(csv::Writer::from_path(runs_path)?),
        })
    }

    /// Flushes and releases all three file handles. The Engine holding this
    /// journal never calls this on the caller's behalf.
    pub fn close(self) -> Result<(), JournalError> {
        self.trades.lock().flush()?;
        self.equity.lock().flush()?;
        self.runs.lock().flush()?;
        Ok(())
    }
}

impl Journal for CsvJournal {
    fn record_trade(&self, record: &TradeRecord) -> Result<(), JournalError> {
        let mut writer = self.trades.lock();
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    fn record_equity(&self, record: &EquitySnapshot) -> Result<(), JournalError> {
        let mut writer = self.equity.lock();
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    fn record_backtest_run(&self, record: &BacktestRunRecord) -> Result<(), JournalError> {
        let mut writer = self.runs.lock();
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
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
    fn in_memory_journal_accumulates_rows() {
        let journal = InMemoryJournal::new();
        journal
            .record_equity(&EquitySnapshot {
                time: ts(),
                balance: 100_000.0,
                equity: 100_000.0,
                margin_used: 0.0,
                free_margin: 100_000.0,
                margin_level: 0.0,
            })
            .unwrap();
        assert_eq!(journal.equity().len(), 1);
        assert!(journal.trades().is_empty());
    }

    #[test]
    fn backtest_run_record_encodes_config_and_stats_as_json() {
        let config = serde_json::json!({ "risk_percent": 0.01 });
        let stats = serde_json::json!({ "trades": 3, "net_pl": 42.5 });
        let record = BacktestRunRecord::new(
            "run-1",
            "ema-cross",
            "EUR_USD",
            "M1",
            "dataset-1",
            ts(),
            crate::test_utils::time_plus_days(ts(), 7),
            &config,
            &stats,
        )
        .unwrap();

        assert!(record.config.contains("risk_percent"));
        assert!(record.stats.contains("net_pl"));
    }

    #[test]
    fn csv_journal_writes_and_closes() {
        let dir = std::env::temp_dir().join(format!("fx-sim-journal-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let journal = CsvJournal::create(
            dir.join("trades.csv"),
            dir.join("equity.csv"),
            dir.join("runs.csv"),
        )
        .unwrap();

        journal
            .record_trade(&TradeRecord {
                trade_id: TradeId::new(),
                instrument: "EUR_USD".into(),
                units: 100_000.0,
                entry_price: 1.1002,
                exit_price: 1.0990,
                open_time: ts(),
                close_time: crate::test_utils::time_plus_secs(ts(), 45),
                realized_pl: -120.0,
                reason: "StopLoss".into(),
            })
            .unwrap();

        journal.close().unwrap();

        let contents = std::fs::read_to_string(dir.join("trades.csv")).unwrap();
        assert!(contents.contains("StopLoss"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
