//! Quote-ingestion CSV replay and scripted-event driving of an [`Engine`],
//! plus a parse-only candle CSV reader. See `SPEC_FULL.md` §6.1/§6.2.
//!
//! Tick/candle ingestion proper (live REST/streaming clients) is an
//! external collaborator out of this crate's scope (`SPEC_FULL.md` §1);
//! this module only covers the CSV replay path used for backtesting.

use crate::{
    engine::{Context, Engine, IncomingQuote},
    error::EngineError,
    trade::{OrderRequest, TradeId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{path::Path, str::FromStr};
use thiserror::Error;

/// Errors raised while replaying a quote CSV or reading a candle CSV.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed row: {0}")]
    MalformedRow(String),

    #[error("engine: {0}")]
    Engine(#[from] EngineError),
}

/// A scripted event attached to a tick row, applied after the tick's price
/// is set (`SPEC_FULL.md` §6.1's `TickThenEvent` ordering — the only
/// ordering this crate implements).
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedEvent {
    Open {
        instrument: String,
        units: f64,
    },
    OpenStopTakeProfit {
        instrument: String,
        units: f64,
        stop_loss: f64,
        take_profit: f64,
    },
    Close {
        trade_id: TradeId,
        reason: Option<String>,
    },
    CloseAll {
        reason: Option<String>,
    },
}

/// Replays a quote CSV (`time, instrument, bid, ask[, event, p1, p2, p3,
/// p4]`) against `engine`, driving `UpdatePrice` for every row and applying
/// any scripted event after the tick. The header row (`time,...`) is
/// skipped if present; empty rows and rows with fewer than four columns
/// are skipped.
pub fn replay_csv(engine: &Engine, path: impl AsRef<Path>) -> Result<(), ReplayError> {
    let file = std::fs::File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);
    let ctx = Context::default();

    for record in reader.records() {
        let record = record?;
        if record.len() < 4 {
            continue;
        }
        if record
            .get(0)
            .is_some_and(|field| field.trim().eq_ignore_ascii_case("time"))
        {
            continue;
        }

        let timestamp = parse_timestamp(record.get(0).unwrap_or(""))?;
        let instrument = record.get(1).unwrap_or("").trim().to_string();
        let bid = parse_f64(record.get(2).unwrap_or(""))?;
        let ask = parse_f64(record.get(3).unwrap_or(""))?;

        engine.update_price(&ctx, IncomingQuote::new(instrument, bid, ask, timestamp))?;

        if record.len() > 4 {
            if let Some(event) = parse_event(&record)? {
                apply_event(engine, &ctx, event)?;
            }
        }
    }

    Ok(())
}

fn apply_event(engine: &Engine, ctx: &Context, event: ScriptedEvent) -> Result<(), ReplayError> {
    match event {
        ScriptedEvent::Open { instrument, units } => {
            engine.create_market_order(ctx, OrderRequest::new(instrument, units, None, None))?;
        }
        ScriptedEvent::OpenStopTakeProfit {
            instrument,
            units,
            stop_loss,
            take_profit,
        } => {
            engine.create_market_order(
                ctx,
                OrderRequest::new(instrument, units, Some(stop_loss), Some(take_profit)),
            )?;
        }
        ScriptedEvent::Close { trade_id, reason } => {
            engine.close_trade(ctx, trade_id, reason.unwrap_or_else(|| "CLOSE".to_string()))?;
        }
        ScriptedEvent::CloseAll { reason } => {
            engine.close_all(ctx, reason.unwrap_or_else(|| "CLOSE_ALL".to_string()))?;
        }
    }
    Ok(())
}

fn parse_event(record: &csv::StringRecord) -> Result<Option<ScriptedEvent>, ReplayError> {
    let event = record.get(4).unwrap_or("").trim();
    if event.is_empty() {
        return Ok(None);
    }

    let p1 = record.get(5).unwrap_or("").trim();
    let p2 = record.get(6).unwrap_or("").trim();
    let p3 = record.get(7).unwrap_or("").trim();
    let p4 = record.get(8).unwrap_or("").trim();

    let event = match event.to_ascii_uppercase().as_str() {
        "OPEN" => ScriptedEvent::Open {
            instrument: p1.to_string(),
            units: parse_f64(p2)?,
        },
        "OPEN_SLTP" => ScriptedEvent::OpenStopTakeProfit {
            instrument: p1.to_string(),
            units: parse_f64(p2)?,
            stop_loss: parse_f64(p3)?,
            take_profit: parse_f64(p4)?,
        },
        "CLOSE" => ScriptedEvent::Close {
            trade_id: TradeId::from_str(p1)
                .map_err(|_| ReplayError::MalformedRow(format!("bad trade id: {p1}")))?,
            reason: optional_string(p2),
        },
        "CLOSE_ALL" => ScriptedEvent::CloseAll {
            reason: optional_string(p1),
        },
        other => return Err(ReplayError::MalformedRow(format!("unknown event: {other}"))),
    };

    Ok(Some(event))
}

fn optional_string(field: &str) -> Option<String> {
    if field.is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}

fn parse_timestamp(field: &str) -> Result<DateTime<Utc>, ReplayError> {
    DateTime::parse_from_rfc3339(field.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ReplayError::MalformedRow(format!("bad timestamp: {field}")))
}

fn parse_f64(field: &str) -> Result<f64, ReplayError> {
    field
        .trim()
        .parse::<f64>()
        .map_err(|_| ReplayError::MalformedRow(format!("bad numeric field: {field}")))
}

/// A single OHLCV candle, as produced by data ingestion (`SPEC_FULL.md`
/// §6.2). Prices are kept as decimal strings to preserve source precision
/// rather than being lossily parsed into `f64` by this parse-only reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub instrument: String,
    pub granularity: String,
    pub complete: bool,
    pub volume: u64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
}

#[derive(Debug, Deserialize)]
struct RawCandleRow {
    time: String,
    instrument: String,
    granularity: String,
    complete: String,
    volume: String,
    o: String,
    h: String,
    l: String,
    c: String,
}

/// Parses a candle CSV (`time, instrument, granularity, complete, volume,
/// o, h, l, c`) with a header row. This is a parse-only reader; the engine
/// never consumes candles directly.
pub fn read_candles_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>, ReplayError> {
    let file = std::fs::File::open(path)?;
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);

    reader
        .deserialize::<RawCandleRow>()
        .map(|row| row.map_err(ReplayError::from).and_then(TryFrom::try_from))
        .collect()
}

impl TryFrom<RawCandleRow> for Candle {
    type Error = ReplayError;

    fn try_from(row: RawCandleRow) -> Result<Self, Self::Error> {
        Ok(Candle {
            time: parse_timestamp(&row.time)?,
            instrument: row.instrument,
            granularity: row.granularity,
            complete: row
                .complete
                .trim()
                .parse::<bool>()
                .map_err(|_| ReplayError::MalformedRow(format!("bad complete flag: {}", row.complete)))?,
            volume: row
                .volume
                .trim()
                .parse::<u64>()
                .map_err(|_| ReplayError::MalformedRow(format!("bad volume: {}", row.volume)))?,
            open: row.o,
            high: row.h,
            low: row.l,
            close: row.c,
        })
    }
}
