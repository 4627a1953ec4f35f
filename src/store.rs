//! Durable Store.
//!
//! Grounded on `cooprefr-bettersys/rust-backend/src/signals/db_storage.rs`:
//! a WAL-mode SQLite file behind a `parking_lot::Mutex<Connection>`, a
//! single `execute_batch` schema bootstrap, `prepare_cached` + `query_map`
//! for list queries, and `INSERT OR IGNORE`/`INSERT OR REPLACE` for
//! idempotent-by-natural-key append paths.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use tracing::{info, warn};

use crate::models::{
    DailyState, DailyStatus, Direction, Heartbeat, PriceSample, Regime, Signal, SignalStatus, StrategyType,
};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS signals (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    direction TEXT NOT NULL,
    strategy TEXT NOT NULL,
    entry REAL NOT NULL,
    stop REAL NOT NULL,
    target REAL NOT NULL,
    margin REAL NOT NULL,
    leverage INTEGER NOT NULL,
    confidence REAL NOT NULL,
    setup_quality INTEGER NOT NULL,
    regime TEXT NOT NULL,
    reasoning TEXT NOT NULL,
    g1_context REAL NOT NULL,
    g2_regime REAL NOT NULL,
    g3_quality REAL NOT NULL,
    g4_ai REAL NOT NULL,
    gate_5_passed INTEGER NOT NULL,
    status TEXT NOT NULL,
    result_price REAL,
    result_ts TEXT,
    result_pnl REAL,
    result_reason TEXT,
    mfe REAL,
    mae REAL,
    duration_min REAL,
    trade_iq REAL,
    analyzed INTEGER NOT NULL DEFAULT 0
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_signals_status_created ON signals(status, created_at);
CREATE INDEX IF NOT EXISTS idx_signals_analyzed ON signals(analyzed, status);

CREATE TABLE IF NOT EXISTS daily_state (
    date TEXT PRIMARY KEY,
    pnl REAL NOT NULL,
    trade_count INTEGER NOT NULL,
    wins INTEGER NOT NULL,
    losses INTEGER NOT NULL,
    consecutive_losses INTEGER NOT NULL,
    has_position INTEGER NOT NULL,
    status TEXT NOT NULL,
    target_hit_at TEXT,
    stop_hit_at TEXT,
    last_trade_at TEXT
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS heartbeats (
    bot_name TEXT NOT NULL,
    ts TEXT NOT NULL,
    status TEXT NOT NULL,
    signals_today INTEGER NOT NULL,
    regime TEXT,
    pnl REAL NOT NULL,
    error TEXT,
    PRIMARY KEY (bot_name, ts)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_heartbeats_bot_ts ON heartbeats(bot_name, ts DESC);

CREATE TABLE IF NOT EXISTS price_samples (
    signal_id TEXT NOT NULL,
    ts TEXT NOT NULL,
    price REAL NOT NULL,
    PRIMARY KEY (signal_id, ts)
) WITHOUT ROWID;
"#;

pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).with_context(|| format!("failed to open store at {path}"))?;
        conn.execute_batch(SCHEMA_SQL).context("failed to initialize store schema")?;

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0)).unwrap_or_default();
        if journal_mode.to_lowercase() != "wal" {
            warn!(journal_mode, "WAL mode not active");
        }
        info!(path, "durable store opened");

        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn upsert_daily_state(&self, state: &DailyState) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO daily_state (date, pnl, trade_count, wins, losses, consecutive_losses, has_position, status, target_hit_at, stop_hit_at, last_trade_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(date) DO UPDATE SET
                pnl=excluded.pnl, trade_count=excluded.trade_count, wins=excluded.wins, losses=excluded.losses,
                consecutive_losses=excluded.consecutive_losses, has_position=excluded.has_position, status=excluded.status,
                target_hit_at=excluded.target_hit_at, stop_hit_at=excluded.stop_hit_at, last_trade_at=excluded.last_trade_at",
            params![
                state.date.to_string(),
                state.pnl,
                state.trade_count,
                state.wins,
                state.losses,
                state.consecutive_losses,
                state.has_position,
                state.status.as_str(),
                state.target_hit_at.map(|t| t.to_rfc3339()),
                state.stop_hit_at.map(|t| t.to_rfc3339()),
                state.last_trade_at.map(|t| t.to_rfc3339()),
            ],
        )
        .context("upsert_daily_state")?;
        Ok(())
    }

    pub fn daily_state(&self, date: NaiveDate) -> Result<Option<DailyState>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT date, pnl, trade_count, wins, losses, consecutive_losses, has_position, status, target_hit_at, stop_hit_at, last_trade_at
             FROM daily_state WHERE date = ?1",
        )?;
        let row = stmt.query_row(params![date.to_string()], row_to_daily_state).ok();
        Ok(row)
    }

    pub fn insert_pending_signal(&self, signal: &Signal) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO signals (
                id, created_at, direction, strategy, entry, stop, target, margin, leverage, confidence,
                setup_quality, regime, reasoning, g1_context, g2_regime, g3_quality, g4_ai, gate_5_passed, status
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19)",
            params![
                signal.id,
                signal.created_at.to_rfc3339(),
                signal.direction.as_str(),
                signal.strategy.as_str(),
                signal.entry,
                signal.stop,
                signal.target,
                signal.margin,
                signal.leverage,
                signal.confidence,
                signal.setup_quality,
                signal.regime.as_str(),
                signal.reasoning,
                signal.gate_scores.g1_context,
                signal.gate_scores.g2_regime,
                signal.gate_scores.g3_quality,
                signal.gate_scores.g4_ai,
                signal.gate_5_passed,
                signal.status.as_str(),
            ],
        )
        .context("insert_pending_signal")?;
        Ok(())
    }

    pub fn update_signal_result(
        &self,
        id: &str,
        status: SignalStatus,
        result_price: f64,
        result_ts: DateTime<Utc>,
        result_pnl: f64,
        result_reason: &str,
        mfe: f64,
        mae: f64,
        duration_min: f64,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE signals SET status=?1, result_price=?2, result_ts=?3, result_pnl=?4, result_reason=?5, mfe=?6, mae=?7, duration_min=?8
             WHERE id=?9",
            params![status.as_str(), result_price, result_ts.to_rfc3339(), result_pnl, result_reason, mfe, mae, duration_min, id],
        )
        .context("update_signal_result")?;
        Ok(())
    }

    pub fn update_signal_trade_iq(&self, id: &str, trade_iq: f64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("UPDATE signals SET trade_iq=?1, analyzed=1 WHERE id=?2", params![trade_iq, id]).context("update_signal_trade_iq")?;
        Ok(())
    }

    pub fn list_pending_signals(&self) -> Result<Vec<Signal>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!("{SIGNAL_COLUMNS} FROM signals WHERE status = 'PENDING' ORDER BY created_at ASC"))?;
        let rows = stmt.query_map([], row_to_signal)?.filter_map(|r| r.ok()).collect();
        Ok(rows)
    }

    pub fn list_unanalyzed_resolved(&self, limit: u32) -> Result<Vec<Signal>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "{SIGNAL_COLUMNS} FROM signals WHERE analyzed = 0 AND status != 'PENDING' ORDER BY result_ts ASC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit], row_to_signal)?.filter_map(|r| r.ok()).collect();
        Ok(rows)
    }

    pub fn append_heartbeat(&self, hb: &Heartbeat) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO heartbeats (bot_name, ts, status, signals_today, regime, pnl, error) VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![hb.bot_name, hb.ts.to_rfc3339(), hb.status, hb.signals_today, hb.regime.map(|r| r.as_str()), hb.pnl, hb.error],
        )
        .context("append_heartbeat")?;
        Ok(())
    }

    pub fn latest_heartbeat(&self, bot_name: &str) -> Result<Option<Heartbeat>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT bot_name, ts, status, signals_today, regime, pnl, error FROM heartbeats WHERE bot_name = ?1 ORDER BY ts DESC LIMIT 1",
        )?;
        let row = stmt.query_row(params![bot_name], row_to_heartbeat).ok();
        Ok(row)
    }

    pub fn append_price_sample(&self, signal_id: &str, ts: DateTime<Utc>, price: f64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO price_samples (signal_id, ts, price) VALUES (?1, ?2, ?3)",
            params![signal_id, ts.to_rfc3339(), price],
        )
        .context("append_price_sample")?;
        Ok(())
    }

    pub fn list_price_samples(&self, signal_id: &str) -> Result<Vec<PriceSample>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT signal_id, ts, price FROM price_samples WHERE signal_id = ?1 ORDER BY ts ASC")?;
        let rows = stmt
            .query_map(params![signal_id], |row| {
                Ok(PriceSample {
                    signal_id: row.get(0)?,
                    ts: parse_ts(row.get::<_, String>(1)?),
                    price: row.get(2)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn daily_stats_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyState>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT date, pnl, trade_count, wins, losses, consecutive_losses, has_position, status, target_hit_at, stop_hit_at, last_trade_at
             FROM daily_state WHERE date BETWEEN ?1 AND ?2 ORDER BY date ASC",
        )?;
        let rows = stmt.query_map(params![start.to_string(), end.to_string()], row_to_daily_state)?.filter_map(|r| r.ok()).collect();
        Ok(rows)
    }
}

const SIGNAL_COLUMNS: &str = "SELECT id, created_at, direction, strategy, entry, stop, target, margin, leverage, confidence, \
     setup_quality, regime, reasoning, g1_context, g2_regime, g3_quality, g4_ai, gate_5_passed, status, \
     result_price, result_ts, result_pnl, result_reason, mfe, mae, duration_min, trade_iq, analyzed";

fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s).map(|t| t.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

fn parse_direction(s: &str) -> Direction {
    if s == "SHORT" {
        Direction::Short
    } else {
        Direction::Long
    }
}

fn parse_strategy(s: &str) -> StrategyType {
    match s {
        "LIQUIDATION_HUNT" => StrategyType::LiquidationHunt,
        "FUNDING_FADE" => StrategyType::FundingFade,
        "RANGE_SCALPING" => StrategyType::RangeScalping,
        _ => StrategyType::TrendMomentum,
    }
}

fn parse_regime(s: &str) -> Regime {
    match s {
        "TRENDING_DOWN" => Regime::TrendingDown,
        "RANGING" => Regime::Ranging,
        "HIGH_VOLATILITY" => Regime::HighVolatility,
        "CHOPPY" => Regime::Choppy,
        _ => Regime::TrendingUp,
    }
}

fn parse_status(s: &str) -> SignalStatus {
    match s {
        "WIN" => SignalStatus::Win,
        "LOSS" => SignalStatus::Loss,
        "TIMEOUT" => SignalStatus::Timeout,
        "CANCELLED" => SignalStatus::Cancelled,
        _ => SignalStatus::Pending,
    }
}

fn parse_daily_status(s: &str) -> DailyStatus {
    match s {
        "TARGET_HIT" => DailyStatus::TargetHit,
        "STOP_HIT" => DailyStatus::StopHit,
        "MAX_TRADES" => DailyStatus::MaxTrades,
        _ => DailyStatus::Active,
    }
}

fn row_to_signal(row: &rusqlite::Row) -> rusqlite::Result<Signal> {
    Ok(Signal {
        id: row.get(0)?,
        created_at: parse_ts(row.get(1)?),
        direction: parse_direction(&row.get::<_, String>(2)?),
        strategy: parse_strategy(&row.get::<_, String>(3)?),
        entry: row.get(4)?,
        stop: row.get(5)?,
        target: row.get(6)?,
        margin: row.get(7)?,
        leverage: row.get(8)?,
        confidence: row.get(9)?,
        setup_quality: row.get(10)?,
        regime: parse_regime(&row.get::<_, String>(11)?),
        reasoning: row.get(12)?,
        gate_scores: crate::models::GateScores {
            g1_context: row.get(13)?,
            g2_regime: row.get(14)?,
            g3_quality: row.get(15)?,
            g4_ai: row.get(16)?,
        },
        gate_5_passed: row.get(17)?,
        status: parse_status(&row.get::<_, String>(18)?),
        result_price: row.get(19)?,
        result_ts: row.get::<_, Option<String>>(20)?.map(parse_ts),
        result_pnl: row.get(21)?,
        result_reason: row.get(22)?,
        mfe: row.get(23)?,
        mae: row.get(24)?,
        duration_min: row.get(25)?,
        trade_iq: row.get(26)?,
        analyzed: row.get(27)?,
    })
}

fn row_to_daily_state(row: &rusqlite::Row) -> rusqlite::Result<DailyState> {
    Ok(DailyState {
        date: row.get::<_, String>(0)?.parse().unwrap_or_default(),
        pnl: row.get(1)?,
        trade_count: row.get(2)?,
        wins: row.get(3)?,
        losses: row.get(4)?,
        consecutive_losses: row.get(5)?,
        has_position: row.get(6)?,
        status: parse_daily_status(&row.get::<_, String>(7)?),
        target_hit_at: row.get::<_, Option<String>>(8)?.map(parse_ts),
        stop_hit_at: row.get::<_, Option<String>>(9)?.map(parse_ts),
        last_trade_at: row.get::<_, Option<String>>(10)?.map(parse_ts),
    })
}

fn row_to_heartbeat(row: &rusqlite::Row) -> rusqlite::Result<Heartbeat> {
    Ok(Heartbeat {
        bot_name: row.get(0)?,
        ts: parse_ts(row.get(1)?),
        status: row.get(2)?,
        signals_today: row.get(3)?,
        regime: row.get::<_, Option<String>>(4)?.map(|s| parse_regime(&s)),
        pnl: row.get(5)?,
        error: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, GateScores, Regime, SignalEconomics, StrategyType};

    fn test_signal() -> Signal {
        Signal::new(
            "SIG_20260101_ABCDEF".to_string(),
            Direction::Long,
            StrategyType::TrendMomentum,
            100.0,
            0.8,
            85,
            Regime::TrendingUp,
            "test".to_string(),
            GateScores::default(),
            true,
            SignalEconomics::default(),
        )
    }

    #[test]
    fn insert_then_list_pending_round_trips() {
        let store = Store::open(":memory:").unwrap();
        let signal = test_signal();
        store.insert_pending_signal(&signal).unwrap();
        let pending = store.list_pending_signals().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, signal.id);
        assert_eq!(pending[0].direction, Direction::Long);
    }

    #[test]
    fn duplicate_insert_is_idempotent() {
        let store = Store::open(":memory:").unwrap();
        let signal = test_signal();
        store.insert_pending_signal(&signal).unwrap();
        store.insert_pending_signal(&signal).unwrap();
        assert_eq!(store.list_pending_signals().unwrap().len(), 1);
    }

    #[test]
    fn daily_state_upsert_replaces_existing_row() {
        let store = Store::open(":memory:").unwrap();
        let date = Utc::now().date_naive();
        let mut state = DailyState::fresh(date);
        store.upsert_daily_state(&state).unwrap();
        state.pnl = 5.0;
        store.upsert_daily_state(&state).unwrap();
        let fetched = store.daily_state(date).unwrap().unwrap();
        assert_eq!(fetched.pnl, 5.0);
    }
}
