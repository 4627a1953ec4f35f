//! Core data model shared by the Signal Engine and the Verifier.
//!
//! Types here are intentionally plain data — invariants are enforced by
//! the modules that construct them (gates, strategy, tracker), not by
//! the types themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SYMBOL: &str = "BTCUSDT";

/// One of the four tracked candle timeframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M3,
    M5,
    M15,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [Timeframe::M1, Timeframe::M3, Timeframe::M5, Timeframe::M15];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
        }
    }

    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M3 => 3,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
        }
    }
}

/// OHLCV bar for a fixed timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub ts: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub quote_volume: f64,
    pub trades: u64,
    pub closed: bool,
}

impl Candle {
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn body_ratio(&self) -> f64 {
        let range = self.range();
        if range <= 0.0 {
            0.0
        } else {
            self.body() / range
        }
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }
}

/// A single executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub ts: i64,
    pub price: f64,
    pub qty: f64,
    pub buyer_is_maker: bool,
}

impl Trade {
    pub fn is_buy(&self) -> bool {
        !self.buyer_is_maker
    }

    pub fn notional(&self) -> f64 {
        self.price * self.qty
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub qty: f64,
}

/// Top-of-book snapshot, best-first on both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub ts: i64,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl Book {
    pub fn mid(&self) -> Option<f64> {
        let bid = self.bids.first()?.price;
        let ask = self.asks.first()?.price;
        Some((bid + ask) / 2.0)
    }

    pub fn spread_bps(&self) -> Option<f64> {
        let bid = self.bids.first()?.price;
        let ask = self.asks.first()?.price;
        let mid = self.mid()?;
        if mid <= 0.0 {
            return None;
        }
        Some((ask - bid) / mid * 10_000.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Funding {
    pub ts: i64,
    pub rate: f64,
    pub mark_price: f64,
    pub next_funding_ts: i64,
}

impl Funding {
    /// Minutes until the next funding settlement, relative to `now_ms`.
    pub fn minutes_to_funding(&self, now_ms: i64) -> f64 {
        ((self.next_funding_ts - now_ms).max(0) as f64) / 60_000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyType {
    TrendMomentum,
    LiquidationHunt,
    FundingFade,
    RangeScalping,
}

impl StrategyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::TrendMomentum => "TREND_MOMENTUM",
            StrategyType::LiquidationHunt => "LIQUIDATION_HUNT",
            StrategyType::FundingFade => "FUNDING_FADE",
            StrategyType::RangeScalping => "RANGE_SCALPING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    TrendingUp,
    TrendingDown,
    Ranging,
    HighVolatility,
    Choppy,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::TrendingUp => "TRENDING_UP",
            Regime::TrendingDown => "TRENDING_DOWN",
            Regime::Ranging => "RANGING",
            Regime::HighVolatility => "HIGH_VOLATILITY",
            Regime::Choppy => "CHOPPY",
        }
    }

    pub fn is_tradeable(&self) -> bool {
        !matches!(self, Regime::Choppy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStatus {
    Pending,
    Win,
    Loss,
    Timeout,
    Cancelled,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Pending => "PENDING",
            SignalStatus::Win => "WIN",
            SignalStatus::Loss => "LOSS",
            SignalStatus::Timeout => "TIMEOUT",
            SignalStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Scores produced by the four short-circuiting gates (G5 is recorded
/// separately via `gate_5_passed` since it only ever has a pass/fail
/// boolean that gates persistence itself).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GateScores {
    pub g1_context: f64,
    pub g2_regime: f64,
    pub g3_quality: f64,
    pub g4_ai: f64,
}

/// An advisory signal. Immutable once written except for the result
/// columns, which only the Verifier writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub direction: Direction,
    pub strategy: StrategyType,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub margin: f64,
    pub leverage: u32,
    pub confidence: f64,
    pub setup_quality: u32,
    pub regime: Regime,
    pub reasoning: String,
    pub gate_scores: GateScores,
    pub gate_5_passed: bool,
    pub status: SignalStatus,
    pub result_price: Option<f64>,
    pub result_ts: Option<DateTime<Utc>>,
    pub result_pnl: Option<f64>,
    pub result_reason: Option<String>,
    pub mfe: Option<f64>,
    pub mae: Option<f64>,
    pub duration_min: Option<f64>,
    pub trade_iq: Option<f64>,
    pub analyzed: bool,
}

/// Entry/target/stop/margin/leverage inputs, sourced from `Config` at
/// call sites. Kept as one bundle so `Signal::new` doesn't grow an
/// unwieldy parameter list as these five move together.
#[derive(Debug, Clone, Copy)]
pub struct SignalEconomics {
    pub margin: f64,
    pub leverage: u32,
    pub tp_pct: f64,
    pub sl_pct: f64,
}

impl Default for SignalEconomics {
    fn default() -> Self {
        Self { margin: 150.0, leverage: 20, tp_pct: 0.005, sl_pct: 0.0025 }
    }
}

impl Signal {
    /// Construct a PENDING signal, computing target/stop from entry and
    /// direction per the configured R:R.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        direction: Direction,
        strategy: StrategyType,
        entry: f64,
        confidence: f64,
        setup_quality: u32,
        regime: Regime,
        reasoning: String,
        gate_scores: GateScores,
        gate_5_passed: bool,
        economics: SignalEconomics,
    ) -> Self {
        let (target, stop) = match direction {
            Direction::Long => (entry * (1.0 + economics.tp_pct), entry * (1.0 - economics.sl_pct)),
            Direction::Short => (entry * (1.0 - economics.tp_pct), entry * (1.0 + economics.sl_pct)),
        };
        Self {
            id,
            created_at: Utc::now(),
            direction,
            strategy,
            entry,
            stop,
            target,
            margin: economics.margin,
            leverage: economics.leverage,
            confidence,
            setup_quality,
            regime,
            reasoning,
            gate_scores,
            gate_5_passed,
            status: SignalStatus::Pending,
            result_price: None,
            result_ts: None,
            result_pnl: None,
            result_reason: None,
            mfe: None,
            mae: None,
            duration_min: None,
            trade_iq: None,
            analyzed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DailyStatus {
    Active,
    TargetHit,
    StopHit,
    MaxTrades,
}

impl DailyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DailyStatus::Active => "ACTIVE",
            DailyStatus::TargetHit => "TARGET_HIT",
            DailyStatus::StopHit => "STOP_HIT",
            DailyStatus::MaxTrades => "MAX_TRADES",
        }
    }
}

/// One row per UTC date. Reset, never deleted, at midnight rollover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyState {
    pub date: chrono::NaiveDate,
    pub pnl: f64,
    pub trade_count: u32,
    pub wins: u32,
    pub losses: u32,
    pub consecutive_losses: u32,
    pub has_position: bool,
    pub status: DailyStatus,
    pub target_hit_at: Option<DateTime<Utc>>,
    pub stop_hit_at: Option<DateTime<Utc>>,
    pub last_trade_at: Option<DateTime<Utc>>,
}

impl DailyState {
    pub fn fresh(date: chrono::NaiveDate) -> Self {
        Self {
            date,
            pnl: 0.0,
            trade_count: 0,
            wins: 0,
            losses: 0,
            consecutive_losses: 0,
            has_position: false,
            status: DailyStatus::Active,
            target_hit_at: None,
            stop_hit_at: None,
            last_trade_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSample {
    pub signal_id: String,
    pub ts: DateTime<Utc>,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub bot_name: String,
    pub ts: DateTime<Utc>,
    pub status: String,
    pub signals_today: u32,
    pub regime: Option<Regime>,
    pub pnl: f64,
    pub error: Option<String>,
}
