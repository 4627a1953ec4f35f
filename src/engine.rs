//! Signal Engine Loop.
//!
//! Orchestrates market data, feature derivation, regime classification,
//! strategy proposal and gating on a fixed tick, persisting accepted
//! signals and the per-tick heartbeat. Grounded on
//! `cooprefr-bettersys/rust-backend`'s `BinancePriceFeed` tick loop shape
//! (single-threaded cooperative scheduler, only I/O suspends) and
//! `original_source/bot-core-brain/src/main.py`'s ten-step sequence.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::features::{self, FeatureHistory, FeatureVector};
use crate::gates::{self, DailyBudgetView};
use crate::market_data::MarketDataAssembler;
use crate::models::{DailyState, Heartbeat, Signal, SignalEconomics};
use crate::notifier::Notifier;
use crate::notify_events::RegimeChangeTracker;
use crate::regime;
use crate::store::Store;
use crate::strategy;

const BOT_NAME: &str = "signal_engine";

pub struct SignalEngine {
    config: Config,
    store: Store,
    http: reqwest::Client,
    notifier: Box<dyn Notifier>,
    history: FeatureHistory,
    regime_tracker: RegimeChangeTracker,
}

impl SignalEngine {
    pub fn new(config: Config, store: Store, notifier: Box<dyn Notifier>) -> Self {
        Self { config, store, http: reqwest::Client::new(), notifier, history: FeatureHistory::new(), regime_tracker: RegimeChangeTracker::new() }
    }

    /// Long-running fixed-tick loop. Never returns except on process
    /// shutdown (external signal, out of scope here).
    pub async fn run(&mut self, assembler: &MarketDataAssembler) {
        loop {
            if let Err(e) = self.tick(assembler).await {
                warn!(error = %e, "signal engine tick failed, abandoning tick");
            }
            tokio::time::sleep(Duration::from_secs(self.config.tick_signal_secs)).await;
        }
    }

    async fn tick(&mut self, assembler: &MarketDataAssembler) -> Result<()> {
        let now = Utc::now();
        let today = now.date_naive();

        // Step 1-2: load (and idempotently reset) today's DailyState.
        let mut daily = match self.store.daily_state(today).context("load daily state")? {
            Some(state) if state.date == today => state,
            _ => {
                let fresh = DailyState::fresh(today);
                self.store.upsert_daily_state(&fresh).context("reset daily state")?;
                fresh
            }
        };

        if daily.status != crate::models::DailyStatus::Active {
            self.heartbeat(today, "daily_limit", daily.pnl, None)?;
            return Ok(());
        }

        // Step 3: snapshot from the Market-Data Assembler.
        let snapshot = assembler.snapshot();
        if snapshot.last_price == 0.0 {
            self.heartbeat(today, "waiting", daily.pnl, None)?;
            return Ok(());
        }

        // Step 4: derive features, classify regime.
        let now_ms = now.timestamp_millis();
        let features = features::derive(&self.http, &self.config, &snapshot, &mut self.history, now_ms).await;
        let regime_result = regime::classify(&features);

        if let Some(msg) = self.regime_tracker.observe(regime_result.regime) {
            self.notifier.send(&msg).await;
        }

        if regime_result.regime == crate::models::Regime::Choppy {
            self.heartbeat(today, "waiting", daily.pnl, Some(regime_result.regime))?;
            return Ok(());
        }

        // Step 5: propose a strategy + direction.
        let Some(proposal) = strategy::propose(&features, &regime_result, regime_result.regime.as_str()) else {
            self.heartbeat(today, "no_setup", daily.pnl, Some(regime_result.regime))?;
            return Ok(());
        };

        // Step 6: optional classifier — none wired up; Gate 4 treats
        // this as SKIP with its fixed fallback score.
        let ai_result = None;

        // Step 7: run the gates, then the final guard.
        let view = DailyBudgetView {
            pnl: daily.pnl,
            trade_count: daily.trade_count,
            active: daily.status == crate::models::DailyStatus::Active,
            has_position: daily.has_position,
            consecutive_losses: daily.consecutive_losses,
            minutes_since_last_trade: crate::budget::minutes_since_last_trade(&daily, now),
        };
        let outcome = gates::evaluate(&features, &regime_result, &proposal, &view, ai_result.as_ref(), &self.config, now);

        if !outcome.passed {
            info!(blocking = outcome.blocking.map(|b| b.as_str()).unwrap_or("-"), reason = %outcome.reason, "signal rejected");
            self.heartbeat(today, "running", daily.pnl, Some(regime_result.regime))?;
            return Ok(());
        }

        if !final_guard(&proposal, ai_result.as_ref(), &self.config) {
            info!("signal dropped at final guard");
            self.heartbeat(today, "running", daily.pnl, Some(regime_result.regime))?;
            return Ok(());
        }

        // Step 8: persist the signal, the feature snapshot, and the
        // emission-time budget bump.
        let id = format!("SIG_{}_{}", now.format("%Y%m%d"), &Uuid::new_v4().simple().to_string()[..8]);
        let economics = SignalEconomics {
            margin: self.config.margin,
            leverage: self.config.leverage,
            tp_pct: self.config.tp_pct,
            sl_pct: self.config.sl_pct,
        };
        let signal = Signal::new(
            id.clone(),
            proposal.direction,
            proposal.strategy,
            snapshot.last_price,
            outcome.overall_score,
            proposal.setup_quality,
            regime_result.regime,
            proposal.reasoning.clone(),
            outcome.scores,
            outcome.passed,
            economics,
        );
        self.store.insert_pending_signal(&signal).context("persist signal")?;
        if let Err(e) = persist_feature_snapshot(&self.config, &id, &features) {
            warn!(error = %e, signal_id = %id, "feature snapshot dump failed (non-fatal)");
        }

        daily.trade_count += 1;
        daily.has_position = true;
        self.store.upsert_daily_state(&daily).context("bump daily state at emission")?;

        // Step 9: notify.
        self.notifier
            .send(&format!(
                "New signal {}: {} {} @ {:.2} (target {:.2}, stop {:.2}, confidence {:.0}%)",
                id,
                signal.direction.as_str(),
                signal.strategy.as_str(),
                signal.entry,
                signal.target,
                signal.stop,
                signal.confidence * 100.0
            ))
            .await;

        // Step 10: running heartbeat.
        self.heartbeat(today, "running", daily.pnl, Some(regime_result.regime))?;
        Ok(())
    }

    fn heartbeat(&self, _today: chrono::NaiveDate, status: &str, pnl: f64, regime: Option<crate::models::Regime>) -> Result<()> {
        let hb = Heartbeat { bot_name: BOT_NAME.to_string(), ts: Utc::now(), status: status.to_string(), signals_today: 0, regime, pnl, error: None };
        self.store.append_heartbeat(&hb).context("append heartbeat")
    }
}

/// Step 7's final guard: a present classifier must agree with the
/// proposal and clear the confidence floor; absence of a classifier is
/// not itself a guard failure (Gate 4 already scored that as SKIP).
fn final_guard(proposal: &strategy::Proposal, ai: Option<&gates::AiResult>, config: &Config) -> bool {
    match ai {
        None => true,
        Some(ai) => !ai.no_trade && ai.direction == proposal.direction && ai.confidence >= config.ai_confidence_min,
    }
}

/// Retraining-pipeline hook: dump the ordered 100-slot feature vector as
/// JSON alongside the signal it produced. Not consumed by anything in
/// this crate — the hook exists so an external trainer has material to
/// read.
fn persist_feature_snapshot(config: &Config, signal_id: &str, features: &FeatureVector) -> Result<()> {
    let dir = feature_snapshot_dir(config);
    std::fs::create_dir_all(&dir).context("create feature snapshot dir")?;
    let path = dir.join(format!("{signal_id}.json"));
    let json = serde_json::to_vec(&features.to_array()).context("serialize feature snapshot")?;
    std::fs::write(path, json).context("write feature snapshot")
}

fn feature_snapshot_dir(config: &Config) -> PathBuf {
    let db_path = PathBuf::from(&config.database_path);
    db_path.parent().unwrap_or_else(|| std::path::Path::new(".")).join("feature_snapshots")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, Regime};

    fn test_config() -> Config {
        Config {
            symbol: "BTCUSDT".to_string(),
            database_path: ":memory:".to_string(),
            margin: 150.0,
            leverage: 20,
            notional: 3000.0,
            tp_pct: 0.005,
            sl_pct: 0.0025,
            daily_target: 10.0,
            daily_stop: -15.0,
            max_trades: 3,
            max_consecutive_losses: 2,
            max_hold_min: 240,
            cooldown_min: 60,
            data_source: crate::config::DataSource::Degraded,
            ai_confidence_min: 0.65,
            context_min: 0.5,
            regime_conf_min: 0.65,
            exhaustion_max: 0.5,
            structure_min: 0.6,
            setup_min: 70,
            mtf_min: 2,
            risk_factors_max: 1,
            tick_signal_secs: 60,
            tick_verifier_secs: 30,
            heartbeat_warn_secs: 180,
            heartbeat_crit_secs: 600,
            notifier_webhook_url: None,
            glassnode_api_key: None,
            coinglass_api_key: None,
        }
    }

    #[test]
    fn final_guard_passes_with_no_classifier() {
        let config = test_config();
        let proposal = strategy::Proposal {
            strategy: crate::models::StrategyType::TrendMomentum,
            direction: Direction::Long,
            setup_quality: 80,
            reasoning: "test".to_string(),
        };
        assert!(final_guard(&proposal, None, &config));
    }

    #[test]
    fn final_guard_rejects_disagreeing_classifier() {
        let config = test_config();
        let proposal = strategy::Proposal {
            strategy: crate::models::StrategyType::TrendMomentum,
            direction: Direction::Long,
            setup_quality: 80,
            reasoning: "test".to_string(),
        };
        let ai = gates::AiResult { direction: Direction::Short, confidence: 0.9, risk_factors: 0, no_trade: false };
        assert!(!final_guard(&proposal, Some(&ai), &config));
    }

    #[test]
    fn regime_as_str_round_trips_through_tracker() {
        let mut tracker = RegimeChangeTracker::new();
        assert!(tracker.observe(Regime::TrendingUp).is_none());
        assert!(tracker.observe(Regime::TrendingDown).is_some());
    }
}
