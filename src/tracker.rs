//! Signal Tracker / Verifier loop.
//!
//! Runs independently of the Signal Engine at a fixed tick, resolving
//! PENDING signals against the last fetched price. Grounded on
//! `original_source/bot-heartbeat/src/tracking` for the extremes-keyed-
//! by-signal-id bookkeeping and on `cooprefr-bettersys/rust-backend`'s
//! tick-loop shape.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::budget;
use crate::config::Config;
use crate::market_data::rest::RestClient;
use crate::models::{Direction, Signal, SignalStatus};
use crate::notifier::Notifier;
use crate::notify_events::{DailySummaryScheduler, HeartbeatMonitor, IqTrendMonitor};
use crate::quality::{self, IqHistory};
use crate::store::Store;

const BOT_NAME: &str = "verifier";
const SIGNAL_ENGINE_BOT_NAME: &str = "signal_engine";
const NOTIONAL: f64 = 3000.0;

struct Extremes {
    high: f64,
    low: f64,
}

pub struct SignalTracker {
    config: Config,
    store: Store,
    client: RestClient,
    notifier: Box<dyn Notifier>,
    extremes: HashMap<String, Extremes>,
    iq_history: IqHistory,
    heartbeat_monitor: HeartbeatMonitor,
    iq_trend_monitor: IqTrendMonitor,
    summary_scheduler: DailySummaryScheduler,
}

impl SignalTracker {
    pub fn new(config: Config, store: Store, notifier: Box<dyn Notifier>) -> Self {
        let client = RestClient::new(config.symbol.clone());
        Self {
            config,
            store,
            client,
            notifier,
            extremes: HashMap::new(),
            iq_history: IqHistory::new(),
            heartbeat_monitor: HeartbeatMonitor::new(),
            iq_trend_monitor: IqTrendMonitor::new(),
            summary_scheduler: DailySummaryScheduler::new(),
        }
    }

    pub async fn run(&mut self) {
        loop {
            if let Err(e) = self.tick().await {
                warn!(error = %e, "verifier tick failed, abandoning tick");
            }
            tokio::time::sleep(Duration::from_secs(self.config.tick_verifier_secs)).await;
        }
    }

    async fn tick(&mut self) -> Result<()> {
        let now = Utc::now();

        // Step 1: fetch current price; skip the tick entirely if unavailable.
        let price = match self.client.fetch_price().await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "price fetch failed, skipping verifier tick");
                return Ok(());
            }
        };

        // Steps 2-5: resolve each pending signal against `price`.
        let pending = self.store.list_pending_signals().context("list pending signals")?;
        for signal in pending {
            self.store.append_price_sample(&signal.id, now, price).context("append price sample")?;

            let entry = self.extremes.entry(signal.id.clone()).or_insert(Extremes { high: price, low: price });
            entry.high = entry.high.max(price);
            entry.low = entry.low.min(price);

            if let Some((status, result_pnl, reason)) = decide_outcome(&signal, price, now, &self.config) {
                self.resolve(signal, status, price, result_pnl, reason, now)?;
            }
        }

        self.notify_supplemented_events(now).await?;
        self.heartbeat(now)?;
        Ok(())
    }

    fn resolve(&mut self, signal: Signal, status: SignalStatus, price: f64, pnl: f64, reason: &str, now: chrono::DateTime<Utc>) -> Result<()> {
        let extremes = self.extremes.remove(&signal.id).unwrap_or(Extremes { high: price, low: price });
        let (mfe, mae) = quality::excursions(signal.direction, signal.entry, extremes.high, extremes.low);
        let duration_min = (now - signal.created_at).num_seconds() as f64 / 60.0;

        self.store
            .update_signal_result(&signal.id, status, price, now, pnl, reason, mfe, mae, duration_min)
            .context("update signal result")?;

        let today = now.date_naive();
        let mut daily = self.store.daily_state(today).context("load daily state for resolution")?.unwrap_or_else(|| crate::models::DailyState::fresh(today));
        budget::apply_result(&mut daily, status, pnl, now, &self.config);
        self.store.upsert_daily_state(&daily).context("upsert daily state on resolution")?;

        let breakdown = quality::score(&signal, mfe, mae, self.config.margin);
        self.iq_history.push(breakdown.total);
        self.store.update_signal_trade_iq(&signal.id, breakdown.total).context("update trade iq")?;

        info!(signal_id = %signal.id, status = status.as_str(), pnl, trade_iq = breakdown.total, "signal resolved");
        Ok(())
    }

    async fn notify_supplemented_events(&mut self, now: chrono::DateTime<Utc>) -> Result<()> {
        if let Some(hb) = self.store.latest_heartbeat(SIGNAL_ENGINE_BOT_NAME).context("latest engine heartbeat")? {
            if let Some(msg) = self.heartbeat_monitor.check(hb.ts, now, &self.config) {
                self.notifier.send(&msg).await;
            }
        }

        let trend = self.iq_history.trend();
        if let Some(msg) = self.iq_trend_monitor.observe(&trend) {
            self.notifier.send(&msg).await;
        }

        let today = now.date_naive();
        if let Some(yesterday) = today.pred_opt() {
            if let Some(prior) = self.store.daily_state(yesterday).context("load prior daily state")? {
                if let Some(msg) = self.summary_scheduler.maybe_emit(today, &prior) {
                    self.notifier.send(&msg).await;
                }
            }
        }

        Ok(())
    }

    fn heartbeat(&self, now: chrono::DateTime<Utc>) -> Result<()> {
        let today = now.date_naive();
        let pnl = self.store.daily_state(today).ok().flatten().map(|s| s.pnl).unwrap_or(0.0);
        let hb = crate::models::Heartbeat { bot_name: BOT_NAME.to_string(), ts: now, status: "running".to_string(), signals_today: 0, regime: None, pnl, error: None };
        self.store.append_heartbeat(&hb).context("append verifier heartbeat")
    }
}

/// Step 3's outcome decision. TP/SL are evaluated off the single fetched
/// price; if both hold simultaneously, TP wins (ties favor the trader).
fn decide_outcome(signal: &Signal, price: f64, now: chrono::DateTime<Utc>, config: &Config) -> Option<(SignalStatus, f64, &'static str)> {
    let tp_hit = match signal.direction {
        Direction::Long => price >= signal.target,
        Direction::Short => price <= signal.target,
    };
    let sl_hit = match signal.direction {
        Direction::Long => price <= signal.stop,
        Direction::Short => price >= signal.stop,
    };

    if tp_hit {
        return Some((SignalStatus::Win, 15.0, "TP_HIT"));
    }
    if sl_hit {
        return Some((SignalStatus::Loss, -7.5, "SL_HIT"));
    }

    let duration_min = (now - signal.created_at).num_seconds() as f64 / 60.0;
    if duration_min >= config.max_hold_min as f64 {
        let pnl_pct = match signal.direction {
            Direction::Long => (price - signal.entry) / signal.entry,
            Direction::Short => (signal.entry - price) / signal.entry,
        };
        return Some((SignalStatus::Timeout, pnl_pct * NOTIONAL, "TIMEOUT"));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GateScores, Regime, SignalEconomics, StrategyType};

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

    fn long_signal(entry: f64) -> Signal {
        Signal::new(
            "SIG_TEST".to_string(),
            Direction::Long,
            StrategyType::TrendMomentum,
            entry,
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
    fn tp_wins_when_both_tp_and_sl_thresholds_are_crossed() {
        let config = test_config();
        let signal = long_signal(100.0);
        let now = signal.created_at;
        // Price far above target also happens to be far below a
        // (hypothetically misconfigured) stop — TP must still win.
        let (status, pnl, reason) = decide_outcome(&signal, signal.target + 10.0, now, &config).unwrap();
        assert_eq!(status, SignalStatus::Win);
        assert_eq!(pnl, 15.0);
        assert_eq!(reason, "TP_HIT");
    }

    #[test]
    fn sl_hit_resolves_as_loss() {
        let config = test_config();
        let signal = long_signal(100.0);
        let now = signal.created_at;
        let (status, pnl, _) = decide_outcome(&signal, signal.stop - 1.0, now, &config).unwrap();
        assert_eq!(status, SignalStatus::Loss);
        assert_eq!(pnl, -7.5);
    }

    #[test]
    fn timeout_fires_after_max_hold_with_signed_pnl() {
        let config = test_config();
        let signal = long_signal(100.0);
        let later = signal.created_at + chrono::Duration::minutes(241);
        let (status, pnl, reason) = decide_outcome(&signal, 101.0, later, &config).unwrap();
        assert_eq!(status, SignalStatus::Timeout);
        assert_eq!(reason, "TIMEOUT");
        assert!(pnl > 0.0);
    }

    #[test]
    fn no_outcome_before_thresholds_or_timeout() {
        let config = test_config();
        let signal = long_signal(100.0);
        let now = signal.created_at;
        assert!(decide_outcome(&signal, 100.1, now, &config).is_none());
    }
}
