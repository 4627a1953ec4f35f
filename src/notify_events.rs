//! Supplemented notification events: regime changes, heartbeat staleness,
//! IQ-trend degradation, and the daily summary.
//!
//! Grounded on `original_source/bot-heartbeat/src/health/monitor.py`'s
//! `HealthMonitor` (alert only on CRITICAL or on a HEALTHY->WARNING
//! transition, never every tick) and `src/daily/manager.py` /
//! `src/reports/generator.py` for the end-of-day summary shape.

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::Config;
use crate::models::{DailyState, Regime};
use crate::quality::IqTrend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

/// Tracks the previous regime so the caller only gets a message on an
/// actual change, not every tick.
#[derive(Debug, Default)]
pub struct RegimeChangeTracker {
    last: Option<Regime>,
}

impl RegimeChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, current: Regime) -> Option<String> {
        let changed = self.last.is_some_and(|prev| prev != current);
        let message = changed.then(|| format!("Regime changed: {} -> {}", self.last.unwrap().as_str(), current.as_str()));
        self.last = Some(current);
        message
    }
}

/// Mirrors `HealthMonitor`: alert on every CRITICAL tick, but only alert
/// on WARNING when the previous tick was HEALTHY, so a sustained warning
/// doesn't re-fire every poll.
#[derive(Debug, Default)]
pub struct HeartbeatMonitor {
    last_status: Option<HealthStatus>,
}

impl HeartbeatMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, last_seen: DateTime<Utc>, now: DateTime<Utc>, config: &Config) -> Option<String> {
        let age_secs = (now - last_seen).num_seconds();
        let status = if age_secs >= config.heartbeat_crit_secs {
            HealthStatus::Critical
        } else if age_secs >= config.heartbeat_warn_secs {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };

        let alert = match status {
            HealthStatus::Critical => true,
            HealthStatus::Warning => self.last_status == Some(HealthStatus::Healthy),
            HealthStatus::Healthy => false,
        };

        self.last_status = Some(status);

        alert.then(|| {
            let minutes = age_secs as f64 / 60.0;
            format!("Signal engine heartbeat {status:?}: last seen {minutes:.1}m ago")
        })
    }
}

/// Fires once per IQ-trend threshold crossing rather than on every
/// below-threshold sample.
#[derive(Debug, Default)]
pub struct IqTrendMonitor {
    was_warning: bool,
    was_critical: bool,
}

impl IqTrendMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, trend: &IqTrend) -> Option<String> {
        let message = if trend.critical && !self.was_critical {
            Some(format!("Trade IQ critical: 10-sample avg {:.1}", trend.avg_10))
        } else if trend.warning && !self.was_warning {
            Some(format!("Trade IQ degrading: 10-sample avg {:.1}", trend.avg_10))
        } else {
            None
        };
        self.was_warning = trend.warning;
        self.was_critical = trend.critical;
        message
    }
}

/// Emitted once at the first tick observed after UTC midnight rollover.
#[derive(Debug, Default)]
pub struct DailySummaryScheduler {
    last_emitted: Option<NaiveDate>,
}

impl DailySummaryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the prior day's closing state the first time `today`'s
    /// date differs from the last emission, so the summary describes the
    /// day that just ended.
    pub fn maybe_emit(&mut self, today: NaiveDate, prior_day: &DailyState) -> Option<String> {
        let should_emit = self.last_emitted != Some(today);
        self.last_emitted = Some(today);
        should_emit.then(|| summary_text(prior_day))
    }
}

fn summary_text(state: &DailyState) -> String {
    let win_rate = if state.wins + state.losses > 0 { state.wins as f64 / (state.wins + state.losses) as f64 * 100.0 } else { 0.0 };
    format!(
        "Daily summary {}: {} trades, {} wins / {} losses ({:.0}% win rate), PnL ${:.2}, status {}",
        state.date,
        state.trade_count,
        state.wins,
        state.losses,
        win_rate,
        state.pnl,
        state.status.as_str()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn regime_tracker_silent_on_first_observation() {
        let mut tracker = RegimeChangeTracker::new();
        assert!(tracker.observe(Regime::TrendingUp).is_none());
        assert!(tracker.observe(Regime::Ranging).is_some());
        assert!(tracker.observe(Regime::Ranging).is_none());
    }

    #[test]
    fn heartbeat_monitor_only_alerts_once_per_warning_onset() {
        let config_warn = 180;
        let config_crit = 600;
        let mut config = test_config();
        config.heartbeat_warn_secs = config_warn;
        config.heartbeat_crit_secs = config_crit;

        let mut monitor = HeartbeatMonitor::new();
        let last_seen = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let first_warn = last_seen + chrono::Duration::seconds(200);
        let still_warn = last_seen + chrono::Duration::seconds(250);

        assert!(monitor.check(last_seen, first_warn, &config).is_some());
        assert!(monitor.check(last_seen, still_warn, &config).is_none());
    }

    #[test]
    fn iq_trend_monitor_fires_once_per_crossing() {
        let mut monitor = IqTrendMonitor::new();
        let critical = IqTrend { avg_10: 45.0, avg_20: 45.0, warning: true, critical: true };
        assert!(monitor.observe(&critical).is_some());
        assert!(monitor.observe(&critical).is_none());
    }

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
}
