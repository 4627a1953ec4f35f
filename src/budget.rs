//! Daily Budget.
//!
//! Grounded on `original_source/bot-core-brain/src/gates/gate_system.py`'s
//! `DailyState` dataclass and the Gate 5 transition logic it feeds: a
//! resolved trade updates pnl/wins/losses/consecutive_losses, then the
//! day transitions to a terminal status it never leaves until UTC
//! midnight replaces the row.
//!
//! `trade_count` is bumped once, by the engine loop at signal emission
//! (the slot this function resolves was already counted) — this
//! function never increments it, to avoid double-counting a trade that
//! was already booked against the day's G5 budget when it was opened.

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::models::{DailyState, DailyStatus, SignalStatus};

/// Apply a resolved signal's outcome to `state` in place, then run the
/// terminal-status transition. Idempotent only in the sense that a
/// second call with the same outcome would double-count — callers must
/// ensure each resolved signal updates the budget exactly once.
pub fn apply_result(state: &mut DailyState, status: SignalStatus, pnl: f64, now: DateTime<Utc>, config: &Config) {
    state.pnl += pnl;
    match status {
        SignalStatus::Win => {
            state.wins += 1;
            state.consecutive_losses = 0;
        }
        SignalStatus::Loss => {
            state.losses += 1;
            state.consecutive_losses += 1;
        }
        SignalStatus::Timeout => {
            if pnl > 0.0 {
                state.wins += 1;
                state.consecutive_losses = 0;
            } else {
                state.losses += 1;
                state.consecutive_losses += 1;
            }
        }
        SignalStatus::Pending | SignalStatus::Cancelled => {}
    }
    state.has_position = false;
    state.last_trade_at = Some(now);

    transition(state, now, config);
}

fn transition(state: &mut DailyState, now: DateTime<Utc>, config: &Config) {
    if state.status != DailyStatus::Active {
        return;
    }
    if state.pnl >= config.daily_target {
        state.status = DailyStatus::TargetHit;
        state.target_hit_at = Some(now);
    } else if state.pnl <= config.daily_stop {
        state.status = DailyStatus::StopHit;
        state.stop_hit_at = Some(now);
    } else if state.trade_count >= config.max_trades {
        state.status = DailyStatus::MaxTrades;
    }
}

/// Minutes elapsed since the last trade, for Gate 5's cooldown check.
pub fn minutes_since_last_trade(state: &DailyState, now: DateTime<Utc>) -> Option<f64> {
    state.last_trade_at.map(|ts| (now - ts).num_seconds() as f64 / 60.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

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
    fn reaching_target_is_terminal_and_sticky() {
        let config = test_config();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let mut state = DailyState::fresh(now.date_naive());
        apply_result(&mut state, SignalStatus::Win, 15.0, now, &config);
        assert_eq!(state.status, DailyStatus::TargetHit);

        apply_result(&mut state, SignalStatus::Loss, -7.5, now, &config);
        assert_eq!(state.status, DailyStatus::TargetHit);
        assert_eq!(state.pnl, 7.5);
    }

    #[test]
    fn consecutive_losses_reset_on_win() {
        let config = test_config();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let mut state = DailyState::fresh(now.date_naive());
        apply_result(&mut state, SignalStatus::Loss, -7.5, now, &config);
        apply_result(&mut state, SignalStatus::Win, 15.0, now, &config);
        assert_eq!(state.consecutive_losses, 0);
    }

    #[test]
    fn max_trades_transition_fires_at_threshold() {
        let config = test_config();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let mut state = DailyState::fresh(now.date_naive());
        // trade_count is bumped by the engine at emission, not here.
        state.trade_count = 3;
        apply_result(&mut state, SignalStatus::Loss, -2.0, now, &config);
        apply_result(&mut state, SignalStatus::Loss, -2.0, now, &config);
        apply_result(&mut state, SignalStatus::Win, 3.0, now, &config);
        assert_eq!(state.status, DailyStatus::MaxTrades);
        assert_eq!(state.trade_count, 3);
    }
}
