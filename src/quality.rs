//! Quality Scorer.
//!
//! Grounded on `original_source/bot-heartbeat/src/iq/calculator.py`:
//! weighted Decision/Execution/Risk composite, a rolling 100-sample
//! history, and a 10-sample trend used for the WARNING/CRITICAL alerts
//! wired up in `notify_events.rs`.

use std::collections::VecDeque;

use crate::models::{Direction, Signal, SignalStatus};

const HISTORY_CAPACITY: usize = 100;
pub const TREND_WARNING: f64 = 60.0;
pub const TREND_CRITICAL: f64 = 50.0;

#[derive(Debug, Clone, Copy)]
pub struct IqBreakdown {
    pub total: f64,
    pub decision: f64,
    pub execution: f64,
    pub risk: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct IqTrend {
    pub avg_10: f64,
    pub avg_20: f64,
    pub warning: bool,
    pub critical: bool,
}

#[derive(Debug, Clone, Default)]
pub struct IqHistory {
    scores: VecDeque<f64>,
}

impl IqHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, score: f64) {
        self.scores.push_back(score);
        while self.scores.len() > HISTORY_CAPACITY {
            self.scores.pop_front();
        }
    }

    pub fn trend(&self) -> IqTrend {
        if self.scores.is_empty() {
            return IqTrend { avg_10: 0.0, avg_20: 0.0, warning: false, critical: false };
        }
        let avg_10 = mean(last_n(&self.scores, 10));
        let avg_20 = if self.scores.len() >= 20 { mean(last_n(&self.scores, 20)) } else { avg_10 };
        IqTrend { avg_10, avg_20, warning: avg_10 < TREND_WARNING, critical: avg_10 < TREND_CRITICAL }
    }
}

fn last_n(buf: &VecDeque<f64>, n: usize) -> &[f64] {
    let (a, b) = buf.as_slices();
    if b.len() >= n {
        &b[b.len() - n..]
    } else {
        let remaining = n - b.len();
        if remaining >= a.len() {
            a
        } else {
            &a[a.len() - remaining..]
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Score a just-resolved signal. `mfe`/`mae` are non-negative percent
/// excursions, `planned_margin` is the configured margin.
pub fn score(signal: &Signal, mfe: f64, mae: f64, planned_margin: f64) -> IqBreakdown {
    let decision = decision_quality(signal, mfe, mae);
    let execution = execution_quality(signal);
    let risk = risk_adherence(signal, planned_margin);
    let total = (0.45 * decision + 0.30 * execution + 0.25 * risk).clamp(0.0, 100.0);
    IqBreakdown { total, decision, execution, risk }
}

fn decision_quality(signal: &Signal, mfe: f64, mae: f64) -> f64 {
    let is_win = signal.status == SignalStatus::Win;
    let confidence_score = if is_win { signal.confidence * 100.0 } else { (1.0 - signal.confidence) * 100.0 };
    let setup_score = if is_win { signal.setup_quality as f64 } else { 100.0 - signal.setup_quality as f64 * 0.5 };
    let timing_score = if mfe > mae {
        if mfe + mae > 0.0 { (mfe / (mfe + mae) * 100.0).min(100.0) } else { 50.0 }
    } else {
        (50.0 - mae * 10.0).max(0.0)
    };
    confidence_score * 0.4 + setup_score * 0.3 + timing_score * 0.3
}

fn execution_quality(signal: &Signal) -> f64 {
    let slippage_score = 90.0;
    let entry_score = 80.0;
    let exit_score = match signal.status {
        SignalStatus::Win => 100.0,
        SignalStatus::Timeout => 50.0,
        _ => 40.0,
    };
    slippage_score * 0.5 + entry_score * 0.3 + exit_score * 0.2
}

fn risk_adherence(signal: &Signal, planned_margin: f64) -> f64 {
    let position_score = if (signal.margin - planned_margin).abs() < 1.0 {
        100.0
    } else {
        let deviation = (signal.margin - planned_margin).abs() / planned_margin;
        (100.0 - deviation * 100.0).max(0.0)
    };
    let sl_score = match signal.status {
        SignalStatus::Loss | SignalStatus::Win => 100.0,
        _ => 80.0,
    };
    let rr_score = match signal.status {
        SignalStatus::Win => 100.0,
        SignalStatus::Loss => 80.0,
        _ => {
            if signal.result_pnl.unwrap_or(0.0) > 0.0 {
                70.0
            } else {
                50.0
            }
        }
    };
    position_score * 0.5 + sl_score * 0.3 + rr_score * 0.2
}

/// Non-negative excursion percentages from entry, direction-aware.
pub fn excursions(direction: Direction, entry: f64, high: f64, low: f64) -> (f64, f64) {
    if entry <= 0.0 {
        return (0.0, 0.0);
    }
    match direction {
        Direction::Long => (((high - entry) / entry * 100.0).max(0.0), ((entry - low) / entry * 100.0).max(0.0)),
        Direction::Short => (((entry - low) / entry * 100.0).max(0.0), ((high - entry) / entry * 100.0).max(0.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GateScores, Regime, SignalEconomics, StrategyType};

    fn pending_signal() -> Signal {
        Signal::new(
            "SIG_TEST".to_string(),
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
    fn win_scores_higher_than_loss_with_identical_confidence() {
        let mut win = pending_signal();
        win.status = SignalStatus::Win;
        win.result_pnl = Some(15.0);
        let mut loss = pending_signal();
        loss.status = SignalStatus::Loss;
        loss.result_pnl = Some(-7.5);

        let win_score = score(&win, 1.0, 0.2, 150.0);
        let loss_score = score(&loss, 0.2, 1.0, 150.0);
        assert!(win_score.total > loss_score.total);
    }

    #[test]
    fn trend_flags_critical_below_fifty() {
        let mut history = IqHistory::new();
        for _ in 0..10 {
            history.push(40.0);
        }
        let trend = history.trend();
        assert!(trend.critical);
        assert!(trend.warning);
    }

    #[test]
    fn long_excursions_use_high_for_mfe_and_low_for_mae() {
        let (mfe, mae) = excursions(Direction::Long, 100.0, 105.0, 98.0);
        assert_eq!(mfe, 5.0);
        assert_eq!(mae, 2.0);
    }
}
