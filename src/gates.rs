//! Gate Pipeline.
//!
//! Grounded on `original_source/bot-core-brain/src/gates/gate_system.py`:
//! five ordered gates, first-FAIL short-circuit, and the blocking-gate
//! mean-of-scores-so-far overall score (G5 failure forces 0.0).

use chrono::{TimeZone, Timelike, Utc};

use crate::config::Config;
use crate::features::FeatureVector;
use crate::models::{Direction, GateScores, Regime};
use crate::regime::RegimeResult;
use crate::strategy::Proposal;

/// Optional classifier output fed into Gate 4.
#[derive(Debug, Clone)]
pub struct AiResult {
    pub direction: Direction,
    pub confidence: f64,
    pub risk_factors: usize,
    pub no_trade: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocking {
    Context,
    Regime,
    Quality,
    Ai,
    DailyBudget,
}

impl Blocking {
    pub fn as_str(&self) -> &'static str {
        match self {
            Blocking::Context => "Gate 1: Context",
            Blocking::Regime => "Gate 2: Regime",
            Blocking::Quality => "Gate 3: Signal Quality",
            Blocking::Ai => "Gate 4: AI Confirmation",
            Blocking::DailyBudget => "Gate 5: Daily Budget",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub passed: bool,
    pub scores: GateScores,
    pub overall_score: f64,
    pub blocking: Option<Blocking>,
    pub reason: String,
}

/// Daily-budget state needed by Gate 5, independent of `store` so this
/// module stays free of any persistence dependency.
#[derive(Debug, Clone, Copy)]
pub struct DailyBudgetView {
    pub pnl: f64,
    pub trade_count: u32,
    pub active: bool,
    pub has_position: bool,
    pub consecutive_losses: u32,
    pub minutes_since_last_trade: Option<f64>,
}

fn gate1_context(features: &FeatureVector, config: &Config, now: chrono::DateTime<Utc>) -> (f64, bool, String) {
    let hour = now.hour();
    let (session_score, session_name) = match hour {
        13..=15 => (1.0, "Overlap (London+NY)"),
        16..=20 => (0.9, "New York"),
        8..=12 => (0.8, "London"),
        0..=7 => (0.5, "Asia"),
        _ => return (0.0, false, "Dead Zone (21:00-00:00 UTC) - NO TRADE".to_string()),
    };

    let mut score = session_score;
    let mut reason = format!("Session: {session_name} ({session_score})");
    if features.funding.time_to_funding > 0.0 && features.funding.time_to_funding <= 20.0 {
        score *= 0.5;
        reason.push_str(&format!("; near funding ({:.0}m)", features.funding.time_to_funding));
    }

    if score >= config.context_min {
        (score, true, reason)
    } else {
        (score, false, format!("Context score {score:.2} < {}", config.context_min))
    }
}

fn gate2_regime(regime: &RegimeResult, config: &Config) -> (f64, bool, String) {
    if regime.regime == Regime::Choppy {
        return (0.0, false, "CHOPPY regime - NO TRADE".to_string());
    }
    if regime.exhaustion_risk >= config.exhaustion_max {
        return (regime.confidence, false, format!("High exhaustion risk: {:.2}", regime.exhaustion_risk));
    }
    if regime.structure_quality < config.structure_min {
        return (regime.confidence, false, format!("Low structure quality: {:.2}", regime.structure_quality));
    }
    if regime.confidence < config.regime_conf_min {
        return (regime.confidence, false, format!("Low regime confidence: {:.0}%", regime.confidence * 100.0));
    }
    (regime.confidence, true, format!("{} with {:.0}% confidence", regime.regime.as_str(), regime.confidence * 100.0))
}

fn gate3_quality(features: &FeatureVector, proposal: &Proposal, config: &Config) -> (f64, bool, String) {
    let setup_score = proposal.setup_quality as f64 / 100.0;
    if proposal.setup_quality < config.setup_min {
        return (setup_score, false, format!("Setup quality {} < {}", proposal.setup_quality, config.setup_min));
    }
    if features.mtf.mtf_alignment < config.mtf_min as f64 {
        return (setup_score, false, format!("MTF confluence {} < {}", features.mtf.mtf_alignment, config.mtf_min));
    }
    let rsi = features.technical.rsi_14;
    if proposal.direction == Direction::Long && rsi > 80.0 {
        return (0.0, false, format!("RSI {rsi:.1} too high for LONG"));
    }
    if proposal.direction == Direction::Short && rsi < 20.0 {
        return (0.0, false, format!("RSI {rsi:.1} too low for SHORT"));
    }
    (setup_score, true, format!("Setup quality {}/100, MTF alignment {}", proposal.setup_quality, features.mtf.mtf_alignment))
}

fn gate4_ai(proposal: &Proposal, ai: Option<&AiResult>, config: &Config) -> (f64, bool, String) {
    let Some(ai) = ai else {
        return (0.65, true, "AI model not available, skipped".to_string());
    };
    if ai.confidence < config.ai_confidence_min {
        return (ai.confidence, false, format!("AI confidence {:.0}% < {:.0}%", ai.confidence * 100.0, config.ai_confidence_min * 100.0));
    }
    if ai.risk_factors as u32 > config.risk_factors_max {
        return (ai.confidence, false, format!("Too many risk factors: {}", ai.risk_factors));
    }
    if ai.no_trade || ai.direction != proposal.direction {
        return (ai.confidence, false, "AI direction disagrees with proposal".to_string());
    }
    (ai.confidence, true, format!("AI confidence {:.0}%", ai.confidence * 100.0))
}

fn gate5_daily_budget(daily: &DailyBudgetView, config: &Config) -> (f64, bool, String) {
    if daily.pnl >= config.daily_target {
        return (0.0, false, format!("Daily target reached: +${:.2}", daily.pnl));
    }
    if daily.pnl <= config.daily_stop {
        return (0.0, false, format!("Daily stop hit: ${:.2}", daily.pnl));
    }
    if daily.trade_count >= config.max_trades {
        return (0.0, false, format!("Max trades reached: {}/{}", daily.trade_count, config.max_trades));
    }
    if !daily.active {
        return (0.0, false, "Daily status not ACTIVE".to_string());
    }
    if daily.consecutive_losses >= config.max_consecutive_losses {
        if let Some(minutes) = daily.minutes_since_last_trade {
            let cooldown = config.cooldown_min as f64;
            if minutes < cooldown {
                return (
                    0.0,
                    false,
                    format!("Cooling down after {} losses ({:.0}m left)", daily.consecutive_losses, cooldown - minutes),
                );
            }
        }
    }
    if daily.has_position {
        return (0.0, false, "Position already open".to_string());
    }
    (1.0, true, format!("All daily checks passed (trades: {}/{}, PnL: ${:.2})", daily.trade_count, config.max_trades, daily.pnl))
}

/// Evaluate all five gates in order, short-circuiting on the first FAIL.
pub fn evaluate(
    features: &FeatureVector,
    regime: &RegimeResult,
    proposal: &Proposal,
    daily: &DailyBudgetView,
    ai: Option<&AiResult>,
    config: &Config,
    now: chrono::DateTime<Utc>,
) -> GateOutcome {
    let mut scores = GateScores::default();

    let (g1, pass1, reason1) = gate1_context(features, config, now);
    scores.g1_context = g1;
    if !pass1 {
        return GateOutcome { passed: false, scores, overall_score: g1, blocking: Some(Blocking::Context), reason: reason1 };
    }

    let (g2, pass2, reason2) = gate2_regime(regime, config);
    scores.g2_regime = g2;
    if !pass2 {
        let overall = (g1 + g2) / 2.0;
        return GateOutcome { passed: false, scores, overall_score: overall, blocking: Some(Blocking::Regime), reason: reason2 };
    }

    let (g3, pass3, reason3) = gate3_quality(features, proposal, config);
    scores.g3_quality = g3;
    if !pass3 {
        let overall = (g1 + g2 + g3) / 3.0;
        return GateOutcome { passed: false, scores, overall_score: overall, blocking: Some(Blocking::Quality), reason: reason3 };
    }

    let (g4, pass4, reason4) = gate4_ai(proposal, ai, config);
    scores.g4_ai = g4;
    if !pass4 {
        let overall = (g1 + g2 + g3 + g4) / 4.0;
        return GateOutcome { passed: false, scores, overall_score: overall, blocking: Some(Blocking::Ai), reason: reason4 };
    }

    let (_, pass5, reason5) = gate5_daily_budget(daily, config);
    if !pass5 {
        return GateOutcome { passed: false, scores, overall_score: 0.0, blocking: Some(Blocking::DailyBudget), reason: reason5 };
    }

    let overall = (g1 + g2 + g3 + g4) / 4.0;
    GateOutcome { passed: true, scores, overall_score: overall, blocking: None, reason: "All gates passed".to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StrategyType;

    fn base_vector() -> FeatureVector {
        FeatureVector {
            technical: crate::features::technical::TechnicalFeatures::default(),
            price_action: crate::features::price_action::PriceActionFeatures::default(),
            mtf: crate::features::mtf::MtfFeatures::default(),
            onchain: crate::features::onchain::OnchainFeatures::default(),
            liquidation: crate::features::liquidation::LiquidationFeatures::default(),
            funding: crate::features::funding::FundingFeatures::default(),
            microstructure: crate::features::microstructure::MicrostructureFeatures::default(),
        }
    }

    fn base_daily() -> DailyBudgetView {
        DailyBudgetView { pnl: 0.0, trade_count: 0, active: true, has_position: false, consecutive_losses: 0, minutes_since_last_trade: None }
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

    #[test]
    fn dead_zone_hour_fails_gate1() {
        let v = base_vector();
        let config = test_config();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 22, 0, 0).unwrap();
        let (_, pass, _) = gate1_context(&v, &config, now);
        assert!(!pass);
    }

    #[test]
    fn daily_target_reached_fails_gate5_with_zero_score() {
        let mut daily = base_daily();
        daily.pnl = 12.0;
        let config = test_config();
        let (score, pass, _) = gate5_daily_budget(&daily, &config);
        assert!(!pass);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn full_pipeline_rejects_on_daily_budget_even_with_good_setup() {
        let mut v = base_vector();
        v.mtf.mtf_alignment = 3.0;
        v.technical.rsi_14 = 50.0;
        let regime = RegimeResult { regime: Regime::TrendingUp, confidence: 0.8, exhaustion_risk: 0.2, structure_quality: 0.8 };
        let proposal = Proposal {
            strategy: StrategyType::TrendMomentum,
            direction: Direction::Long,
            setup_quality: 85,
            reasoning: "test".to_string(),
        };
        let mut daily = base_daily();
        daily.trade_count = 3;
        let config = test_config();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 14, 0, 0).unwrap();
        let outcome = evaluate(&v, &regime, &proposal, &daily, None, &config, now);
        assert!(!outcome.passed);
        assert_eq!(outcome.blocking, Some(Blocking::DailyBudget));
        assert_eq!(outcome.overall_score, 0.0);
    }
}
