//! End-to-end scenarios driving the public gate/strategy/store/budget/
//! quality surface together, the way a single Signal Engine or Verifier
//! tick would use them.

use btc_signal_core::budget;
use btc_signal_core::config::{Config, DataSource};
use btc_signal_core::features::funding::FundingFeatures;
use btc_signal_core::features::liquidation::LiquidationFeatures;
use btc_signal_core::features::microstructure::MicrostructureFeatures;
use btc_signal_core::features::mtf::MtfFeatures;
use btc_signal_core::features::onchain::OnchainFeatures;
use btc_signal_core::features::price_action::PriceActionFeatures;
use btc_signal_core::features::technical::TechnicalFeatures;
use btc_signal_core::features::FeatureVector;
use btc_signal_core::gates::{self, Blocking, DailyBudgetView};
use btc_signal_core::models::{DailyState, DailyStatus, Direction, GateScores, Regime, SignalEconomics, SignalStatus, StrategyType};
use btc_signal_core::quality;
use btc_signal_core::regime::{self, RegimeResult};
use btc_signal_core::store::Store;
use btc_signal_core::strategy;
use btc_signal_core::models::Signal;

use chrono::{TimeZone, Utc};

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
        data_source: DataSource::Degraded,
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

fn base_vector() -> FeatureVector {
    FeatureVector {
        technical: TechnicalFeatures::default(),
        price_action: PriceActionFeatures::default(),
        mtf: MtfFeatures::default(),
        onchain: OnchainFeatures::default(),
        liquidation: LiquidationFeatures::default(),
        funding: FundingFeatures::default(),
        microstructure: MicrostructureFeatures::default(),
    }
}

fn base_daily() -> DailyBudgetView {
    DailyBudgetView { pnl: 0.0, trade_count: 0, active: true, has_position: false, consecutive_losses: 0, minutes_since_last_trade: None }
}

#[test]
fn dead_zone_reject_no_signal() {
    let v = base_vector();
    let config = test_config();
    let regime_result = RegimeResult { regime: Regime::TrendingUp, confidence: 0.8, exhaustion_risk: 0.2, structure_quality: 0.8 };
    let proposal = strategy::Proposal { strategy: StrategyType::TrendMomentum, direction: Direction::Long, setup_quality: 85, reasoning: "test".to_string() };
    let daily = base_daily();
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 22, 0, 0).unwrap();

    let outcome = gates::evaluate(&v, &regime_result, &proposal, &daily, None, &config, now);

    assert!(!outcome.passed);
    assert_eq!(outcome.blocking, Some(Blocking::Context));
}

#[test]
fn trending_up_long_accepted_with_correct_target_and_stop() {
    let mut v = base_vector();
    v.technical.adx = 32.0;
    v.technical.ema_9 = 3.0;
    v.technical.ema_21 = 2.0;
    v.technical.ema_50 = 1.0;
    v.technical.rsi_14 = 48.0;
    v.microstructure.cvd_trend = 0.2;
    v.funding.funding_current = 0.0002;
    v.mtf.mtf_alignment = 3.0;
    v.mtf.mtf_confluence_score = 80.0;
    v.onchain.whale_activity_score = 65.0;

    let regime_result = RegimeResult { regime: Regime::TrendingUp, confidence: 0.78, exhaustion_risk: 0.3, structure_quality: 0.75 };
    let proposal = strategy::propose(&v, &regime_result, regime_result.regime.as_str()).expect("setup should clear SETUP_QUALITY_MIN");
    assert_eq!(proposal.direction, Direction::Long);

    let config = test_config();
    let daily = base_daily();
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 14, 0, 0).unwrap();
    let outcome = gates::evaluate(&v, &regime_result, &proposal, &daily, None, &config, now);
    assert!(outcome.passed, "expected all gates to pass: {}", outcome.reason);

    let entry = 100_000.0;
    let economics = SignalEconomics { margin: config.margin, leverage: config.leverage, tp_pct: config.tp_pct, sl_pct: config.sl_pct };
    let signal = Signal::new(
        "SIG_E2E_1".to_string(),
        proposal.direction,
        proposal.strategy,
        entry,
        outcome.overall_score,
        proposal.setup_quality,
        regime_result.regime,
        proposal.reasoning.clone(),
        outcome.scores,
        outcome.passed,
        economics,
    );
    assert!((signal.target - entry * 1.005).abs() < 1e-6);
    assert!((signal.stop - entry * 0.9975).abs() < 1e-6);
}

#[test]
fn counter_trend_short_blocked_by_exhaustion_floor() {
    let mut v = base_vector();
    v.technical.ema_9 = 1.0;
    v.technical.ema_21 = 2.0;
    v.technical.ema_50 = 3.0;
    v.technical.rsi_14 = 50.0;
    v.microstructure.cvd_trend = -0.1;

    let regime_result = RegimeResult { regime: Regime::TrendingUp, confidence: 0.8, exhaustion_risk: 0.4, structure_quality: 0.7 };
    let proposal = strategy::propose(&v, &regime_result, regime_result.regime.as_str());
    assert!(proposal.is_none(), "exhaustion 0.4 is below the 0.7 counter-trend floor, proposer must reject");
}

#[test]
fn verifier_resolves_tp_hit_through_the_store() {
    let store = Store::open(":memory:").expect("open in-memory store");
    let config = test_config();
    let economics = SignalEconomics { margin: config.margin, leverage: config.leverage, tp_pct: config.tp_pct, sl_pct: config.sl_pct };
    let entry = 100_000.0;
    let signal = Signal::new(
        "SIG_E2E_TP".to_string(),
        Direction::Long,
        StrategyType::TrendMomentum,
        entry,
        0.8,
        85,
        Regime::TrendingUp,
        "test".to_string(),
        GateScores::default(),
        true,
        economics,
    );
    assert!((signal.target - 100_500.0).abs() < 1e-6);
    assert!((signal.stop - 99_750.0).abs() < 1e-6);

    store.insert_pending_signal(&signal).expect("persist signal");
    let pending = store.list_pending_signals().expect("list pending");
    assert_eq!(pending.len(), 1);

    // Price series samples: 100100, 100300, 100600 — TP (100500) is
    // crossed by the third sample.
    let now = signal.created_at + chrono::Duration::minutes(5);
    let fill_price = 100_600.0;
    let (mfe, mae) = quality::excursions(signal.direction, signal.entry, fill_price, 100_100.0);
    store
        .update_signal_result(&signal.id, SignalStatus::Win, signal.target, now, 15.0, "TP_HIT", mfe, mae, 5.0)
        .expect("update signal result");

    let pending_after = store.list_pending_signals().expect("list pending after resolution");
    assert!(pending_after.is_empty());
    assert!(mfe > 0.0);
    assert_eq!(mae, 0.0);
}

#[test]
fn daily_stop_blocks_further_signals_after_two_losses() {
    let config = test_config();
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    let mut state = DailyState::fresh(now.date_naive());

    budget::apply_result(&mut state, SignalStatus::Loss, -7.5, now, &config);
    assert_eq!(state.status, DailyStatus::Active);
    assert_eq!(state.pnl, -7.5);

    budget::apply_result(&mut state, SignalStatus::Loss, -7.5, now, &config);
    assert_eq!(state.status, DailyStatus::StopHit);
    assert_eq!(state.pnl, -15.0);

    let view = DailyBudgetView {
        pnl: state.pnl,
        trade_count: state.trade_count,
        active: state.status == DailyStatus::Active,
        has_position: state.has_position,
        consecutive_losses: state.consecutive_losses,
        minutes_since_last_trade: budget::minutes_since_last_trade(&state, now),
    };
    let v = base_vector();
    let regime_result = regime::classify(&v);
    let proposal = strategy::Proposal { strategy: StrategyType::TrendMomentum, direction: Direction::Long, setup_quality: 90, reasoning: "test".to_string() };
    let outcome = gates::evaluate(&v, &regime_result, &proposal, &view, None, &config, now);

    assert!(!outcome.passed);
    assert_eq!(outcome.blocking, Some(Blocking::DailyBudget));
    assert_eq!(outcome.overall_score, 0.0);
}
