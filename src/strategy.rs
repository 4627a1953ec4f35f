//! Strategy Proposer.
//!
//! Grounded on `original_source/bot-core-brain/src/signals/signal_generator.py`:
//! selection order (funding extreme → liquidation zone → regime default),
//! the hard direction-vs-regime rule with the exhaustion-risk escape
//! hatch, per-strategy validators, and the six-component setup-quality sum.

use crate::features::FeatureVector;
use crate::models::{Direction, StrategyType};
use crate::regime::RegimeResult;

pub const SETUP_QUALITY_MIN: u32 = 70;
const FUNDING_EXTREME: f64 = 0.001;
const LIQ_DENSITY_MIN: f64 = 5_000_000.0;
const EXHAUSTION_COUNTER_TREND: f64 = 0.7;

#[derive(Debug, Clone)]
pub struct Proposal {
    pub strategy: StrategyType,
    pub direction: Direction,
    pub setup_quality: u32,
    pub reasoning: String,
}

/// Select a strategy+direction, validate it against the regime, score
/// setup quality, and drop anything below [`SETUP_QUALITY_MIN`].
pub fn propose(v: &FeatureVector, regime: &RegimeResult, regime_name: &str) -> Option<Proposal> {
    let (strategy, direction) = select_strategy(v, regime)?;

    if !direction_allowed(direction, regime) {
        return None;
    }

    let setup_quality = setup_quality(v, direction);
    if setup_quality < SETUP_QUALITY_MIN {
        return None;
    }

    let reasoning = reasoning(v, regime_name, strategy, direction);
    Some(Proposal { strategy, direction, setup_quality, reasoning })
}

fn direction_allowed(direction: Direction, regime: &RegimeResult) -> bool {
    use crate::models::Regime::*;
    match (regime.regime, direction) {
        (TrendingUp, Direction::Short) => regime.exhaustion_risk > EXHAUSTION_COUNTER_TREND,
        (TrendingDown, Direction::Long) => regime.exhaustion_risk > EXHAUSTION_COUNTER_TREND,
        _ => true,
    }
}

fn select_strategy(v: &FeatureVector, regime: &RegimeResult) -> Option<(StrategyType, Direction)> {
    if v.funding.funding_extreme != 0.0 {
        if let Some(dir) = validate_funding_fade(v, regime) {
            return Some((StrategyType::FundingFade, dir));
        }
    }

    if v.liquidation.distance_to_long_liq < 0.02 || v.liquidation.distance_to_short_liq < 0.02 {
        if let Some(dir) = validate_liquidation_hunt(v, regime) {
            return Some((StrategyType::LiquidationHunt, dir));
        }
    }

    use crate::models::Regime::*;
    match regime.regime {
        TrendingUp => validate_trend_momentum(v, Direction::Long).then_some((StrategyType::TrendMomentum, Direction::Long)),
        TrendingDown => {
            validate_trend_momentum(v, Direction::Short).then_some((StrategyType::TrendMomentum, Direction::Short))
        }
        Ranging => validate_range_scalping(v).map(|dir| (StrategyType::RangeScalping, dir)),
        HighVolatility => validate_liquidation_hunt(v, regime).map(|dir| (StrategyType::LiquidationHunt, dir)),
        Choppy => None,
    }
}

fn validate_trend_momentum(v: &FeatureVector, direction: Direction) -> bool {
    let t = &v.technical;
    match direction {
        Direction::Long => {
            t.ema_9 > t.ema_21
                && t.ema_21 > t.ema_50
                && (t.rsi_14 >= 40.0 && t.rsi_14 <= 60.0)
                && v.microstructure.cvd_trend > 0.0
                && v.funding.funding_current <= 0.0005
        }
        Direction::Short => {
            t.ema_9 < t.ema_21
                && t.ema_21 < t.ema_50
                && (t.rsi_14 >= 40.0 && t.rsi_14 <= 60.0)
                && v.microstructure.cvd_trend < 0.0
        }
    }
}

fn validate_liquidation_hunt(v: &FeatureVector, regime: &RegimeResult) -> Option<Direction> {
    use crate::models::Regime::*;
    let liq = &v.liquidation;
    let micro = &v.microstructure;

    let short_zone_long = liq.distance_to_short_liq < 0.02
        && liq.short_liq_density_2pct > LIQ_DENSITY_MIN
        && micro.orderbook_imbalance > 0.1
        && micro.cvd_trend > 0.0;
    let long_zone_short = liq.distance_to_long_liq < 0.02
        && liq.long_liq_density_2pct > LIQ_DENSITY_MIN
        && micro.orderbook_imbalance < -0.1
        && micro.cvd_trend < 0.0;

    match regime.regime {
        TrendingUp => short_zone_long.then_some(Direction::Long),
        TrendingDown => long_zone_short.then_some(Direction::Short),
        _ => {
            if short_zone_long {
                Some(Direction::Long)
            } else if long_zone_short {
                Some(Direction::Short)
            } else {
                None
            }
        }
    }
}

fn validate_funding_fade(v: &FeatureVector, regime: &RegimeResult) -> Option<Direction> {
    use crate::models::Regime::*;
    let funding = v.funding.funding_current;
    let rsi = v.technical.rsi_14;
    let allow_counter_trend = regime.exhaustion_risk > EXHAUSTION_COUNTER_TREND;

    match regime.regime {
        TrendingUp => {
            if funding < -FUNDING_EXTREME && rsi < 50.0 {
                Some(Direction::Long)
            } else if funding > FUNDING_EXTREME && allow_counter_trend && rsi > 70.0 {
                Some(Direction::Short)
            } else {
                None
            }
        }
        TrendingDown => {
            if funding > FUNDING_EXTREME && rsi > 50.0 {
                Some(Direction::Short)
            } else if funding < -FUNDING_EXTREME && allow_counter_trend && rsi < 30.0 {
                Some(Direction::Long)
            } else {
                None
            }
        }
        _ => {
            if funding > FUNDING_EXTREME && rsi > 60.0 {
                Some(Direction::Short)
            } else if funding < -FUNDING_EXTREME && rsi < 40.0 {
                Some(Direction::Long)
            } else {
                None
            }
        }
    }
}

fn validate_range_scalping(v: &FeatureVector) -> Option<Direction> {
    let t = &v.technical;
    let pa = &v.price_action;
    let micro = &v.microstructure;
    if t.rsi_14 < 35.0 && pa.lower_wick_ratio > 0.5 && micro.cvd > 0.0 {
        return Some(Direction::Long);
    }
    if t.rsi_14 > 65.0 && pa.upper_wick_ratio > 0.5 && micro.cvd < 0.0 {
        return Some(Direction::Short);
    }
    None
}

fn setup_quality(v: &FeatureVector, direction: Direction) -> u32 {
    let mut score = 0.0_f64;

    score += v.mtf.mtf_confluence_score / 100.0 * 20.0;

    let long = direction == Direction::Long;
    score += if (long && v.microstructure.cvd_trend > 0.0) || (!long && v.microstructure.cvd_trend < 0.0) {
        10.0
    } else {
        0.0
    };
    score += if (long && v.microstructure.aggressor_ratio > 0.5) || (!long && v.microstructure.aggressor_ratio < 0.5) {
        10.0
    } else {
        5.0
    };

    score += if v.price_action.key_level_distance < 0.005 {
        15.0
    } else if v.price_action.key_level_distance < 0.01 {
        10.0
    } else {
        5.0
    };

    score += if v.onchain.whale_activity_score > 60.0 {
        15.0
    } else if v.onchain.whale_activity_score > 40.0 {
        10.0
    } else {
        5.0
    };

    let momentum_aligned = if long { v.technical.macd_histogram > 0.0 } else { v.technical.macd_histogram < 0.0 };
    let momentum_tf_aligned = if long { v.mtf.tf_3m_momentum > 0.0 } else { v.mtf.tf_3m_momentum < 0.0 };
    score += if momentum_aligned && momentum_tf_aligned {
        15.0
    } else if momentum_aligned || momentum_tf_aligned {
        10.0
    } else {
        5.0
    };

    score += if (v.microstructure.orderbook_imbalance > 0.1 && long) || (v.microstructure.orderbook_imbalance < -0.1 && !long) {
        15.0
    } else if v.microstructure.orderbook_imbalance.abs() < 0.1 {
        10.0
    } else {
        5.0
    };

    score.clamp(0.0, 100.0) as u32
}

fn reasoning(v: &FeatureVector, regime_name: &str, strategy: StrategyType, direction: Direction) -> String {
    let mut parts = vec![
        format!("Regime: {regime_name}"),
        format!("Strategy: {}", strategy.as_str()),
        format!("Direction: {}", direction.as_str()),
        format!("RSI: {:.1}", v.technical.rsi_14),
        format!("ADX: {:.1}", v.technical.adx),
        format!("MTF: {}/3 aligned", v.mtf.mtf_alignment as u32),
    ];
    if v.funding.funding_current != 0.0 {
        parts.push(format!("Funding: {:.3}%", v.funding.funding_current * 100.0));
    }
    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Regime;

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

    #[test]
    fn counter_trend_short_requires_high_exhaustion() {
        let regime_low = RegimeResult { regime: Regime::TrendingUp, confidence: 0.8, exhaustion_risk: 0.4, structure_quality: 0.7 };
        assert!(!direction_allowed(Direction::Short, &regime_low));
        let regime_high = RegimeResult { regime: Regime::TrendingUp, confidence: 0.8, exhaustion_risk: 0.75, structure_quality: 0.7 };
        assert!(direction_allowed(Direction::Short, &regime_high));
    }

    #[test]
    fn trending_up_long_passes_with_aligned_features() {
        let mut v = base_vector();
        v.technical.ema_9 = 3.0;
        v.technical.ema_21 = 2.0;
        v.technical.ema_50 = 1.0;
        v.technical.rsi_14 = 48.0;
        v.microstructure.cvd_trend = 0.2;
        v.funding.funding_current = 0.0002;
        assert!(validate_trend_momentum(&v, Direction::Long));
    }

    #[test]
    fn setup_quality_clamped_to_0_100() {
        let v = base_vector();
        let q = setup_quality(&v, Direction::Long);
        assert!(q <= 100);
    }
}
