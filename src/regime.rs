//! Regime Classifier.
//!
//! Grounded on `original_source/bot-core-brain/src/features/regime.py`:
//! ordered first-match decision tree, weighted exhaustion-risk sum, and
//! a base-plus-bonus structure-quality and trend-confidence score.

use crate::features::FeatureVector;
use crate::models::Regime;

#[derive(Debug, Clone, Copy)]
pub struct RegimeResult {
    pub regime: Regime,
    pub confidence: f64,
    pub exhaustion_risk: f64,
    pub structure_quality: f64,
}

fn choppiness(v: &FeatureVector) -> f64 {
    let mut score: f64 = 50.0;
    if v.technical.adx < 20.0 {
        score += 20.0;
    } else if v.technical.adx < 25.0 {
        score += 10.0;
    } else {
        score -= 10.0;
    }
    if v.price_action.upper_wick_ratio > 0.3 && v.price_action.lower_wick_ratio > 0.3 {
        score += 15.0;
    }
    if v.price_action.body_ratio < 0.3 {
        score += 10.0;
    }
    if v.mtf.tf_divergence != 0.0 {
        score += 15.0;
    }
    score.clamp(0.0, 100.0)
}

fn exhaustion_risk(v: &FeatureVector) -> f64 {
    let extreme_rsi = if v.technical.rsi_14 > 70.0 || v.technical.rsi_14 < 30.0 {
        1.0
    } else if v.technical.rsi_14 > 60.0 || v.technical.rsi_14 < 40.0 {
        0.5
    } else {
        0.0
    };
    let body_shrinking =
        if v.price_action.body_ratio < 0.3 { 1.0 - (v.price_action.body_ratio / 0.3) } else { 0.0 };
    let onchain_div = if v.onchain.exchange_netflow > 0.0 { (v.onchain.exchange_netflow / 10_000.0).min(1.0) } else { 0.0 };
    // volume_declining has no direct input in this feature set (grounded on
    // regime.py's own "would need volume history" placeholder; kept at 0).
    let volume_declining = 0.0_f64;
    let weighted =
        0.30 * extreme_rsi + 0.20 * volume_declining + 0.15 * body_shrinking + 0.15 * extreme_rsi + 0.20 * onchain_div;
    weighted.clamp(0.0, 1.0)
}

fn structure_quality(v: &FeatureVector) -> f64 {
    let mut quality: f64 = 0.5;
    if v.price_action.trend_structure != 0.0 {
        quality += 0.3;
    }
    if v.price_action.hh_count >= 2.0 || v.price_action.ll_count >= 2.0 {
        quality += 0.1;
    }
    if v.price_action.consolidation_bars < 5.0 {
        quality += 0.1;
    }
    quality.clamp(0.0, 1.0)
}

fn trend_confidence(v: &FeatureVector, up: bool) -> f64 {
    let mut confidence: f64 = 0.65;
    if v.technical.adx > 30.0 {
        confidence += 0.1;
    }
    if v.technical.adx > 40.0 {
        confidence += 0.1;
    }
    if up && v.mtf.tf_15m_trend == 1.0 && v.mtf.tf_5m_trend == 1.0 {
        confidence += 0.1;
    } else if !up && v.mtf.tf_15m_trend == -1.0 && v.mtf.tf_5m_trend == -1.0 {
        confidence += 0.1;
    }
    if up && v.price_action.trend_structure == 1.0 {
        confidence += 0.05;
    } else if !up && v.price_action.trend_structure == -1.0 {
        confidence += 0.05;
    }
    confidence.min(0.95)
}

/// First-match-wins decision tree.
pub fn classify(v: &FeatureVector) -> RegimeResult {
    let exhaustion_risk = exhaustion_risk(v);
    let structure_quality = structure_quality(v);

    if v.technical.atr_percentile > 80.0 {
        return RegimeResult {
            regime: Regime::HighVolatility,
            confidence: (v.technical.atr_percentile / 100.0).min(0.95),
            exhaustion_risk,
            structure_quality,
        };
    }

    let choppiness = choppiness(v);
    if choppiness > 50.0 && v.technical.adx < 25.0 {
        return RegimeResult { regime: Regime::Choppy, confidence: 0.7, exhaustion_risk, structure_quality };
    }

    if v.technical.adx >= 25.0 {
        let ema_up = v.technical.ema_9 > v.technical.ema_21 && v.technical.ema_21 > v.technical.ema_50;
        let ema_down = v.technical.ema_9 < v.technical.ema_21 && v.technical.ema_21 < v.technical.ema_50;
        if ema_up {
            return RegimeResult {
                regime: Regime::TrendingUp,
                confidence: trend_confidence(v, true),
                exhaustion_risk,
                structure_quality,
            };
        }
        if ema_down {
            return RegimeResult {
                regime: Regime::TrendingDown,
                confidence: trend_confidence(v, false),
                exhaustion_risk,
                structure_quality,
            };
        }
    }

    if choppiness < 50.0 {
        return RegimeResult { regime: Regime::Ranging, confidence: 0.75, exhaustion_risk, structure_quality };
    }

    RegimeResult { regime: Regime::Choppy, confidence: 0.5, exhaustion_risk, structure_quality }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn high_atr_percentile_wins_regardless_of_trend() {
        let mut v = base_vector();
        v.technical.atr_percentile = 90.0;
        v.technical.adx = 40.0;
        v.technical.ema_9 = 3.0;
        v.technical.ema_21 = 2.0;
        v.technical.ema_50 = 1.0;
        let r = classify(&v);
        assert_eq!(r.regime, Regime::HighVolatility);
    }

    #[test]
    fn trending_up_requires_adx_and_ema_order() {
        let mut v = base_vector();
        v.technical.adx = 32.0;
        v.technical.ema_9 = 3.0;
        v.technical.ema_21 = 2.0;
        v.technical.ema_50 = 1.0;
        let r = classify(&v);
        assert_eq!(r.regime, Regime::TrendingUp);
        assert!(r.regime.is_tradeable());
    }

    #[test]
    fn default_falls_through_to_choppy() {
        let v = base_vector();
        let r = classify(&v);
        assert_eq!(r.regime, Regime::Choppy);
    }
}
