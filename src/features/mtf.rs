//! MTF[15] feature group.
//!
//! Grounded on `original_source/bot-core-brain/src/features/multi_timeframe.py`:
//! trend direction from 9/21 EMA agreement with price, confluence scored
//! over {15m, 5m, 3m}, divergence requiring >1 distinct non-zero
//! direction among the three.

use crate::models::Candle;

use super::technical::{ema, rsi};

#[derive(Debug, Clone, Copy, Default)]
pub struct MtfFeatures {
    pub tf_15m_trend: f64,
    pub tf_15m_strength: f64,
    pub tf_15m_rsi: f64,
    pub tf_5m_trend: f64,
    pub tf_5m_strength: f64,
    pub tf_5m_rsi: f64,
    pub tf_3m_momentum: f64,
    pub tf_1m_momentum: f64,
    pub mtf_alignment: f64,
    pub mtf_confluence_score: f64,
    pub htf_support_dist: f64,
    pub htf_resistance_dist: f64,
    pub tf_divergence: f64,
    pub momentum_acceleration: f64,
    pub trend_age_bars: f64,
}

impl MtfFeatures {
    pub fn as_slots(&self) -> [f64; 15] {
        [
            self.tf_15m_trend,
            self.tf_15m_strength,
            self.tf_15m_rsi,
            self.tf_5m_trend,
            self.tf_5m_strength,
            self.tf_5m_rsi,
            self.tf_3m_momentum,
            self.tf_1m_momentum,
            self.mtf_alignment,
            self.mtf_confluence_score,
            self.htf_support_dist,
            self.htf_resistance_dist,
            self.tf_divergence,
            self.momentum_acceleration,
            self.trend_age_bars,
        ]
    }
}

fn trend_direction(candles: &[Candle], short: usize, long: usize) -> (f64, f64) {
    if candles.len() < long {
        return (0.0, 0.0);
    }
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let ema_s = ema(&closes, short);
    let ema_l = ema(&closes, long);
    let price = *closes.last().unwrap();
    let direction = if ema_s > ema_l && price > ema_s {
        1.0
    } else if ema_s < ema_l && price < ema_s {
        -1.0
    } else {
        0.0
    };
    let strength = ((ema_s - ema_l).abs() / price * 100.0).min(1.0);
    (direction, strength)
}

fn momentum(candles: &[Candle], period: usize) -> f64 {
    if candles.len() < period {
        return 0.0;
    }
    let current = candles[candles.len() - 1].close;
    let previous = candles[candles.len() - period].close;
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous * 100.0
}

fn momentum_acceleration(candles: &[Candle], period: usize) -> f64 {
    if candles.len() < period * 2 {
        return 0.0;
    }
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let n = closes.len();
    let recent = if closes[n - period] != 0.0 {
        (closes[n - 1] - closes[n - period]) / closes[n - period] * 100.0
    } else {
        0.0
    };
    let prev = if closes[n - period * 2] != 0.0 {
        (closes[n - period] - closes[n - period * 2]) / closes[n - period * 2] * 100.0
    } else {
        0.0
    };
    recent - prev
}

fn trend_age(candles: &[Candle], direction: f64) -> f64 {
    if candles.len() < 10 || direction == 0.0 {
        return 0.0;
    }
    let mut age = 0.0;
    for w in candles.windows(2).rev() {
        let (prev, cur) = (w[0].close, w[1].close);
        let aligned = (direction > 0.0 && cur > prev) || (direction < 0.0 && cur < prev);
        if aligned {
            age += 1.0;
        } else {
            break;
        }
    }
    age
}

fn htf_levels(candles: &[Candle]) -> (f64, f64) {
    const LOOKBACK: usize = 100;
    if candles.len() < 10 {
        return (0.0, f64::INFINITY);
    }
    let take = LOOKBACK.min(candles.len());
    let window = &candles[candles.len() - take..];
    let resistance = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let support = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    (support, resistance)
}

pub fn calculate(c15: &[Candle], c5: &[Candle], c3: &[Candle], c1: &[Candle]) -> MtfFeatures {
    let mut f = MtfFeatures::default();

    if !c15.is_empty() {
        (f.tf_15m_trend, f.tf_15m_strength) = trend_direction(c15, 9, 21);
        let closes: Vec<f64> = c15.iter().map(|c| c.close).collect();
        f.tf_15m_rsi = rsi(&closes, 14);
    }
    if !c5.is_empty() {
        (f.tf_5m_trend, f.tf_5m_strength) = trend_direction(c5, 9, 21);
        let closes: Vec<f64> = c5.iter().map(|c| c.close).collect();
        f.tf_5m_rsi = rsi(&closes, 14);
    }
    if !c3.is_empty() {
        f.tf_3m_momentum = momentum(c3, 10);
    }
    if !c1.is_empty() {
        f.tf_1m_momentum = momentum(c1, 10);
    }

    let mut directions = vec![f.tf_15m_trend, f.tf_5m_trend];
    if !c3.is_empty() {
        directions.push(if f.tf_3m_momentum > 0.0 { 1.0 } else if f.tf_3m_momentum < 0.0 { -1.0 } else { 0.0 });
    }
    let bullish = directions.iter().filter(|&&d| d == 1.0).count();
    let bearish = directions.iter().filter(|&&d| d == -1.0).count();
    f.mtf_alignment = bullish.max(bearish) as f64;
    if directions.iter().any(|&d| d != 0.0) {
        f.mtf_confluence_score = (bullish.max(bearish) as f64 / directions.len() as f64) * 100.0;
    }

    let tf3_dir = if f.tf_3m_momentum > 0.1 { 1.0 } else if f.tf_3m_momentum < -0.1 { -1.0 } else { 0.0 };
    let non_neutral: Vec<f64> =
        [f.tf_15m_trend, f.tf_5m_trend, tf3_dir].into_iter().filter(|&d| d != 0.0).collect();
    let distinct = non_neutral.iter().fold(std::collections::HashSet::new(), |mut set, v| {
        set.insert(v.to_bits());
        set
    });
    f.tf_divergence = if non_neutral.len() >= 2 && distinct.len() > 1 { 1.0 } else { 0.0 };

    if !c1.is_empty() {
        f.momentum_acceleration = momentum_acceleration(c1, 5);
    }
    if !c15.is_empty() {
        f.trend_age_bars = trend_age(c15, f.tf_15m_trend);
        let (support, resistance) = htf_levels(c15);
        let price = c15.last().unwrap().close;
        f.htf_support_dist = if support > 0.0 { (price - support) / price } else { 0.0 };
        f.htf_resistance_dist = if resistance.is_finite() { (resistance - price) / price } else { 0.0 };
    }

    f
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64, close: f64) -> Candle {
        Candle { ts, open: close, high: close, low: close, close, volume: 1.0, quote_volume: close, trades: 1, closed: true }
    }

    #[test]
    fn empty_inputs_yield_default_features() {
        let f = calculate(&[], &[], &[], &[]);
        assert_eq!(f.tf_15m_trend, 0.0);
        assert_eq!(f.mtf_alignment, 0.0);
    }

    #[test]
    fn rising_series_has_positive_momentum() {
        let candles: Vec<Candle> = (0..15).map(|i| candle(i, 100.0 + i as f64)).collect();
        let f = calculate(&[], &[], &[], &candles);
        assert!(f.tf_1m_momentum > 0.0);
    }
}
