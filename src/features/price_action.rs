//! PriceAction[15] feature group.
//!
//! Grounded on `original_source/bot-core-brain/src/features/price_action.py`:
//! ±5-bar swing-pivot detection, HH/HL/LH/LL counting over the last 10
//! swings, and a 50-bar swing-based support/resistance fallback for
//! `key_level_distance`.

use crate::models::Candle;

#[derive(Debug, Clone, Copy, Default)]
pub struct PriceActionFeatures {
    pub body_ratio: f64,
    pub upper_wick_ratio: f64,
    pub lower_wick_ratio: f64,
    pub range_expansion: f64,
    pub breakout_strength: f64,
    pub swing_high_dist: f64,
    pub swing_low_dist: f64,
    pub hh_count: f64,
    pub ll_count: f64,
    pub hl_count: f64,
    pub lh_count: f64,
    pub trend_structure: f64,
    pub consolidation_bars: f64,
    pub volatility_contraction: f64,
    pub key_level_distance: f64,
}

impl PriceActionFeatures {
    pub fn as_slots(&self) -> [f64; 15] {
        [
            self.body_ratio,
            self.upper_wick_ratio,
            self.lower_wick_ratio,
            self.range_expansion,
            self.breakout_strength,
            self.swing_high_dist,
            self.swing_low_dist,
            self.hh_count,
            self.ll_count,
            self.hl_count,
            self.lh_count,
            self.trend_structure,
            self.consolidation_bars,
            self.volatility_contraction,
            self.key_level_distance,
        ]
    }
}

fn swing_points(candles: &[Candle], lookback: usize) -> (Vec<(usize, f64)>, Vec<(usize, f64)>) {
    let mut highs_out = Vec::new();
    let mut lows_out = Vec::new();
    if candles.len() <= lookback * 2 {
        return (highs_out, lows_out);
    }
    for i in lookback..candles.len() - lookback {
        let window = &candles[i - lookback..=i + lookback];
        let high = candles[i].high;
        let low = candles[i].low;
        if window.iter().all(|c| c.high <= high) {
            highs_out.push((i, high));
        }
        if window.iter().all(|c| c.low >= low) {
            lows_out.push((i, low));
        }
    }
    (highs_out, lows_out)
}

fn market_structure(swing_highs: &[(usize, f64)], swing_lows: &[(usize, f64)]) -> (f64, f64, f64, f64) {
    let mut hh = 0.0;
    let mut lh = 0.0;
    if swing_highs.len() >= 2 {
        for i in 1..swing_highs.len().min(10) {
            let (cur, prev) = (swing_highs[swing_highs.len() - i].1, swing_highs[swing_highs.len() - i - 1].1);
            if cur > prev {
                hh += 1.0;
            } else {
                lh += 1.0;
            }
        }
    }
    let mut hl = 0.0;
    let mut ll = 0.0;
    if swing_lows.len() >= 2 {
        for i in 1..swing_lows.len().min(10) {
            let (cur, prev) = (swing_lows[swing_lows.len() - i].1, swing_lows[swing_lows.len() - i - 1].1);
            if cur > prev {
                hl += 1.0;
            } else {
                ll += 1.0;
            }
        }
    }
    (hh, ll, hl, lh)
}

pub fn calculate(candles: &[Candle]) -> PriceActionFeatures {
    let mut f = PriceActionFeatures::default();
    if candles.len() < 2 {
        return f;
    }
    let current = candles[candles.len() - 1];

    if current.range() > 0.0 {
        f.body_ratio = current.body() / current.range();
        f.upper_wick_ratio = current.upper_wick() / current.range();
        f.lower_wick_ratio = current.lower_wick() / current.range();
    }

    let avg_range = if candles.len() >= 20 {
        let window = &candles[candles.len() - 20..];
        window.iter().map(|c| c.range()).sum::<f64>() / 20.0
    } else {
        current.range()
    };
    f.range_expansion = if avg_range > 0.0 { current.range() / avg_range } else { 1.0 };

    let (swing_highs, swing_lows) = swing_points(candles, 5);
    let price = current.close;
    if let Some(&(_, sh)) = swing_highs.last() {
        f.swing_high_dist = (sh - price) / price;
    }
    if let Some(&(_, sl)) = swing_lows.last() {
        f.swing_low_dist = (price - sl) / price;
    }

    let (hh, ll, hl, lh) = market_structure(&swing_highs, &swing_lows);
    f.hh_count = hh;
    f.ll_count = ll;
    f.hl_count = hl;
    f.lh_count = lh;
    f.trend_structure = if hh > lh && hl > ll {
        1.0
    } else if lh > hh && ll > hl {
        -1.0
    } else {
        0.0
    };

    if candles.len() >= 20 {
        let window = &candles[candles.len() - 20..candles.len() - 1];
        let recent_high = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let recent_low = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let recent_range = recent_high - recent_low;
        if recent_range > 0.0 {
            if current.close > recent_high {
                f.breakout_strength = (current.close - recent_high) / recent_range;
            } else if current.close < recent_low {
                f.breakout_strength = (recent_low - current.close) / recent_range;
            }
        }
    }

    if candles.len() >= 10 {
        let window = &candles[candles.len() - 10..];
        let avg = window.iter().map(|c| c.range()).sum::<f64>() / 10.0;
        f.consolidation_bars = window.iter().filter(|c| c.range() < avg * 0.5).count() as f64;
    }

    let ranges: Vec<f64> = candles.iter().map(|c| c.range()).collect();
    f.volatility_contraction = if volatility_contraction(&ranges, 10) { 1.0 } else { 0.0 };

    f.key_level_distance = key_level_distance(candles, price);

    f
}

fn volatility_contraction(ranges: &[f64], period: usize) -> bool {
    if ranges.len() < period {
        return false;
    }
    let recent = &ranges[ranges.len() - period..];
    let earlier_start = if ranges.len() >= period * 2 { ranges.len() - period * 2 } else { 0 };
    let earlier_end = ranges.len() - period;
    let earlier = &ranges[earlier_start..earlier_end];
    if earlier.is_empty() {
        return false;
    }
    let mean = |s: &[f64]| s.iter().sum::<f64>() / s.len() as f64;
    mean(recent) < mean(earlier) * 0.7
}

fn key_level_distance(candles: &[Candle], price: f64) -> f64 {
    const LOOKBACK: usize = 50;
    if candles.len() < LOOKBACK {
        return 0.0;
    }
    let window = &candles[candles.len() - LOOKBACK..];
    let (swing_highs, swing_lows) = swing_points(window, 3);
    let resistance: Vec<f64> = swing_highs.iter().rev().take(5).map(|&(_, v)| v).collect();
    let support: Vec<f64> = swing_lows.iter().rev().take(5).map(|&(_, v)| v).collect();

    let nearest = |levels: &[f64]| -> f64 {
        levels
            .iter()
            .min_by(|a, b| (*a - price).abs().partial_cmp(&(*b - price).abs()).unwrap())
            .copied()
            .unwrap_or(price)
    };
    let dist_support = if support.is_empty() { price } else { (price - nearest(&support)).abs() } / price;
    let dist_resistance = if resistance.is_empty() { price } else { (nearest(&resistance) - price).abs() } / price;
    dist_support.min(dist_resistance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle { ts, open: o, high: h, low: l, close: c, volume: 10.0, quote_volume: 1000.0, trades: 5, closed: true }
    }

    #[test]
    fn flat_series_has_zero_trend_structure() {
        let candles: Vec<Candle> = (0..30).map(|i| candle(i, 100.0, 100.5, 99.5, 100.0)).collect();
        let f = calculate(&candles);
        assert_eq!(f.trend_structure, 0.0);
    }
}
