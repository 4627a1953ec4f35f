//! Technical[20] feature group.
//!
//! Grounded on `original_source/bot-core-brain/src/features/technical.py`:
//! Wilder-style RSI/ATR over a plain mean (not re-smoothed), EMA seeded on
//! the first close, ADX as a single-bar DX (no further smoothing of DX is
//! applied, matching the source).

use crate::models::Candle;

#[derive(Debug, Clone, Copy, Default)]
pub struct TechnicalFeatures {
    pub rsi_7: f64,
    pub rsi_14: f64,
    pub ema_9: f64,
    pub ema_21: f64,
    pub ema_50: f64,
    pub ema_200: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
    pub bb_position: f64,
    pub atr_14: f64,
    pub atr_percentile: f64,
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub vwap: f64,
}

impl TechnicalFeatures {
    pub fn as_slots(&self) -> [f64; 20] {
        [
            self.rsi_7,
            self.rsi_14,
            self.ema_9,
            self.ema_21,
            self.ema_50,
            self.ema_200,
            self.macd_line,
            self.macd_signal,
            self.macd_histogram,
            self.bb_upper,
            self.bb_lower,
            self.bb_position,
            self.atr_14,
            self.atr_percentile,
            self.adx,
            self.plus_di,
            self.minus_di,
            self.stoch_k,
            self.stoch_d,
            self.vwap,
        ]
    }
}

/// Exponential moving average, seeded on the first sample.
pub fn ema(prices: &[f64], period: usize) -> f64 {
    if prices.len() < period {
        return prices.last().copied().unwrap_or(0.0);
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut value = prices[0];
    for &p in &prices[1..] {
        value = p * alpha + value * (1.0 - alpha);
    }
    value
}

/// Wilder RSI over a plain trailing mean of gains/losses; 50 when the
/// series is too short.
pub fn rsi(prices: &[f64], period: usize) -> f64 {
    if prices.len() < period + 1 {
        return 50.0;
    }
    let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let tail = &deltas[deltas.len() - period..];
    let avg_gain: f64 = tail.iter().map(|d| d.max(0.0)).sum::<f64>() / period as f64;
    let avg_loss: f64 = tail.iter().map(|d| (-d).max(0.0)).sum::<f64>() / period as f64;
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

fn macd(prices: &[f64]) -> (f64, f64, f64) {
    const FAST: usize = 12;
    const SLOW: usize = 26;
    const SIGNAL: usize = 9;
    if prices.len() < SLOW {
        return (0.0, 0.0, 0.0);
    }
    let macd_line = ema(prices, FAST) - ema(prices, SLOW);

    let start = SLOW.max(prices.len().saturating_sub(50));
    let mut history = Vec::with_capacity(prices.len() - start);
    for i in start..prices.len() {
        let window = &prices[..=i];
        history.push(ema(window, FAST) - ema(window, SLOW));
    }
    let macd_signal = if history.len() >= SIGNAL {
        ema(&history, SIGNAL)
    } else {
        macd_line
    };
    (macd_line, macd_signal, macd_line - macd_signal)
}

fn bollinger_bands(prices: &[f64], period: usize, std_dev: f64) -> (f64, f64, f64) {
    if prices.len() < period {
        let last = prices.last().copied().unwrap_or(0.0);
        return (last, last, 0.5);
    }
    let recent = &prices[prices.len() - period..];
    let mean: f64 = recent.iter().sum::<f64>() / period as f64;
    let variance: f64 = recent.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / period as f64;
    let std = variance.sqrt();
    let upper = mean + std * std_dev;
    let lower = mean - std * std_dev;
    let current = *prices.last().unwrap();
    let position = if upper - lower == 0.0 {
        0.5
    } else {
        ((current - lower) / (upper - lower)).clamp(0.0, 1.0)
    };
    (upper, lower, position)
}

fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .map(|w| {
            let (prev, cur) = (w[0], w[1]);
            (cur.high - cur.low)
                .max((cur.high - prev.close).abs())
                .max((cur.low - prev.close).abs())
        })
        .collect()
}

fn atr(candles: &[Candle], period: usize) -> f64 {
    if candles.len() < period + 1 {
        return 0.0;
    }
    let tr = true_ranges(candles);
    let tail = &tr[tr.len() - period..];
    tail.iter().sum::<f64>() / period as f64
}

/// ADX as a single-bar DX (no further smoothing), preserved as written
/// in the source.
fn adx_di(candles: &[Candle], period: usize) -> (f64, f64, f64) {
    if candles.len() < period + 1 {
        return (0.0, 0.0, 0.0);
    }
    let mut tr = Vec::with_capacity(candles.len() - 1);
    let mut plus_dm = Vec::with_capacity(candles.len() - 1);
    let mut minus_dm = Vec::with_capacity(candles.len() - 1);
    for w in candles.windows(2) {
        let (prev, cur) = (w[0], w[1]);
        tr.push(
            (cur.high - cur.low)
                .max((cur.high - prev.close).abs())
                .max((cur.low - prev.close).abs()),
        );
        let up_move = cur.high - prev.high;
        let down_move = prev.low - cur.low;
        plus_dm.push(if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 });
        minus_dm.push(if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 });
    }
    if tr.len() < period {
        return (0.0, 0.0, 0.0);
    }
    let mean = |v: &[f64]| v[v.len() - period..].iter().sum::<f64>() / period as f64;
    let atr_v = mean(&tr);
    if atr_v == 0.0 {
        return (0.0, 0.0, 0.0);
    }
    let plus_di = 100.0 * mean(&plus_dm) / atr_v;
    let minus_di = 100.0 * mean(&minus_dm) / atr_v;
    let di_sum = plus_di + minus_di;
    if di_sum == 0.0 {
        return (0.0, plus_di, minus_di);
    }
    let dx = 100.0 * (plus_di - minus_di).abs() / di_sum;
    (dx, plus_di, minus_di)
}

fn stochastic(candles: &[Candle], k_period: usize, d_period: usize) -> (f64, f64) {
    if candles.len() < k_period {
        return (50.0, 50.0);
    }
    let k_of = |upto: usize| -> f64 {
        let start = upto.saturating_sub(k_period - 1);
        let window = &candles[start..=upto];
        let hh = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let ll = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        if hh - ll == 0.0 {
            50.0
        } else {
            100.0 * (candles[upto].close - ll) / (hh - ll)
        }
    };
    let last = candles.len() - 1;
    let k = k_of(last);
    let start = last.saturating_sub(d_period - 1);
    let k_values: Vec<f64> = (start..=last).map(k_of).collect();
    let d = k_values.iter().sum::<f64>() / k_values.len() as f64;
    (k, d)
}

fn vwap(closes: &[f64], volumes: &[f64]) -> f64 {
    if closes.is_empty() || closes.len() != volumes.len() {
        return closes.last().copied().unwrap_or(0.0);
    }
    let total_volume: f64 = volumes.iter().sum();
    if total_volume == 0.0 {
        return *closes.last().unwrap();
    }
    closes.iter().zip(volumes).map(|(p, v)| p * v).sum::<f64>() / total_volume
}

/// Percentile rank of `current` within `history`, expressed 0..100.
pub fn percentile_rank(current: f64, history: &[f64]) -> f64 {
    if history.is_empty() {
        return 50.0;
    }
    let below = history.iter().filter(|&&v| v < current).count();
    (below as f64 / history.len() as f64) * 100.0
}

pub fn calculate(candles_5m: &[Candle], atr_history: &[f64]) -> (TechnicalFeatures, f64) {
    if candles_5m.len() < 2 {
        return (TechnicalFeatures::default(), 0.0);
    }
    let closes: Vec<f64> = candles_5m.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = candles_5m.iter().map(|c| c.volume).collect();

    let mut f = TechnicalFeatures::default();
    f.rsi_7 = rsi(&closes, 7);
    f.rsi_14 = rsi(&closes, 14);
    f.ema_9 = ema(&closes, 9);
    f.ema_21 = ema(&closes, 21);
    f.ema_50 = ema(&closes, 50);
    f.ema_200 = ema(&closes, 200);
    (f.macd_line, f.macd_signal, f.macd_histogram) = macd(&closes);
    (f.bb_upper, f.bb_lower, f.bb_position) = bollinger_bands(&closes, 20, 2.0);
    f.atr_14 = atr(candles_5m, 14);
    f.atr_percentile = percentile_rank(f.atr_14, atr_history);
    (f.adx, f.plus_di, f.minus_di) = adx_di(candles_5m, 14);
    (f.stoch_k, f.stoch_d) = stochastic(candles_5m, 14, 3);
    f.vwap = vwap(&closes, &volumes);

    (f, f.atr_14)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_sentinel_when_series_too_short() {
        assert_eq!(rsi(&[1.0, 2.0], 14), 50.0);
    }

    #[test]
    fn ema_converges_toward_flat_series() {
        let prices = vec![100.0; 30];
        assert!((ema(&prices, 9) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn percentile_rank_of_new_high_is_100() {
        let history = vec![1.0, 2.0, 3.0];
        assert_eq!(percentile_rank(10.0, &history), 100.0);
    }
}
