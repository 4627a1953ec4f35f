//! Funding[8] feature group.
//!
//! Grounded on `original_source/bot-core-brain/src/features/funding.py`:
//! current/predicted rate, 8h/24h trend deltas, a percentile over the
//! kept ≤90-reading history, and a funding/price divergence heuristic.

use crate::models::Funding;

use super::technical::percentile_rank;

#[derive(Debug, Clone, Copy, Default)]
pub struct FundingFeatures {
    pub funding_current: f64,
    pub funding_predicted: f64,
    pub funding_trend_8h: f64,
    pub funding_trend_24h: f64,
    pub funding_extreme: f64,
    pub funding_vs_price_div: f64,
    pub time_to_funding: f64,
    pub funding_percentile: f64,
}

impl FundingFeatures {
    pub fn as_slots(&self) -> [f64; 8] {
        [
            self.funding_current,
            self.funding_predicted,
            self.funding_trend_8h,
            self.funding_trend_24h,
            self.funding_extreme,
            self.funding_vs_price_div,
            self.time_to_funding,
            self.funding_percentile,
        ]
    }
}

/// `funding_history`/`price_history` are the last ≤90 8h readings kept by
/// the caller (oldest-first). `now_ms` is the current wall clock.
pub fn calculate(
    funding: Option<&Funding>,
    last_price: f64,
    funding_history: &[f64],
    price_history: &[f64],
    now_ms: i64,
) -> FundingFeatures {
    let mut f = FundingFeatures::default();
    let Some(funding) = funding else {
        f.funding_percentile = 50.0;
        return f;
    };

    f.funding_current = funding.rate;
    f.funding_predicted = funding.rate;
    f.funding_extreme = if funding.rate.abs() > 0.001 { 1.0 } else { 0.0 };
    f.time_to_funding = funding.minutes_to_funding(now_ms);

    if funding_history.len() >= 2 {
        let recent_8h = &funding_history[funding_history.len() - 2..];
        f.funding_trend_8h = recent_8h[1] - recent_8h[0];
        let take_24h = funding_history.len().min(6);
        let recent_24h = &funding_history[funding_history.len() - take_24h..];
        if recent_24h.len() >= 2 {
            f.funding_trend_24h = recent_24h[recent_24h.len() - 1] - recent_24h[0];
        }
    }

    f.funding_percentile = if funding_history.len() > 1 {
        percentile_rank(funding.rate, funding_history)
    } else {
        50.0
    };

    f.funding_vs_price_div = divergence(funding_history, price_history);

    let _ = last_price;
    f
}

fn divergence(funding_history: &[f64], price_history: &[f64]) -> f64 {
    if funding_history.len() < 3 || price_history.len() < 3 {
        return 0.0;
    }
    let rf = &funding_history[funding_history.len() - 3..];
    let rp = &price_history[price_history.len() - 3..];
    let funding_change = rf[2] - rf[0];
    let funding_bullish = funding_change > 0.0;
    if rp[0] == 0.0 {
        return 0.0;
    }
    let price_change = (rp[2] - rp[0]) / rp[0];
    let price_bullish = price_change > 0.0;
    if funding_bullish != price_bullish {
        let magnitude = (funding_change * 1000.0).abs() + (price_change * 100.0).abs();
        if funding_bullish {
            magnitude
        } else {
            -magnitude
        }
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_funding_yields_neutral_percentile() {
        let f = calculate(None, 100.0, &[], &[], 0);
        assert_eq!(f.funding_percentile, 50.0);
    }

    #[test]
    fn extreme_funding_flag_set_above_threshold() {
        let funding = Funding { ts: 0, rate: 0.0015, mark_price: 100.0, next_funding_ts: 60_000 };
        let f = calculate(Some(&funding), 100.0, &[], &[], 0);
        assert_eq!(f.funding_extreme, 1.0);
    }
}
