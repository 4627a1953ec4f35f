//! Liquidation[10] feature group.
//!
//! Grounded on `original_source/bot-core-brain/src/features/liquidation.py`:
//! live mode fetches a liquidation heatmap from Coinglass and derives
//! density/distance/imbalance/cascade-risk from it; degraded mode emits
//! fixed sentinels in the same realistic ranges the source's mock path
//! documents, preserving determinism.

use anyhow::Result;
use serde::Deserialize;

use crate::config::{Config, DataSource};

#[derive(Debug, Clone, Copy, Default)]
pub struct LiquidationFeatures {
    pub long_liq_density_1pct: f64,
    pub long_liq_density_2pct: f64,
    pub short_liq_density_1pct: f64,
    pub short_liq_density_2pct: f64,
    pub distance_to_long_liq: f64,
    pub distance_to_short_liq: f64,
    pub liq_imbalance: f64,
    pub recent_liq_volume_1h: f64,
    pub recent_liq_volume_24h: f64,
    pub liq_cascade_risk: f64,
}

impl LiquidationFeatures {
    pub fn as_slots(&self) -> [f64; 10] {
        [
            self.long_liq_density_1pct,
            self.long_liq_density_2pct,
            self.short_liq_density_1pct,
            self.short_liq_density_2pct,
            self.distance_to_long_liq,
            self.distance_to_short_liq,
            self.liq_imbalance,
            self.recent_liq_volume_1h,
            self.recent_liq_volume_24h,
            self.liq_cascade_risk,
        ]
    }

    /// Degraded-mode sentinel path. Fixed, not randomized, so repeated
    /// calls on identical inputs stay bit-stable.
    fn degraded() -> Self {
        Self {
            long_liq_density_1pct: 6_000_000.0,
            long_liq_density_2pct: 12_000_000.0,
            short_liq_density_1pct: 6_000_000.0,
            short_liq_density_2pct: 12_000_000.0,
            distance_to_long_liq: 0.015,
            distance_to_short_liq: 0.015,
            liq_imbalance: 0.0,
            recent_liq_volume_1h: 15_000_000.0,
            recent_liq_volume_24h: 300_000_000.0,
            liq_cascade_risk: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LiqLevel {
    price: f64,
    volume: f64,
    is_long: bool,
}

#[derive(Deserialize)]
struct HeatmapResponse {
    success: bool,
    data: Vec<HeatmapRow>,
}

#[derive(Deserialize)]
struct HeatmapRow {
    price: f64,
    volume: f64,
    side: String,
}

fn density(levels: &[LiqLevel], price: f64, long_side: bool, pct: f64) -> f64 {
    if price == 0.0 {
        return 0.0;
    }
    levels
        .iter()
        .filter(|l| {
            if long_side {
                l.is_long && l.price >= price * (1.0 - pct) && l.price < price
            } else {
                !l.is_long && l.price <= price * (1.0 + pct) && l.price > price
            }
        })
        .map(|l| l.volume)
        .sum()
}

fn nearest_zone(levels: &[LiqLevel], price: f64, long_side: bool, min_volume: f64) -> f64 {
    if price == 0.0 {
        return 0.0;
    }
    let relevant: Vec<&LiqLevel> = levels
        .iter()
        .filter(|l| {
            l.volume >= min_volume && if long_side { l.is_long && l.price < price } else { !l.is_long && l.price > price }
        })
        .collect();
    if relevant.is_empty() {
        return 0.1;
    }
    if long_side {
        let nearest = relevant.iter().max_by(|a, b| a.price.partial_cmp(&b.price).unwrap()).unwrap();
        (price - nearest.price) / price
    } else {
        let nearest = relevant.iter().min_by(|a, b| a.price.partial_cmp(&b.price).unwrap()).unwrap();
        (nearest.price - price) / price
    }
}

fn cascade_risk(f: &LiquidationFeatures) -> f64 {
    let mut risk = 0.0;
    if f.long_liq_density_1pct > 10_000_000.0 {
        risk += 0.2;
    }
    if f.short_liq_density_1pct > 10_000_000.0 {
        risk += 0.2;
    }
    risk += if f.distance_to_long_liq < 0.01 {
        0.3
    } else if f.distance_to_long_liq < 0.02 {
        0.15
    } else {
        0.0
    };
    risk += if f.distance_to_short_liq < 0.01 {
        0.3
    } else if f.distance_to_short_liq < 0.02 {
        0.15
    } else {
        0.0
    };
    risk.min(1.0)
}

async fn fetch_live(http: &reqwest::Client, api_key: &str, price: f64) -> Result<LiquidationFeatures> {
    let resp: HeatmapResponse = http
        .get("https://open-api.coinglass.com/public/v2/liquidation_heatmap")
        .header("coinglassSecret", api_key)
        .query(&[("symbol", "BTC")])
        .send()
        .await?
        .json()
        .await?;
    if !resp.success || resp.data.is_empty() {
        return Ok(LiquidationFeatures::degraded());
    }
    let levels: Vec<LiqLevel> =
        resp.data.into_iter().map(|r| LiqLevel { price: r.price, volume: r.volume, is_long: r.side == "long" }).collect();

    let mut f = LiquidationFeatures {
        long_liq_density_1pct: density(&levels, price, true, 0.01),
        long_liq_density_2pct: density(&levels, price, true, 0.02),
        short_liq_density_1pct: density(&levels, price, false, 0.01),
        short_liq_density_2pct: density(&levels, price, false, 0.02),
        distance_to_long_liq: nearest_zone(&levels, price, true, 1_000_000.0),
        distance_to_short_liq: nearest_zone(&levels, price, false, 1_000_000.0),
        ..Default::default()
    };
    let long_volume: f64 = levels.iter().filter(|l| l.is_long).map(|l| l.volume).sum();
    let short_volume: f64 = levels.iter().filter(|l| !l.is_long).map(|l| l.volume).sum();
    let total = long_volume + short_volume;
    f.liq_imbalance = if total > 0.0 { (long_volume - short_volume) / total } else { 0.0 };
    f.liq_cascade_risk = cascade_risk(&f);
    Ok(f)
}

pub async fn calculate(http: &reqwest::Client, config: &Config, price: f64) -> LiquidationFeatures {
    if config.data_source == DataSource::Degraded {
        return LiquidationFeatures::degraded();
    }
    let Some(api_key) = &config.coinglass_api_key else {
        return LiquidationFeatures::degraded();
    };
    fetch_live(http, api_key, price).await.unwrap_or_else(|_| LiquidationFeatures::degraded())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_sentinel_is_finite_and_in_documented_range() {
        let f = LiquidationFeatures::degraded();
        assert!(f.liq_cascade_risk >= 0.0 && f.liq_cascade_risk <= 1.0);
        assert!(f.long_liq_density_1pct.is_finite());
    }
}
