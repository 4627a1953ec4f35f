//! OnChain[20] feature group.
//!
//! Grounded on `original_source/bot-core-brain/src/features/onchain.py`:
//! live mode pulls a handful of Glassnode metrics (exchange transfer
//! counts, active addresses, SOPR, miner reserve, exchange balance) and
//! derives flow/whale composites from them; degraded mode emits the
//! same fixed midpoints the source's mock path documents.

use anyhow::Result;
use serde_json::Value;

use crate::config::{Config, DataSource};

#[derive(Debug, Clone, Copy, Default)]
pub struct OnchainFeatures {
    pub exchange_inflow: f64,
    pub exchange_outflow: f64,
    pub exchange_netflow: f64,
    pub flow_velocity: f64,
    pub flow_percentile: f64,
    pub large_tx_count: f64,
    pub whale_accumulation: f64,
    pub whale_distribution: f64,
    pub smart_money_flow: f64,
    pub whale_activity_score: f64,
    pub miner_reserve: f64,
    pub miner_outflow: f64,
    pub hash_rate_trend: f64,
    pub active_addresses: f64,
    pub transaction_count: f64,
    pub nvt_ratio: f64,
    pub sopr: f64,
    pub puell_multiple: f64,
    pub supply_on_exchange: f64,
    pub stablecoin_supply_ratio: f64,
}

impl OnchainFeatures {
    pub fn as_slots(&self) -> [f64; 20] {
        [
            self.exchange_inflow,
            self.exchange_outflow,
            self.exchange_netflow,
            self.flow_velocity,
            self.flow_percentile,
            self.large_tx_count,
            self.whale_accumulation,
            self.whale_distribution,
            self.smart_money_flow,
            self.whale_activity_score,
            self.miner_reserve,
            self.miner_outflow,
            self.hash_rate_trend,
            self.active_addresses,
            self.transaction_count,
            self.nvt_ratio,
            self.sopr,
            self.puell_multiple,
            self.supply_on_exchange,
            self.stablecoin_supply_ratio,
        ]
    }

    fn degraded() -> Self {
        Self {
            exchange_inflow: 10_000.0,
            exchange_outflow: 9_000.0,
            exchange_netflow: 1_000.0,
            flow_velocity: 0.0,
            flow_percentile: 50.0,
            large_tx_count: 100.0,
            whale_accumulation: 50.0,
            whale_distribution: 50.0,
            smart_money_flow: 0.0,
            whale_activity_score: 50.0,
            miner_reserve: 1_800_000.0,
            miner_outflow: 0.0,
            hash_rate_trend: 0.0,
            active_addresses: 1_000_000.0,
            transaction_count: 300_000.0,
            nvt_ratio: 60.0,
            sopr: 1.0,
            puell_multiple: 1.0,
            supply_on_exchange: 2_300_000.0,
            stablecoin_supply_ratio: 5.0,
        }
    }
}

async fn glassnode_metric(http: &reqwest::Client, api_key: &str, metric: &str) -> Result<Option<f64>> {
    let url = format!("https://api.glassnode.com/v1/metrics/{metric}");
    let rows: Vec<Value> = http.get(&url).query(&[("a", "BTC"), ("api_key", api_key), ("i", "24h")]).send().await?.json().await?;
    Ok(rows.last().and_then(|row| row.get("v")).and_then(Value::as_f64))
}

fn whale_activity_score(large_tx_count: f64, accumulation: f64, distribution: f64) -> f64 {
    let mut score = 50.0;
    if large_tx_count > 100.0 {
        score += 10.0;
    } else if large_tx_count < 20.0 {
        score -= 10.0;
    }
    let net_whale = accumulation - distribution;
    if net_whale > 0.0 {
        score += (net_whale * 2.0).min(20.0);
    } else {
        score -= (net_whale.abs() * 2.0).min(20.0);
    }
    score.clamp(0.0, 100.0)
}

async fn fetch_live(http: &reqwest::Client, api_key: &str, flow_history: &[f64]) -> Result<OnchainFeatures> {
    let mut f = OnchainFeatures::degraded();

    if let Some(inflow) = glassnode_metric(http, api_key, "transactions/transfers_to_exchanges_count").await? {
        f.exchange_inflow = inflow;
    }
    if let Some(outflow) = glassnode_metric(http, api_key, "transactions/transfers_from_exchanges_count").await? {
        f.exchange_outflow = outflow;
    }
    f.exchange_netflow = f.exchange_inflow - f.exchange_outflow;

    if let Some(active) = glassnode_metric(http, api_key, "addresses/active_count").await? {
        f.active_addresses = active;
    }
    if let Some(tx_count) = glassnode_metric(http, api_key, "transactions/count").await? {
        f.transaction_count = tx_count;
    }
    if let Some(sopr) = glassnode_metric(http, api_key, "indicators/sopr").await? {
        f.sopr = sopr;
    }
    if let Some(reserve) = glassnode_metric(http, api_key, "mining/balance").await? {
        f.miner_reserve = reserve;
    }
    if let Some(supply) = glassnode_metric(http, api_key, "distribution/balance_exchanges").await? {
        f.supply_on_exchange = supply;
    }

    f.flow_percentile = if flow_history.is_empty() {
        50.0
    } else {
        super::technical::percentile_rank(f.exchange_netflow, flow_history)
    };
    if let Some(&prev) = flow_history.last() {
        f.flow_velocity = f.exchange_netflow - prev;
    }

    f.whale_activity_score = whale_activity_score(f.large_tx_count, f.whale_accumulation, f.whale_distribution);
    Ok(f)
}

/// `flow_history` is the caller-owned ≤720-reading ring buffer of past
/// `exchange_netflow` values, mirroring the ATR history's role.
pub async fn calculate(http: &reqwest::Client, config: &Config, flow_history: &[f64]) -> OnchainFeatures {
    if config.data_source == DataSource::Degraded {
        return OnchainFeatures::degraded();
    }
    let Some(api_key) = &config.glassnode_api_key else {
        return OnchainFeatures::degraded();
    };
    fetch_live(http, api_key, flow_history).await.unwrap_or_else(|_| OnchainFeatures::degraded())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whale_score_is_clamped() {
        assert_eq!(whale_activity_score(200.0, 100.0, 0.0), 100.0);
        assert_eq!(whale_activity_score(0.0, 0.0, 100.0), 30.0);
    }

    #[test]
    fn degraded_sentinel_all_finite() {
        let f = OnchainFeatures::degraded();
        for v in f.as_slots() {
            assert!(v.is_finite());
        }
    }
}
