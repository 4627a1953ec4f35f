//! Feature Derivation.
//!
//! Stateless per-call computation of the 100-slot `FeatureVector` from a
//! `MarketSnapshot`, except for the ring-buffer histories kept here across
//! ticks (ATR-14 and funding percentiles, plus the microstructure/on-chain
//! histories each group's own formula needs). Grounded module-for-module
//! on `original_source/bot-core-brain/src/features/*`.

pub mod funding;
pub mod liquidation;
pub mod microstructure;
pub mod mtf;
pub mod onchain;
pub mod price_action;
pub mod technical;

use std::collections::VecDeque;

use crate::config::Config;
use crate::market_data::MarketSnapshot;
use crate::models::Timeframe;

const ATR_HISTORY_CAPACITY: usize = 720;
const FUNDING_HISTORY_CAPACITY: usize = 90;
const CVD_HISTORY_CAPACITY: usize = 100;
const SPREAD_HISTORY_CAPACITY: usize = 1000;

/// Ring-buffer state carried across Signal Engine ticks. Oldest-evict.
#[derive(Debug, Clone, Default)]
pub struct FeatureHistory {
    atr: VecDeque<f64>,
    funding_rate: VecDeque<f64>,
    funding_price: VecDeque<f64>,
    onchain_flow: VecDeque<f64>,
    cvd: VecDeque<f64>,
    spread: VecDeque<f64>,
}

impl FeatureHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(buf: &mut VecDeque<f64>, value: f64, capacity: usize) {
        buf.push_back(value);
        while buf.len() > capacity {
            buf.pop_front();
        }
    }
}

/// Fixed-length, order-significant feature vector. The vector order is
/// part of the public contract consumed by the classifier.
#[derive(Debug, Clone, Copy)]
pub struct FeatureVector {
    pub technical: technical::TechnicalFeatures,
    pub price_action: price_action::PriceActionFeatures,
    pub mtf: mtf::MtfFeatures,
    pub onchain: onchain::OnchainFeatures,
    pub liquidation: liquidation::LiquidationFeatures,
    pub funding: funding::FundingFeatures,
    pub microstructure: microstructure::MicrostructureFeatures,
}

impl FeatureVector {
    /// Concatenate the eight group vectors in the exact order the
    /// classifier and gates expect: Technical[20], PriceAction[15],
    /// MTF[15], OnChain[20], Liquidation[10], Funding[8], Microstructure[12].
    pub fn to_array(&self) -> [f64; 100] {
        let mut out = [0.0; 100];
        let mut idx = 0;
        let mut extend = |slots: &[f64]| {
            out[idx..idx + slots.len()].copy_from_slice(slots);
            idx += slots.len();
        };
        extend(&self.technical.as_slots());
        extend(&self.price_action.as_slots());
        extend(&self.mtf.as_slots());
        extend(&self.onchain.as_slots());
        extend(&self.liquidation.as_slots());
        extend(&self.funding.as_slots());
        extend(&self.microstructure.as_slots());
        out
    }
}

/// Derive the full feature vector from `snapshot`, updating `history` in
/// place. `http`/`config` drive the live-vs-degraded external groups.
pub async fn derive(
    http: &reqwest::Client,
    config: &Config,
    snapshot: &MarketSnapshot,
    history: &mut FeatureHistory,
    now_ms: i64,
) -> FeatureVector {
    let c5 = snapshot.candles(Timeframe::M5);
    let c5_vec: Vec<_> = c5.iter().copied().collect();
    let c15_vec: Vec<_> = snapshot.candles(Timeframe::M15).iter().copied().collect();
    let c3_vec: Vec<_> = snapshot.candles(Timeframe::M3).iter().copied().collect();
    let c1_vec: Vec<_> = snapshot.candles(Timeframe::M1).iter().copied().collect();

    let atr_history_slice: Vec<f64> = history.atr.iter().copied().collect();
    let (technical, atr_14) = technical::calculate(&c5_vec, &atr_history_slice);
    FeatureHistory::push(&mut history.atr, atr_14, ATR_HISTORY_CAPACITY);

    let price_action = price_action::calculate(&c5_vec);
    let mtf = mtf::calculate(&c15_vec, &c5_vec, &c3_vec, &c1_vec);

    let onchain = onchain::calculate(http, config, &history.onchain_flow.iter().copied().collect::<Vec<_>>()).await;
    FeatureHistory::push(&mut history.onchain_flow, onchain.exchange_netflow, ATR_HISTORY_CAPACITY);

    let liquidation = liquidation::calculate(http, config, snapshot.last_price).await;

    let funding_rate_slice: Vec<f64> = history.funding_rate.iter().copied().collect();
    let funding_price_slice: Vec<f64> = history.funding_price.iter().copied().collect();
    let funding = funding::calculate(
        snapshot.funding.as_ref(),
        snapshot.last_price,
        &funding_rate_slice,
        &funding_price_slice,
        now_ms,
    );
    if let Some(f) = &snapshot.funding {
        FeatureHistory::push(&mut history.funding_rate, f.rate, FUNDING_HISTORY_CAPACITY);
        FeatureHistory::push(&mut history.funding_price, snapshot.last_price, FUNDING_HISTORY_CAPACITY);
    }

    let cvd_slice: Vec<f64> = history.cvd.iter().copied().collect();
    let spread_slice: Vec<f64> = history.spread.iter().copied().collect();
    let microstructure = microstructure::calculate(
        &snapshot.trades,
        snapshot.book.as_ref(),
        snapshot.last_price,
        technical.vwap,
        &cvd_slice,
        &spread_slice,
    );
    FeatureHistory::push(&mut history.cvd, microstructure.cvd, CVD_HISTORY_CAPACITY);
    FeatureHistory::push(&mut history.spread, microstructure.spread_bps, SPREAD_HISTORY_CAPACITY);

    FeatureVector { technical, price_action, mtf, onchain, liquidation, funding, microstructure }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_vector_is_always_length_100_and_finite() {
        let v = FeatureVector {
            technical: technical::TechnicalFeatures::default(),
            price_action: price_action::PriceActionFeatures::default(),
            mtf: mtf::MtfFeatures::default(),
            onchain: onchain::OnchainFeatures::default(),
            liquidation: liquidation::LiquidationFeatures::default(),
            funding: funding::FundingFeatures::default(),
            microstructure: microstructure::MicrostructureFeatures::default(),
        };
        let arr = v.to_array();
        assert_eq!(arr.len(), 100);
        assert!(arr.iter().all(|x| x.is_finite()));
    }
}
