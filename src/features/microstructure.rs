//! Microstructure[12] feature group.
//!
//! Grounded on `original_source/bot-core-brain/src/features/microstructure.py`:
//! CVD over the live trade queue, full and top-10 book imbalance, a
//! rolling spread-percentile history, and a POC computed from a
//! round-to-nearest-$10 volume profile of recent trades.

use std::collections::{HashMap, VecDeque};

use crate::models::{Book, Trade};

use super::technical::percentile_rank;

#[derive(Debug, Clone, Copy, Default)]
pub struct MicrostructureFeatures {
    pub cvd: f64,
    pub cvd_trend: f64,
    pub orderbook_imbalance: f64,
    pub orderbook_imbalance_10: f64,
    pub large_order_flow: f64,
    pub tape_speed: f64,
    pub aggressor_ratio: f64,
    pub spread_bps: f64,
    pub spread_percentile: f64,
    pub depth_ratio: f64,
    pub vwap_distance: f64,
    pub poc_distance: f64,
}

impl MicrostructureFeatures {
    pub fn as_slots(&self) -> [f64; 12] {
        [
            self.cvd,
            self.cvd_trend,
            self.orderbook_imbalance,
            self.orderbook_imbalance_10,
            self.large_order_flow,
            self.tape_speed,
            self.aggressor_ratio,
            self.spread_bps,
            self.spread_percentile,
            self.depth_ratio,
            self.vwap_distance,
            self.poc_distance,
        ]
    }
}

const LARGE_ORDER_THRESHOLD: f64 = 100_000.0;
const PROFILE_BIN: f64 = 10.0;

fn cvd(trades: &VecDeque<Trade>) -> f64 {
    trades.iter().map(|t| if t.is_buy() { t.notional() } else { -t.notional() }).sum()
}

fn cvd_trend(cvd_history: &[f64]) -> f64 {
    if cvd_history.len() < 10 {
        return 0.0;
    }
    let recent = &cvd_history[cvd_history.len() - 10..];
    if recent[0] == 0.0 {
        0.0
    } else {
        (recent[recent.len() - 1] - recent[0]) / recent[0].abs()
    }
}

fn orderbook_imbalance(book: &Book) -> (f64, f64) {
    let notional = |levels: &[crate::models::BookLevel]| -> f64 { levels.iter().map(|l| l.price * l.qty).sum() };
    let total_bid = notional(&book.bids);
    let total_ask = notional(&book.asks);
    let total = total_bid + total_ask;
    let full = if total > 0.0 { (total_bid - total_ask) / total } else { 0.0 };

    let bid_10 = notional(&book.bids.iter().take(10).copied().collect::<Vec<_>>());
    let ask_10 = notional(&book.asks.iter().take(10).copied().collect::<Vec<_>>());
    let total_10 = bid_10 + ask_10;
    let top10 = if total_10 > 0.0 { (bid_10 - ask_10) / total_10 } else { 0.0 };
    (full, top10)
}

fn depth_ratio(book: &Book, price_range_pct: f64) -> f64 {
    let Some(mid) = book.mid() else { return 0.0 };
    let up = mid * (1.0 + price_range_pct);
    let down = mid * (1.0 - price_range_pct);
    let bid_depth: f64 = book.bids.iter().filter(|l| l.price >= down).map(|l| l.qty).sum();
    let ask_depth: f64 = book.asks.iter().filter(|l| l.price <= up).map(|l| l.qty).sum();
    let total_bid: f64 = book.bids.iter().map(|l| l.qty).sum();
    let total_ask: f64 = book.asks.iter().map(|l| l.qty).sum();
    let total = total_bid + total_ask;
    if total == 0.0 {
        0.0
    } else {
        (bid_depth + ask_depth) / total
    }
}

fn point_of_control(trades: &VecDeque<Trade>) -> f64 {
    let mut profile: HashMap<i64, f64> = HashMap::new();
    for t in trades {
        let level = (t.price / PROFILE_BIN).round() as i64;
        *profile.entry(level).or_insert(0.0) += t.notional();
    }
    profile
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(level, _)| level as f64 * PROFILE_BIN)
        .unwrap_or(0.0)
}

/// `cvd_history`/`spread_history` are caller-owned ring buffers (≤100
/// and ≤1000 samples respectively, per the source).
pub fn calculate(
    trades: &VecDeque<Trade>,
    book: Option<&Book>,
    last_price: f64,
    vwap: f64,
    cvd_history: &[f64],
    spread_history: &[f64],
) -> MicrostructureFeatures {
    let mut f = MicrostructureFeatures { aggressor_ratio: 0.5, spread_percentile: 50.0, ..Default::default() };

    f.cvd = cvd(trades);
    f.cvd_trend = cvd_trend(cvd_history);

    if let Some(book) = book {
        (f.orderbook_imbalance, f.orderbook_imbalance_10) = orderbook_imbalance(book);
        f.spread_bps = book.spread_bps().unwrap_or(0.0);
        f.depth_ratio = depth_ratio(book, 0.001);
    }

    f.large_order_flow = trades.iter().map(|t| t.notional()).filter(|&n| n >= LARGE_ORDER_THRESHOLD).sum();
    f.tape_speed = trades.len() as f64;
    if !trades.is_empty() {
        f.aggressor_ratio = trades.iter().filter(|t| t.is_buy()).count() as f64 / trades.len() as f64;
    }

    f.spread_percentile = if spread_history.len() < 2 { 50.0 } else { percentile_rank(f.spread_bps, spread_history) };

    f.vwap_distance = if vwap != 0.0 { (last_price - vwap) / vwap } else { 0.0 };

    let poc = point_of_control(trades);
    f.poc_distance = if poc > 0.0 && last_price > 0.0 { (last_price - poc) / last_price } else { 0.0 };

    f
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Trade;

    fn trade(price: f64, qty: f64, is_buy: bool) -> Trade {
        Trade { ts: 0, price, qty, buyer_is_maker: !is_buy }
    }

    #[test]
    fn cvd_nets_buy_and_sell_notional() {
        let mut trades = VecDeque::new();
        trades.push_back(trade(100.0, 1.0, true));
        trades.push_back(trade(100.0, 1.0, false));
        assert_eq!(cvd(&trades), 0.0);
    }

    #[test]
    fn aggressor_ratio_defaults_to_half_with_no_trades() {
        let f = calculate(&VecDeque::new(), None, 0.0, 0.0, &[], &[]);
        assert_eq!(f.aggressor_ratio, 0.5);
    }
}
