//! Market-Data Assembler.
//!
//! Maintains live per-timeframe candles, a bounded trade queue, the latest
//! book and funding snapshot, and backfills history on startup. Grounded
//! on the reconnect-with-backoff shape of
//! `cooprefr-bettersys/rust-backend`'s `scrapers/polymarket_ws.rs` and
//! `scrapers/dome_websocket.rs`, adapted to a single combined Binance
//! stream instead of a command-driven per-asset subscription.

pub mod rest;
pub mod stream;

use std::collections::VecDeque;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::models::{Book, Candle, Funding, Timeframe, Trade};

const CANDLE_CAPACITY: usize = 500;
const TRADE_CAPACITY: usize = 1000;

/// Bounded, FIFO-evicting snapshot of everything the feature derivation
/// stage needs. Within a timeframe, candle timestamps are non-decreasing
/// and at most one unclosed candle exists, always last.
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    pub candles: [VecDeque<Candle>; 4],
    pub trades: VecDeque<Trade>,
    pub book: Option<Book>,
    pub funding: Option<Funding>,
    pub last_price: f64,
}

impl MarketSnapshot {
    fn tf_index(tf: Timeframe) -> usize {
        match tf {
            Timeframe::M1 => 0,
            Timeframe::M3 => 1,
            Timeframe::M5 => 2,
            Timeframe::M15 => 3,
        }
    }

    pub fn candles(&self, tf: Timeframe) -> &VecDeque<Candle> {
        &self.candles[Self::tf_index(tf)]
    }

    fn candles_mut(&mut self, tf: Timeframe) -> &mut VecDeque<Candle> {
        &mut self.candles[Self::tf_index(tf)]
    }

    pub(crate) fn seed_candles(&mut self, tf: Timeframe, seed: Vec<Candle>) {
        let slot = self.candles_mut(tf);
        slot.clear();
        slot.extend(seed);
        while slot.len() > CANDLE_CAPACITY {
            slot.pop_front();
        }
    }

    pub(crate) fn apply_kline(&mut self, tf: Timeframe, candle: Candle) {
        let slot = self.candles_mut(tf);
        match slot.back_mut() {
            Some(last) if last.ts == candle.ts && !last.closed => {
                *last = candle;
            }
            Some(last) if candle.ts < last.ts => {
                warn!(tf = tf.as_str(), "dropping non-monotone candle");
                return;
            }
            _ => {
                slot.push_back(candle);
                while slot.len() > CANDLE_CAPACITY {
                    slot.pop_front();
                }
            }
        }
        self.last_price = candle.close;
    }

    pub(crate) fn apply_trade(&mut self, trade: Trade) {
        self.trades.push_back(trade);
        while self.trades.len() > TRADE_CAPACITY {
            self.trades.pop_front();
        }
        self.last_price = trade.price;
    }

    pub(crate) fn apply_book(&mut self, book: Book) {
        self.book = Some(book);
    }

    pub(crate) fn apply_funding(&mut self, funding: Funding) {
        self.funding = Some(funding);
    }
}

/// Owns the live `MarketSnapshot` behind a `parking_lot::RwLock` (single
/// writer: the stream task; many readers: the engine tick). Matches the
/// teacher's `BinancePriceFeed` shape (`Arc<RwLock<...>>` + a background
/// `tokio::spawn` consumer task) but widened to klines/trades/book/funding.
pub struct MarketDataAssembler {
    snapshot: RwLock<MarketSnapshot>,
    client: rest::RestClient,
}

impl MarketDataAssembler {
    pub fn new(symbol: String) -> Self {
        Self {
            snapshot: RwLock::new(MarketSnapshot::default()),
            client: rest::RestClient::new(symbol),
        }
    }

    pub fn snapshot(&self) -> MarketSnapshot {
        self.snapshot.read().clone()
    }

    /// Seed per-timeframe candle history plus one book/funding snapshot.
    pub async fn backfill(&self) -> anyhow::Result<()> {
        for tf in Timeframe::ALL {
            let candles = self.client.fetch_klines(tf, CANDLE_CAPACITY).await?;
            self.snapshot.write().seed_candles(tf, candles);
        }
        if let Ok(book) = self.client.fetch_book().await {
            self.snapshot.write().apply_book(book);
        }
        if let Ok(funding) = self.client.fetch_funding().await {
            self.snapshot.write().apply_funding(funding);
        }
        debug!("market data backfill complete");
        Ok(())
    }

    /// Long-running combined-stream consumer. Reconnects with a 5s
    /// back-off on close; never clears state across reconnects.
    pub async fn run(&self) {
        loop {
            match stream::connect_and_consume(&self.client.symbol, &self.snapshot).await {
                Ok(()) => {}
                Err(e) => warn!(error = %e, "market data stream ended"),
            }
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        }
    }
}
