//! REST calls against the exchange.
//!
//! Grounded on `cooprefr-bettersys/rust-backend`'s `reqwest`-based scraper
//! clients (`scrapers/polymarket_api.rs`, `scrapers/dome_rest.rs`): a thin
//! client struct wrapping a shared `reqwest::Client`, one method per
//! endpoint, `anyhow::Context` on every parse step.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::models::{Book, BookLevel, Candle, Funding, Timeframe};

const BASE_URL: &str = "https://fapi.binance.com/fapi/v1";

#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    pub symbol: String,
}

#[derive(Debug, Deserialize)]
struct PremiumIndexResponse {
    #[serde(rename = "lastFundingRate")]
    last_funding_rate: String,
    #[serde(rename = "markPrice")]
    mark_price: String,
    #[serde(rename = "nextFundingTime")]
    next_funding_time: i64,
}

#[derive(Debug, Deserialize)]
struct DepthResponse {
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: String,
}

impl RestClient {
    pub fn new(symbol: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self { http, symbol }
    }

    /// `GET /klines?symbol=...&interval=...&limit=...`. Binance returns
    /// `limit` most-recent candles, oldest first; indices 0,1,2,3,4,5,7,8
    /// are open_time, o, h, l, c, v, quote_volume, trades.
    pub async fn fetch_klines(&self, tf: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        let url = format!(
            "{BASE_URL}/klines?symbol={}&interval={}&limit={limit}",
            self.symbol,
            tf.as_str()
        );
        let raw: Vec<Value> = self
            .http
            .get(&url)
            .send()
            .await
            .context("fetch_klines request")?
            .json()
            .await
            .context("fetch_klines decode")?;

        let mut candles = Vec::with_capacity(raw.len());
        for (idx, row) in raw.iter().enumerate() {
            let arr = row.as_array().context("kline row not an array")?;
            let get_f64 = |i: usize| -> Result<f64> {
                arr.get(i)
                    .and_then(|v| v.as_str().and_then(|s| s.parse::<f64>().ok()).or(v.as_f64()))
                    .with_context(|| format!("kline[{idx}] field {i}"))
            };
            let ts = arr
                .get(0)
                .and_then(Value::as_i64)
                .with_context(|| format!("kline[{idx}] open_time"))?;
            let trades = arr.get(8).and_then(Value::as_u64).unwrap_or(0);
            let closed = idx + 1 < raw.len();
            candles.push(Candle {
                ts,
                open: get_f64(1)?,
                high: get_f64(2)?,
                low: get_f64(3)?,
                close: get_f64(4)?,
                volume: get_f64(5)?,
                quote_volume: get_f64(7)?,
                trades,
                closed,
            });
        }
        Ok(candles)
    }

    /// `GET /premiumIndex`.
    pub async fn fetch_funding(&self) -> Result<Funding> {
        let url = format!("{BASE_URL}/premiumIndex?symbol={}", self.symbol);
        let resp: PremiumIndexResponse = self
            .http
            .get(&url)
            .send()
            .await
            .context("fetch_funding request")?
            .json()
            .await
            .context("fetch_funding decode")?;
        Ok(Funding {
            ts: chrono::Utc::now().timestamp_millis(),
            rate: resp.last_funding_rate.parse().context("funding rate parse")?,
            mark_price: resp.mark_price.parse().context("mark price parse")?,
            next_funding_ts: resp.next_funding_time,
        })
    }

    /// `GET /depth?limit=20`.
    pub async fn fetch_book(&self) -> Result<Book> {
        let url = format!("{BASE_URL}/depth?symbol={}&limit=20", self.symbol);
        let resp: DepthResponse = self
            .http
            .get(&url)
            .send()
            .await
            .context("fetch_book request")?
            .json()
            .await
            .context("fetch_book decode")?;
        let to_levels = |rows: Vec<[String; 2]>| -> Result<Vec<BookLevel>> {
            rows.into_iter()
                .map(|[p, q]| {
                    Ok(BookLevel {
                        price: p.parse().context("book price parse")?,
                        qty: q.parse().context("book qty parse")?,
                    })
                })
                .collect()
        };
        Ok(Book {
            ts: chrono::Utc::now().timestamp_millis(),
            bids: to_levels(resp.bids)?,
            asks: to_levels(resp.asks)?,
        })
    }

    /// `GET /ticker/price` — used by the Verifier's single-call tick.
    pub async fn fetch_price(&self) -> Result<f64> {
        let url = format!("{BASE_URL}/ticker/price?symbol={}", self.symbol);
        let resp: PriceResponse = self
            .http
            .get(&url)
            .send()
            .await
            .context("fetch_price request")?
            .json()
            .await
            .context("fetch_price decode")?;
        resp.price.parse().context("fetch_price parse")
    }
}
