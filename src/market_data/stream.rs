//! Combined Binance futures WebSocket stream.
//!
//! Subscribes to `kline_{tf}` for each timeframe, aggregate trades, top-20
//! depth at 100ms, and mark-price at 1s on one combined stream, dispatching
//! on the `"e"` event-type field. Grounded on the reconnect/idle-timeout
//! shape of `cooprefr-bettersys/rust-backend`'s `scrapers/polymarket_ws.rs`
//! and `scrapers/dome_websocket.rs` (ping interval + `tokio::select!` over
//! the read half and a timer).

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use parking_lot::RwLock;
use serde_json::Value;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::models::{Book, BookLevel, Candle, Funding, Timeframe, Trade};

use super::MarketSnapshot;

const BASE_WS_URL: &str = "wss://fstream.binance.com/stream?streams=";
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

fn combined_stream_path(symbol: &str) -> String {
    let sym = symbol.to_lowercase();
    let mut streams = vec![
        format!("{sym}@aggTrade"),
        format!("{sym}@depth20@100ms"),
        format!("{sym}@markPrice@1s"),
    ];
    for tf in Timeframe::ALL {
        streams.push(format!("{sym}@kline_{}", tf.as_str()));
    }
    format!("{BASE_WS_URL}{}", streams.join("/"))
}

fn timeframe_from_interval(interval: &str) -> Option<Timeframe> {
    Timeframe::ALL.into_iter().find(|tf| tf.as_str() == interval)
}

/// Connect once, consume until the socket closes or idles past
/// `IDLE_TIMEOUT` with no liveness response. Callers reconnect with their
/// own back-off; this function never clears `snapshot` state.
pub async fn connect_and_consume(symbol: &str, snapshot: &RwLock<MarketSnapshot>) -> Result<()> {
    let url = combined_stream_path(symbol);
    let (ws, _resp) = connect_async(&url).await.context("connect_async market stream")?;
    debug!(url = %url, "market data stream connected");

    let (mut write, mut read) = ws.split();

    loop {
        let next = tokio::time::timeout(IDLE_TIMEOUT, read.next()).await;
        let msg = match next {
            Ok(Some(Ok(msg))) => msg,
            Ok(Some(Err(e))) => return Err(e).context("market stream read error"),
            Ok(None) => return Ok(()), // stream closed; caller reconnects
            Err(_) => {
                // idle timeout: send a liveness probe, keep waiting
                use futures_util::SinkExt;
                write
                    .send(Message::Ping(Vec::new()))
                    .await
                    .context("market stream ping")?;
                continue;
            }
        };

        match msg {
            Message::Text(text) => {
                if let Err(e) = handle_message(&text, snapshot) {
                    warn!(error = %e, "failed to handle market stream message");
                }
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Ok(()),
            _ => {}
        }
    }
}

fn handle_message(text: &str, snapshot: &RwLock<MarketSnapshot>) -> Result<()> {
    let envelope: Value = serde_json::from_str(text).context("parse stream envelope")?;
    let payload = envelope.get("data").unwrap_or(&envelope);
    let event = payload.get("e").and_then(Value::as_str).unwrap_or("");

    match event {
        "kline" => handle_kline(payload, snapshot),
        "aggTrade" => handle_trade(payload, snapshot),
        "depthUpdate" => handle_depth(payload, snapshot),
        "markPriceUpdate" => handle_mark_price(payload, snapshot),
        _ => Ok(()),
    }
}

fn parse_f64(v: &Value) -> Option<f64> {
    v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_f64())
}

fn handle_kline(payload: &Value, snapshot: &RwLock<MarketSnapshot>) -> Result<()> {
    let k = payload.get("k").context("kline payload missing k")?;
    let interval = k.get("i").and_then(Value::as_str).context("kline interval")?;
    let Some(tf) = timeframe_from_interval(interval) else {
        return Ok(());
    };
    let candle = Candle {
        ts: k.get("t").and_then(Value::as_i64).context("kline open time")?,
        open: parse_f64(k.get("o").context("kline open")?).context("kline open parse")?,
        high: parse_f64(k.get("h").context("kline high")?).context("kline high parse")?,
        low: parse_f64(k.get("l").context("kline low")?).context("kline low parse")?,
        close: parse_f64(k.get("c").context("kline close")?).context("kline close parse")?,
        volume: parse_f64(k.get("v").context("kline volume")?).context("kline volume parse")?,
        quote_volume: parse_f64(k.get("q").context("kline quote volume")?)
            .context("kline quote volume parse")?,
        trades: k.get("n").and_then(Value::as_u64).unwrap_or(0),
        closed: k.get("x").and_then(Value::as_bool).unwrap_or(false),
    };
    snapshot.write().apply_kline(tf, candle);
    Ok(())
}

fn handle_trade(payload: &Value, snapshot: &RwLock<MarketSnapshot>) -> Result<()> {
    let trade = Trade {
        ts: payload.get("T").and_then(Value::as_i64).context("trade ts")?,
        price: parse_f64(payload.get("p").context("trade price")?).context("trade price parse")?,
        qty: parse_f64(payload.get("q").context("trade qty")?).context("trade qty parse")?,
        buyer_is_maker: payload.get("m").and_then(Value::as_bool).unwrap_or(false),
    };
    snapshot.write().apply_trade(trade);
    Ok(())
}

fn handle_depth(payload: &Value, snapshot: &RwLock<MarketSnapshot>) -> Result<()> {
    let to_levels = |key: &str| -> Result<Vec<BookLevel>> {
        payload
            .get(key)
            .and_then(Value::as_array)
            .context("depth levels")?
            .iter()
            .filter_map(|lvl| {
                let arr = lvl.as_array()?;
                let price = parse_f64(arr.first()?)?;
                let qty = parse_f64(arr.get(1)?)?;
                Some(Ok(BookLevel { price, qty }))
            })
            .collect()
    };
    let book = Book {
        ts: payload
            .get("E")
            .and_then(Value::as_i64)
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
        bids: to_levels("b")?,
        asks: to_levels("a")?,
    };
    snapshot.write().apply_book(book);
    Ok(())
}

fn handle_mark_price(payload: &Value, snapshot: &RwLock<MarketSnapshot>) -> Result<()> {
    let funding = Funding {
        ts: payload
            .get("E")
            .and_then(Value::as_i64)
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
        rate: parse_f64(payload.get("r").context("mark price funding rate")?)
            .context("funding rate parse")?,
        mark_price: parse_f64(payload.get("p").context("mark price")?).context("mark price parse")?,
        next_funding_ts: payload.get("T").and_then(Value::as_i64).unwrap_or(0),
    };
    snapshot.write().apply_funding(funding);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_stream_path_includes_all_timeframes() {
        let path = combined_stream_path("BTCUSDT");
        assert!(path.contains("btcusdt@kline_1m"));
        assert!(path.contains("btcusdt@kline_15m"));
        assert!(path.contains("btcusdt@aggTrade"));
        assert!(path.contains("btcusdt@depth20@100ms"));
        assert!(path.contains("btcusdt@markPrice@1s"));
    }

    #[test]
    fn kline_event_updates_snapshot() {
        let snapshot = RwLock::new(MarketSnapshot::default());
        let payload = serde_json::json!({
            "e": "kline",
            "k": {
                "t": 1_000_i64,
                "o": "100.0",
                "h": "101.0",
                "l": "99.0",
                "c": "100.5",
                "v": "10.0",
                "q": "1000.0",
                "n": 5,
                "i": "1m",
                "x": true,
            }
        });
        handle_message(&payload.to_string(), &snapshot).unwrap();
        let snap = snapshot.read();
        assert_eq!(snap.candles(Timeframe::M1).len(), 1);
        assert_eq!(snap.last_price, 100.5);
    }
}
