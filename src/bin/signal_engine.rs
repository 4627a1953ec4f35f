//! Signal Engine process entry point: backfills market data, then drives
//! the fixed-tick decision loop (C6) against the shared Durable Store.

use std::sync::Arc;

use anyhow::{Context, Result};
use btc_signal_core::config::Config;
use btc_signal_core::engine::SignalEngine;
use btc_signal_core::market_data::MarketDataAssembler;
use btc_signal_core::notifier::{NoopNotifier, Notifier, WebhookNotifier};
use btc_signal_core::store::Store;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "btc_signal_core=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_notifier(config: &Config) -> Box<dyn Notifier> {
    match &config.notifier_webhook_url {
        Some(url) => Box::new(WebhookNotifier::new(reqwest::Client::new(), url.clone())),
        None => Box::new(NoopNotifier),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("load config")?;
    info!(symbol = %config.symbol, "signal engine starting");

    let store = Store::open(&config.database_path).context("open durable store")?;
    let notifier = build_notifier(&config);
    let assembler = Arc::new(MarketDataAssembler::new(config.symbol.clone()));

    assembler.backfill().await.context("market data backfill")?;
    info!("market data backfill complete");

    let assembler_for_stream = assembler.clone();
    tokio::spawn(async move {
        assembler_for_stream.run().await;
    });

    let mut engine = SignalEngine::new(config, store, notifier);
    engine.run(&assembler).await;

    Ok(())
}
