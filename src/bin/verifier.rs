//! Verifier process entry point: drives the fixed-tick Signal Tracker
//! (C7), Daily Budget (C8), and Quality Scorer (C9) against the shared
//! Durable Store.

use anyhow::{Context, Result};
use btc_signal_core::config::Config;
use btc_signal_core::notifier::{NoopNotifier, Notifier, WebhookNotifier};
use btc_signal_core::store::Store;
use btc_signal_core::tracker::SignalTracker;
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
    info!(symbol = %config.symbol, "verifier starting");

    let store = Store::open(&config.database_path).context("open durable store")?;
    let notifier = build_notifier(&config);

    let mut tracker = SignalTracker::new(config, store, notifier);
    tracker.run().await;

    Ok(())
}
