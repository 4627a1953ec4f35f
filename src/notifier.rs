//! Notifier contract: a minimal fire-and-forget outbound sink.
//!
//! Grounded on `cooprefr-bettersys/rust-backend`'s `reqwest`-based outbound calls in
//! `scrapers/polymarket_api.rs`: fire-and-forget POST, failures logged
//! and swallowed, never awaiting a semantic response from the far end.

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, msg: &str);
}

/// Used in tests and `DataSource::Degraded` runs where no chat transport
/// is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _msg: &str) {}
}

pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(http: reqwest::Client, url: String) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, msg: &str) {
        let result = self.http.post(&self.url).json(&json!({ "text": msg })).send().await;
        if let Err(e) = result {
            warn!(error = %e, "notifier webhook send failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_notifier_never_panics() {
        NoopNotifier.send("test").await;
    }
}
