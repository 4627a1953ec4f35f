//! Frozen process configuration, assembled once at startup.
//!
//! Grounded on `cooprefr-bettersys/rust-backend`'s `models::Config::from_env`
//! — env-var lookups happen only here, never scattered through the call
//! graph.

use anyhow::Result;

/// Whether external on-chain / liquidation / funding-percentile providers
/// are live HTTP calls or deterministic sentinel fallbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Live,
    Degraded,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub symbol: String,
    pub database_path: String,

    pub margin: f64,
    pub leverage: u32,
    pub notional: f64,
    pub tp_pct: f64,
    pub sl_pct: f64,

    pub daily_target: f64,
    pub daily_stop: f64,
    pub max_trades: u32,
    pub max_consecutive_losses: u32,
    pub max_hold_min: i64,
    pub cooldown_min: i64,

    pub data_source: DataSource,

    pub ai_confidence_min: f64,
    pub context_min: f64,
    pub regime_conf_min: f64,
    pub exhaustion_max: f64,
    pub structure_min: f64,
    pub setup_min: u32,
    pub mtf_min: u32,
    pub risk_factors_max: u32,

    pub tick_signal_secs: u64,
    pub tick_verifier_secs: u64,
    pub heartbeat_warn_secs: i64,
    pub heartbeat_crit_secs: i64,

    pub notifier_webhook_url: Option<String>,

    /// Live-mode credentials for the OnChain/Liquidation feature groups.
    /// Absence does not force `DataSource::Degraded` — it only starves the
    /// live fetch, which falls back to the same sentinel path.
    pub glassnode_api_key: Option<String>,
    pub coinglass_api_key: Option<String>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let data_source = if env_or("USE_DEGRADED_EXTERNAL_DATA", false) {
            DataSource::Degraded
        } else {
            DataSource::Live
        };

        Ok(Self {
            symbol: std::env::var("SYMBOL").unwrap_or_else(|_| "BTCUSDT".to_string()),
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "./btc_signal_core.db".to_string()),

            margin: env_or("MARGIN", 150.0),
            leverage: env_or("LEVERAGE", 20),
            notional: env_or("NOTIONAL", 3000.0),
            tp_pct: env_or("TP_PCT", 0.005),
            sl_pct: env_or("SL_PCT", 0.0025),

            daily_target: env_or("DAILY_TARGET", 10.0),
            daily_stop: env_or("DAILY_STOP", -15.0),
            max_trades: env_or("MAX_TRADES", 3),
            max_consecutive_losses: env_or("MAX_CONSECUTIVE_LOSSES", 2),
            max_hold_min: env_or("MAX_HOLD_MIN", 240),
            cooldown_min: env_or("COOLDOWN_MIN", 60),

            data_source,

            ai_confidence_min: env_or("AI_CONFIDENCE_MIN", 0.65),
            context_min: env_or("CONTEXT_MIN", 0.5),
            regime_conf_min: env_or("REGIME_CONF_MIN", 0.65),
            exhaustion_max: env_or("EXHAUSTION_MAX", 0.5),
            structure_min: env_or("STRUCTURE_MIN", 0.6),
            setup_min: env_or("SETUP_MIN", 70),
            mtf_min: env_or("MTF_MIN", 2),
            risk_factors_max: env_or("RISK_FACTORS_MAX", 1),

            tick_signal_secs: env_or("TICK_SIGNAL_SECS", 60),
            tick_verifier_secs: env_or("TICK_VERIFIER_SECS", 30),
            heartbeat_warn_secs: env_or("HEARTBEAT_WARN_SECS", 180),
            heartbeat_crit_secs: env_or("HEARTBEAT_CRIT_SECS", 600),

            notifier_webhook_url: std::env::var("NOTIFIER_WEBHOOK_URL").ok(),

            glassnode_api_key: std::env::var("GLASSNODE_API_KEY").ok(),
            coinglass_api_key: std::env::var("COINGLASS_API_KEY").ok(),
        })
    }
}
