//! Configuration loading from environment.

use std::env;
use std::time::Duration;

use crowdfund_hex::AggregateStrategy;

/// Which gateway adapters to wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    /// In-process simulated gateways; no network traffic.
    Simulated,
    /// Real HTTP adapters; requires the gateway credentials below.
    Live,
}

impl std::str::FromStr for GatewayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simulated" => Ok(GatewayMode::Simulated),
            "live" => Ok(GatewayMode::Live),
            _ => Err(format!("Unknown gateway mode: {}", s)),
        }
    }
}

/// Application configuration.
pub struct Config {
    pub database_url: String,
    pub reconcile_interval: Duration,
    pub aggregate_strategy: AggregateStrategy,
    pub gateway_mode: GatewayMode,
    pub gateway_timeout: Duration,
    pub callback_url: String,
    pub card_base_url: Option<String>,
    pub card_secret: Option<String>,
    pub momo_base_url: Option<String>,
    pub momo_secret: Option<String>,
    pub simulated_secret: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let reconcile_interval = Duration::from_secs(
            env::var("RECONCILE_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
        );

        let aggregate_strategy = env::var("AGGREGATE_STRATEGY")
            .unwrap_or_else(|_| "incremental".to_string())
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        let gateway_mode = env::var("GATEWAY_MODE")
            .unwrap_or_else(|_| "simulated".to_string())
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        let gateway_timeout = Duration::from_secs(
            env::var("GATEWAY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
        );

        let callback_url = env::var("GATEWAY_CALLBACK_URL")
            .unwrap_or_else(|_| "http://localhost:3000/callbacks/payments".to_string());

        let config = Self {
            database_url,
            reconcile_interval,
            aggregate_strategy,
            gateway_mode,
            gateway_timeout,
            callback_url,
            card_base_url: env::var("CARD_GATEWAY_URL").ok(),
            card_secret: env::var("CARD_GATEWAY_SECRET").ok(),
            momo_base_url: env::var("MOMO_GATEWAY_URL").ok(),
            momo_secret: env::var("MOMO_GATEWAY_SECRET").ok(),
            simulated_secret: env::var("SIMULATED_GATEWAY_SECRET")
                .unwrap_or_else(|_| "simulated-secret".to_string()),
        };

        if config.gateway_mode == GatewayMode::Live {
            if config.card_base_url.is_none() || config.card_secret.is_none() {
                anyhow::bail!("CARD_GATEWAY_URL and CARD_GATEWAY_SECRET are required in live mode");
            }
            if config.momo_base_url.is_none() || config.momo_secret.is_none() {
                anyhow::bail!("MOMO_GATEWAY_URL and MOMO_GATEWAY_SECRET are required in live mode");
            }
        }

        Ok(config)
    }
}
