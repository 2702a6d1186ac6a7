//! # Crowdfund Ledger
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository adapter
//! - Construct the gateway registry and donation service
//! - Run the periodic aggregate reconciliation sweep

mod config;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crowdfund_gateways::{
    CardGateway, GatewayConfig, MobileMoneyGateway, SimulatedBehavior, SimulatedGateway,
};
use crowdfund_hex::DonationService;
use crowdfund_repo::build_repo;
use crowdfund_types::{GatewayKind, GatewayRegistry, PaymentGateway};

use config::{Config, GatewayMode};

fn build_gateways(config: &Config) -> anyhow::Result<GatewayRegistry> {
    match config.gateway_mode {
        GatewayMode::Simulated => Ok(GatewayRegistry::new()
            .register(Arc::new(SimulatedGateway::new(
                GatewayKind::Card,
                SimulatedBehavior::Approve,
                config.simulated_secret.clone(),
            )) as Arc<dyn PaymentGateway>)
            .register(Arc::new(SimulatedGateway::new(
                GatewayKind::MobileMoney,
                SimulatedBehavior::Pend,
                config.simulated_secret.clone(),
            )) as Arc<dyn PaymentGateway>)),
        GatewayMode::Live => {
            // Presence of the credentials was validated at config load.
            let card_cfg = GatewayConfig::new(
                config.card_base_url.clone().unwrap_or_default(),
                config.card_secret.clone().unwrap_or_default(),
                config.callback_url.clone(),
            )
            .with_timeout(config.gateway_timeout);

            let momo_cfg = GatewayConfig::new(
                config.momo_base_url.clone().unwrap_or_default(),
                config.momo_secret.clone().unwrap_or_default(),
                config.callback_url.clone(),
            )
            .with_timeout(config.gateway_timeout);

            Ok(GatewayRegistry::new()
                .register(Arc::new(CardGateway::new(card_cfg)?) as Arc<dyn PaymentGateway>)
                .register(
                    Arc::new(MobileMoneyGateway::new(momo_cfg)?) as Arc<dyn PaymentGateway>
                ))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,crowdfund_app=debug,crowdfund_hex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Using database: {}", config.database_url);
    tracing::info!(
        "Gateway mode: {:?}, aggregate strategy: {:?}",
        config.gateway_mode,
        config.aggregate_strategy
    );

    // Build repository (handles connection and migration)
    let repo = Arc::new(build_repo(&config.database_url).await?);

    // Wire the gateway adapters and the service
    let gateways = build_gateways(&config)?;
    let service = DonationService::new(repo, gateways, config.aggregate_strategy);

    // One authoritative pass at boot, then the periodic sweep
    let reports = service.reconcile_now().await?;
    let drifted = reports.iter().filter(|r| r.corrected).count();
    tracing::info!(
        "Startup reconciliation: {} campaigns checked, {} corrected",
        reports.len(),
        drifted
    );

    let sweeper = service.aggregator().clone();
    tokio::spawn(sweeper.run(config.reconcile_interval));

    tracing::info!(
        "Ledger engine ready; reconciling every {:?}",
        config.reconcile_interval
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    Ok(())
}
