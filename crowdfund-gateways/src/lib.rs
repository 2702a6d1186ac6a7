//! # Crowdfund Gateways
//!
//! Outbound payment gateway adapters implementing the `PaymentGateway`
//! port:
//! - `CardGateway` - synchronous card charges; the gateway answers
//!   approved/declined before the call returns
//! - `MobileMoneyGateway` - asynchronous mobile-money charges; the
//!   initiating call returns a pending reference and the definitive
//!   outcome arrives later on the configured callback URL
//! - `SimulatedGateway` - scriptable adapter for development and tests
//!
//! Credentials and endpoints live in an explicit [`GatewayConfig`] passed
//! to each adapter at construction; nothing is read from process globals.

use std::time::Duration;

use crowdfund_types::GatewayError;

pub mod card;
pub mod mobile_money;
pub mod signature;
pub mod simulated;

pub use card::CardGateway;
pub use mobile_money::MobileMoneyGateway;
pub use simulated::{SimulatedBehavior, SimulatedGateway};

/// Connection settings for an HTTP gateway adapter.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// API origin, e.g. `https://api.paychangu.com`
    pub base_url: String,
    /// Bearer secret for outbound calls; also signs/verifies callbacks
    pub secret_key: String,
    /// Where the gateway should deliver asynchronous callbacks
    pub callback_url: String,
    /// Upper bound on one outbound call
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Creates a config with the default 5 second call timeout.
    pub fn new(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            secret_key: secret_key.into(),
            callback_url: callback_url.into(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Overrides the call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the HTTP client used by an adapter.
    pub(crate) fn build_client(&self) -> anyhow::Result<reqwest::Client> {
        Ok(reqwest::Client::builder().timeout(self.timeout).build()?)
    }
}

/// Maps a transport failure to the gateway error taxonomy.
///
/// Timeouts are indeterminate - the charge may have reached the gateway -
/// and must never be reported as a decline.
pub(crate) fn map_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Unavailable(err.to_string())
    }
}
