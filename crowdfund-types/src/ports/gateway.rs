//! Payment gateway port trait.
//!
//! Two structurally different gateway protocols hide behind one capability:
//! a synchronous charge that returns `Approved`/`Declined` before control
//! comes back, and an asynchronous initiate call that returns `Pending`
//! plus a reference correlated with a later inbound callback.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{CampaignId, Money, UserId};
use crate::error::GatewayError;

/// How a donor pays. The instrument selects the gateway adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentInstrument {
    /// Card token from the client-side tokenizer; charged synchronously.
    Card { token: String },
    /// Mobile-money wallet; charged via initiate-then-callback.
    MobileMoney {
        msisdn: String,
        email: Option<String>,
    },
}

impl PaymentInstrument {
    /// The gateway family this instrument routes to.
    pub fn kind(&self) -> GatewayKind {
        match self {
            PaymentInstrument::Card { .. } => GatewayKind::Card,
            PaymentInstrument::MobileMoney { .. } => GatewayKind::MobileMoney,
        }
    }
}

/// Families of gateway adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    Card,
    MobileMoney,
}

impl std::fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayKind::Card => write!(f, "card"),
            GatewayKind::MobileMoney => write!(f, "mobile_money"),
        }
    }
}

/// A charge to place against a gateway.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub user_id: UserId,
    pub campaign_id: CampaignId,
    pub amount: Money,
    pub instrument: PaymentInstrument,
}

/// The normalized result shape both gateway variants produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    /// Definitive success.
    Approved,
    /// Definitive, gateway-declared decline.
    Declined,
    /// Charge initiated; outcome arrives via callback or poll.
    Pending,
}

/// Normalized gateway response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCharge {
    pub status: ChargeStatus,
    /// Correlation reference for callbacks and support lookups.
    pub reference: String,
    /// Decline reason, when the gateway declared one.
    pub reason: Option<String>,
}

/// Port trait for payment gateway adapters.
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    /// The gateway family this adapter serves.
    fn kind(&self) -> GatewayKind;

    /// Places a charge.
    ///
    /// Synchronous adapters return `Approved` or `Declined`; asynchronous
    /// adapters return `Pending` with a correlation reference. Transport
    /// timeouts MUST surface as `GatewayError::Timeout`, never as a
    /// decline: the outcome is unknown and money may still be in flight.
    async fn charge(&self, req: &ChargeRequest) -> Result<GatewayCharge, GatewayError>;
}

/// Routes payment instruments to their gateway adapters.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<GatewayKind, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own kind, replacing any previous one.
    pub fn register(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(gateway.kind(), gateway);
        self
    }

    /// Resolves the adapter for a gateway family.
    pub fn get(&self, kind: GatewayKind) -> Result<&Arc<dyn PaymentGateway>, GatewayError> {
        self.gateways
            .get(&kind)
            .ok_or_else(|| GatewayError::Unavailable(format!("no {} gateway configured", kind)))
    }
}
