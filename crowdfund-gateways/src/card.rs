//! Synchronous card charge adapter.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, instrument};

use crowdfund_types::{
    ChargeRequest, ChargeStatus, GatewayCharge, GatewayError, GatewayKind, PaymentGateway,
    PaymentInstrument,
};

use crate::{GatewayConfig, map_transport_error};

/// Card processor adapter. One call, one definitive answer.
pub struct CardGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl CardGateway {
    /// Creates a card gateway from its connection settings.
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let client = config.build_client()?;
        Ok(Self { client, config })
    }
}

#[derive(Deserialize)]
struct CardChargeResponse {
    status: String,
    reference: String,
    #[serde(default)]
    reason: Option<String>,
}

impl CardChargeResponse {
    fn into_charge(self) -> Result<GatewayCharge, GatewayError> {
        let status = match self.status.as_str() {
            "approved" => ChargeStatus::Approved,
            "declined" => ChargeStatus::Declined,
            other => {
                return Err(GatewayError::InvalidResponse(format!(
                    "unknown charge status: {}",
                    other
                )));
            }
        };
        Ok(GatewayCharge {
            status,
            reference: self.reference,
            reason: self.reason,
        })
    }
}

#[async_trait]
impl PaymentGateway for CardGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Card
    }

    #[instrument(skip(self, req), fields(campaign_id = %req.campaign_id))]
    async fn charge(&self, req: &ChargeRequest) -> Result<GatewayCharge, GatewayError> {
        let PaymentInstrument::Card { token } = &req.instrument else {
            return Err(GatewayError::Unavailable(
                "card gateway requires a card instrument".into(),
            ));
        };

        let payload = serde_json::json!({
            "amount": req.amount.amount(),
            "currency": req.amount.currency(),
            "token": token,
        });

        let response = self
            .client
            .post(format!("{}/v1/charges", self.config.base_url))
            .bearer_auth(&self.config.secret_key)
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        // 402 carries a well-formed decline body; anything else non-2xx is
        // a gateway-side fault, not an answer.
        if status.is_success() || status == reqwest::StatusCode::PAYMENT_REQUIRED {
            let body: CardChargeResponse = response
                .json()
                .await
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
            body.into_charge()
        } else {
            let text = response.text().await.unwrap_or_default();
            error!("card gateway error: {} - {}", status, text);
            Err(GatewayError::Unavailable(format!("HTTP {}", status)))
        }
    }
}
