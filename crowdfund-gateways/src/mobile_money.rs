//! Asynchronous mobile-money adapter (initiate-then-callback).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, instrument};

use crowdfund_types::{
    ChargeRequest, ChargeStatus, GatewayCharge, GatewayError, GatewayKind, PaymentGateway,
    PaymentInstrument,
};

use crate::{GatewayConfig, map_transport_error};

/// Mobile-money processor adapter.
///
/// The initiating call only acknowledges the charge: it returns a
/// correlation reference and the wallet holder approves or rejects on
/// their handset. The definitive outcome arrives on the configured
/// callback URL.
pub struct MobileMoneyGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl MobileMoneyGateway {
    /// Creates a mobile-money gateway from its connection settings.
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let client = config.build_client()?;
        Ok(Self { client, config })
    }
}

#[derive(Deserialize)]
struct InitiateResponse {
    reference: String,
}

#[async_trait]
impl PaymentGateway for MobileMoneyGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::MobileMoney
    }

    #[instrument(skip(self, req), fields(campaign_id = %req.campaign_id))]
    async fn charge(&self, req: &ChargeRequest) -> Result<GatewayCharge, GatewayError> {
        let PaymentInstrument::MobileMoney { msisdn, email } = &req.instrument else {
            return Err(GatewayError::Unavailable(
                "mobile-money gateway requires a mobile-money instrument".into(),
            ));
        };

        let payload = serde_json::json!({
            "amount": req.amount.amount(),
            "currency": req.amount.currency(),
            "phone_number": msisdn,
            "email": email,
            "callback_url": self.config.callback_url,
        });

        let response = self
            .client
            .post(format!("{}/v1/payments", self.config.base_url))
            .bearer_auth(&self.config.secret_key)
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("mobile-money gateway error: {} - {}", status, text);
            return Err(GatewayError::Unavailable(format!("HTTP {}", status)));
        }

        let body: InitiateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        Ok(GatewayCharge {
            status: ChargeStatus::Pending,
            reference: body.reference,
            reason: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiate_response_parses() {
        let body = r#"{"reference":"mm_20250101_0042","status":"pending"}"#;
        let response: InitiateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.reference, "mm_20250101_0042");
    }
}
