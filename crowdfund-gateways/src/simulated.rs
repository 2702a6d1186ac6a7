//! Scriptable gateway for development and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use rand::distr::{Alphanumeric, SampleString};

use crowdfund_types::dto::{CallbackOutcome, GatewayCallback};
use crowdfund_types::{
    ChargeRequest, ChargeStatus, Currency, GatewayCharge, GatewayError, GatewayKind,
    PaymentGateway,
};

use crate::signature::sign_callback;

/// What the simulated gateway answers to every charge.
#[derive(Debug, Clone)]
pub enum SimulatedBehavior {
    /// Approve synchronously.
    Approve,
    /// Decline synchronously with the given reason.
    Decline { reason: String },
    /// Acknowledge and hold; the outcome is delivered when [`settle`] is
    /// called.
    ///
    /// [`settle`]: SimulatedGateway::settle
    Pend,
    /// Fail every charge with an indeterminate timeout.
    Timeout,
}

/// A charge held by the simulated gateway awaiting settlement.
#[derive(Debug, Clone)]
pub struct HeldCharge {
    pub amount: i64,
    pub currency: Currency,
}

/// A callback the simulated gateway emitted, signed the way a real
/// gateway would sign it.
#[derive(Debug, Clone)]
pub struct SignedCallback {
    pub callback: GatewayCallback,
    /// Hex HMAC-SHA256 over the serialized callback
    pub signature: String,
}

/// In-process gateway double. Can impersonate either gateway family.
pub struct SimulatedGateway {
    kind: GatewayKind,
    behavior: SimulatedBehavior,
    secret: String,
    held: DashMap<String, HeldCharge>,
}

impl SimulatedGateway {
    pub fn new(kind: GatewayKind, behavior: SimulatedBehavior, secret: impl Into<String>) -> Self {
        Self {
            kind,
            behavior,
            secret: secret.into(),
            held: DashMap::new(),
        }
    }

    fn next_reference(&self) -> String {
        let suffix = Alphanumeric.sample_string(&mut rand::rng(), 16);
        format!("sim_{}", suffix.to_lowercase())
    }

    /// Number of charges awaiting settlement.
    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// Delivers the definitive outcome for a held charge, producing the
    /// signed callback a real gateway would POST. Returns None when the
    /// reference is unknown or already settled.
    pub fn settle(
        &self,
        reference: &str,
        outcome: CallbackOutcome,
        reason: Option<String>,
    ) -> Option<SignedCallback> {
        let (reference, held) = self.held.remove(reference)?;
        let callback = GatewayCallback {
            reference,
            outcome,
            reason,
            payload: serde_json::json!({
                "amount": held.amount,
                "currency": held.currency,
            }),
        };
        let body = serde_json::to_vec(&callback).ok()?;
        let signature = sign_callback(&body, &self.secret);
        Some(SignedCallback {
            callback,
            signature,
        })
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    fn kind(&self) -> GatewayKind {
        self.kind
    }

    async fn charge(&self, req: &ChargeRequest) -> Result<GatewayCharge, GatewayError> {
        let reference = self.next_reference();
        match &self.behavior {
            SimulatedBehavior::Approve => Ok(GatewayCharge {
                status: ChargeStatus::Approved,
                reference,
                reason: None,
            }),
            SimulatedBehavior::Decline { reason } => Ok(GatewayCharge {
                status: ChargeStatus::Declined,
                reference,
                reason: Some(reason.clone()),
            }),
            SimulatedBehavior::Pend => {
                self.held.insert(
                    reference.clone(),
                    HeldCharge {
                        amount: req.amount.amount(),
                        currency: req.amount.currency(),
                    },
                );
                Ok(GatewayCharge {
                    status: ChargeStatus::Pending,
                    reference,
                    reason: None,
                })
            }
            SimulatedBehavior::Timeout => Err(GatewayError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::verify_callback_signature;
    use crowdfund_types::{CampaignId, Money, PaymentInstrument, UserId};

    fn charge_request() -> ChargeRequest {
        ChargeRequest {
            user_id: UserId::new(),
            campaign_id: CampaignId::new(),
            amount: Money::new(25_000, Currency::MWK).unwrap(),
            instrument: PaymentInstrument::MobileMoney {
                msisdn: "+265991234567".to_string(),
                email: None,
            },
        }
    }

    #[tokio::test]
    async fn test_approve_behavior() {
        let gateway = SimulatedGateway::new(
            GatewayKind::Card,
            SimulatedBehavior::Approve,
            "test-secret",
        );
        let charge = gateway.charge(&charge_request()).await.unwrap();
        assert_eq!(charge.status, ChargeStatus::Approved);
        assert!(charge.reference.starts_with("sim_"));
    }

    #[tokio::test]
    async fn test_decline_behavior_carries_reason() {
        let gateway = SimulatedGateway::new(
            GatewayKind::Card,
            SimulatedBehavior::Decline {
                reason: "insufficient balance".to_string(),
            },
            "test-secret",
        );
        let charge = gateway.charge(&charge_request()).await.unwrap();
        assert_eq!(charge.status, ChargeStatus::Declined);
        assert_eq!(charge.reason.as_deref(), Some("insufficient balance"));
    }

    #[tokio::test]
    async fn test_pend_then_settle_emits_signed_callback() {
        let gateway = SimulatedGateway::new(
            GatewayKind::MobileMoney,
            SimulatedBehavior::Pend,
            "test-secret",
        );
        let charge = gateway.charge(&charge_request()).await.unwrap();
        assert_eq!(charge.status, ChargeStatus::Pending);
        assert_eq!(gateway.held_count(), 1);

        let signed = gateway
            .settle(&charge.reference, CallbackOutcome::Approved, None)
            .unwrap();
        assert_eq!(signed.callback.reference, charge.reference);

        let body = serde_json::to_vec(&signed.callback).unwrap();
        assert!(verify_callback_signature(
            &body,
            &signed.signature,
            "test-secret"
        ));

        // settled charges are gone
        assert!(
            gateway
                .settle(&charge.reference, CallbackOutcome::Approved, None)
                .is_none()
        );
    }
}
