//! Donation coordination service.
//!
//! Orchestrates the full funding flow through the ports: validation,
//! idempotency, the gateway call, the atomic ledger commit, and the
//! aggregate update. The original system hid the last two behind an ORM
//! save hook; here they are one visible call sequence.

use tracing::{instrument, warn};

use crowdfund_types::{
    AppError, Campaign, CampaignId, CampaignSummary, ChargeRequest, ChargeStatus, CommitDonation,
    CreateCampaignRequest, DonateRequest, GatewayCallback, GatewayError, GatewayRegistry,
    LedgerRepository, Money, ReconcileReport, Transaction, TransactionOutcome, TransactionStatus,
    UserId,
    dto::CallbackOutcome,
};

use crate::aggregator::{AggregateStrategy, FundAggregator};

/// Coordinates donations, gateway callbacks and aggregate reads.
///
/// Generic over `R: LedgerRepository` - the adapter is injected at
/// compile time. Gateways are selected per request through the registry,
/// so adding a gateway family means registering one more adapter.
pub struct DonationService<R: LedgerRepository + Clone> {
    repo: R,
    gateways: GatewayRegistry,
    aggregator: FundAggregator<R>,
}

impl<R: LedgerRepository + Clone> DonationService<R> {
    /// Creates a new service over a ledger and a set of gateways.
    pub fn new(repo: R, gateways: GatewayRegistry, strategy: AggregateStrategy) -> Self {
        let aggregator = FundAggregator::new(repo.clone(), strategy);
        Self {
            repo,
            gateways,
            aggregator,
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Returns the fund aggregator (e.g. to spawn its sweep loop).
    pub fn aggregator(&self) -> &FundAggregator<R> {
        &self.aggregator
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Campaign operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Creates a new campaign.
    pub async fn create_campaign(&self, req: CreateCampaignRequest) -> Result<Campaign, AppError> {
        if req.title.trim().is_empty() {
            return Err(AppError::BadRequest("Campaign title cannot be empty".into()));
        }
        if req.goal_amount <= 0 {
            return Err(AppError::BadRequest("Campaign goal must be positive".into()));
        }

        self.repo.create_campaign(req).await.map_err(Into::into)
    }

    /// Gets a campaign by ID.
    pub async fn get_campaign(&self, id: CampaignId) -> Result<Campaign, AppError> {
        self.repo
            .get_campaign(id)
            .await
            .map_err(Into::into)
            .and_then(|opt| opt.ok_or_else(|| AppError::NotFound(format!("Campaign {}", id))))
    }

    /// Closes a campaign to new donations.
    pub async fn close_campaign(&self, id: CampaignId) -> Result<(), AppError> {
        self.repo
            .set_campaign_active(id, false)
            .await
            .map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Donation flow
    // ─────────────────────────────────────────────────────────────────────────

    /// Funds a campaign.
    ///
    /// Synchronous gateways resolve to a terminal transaction before this
    /// returns; asynchronous gateways (and timed-out calls) leave it
    /// pending for a later [`resolve_callback`].
    ///
    /// [`resolve_callback`]: DonationService::resolve_callback
    #[instrument(skip(self, req), fields(user_id = %req.user_id, campaign_id = %req.campaign_id))]
    pub async fn donate(&self, req: DonateRequest) -> Result<Transaction, AppError> {
        if req.amount <= 0 {
            return Err(AppError::BadRequest("Amount must be positive".into()));
        }

        let campaign = self.get_campaign(req.campaign_id).await?;
        let amount = Money::new(req.amount, req.currency)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        campaign
            .accepts(&amount)
            .map_err(|e| AppError::from(crowdfund_types::RepoError::Domain(e)))?;

        // Retried requests resolve before any gateway traffic.
        let idempotency_key = req.nonce.as_deref().map(|nonce| derive_idempotency_key(&req, nonce));
        if let Some(key) = &idempotency_key {
            if let Some(existing) = self.repo.find_by_idempotency_key(key).await? {
                return Ok(existing);
            }
        }

        if self
            .repo
            .find_donation(req.user_id, req.campaign_id)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateDonation {
                user_id: req.user_id,
                campaign_id: req.campaign_id,
            });
        }

        let gateway = self
            .gateways
            .get(req.instrument.kind())
            .map_err(|e| AppError::GatewayUnavailable(e.to_string()))?;

        let charge_req = ChargeRequest {
            user_id: req.user_id,
            campaign_id: req.campaign_id,
            amount,
            instrument: req.instrument.clone(),
        };

        let commit = match gateway.charge(&charge_req).await {
            Ok(charge) => {
                let initial_status = match charge.status {
                    ChargeStatus::Approved => TransactionStatus::Completed,
                    ChargeStatus::Declined => TransactionStatus::Failed,
                    ChargeStatus::Pending => TransactionStatus::Pending,
                };
                let failure_reason = match charge.status {
                    ChargeStatus::Declined => {
                        Some(charge.reason.unwrap_or_else(|| "declined".to_string()))
                    }
                    _ => None,
                };
                CommitDonation {
                    user_id: req.user_id,
                    campaign_id: req.campaign_id,
                    amount: req.amount,
                    currency: req.currency,
                    initial_status,
                    gateway_reference: Some(charge.reference),
                    idempotency_key,
                    failure_reason,
                }
            }
            // Indeterminate: the charge may have reached the gateway, so
            // the transaction stays pending until a callback or poll
            // resolves it. Declining here could mark in-flight money lost.
            Err(GatewayError::Timeout) => {
                warn!("gateway call timed out; recording pending transaction");
                CommitDonation {
                    user_id: req.user_id,
                    campaign_id: req.campaign_id,
                    amount: req.amount,
                    currency: req.currency,
                    initial_status: TransactionStatus::Pending,
                    gateway_reference: None,
                    idempotency_key,
                    failure_reason: None,
                }
            }
            Err(e) => return Err(AppError::GatewayUnavailable(e.to_string())),
        };

        let receipt = self.repo.commit_donation(commit).await?;
        Ok(receipt.transaction)
    }

    /// Applies an inbound gateway callback to its pending transaction.
    ///
    /// Replayed callbacks are idempotent: a terminal transaction with the
    /// same outcome is returned unchanged. A conflicting outcome is a
    /// protocol violation and fails loudly.
    #[instrument(skip(self, callback), fields(reference = %callback.reference))]
    pub async fn resolve_callback(&self, callback: GatewayCallback) -> Result<Transaction, AppError> {
        let existing = self
            .repo
            .find_by_gateway_reference(&callback.reference)
            .await?
            .ok_or_else(|| AppError::UnknownReference(callback.reference.clone()))?;

        let outcome = match callback.outcome {
            CallbackOutcome::Approved => TransactionOutcome::Completed,
            CallbackOutcome::Declined => TransactionOutcome::Failed {
                reason: callback.reason.clone(),
            },
        };

        self.repo
            .finalize_transaction(existing.id, outcome)
            .await
            .map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read paths
    // ─────────────────────────────────────────────────────────────────────────

    /// Funding summary for a campaign.
    pub async fn campaign_summary(&self, id: CampaignId) -> Result<CampaignSummary, AppError> {
        self.aggregator.summary(id).await
    }

    /// Authoritative donation total, recomputed from the ledger.
    pub async fn donation_total(&self, id: CampaignId) -> Result<Money, AppError> {
        self.repo.recompute_raised(id).await.map_err(Into::into)
    }

    /// Lists a user's transactions, newest first.
    pub async fn list_transactions(&self, user_id: UserId) -> Result<Vec<Transaction>, AppError> {
        self.repo
            .list_transactions_for_user(user_id)
            .await
            .map_err(Into::into)
    }

    /// The `limit` most recent transactions of a user.
    pub async fn recent_transactions(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<Transaction>, AppError> {
        let mut transactions = self.list_transactions(user_id).await?;
        transactions.truncate(limit);
        Ok(transactions)
    }

    /// Runs one reconciliation sweep on demand.
    pub async fn reconcile_now(&self) -> Result<Vec<ReconcileReport>, AppError> {
        self.aggregator.sweep().await
    }
}

/// Derives the idempotency key correlating retried donate requests.
///
/// The nonce is client-supplied; folding in the request identity means a
/// reused nonce on a different request cannot alias an unrelated
/// transaction.
fn derive_idempotency_key(req: &DonateRequest, nonce: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(req.user_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(req.campaign_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(req.amount.to_le_bytes());
    hasher.update(b"|");
    hasher.update(req.currency.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(nonce.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crowdfund_types::{Currency, PaymentInstrument};

    fn request(nonce: Option<&str>) -> DonateRequest {
        DonateRequest {
            user_id: UserId::new(),
            campaign_id: CampaignId::new(),
            amount: 25_000,
            currency: Currency::USD,
            instrument: PaymentInstrument::Card {
                token: "tok_1".to_string(),
            },
            nonce: nonce.map(String::from),
        }
    }

    #[test]
    fn test_idempotency_key_is_stable() {
        let req = request(Some("nonce-1"));
        assert_eq!(
            derive_idempotency_key(&req, "nonce-1"),
            derive_idempotency_key(&req, "nonce-1")
        );
    }

    #[test]
    fn test_idempotency_key_varies_with_request() {
        let a = request(Some("nonce-1"));
        let mut b = a.clone();
        b.amount = 30_000;
        assert_ne!(
            derive_idempotency_key(&a, "nonce-1"),
            derive_idempotency_key(&b, "nonce-1")
        );
        assert_ne!(
            derive_idempotency_key(&a, "nonce-1"),
            derive_idempotency_key(&a, "nonce-2")
        );
    }
}
