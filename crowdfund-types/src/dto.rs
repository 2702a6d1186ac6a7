//! Data Transfer Objects for requests, receipts and reports.

use serde::{Deserialize, Serialize};

use crate::domain::{
    CampaignId, Currency, Donation, Money, Transaction, TransactionStatus, UserId,
};
use crate::ports::PaymentInstrument;

// ─────────────────────────────────────────────────────────────────────────────
// Campaign DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a new campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaignRequest {
    /// Campaign title
    pub title: String,
    /// Funding target in smallest currency unit
    pub goal_amount: i64,
    pub currency: Currency,
    /// Owning user
    pub creator_id: UserId,
}

/// Read-only funding summary for a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub campaign_id: CampaignId,
    /// Total raised in smallest currency unit
    pub raised_amount: i64,
    /// Funding target in smallest currency unit
    pub goal_amount: i64,
    pub currency: Currency,
    pub active: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Donation DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to fund a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonateRequest {
    pub user_id: UserId,
    pub campaign_id: CampaignId,
    /// Amount in smallest currency unit
    pub amount: i64,
    pub currency: Currency,
    /// Selects and parameterizes the gateway adapter
    pub instrument: PaymentInstrument,
    /// Client-supplied nonce; retried requests carrying the same nonce
    /// resolve to the same transaction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// Storage-level instruction to persist a donation with its transaction.
///
/// Built by the coordinator after the gateway answered (or timed out);
/// `initial_status` encodes which leg of the protocol we are on.
#[derive(Debug, Clone)]
pub struct CommitDonation {
    pub user_id: UserId,
    pub campaign_id: CampaignId,
    /// Amount in smallest currency unit
    pub amount: i64,
    pub currency: Currency,
    /// `Completed`/`Failed` for the synchronous fast path, `Pending` for
    /// asynchronous gateways and indeterminate timeouts
    pub initial_status: TransactionStatus,
    pub gateway_reference: Option<String>,
    pub idempotency_key: Option<String>,
    pub failure_reason: Option<String>,
}

/// The atomically-created donation/transaction pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationReceipt {
    pub donation: Donation,
    pub transaction: Transaction,
}

// ─────────────────────────────────────────────────────────────────────────────
// Callback DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Definitive outcome carried by an inbound gateway callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackOutcome {
    Approved,
    Declined,
}

/// An inbound gateway callback, already authenticated by the web layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCallback {
    /// The reference issued at initiation time
    pub reference: String,
    pub outcome: CallbackOutcome,
    /// Decline reason, when the gateway supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Raw gateway payload, retained for audit logging
    #[serde(default)]
    pub payload: serde_json::Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Reconciliation DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Result of one aggregate drift check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub campaign_id: CampaignId,
    /// Cached value before the check
    pub cached: Money,
    /// Authoritative recomputed value
    pub recomputed: Money,
    /// True when drift was detected and the cache was corrected
    pub corrected: bool,
}

impl ReconcileReport {
    /// True when cache and ledger disagreed.
    pub fn drifted(&self) -> bool {
        self.cached != self.recomputed
    }
}
