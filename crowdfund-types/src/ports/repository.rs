//! Ledger storage port trait.
//!
//! This is the primary port of the engine. Adapters (Postgres, SQLite,
//! in-memory test doubles) implement this trait.

use std::sync::Arc;

use crate::domain::{
    Campaign, CampaignId, Donation, Money, Transaction, TransactionId, TransactionOutcome, UserId,
};
use crate::dto::{CommitDonation, CreateCampaignRequest, DonationReceipt, ReconcileReport};
use crate::error::RepoError;

/// The ledger store port.
///
/// Implementations MUST uphold two atomicity contracts:
/// - `commit_donation` writes the donation and its transaction (and, for a
///   completed initial status, the campaign increment) in one atomic unit;
/// - `finalize_transaction` applies the status change and the campaign
///   increment in one atomic unit, serializing concurrent increments to
///   the same campaign.
///
/// No partial write may ever be observable.
#[async_trait::async_trait]
pub trait LedgerRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────
    // Campaign operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Creates a new active campaign with zero raised.
    async fn create_campaign(&self, req: CreateCampaignRequest) -> Result<Campaign, RepoError>;

    /// Gets a campaign by ID.
    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>, RepoError>;

    /// Lists all campaigns, newest first.
    async fn list_campaigns(&self) -> Result<Vec<Campaign>, RepoError>;

    /// Opens or closes a campaign for new donations.
    async fn set_campaign_active(&self, id: CampaignId, active: bool) -> Result<(), RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Ledger operations (MUST be atomic)
    // ─────────────────────────────────────────────────────────────────────────

    /// Creates a donation and its transaction in one atomic unit.
    ///
    /// Fails with `DuplicateDonation` when a donation already exists for
    /// the (user, campaign) pair, and with `CampaignInactive` when the
    /// campaign no longer accepts donations.
    async fn commit_donation(&self, req: CommitDonation) -> Result<DonationReceipt, RepoError>;

    /// Applies a definitive outcome to a pending transaction.
    ///
    /// A `Completed` outcome increments the campaign's raised amount in
    /// the same atomic unit. Repeating a terminal outcome is a no-op that
    /// returns the stored row; a conflicting outcome fails with
    /// `InvalidStateTransition`.
    async fn finalize_transaction(
        &self,
        id: TransactionId,
        outcome: TransactionOutcome,
    ) -> Result<Transaction, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// Finds the donation for a (user, campaign) pair.
    async fn find_donation(
        &self,
        user_id: UserId,
        campaign_id: CampaignId,
    ) -> Result<Option<Donation>, RepoError>;

    /// Finds a transaction by its idempotency key.
    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Transaction>, RepoError>;

    /// Finds a transaction by its gateway correlation reference.
    async fn find_by_gateway_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, RepoError>;

    /// Gets a transaction by ID.
    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError>;

    /// Lists transactions for a user, newest first.
    async fn list_transactions_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Transaction>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Aggregate maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Recomputes the raised total from completed donation transactions.
    ///
    /// This is the authoritative value; the cached column is an
    /// optimization on top of it.
    async fn recompute_raised(&self, campaign_id: CampaignId) -> Result<Money, RepoError>;

    /// Compares the cached raised total against the recomputed one and
    /// corrects the cache on mismatch, atomically.
    async fn reconcile_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<ReconcileReport, RepoError>;
}

#[async_trait::async_trait]
impl<T: LedgerRepository + ?Sized> LedgerRepository for Arc<T> {
    async fn create_campaign(&self, req: CreateCampaignRequest) -> Result<Campaign, RepoError> {
        (**self).create_campaign(req).await
    }

    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>, RepoError> {
        (**self).get_campaign(id).await
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>, RepoError> {
        (**self).list_campaigns().await
    }

    async fn set_campaign_active(&self, id: CampaignId, active: bool) -> Result<(), RepoError> {
        (**self).set_campaign_active(id, active).await
    }

    async fn commit_donation(&self, req: CommitDonation) -> Result<DonationReceipt, RepoError> {
        (**self).commit_donation(req).await
    }

    async fn finalize_transaction(
        &self,
        id: TransactionId,
        outcome: TransactionOutcome,
    ) -> Result<Transaction, RepoError> {
        (**self).finalize_transaction(id, outcome).await
    }

    async fn find_donation(
        &self,
        user_id: UserId,
        campaign_id: CampaignId,
    ) -> Result<Option<Donation>, RepoError> {
        (**self).find_donation(user_id, campaign_id).await
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Transaction>, RepoError> {
        (**self).find_by_idempotency_key(key).await
    }

    async fn find_by_gateway_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, RepoError> {
        (**self).find_by_gateway_reference(reference).await
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError> {
        (**self).get_transaction(id).await
    }

    async fn list_transactions_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Transaction>, RepoError> {
        (**self).list_transactions_for_user(user_id).await
    }

    async fn recompute_raised(&self, campaign_id: CampaignId) -> Result<Money, RepoError> {
        (**self).recompute_raised(campaign_id).await
    }

    async fn reconcile_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<ReconcileReport, RepoError> {
        (**self).reconcile_campaign(campaign_id).await
    }
}
