//! Shared database types with feature-gated fields for SQLite and PostgreSQL.

use sqlx::FromRow;

use crowdfund_types::{
    Campaign, CampaignId, Currency, Donation, DonationId, Money, RepoError, Transaction,
    TransactionId, TransactionStatus, TransactionType, UserId,
};

// ─────────────────────────────────────────────────────────────────────────────
// Feature-gated imports
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(not(feature = "sqlite"))]
use chrono::{DateTime, Utc};
#[cfg(not(feature = "sqlite"))]
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Database row structs (derive FromRow for automatic mapping)
// ─────────────────────────────────────────────────────────────────────────────

/// Campaign row from database.
#[derive(FromRow)]
pub struct DbCampaign {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    pub title: String,
    pub goal_amount: i64,
    pub raised_amount: i64,
    pub currency: String,

    #[cfg(not(feature = "sqlite"))]
    pub active: bool,
    #[cfg(feature = "sqlite")]
    pub active: i64,

    #[cfg(not(feature = "sqlite"))]
    pub creator_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub creator_id: String,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,
}

/// Donation row from database.
#[derive(FromRow)]
pub struct DbDonation {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    #[cfg(not(feature = "sqlite"))]
    pub user_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub user_id: String,

    #[cfg(not(feature = "sqlite"))]
    pub campaign_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub campaign_id: String,

    pub amount: i64,
    pub currency: String,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,
}

/// Transaction row from database.
#[derive(FromRow)]
pub struct DbTransaction {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    #[cfg(not(feature = "sqlite"))]
    pub user_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub user_id: String,

    #[cfg(not(feature = "sqlite"))]
    pub donation_id: Option<Uuid>,
    #[cfg(feature = "sqlite")]
    pub donation_id: Option<String>,

    pub amount: i64,
    pub currency: String,
    pub kind: String,
    pub status: String,
    pub gateway_reference: Option<String>,
    pub idempotency_key: Option<String>,
    pub failure_reason: Option<String>,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,
}

/// Gate columns consulted before accepting a donation.
#[derive(FromRow)]
pub struct DbCampaignGate {
    #[cfg(not(feature = "sqlite"))]
    pub active: bool,
    #[cfg(feature = "sqlite")]
    pub active: i64,

    pub currency: String,
}

impl DbCampaignGate {
    pub fn is_active(&self) -> bool {
        #[cfg(not(feature = "sqlite"))]
        {
            self.active
        }
        #[cfg(feature = "sqlite")]
        {
            self.active != 0
        }
    }
}

/// Cached raised total and currency for one campaign.
#[derive(FromRow)]
pub struct DbCampaignFunds {
    pub raised_amount: i64,
    pub currency: String,
}

/// Aggregated sum row.
#[derive(FromRow)]
pub struct DbTotal {
    pub total: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

pub fn parse_currency(s: &str) -> Result<Currency, RepoError> {
    match s {
        "USD" => Ok(Currency::USD),
        "EUR" => Ok(Currency::EUR),
        "GBP" => Ok(Currency::GBP),
        "MWK" => Ok(Currency::MWK),
        _ => Err(RepoError::Database(format!("Unknown currency: {}", s))),
    }
}

pub fn parse_transaction_type(s: &str) -> Result<TransactionType, RepoError> {
    match s {
        "DONATION" => Ok(TransactionType::Donation),
        "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
        _ => Err(RepoError::Database(format!(
            "Unknown transaction type: {}",
            s
        ))),
    }
}

pub fn parse_transaction_status(s: &str) -> Result<TransactionStatus, RepoError> {
    match s {
        "PENDING" => Ok(TransactionStatus::Pending),
        "COMPLETED" => Ok(TransactionStatus::Completed),
        "FAILED" => Ok(TransactionStatus::Failed),
        _ => Err(RepoError::Database(format!(
            "Unknown transaction status: {}",
            s
        ))),
    }
}

#[cfg(feature = "sqlite")]
fn parse_uuid(s: &str) -> Result<uuid::Uuid, RepoError> {
    uuid::Uuid::parse_str(s).map_err(|e| RepoError::Database(e.to_string()))
}

#[cfg(feature = "sqlite")]
fn parse_datetime(s: &str) -> Result<chrono::DateTime<chrono::Utc>, RepoError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| RepoError::Database(e.to_string()))
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

// ─────────────────────────────────────────────────────────────────────────────
// Domain conversion (feature-gated implementations)
// ─────────────────────────────────────────────────────────────────────────────

impl DbCampaign {
    /// Convert database row to domain Campaign.
    pub fn into_domain(self) -> Result<Campaign, RepoError> {
        let currency = parse_currency(&self.currency)?;
        let goal = Money::new(self.goal_amount, currency).map_err(RepoError::Domain)?;
        let raised = Money::new(self.raised_amount, currency).map_err(RepoError::Domain)?;

        #[cfg(not(feature = "sqlite"))]
        let (id, creator_id, active, created_at) = (
            CampaignId::from_uuid(self.id),
            UserId::from_uuid(self.creator_id),
            self.active,
            self.created_at,
        );

        #[cfg(feature = "sqlite")]
        let (id, creator_id, active, created_at) = (
            CampaignId::from_uuid(parse_uuid(&self.id)?),
            UserId::from_uuid(parse_uuid(&self.creator_id)?),
            self.active != 0,
            parse_datetime(&self.created_at)?,
        );

        Ok(Campaign::from_parts(
            id, self.title, goal, raised, active, creator_id, created_at,
        ))
    }
}

impl DbDonation {
    /// Convert database row to domain Donation.
    pub fn into_domain(self) -> Result<Donation, RepoError> {
        let currency = parse_currency(&self.currency)?;
        let amount = Money::new(self.amount, currency).map_err(RepoError::Domain)?;

        #[cfg(not(feature = "sqlite"))]
        let (id, user_id, campaign_id, created_at) = (
            DonationId::from_uuid(self.id),
            UserId::from_uuid(self.user_id),
            CampaignId::from_uuid(self.campaign_id),
            self.created_at,
        );

        #[cfg(feature = "sqlite")]
        let (id, user_id, campaign_id, created_at) = (
            DonationId::from_uuid(parse_uuid(&self.id)?),
            UserId::from_uuid(parse_uuid(&self.user_id)?),
            CampaignId::from_uuid(parse_uuid(&self.campaign_id)?),
            parse_datetime(&self.created_at)?,
        );

        Ok(Donation::from_parts(
            id,
            user_id,
            campaign_id,
            amount,
            created_at,
        ))
    }
}

impl DbTransaction {
    /// Convert database row to domain Transaction.
    pub fn into_domain(self) -> Result<Transaction, RepoError> {
        let currency = parse_currency(&self.currency)?;
        let kind = parse_transaction_type(&self.kind)?;
        let status = parse_transaction_status(&self.status)?;
        let amount = Money::new(self.amount, currency).map_err(RepoError::Domain)?;

        #[cfg(not(feature = "sqlite"))]
        let (id, user_id, donation_id, created_at) = (
            TransactionId::from_uuid(self.id),
            UserId::from_uuid(self.user_id),
            self.donation_id.map(DonationId::from_uuid),
            self.created_at,
        );

        #[cfg(feature = "sqlite")]
        let (id, user_id, donation_id, created_at) = (
            TransactionId::from_uuid(parse_uuid(&self.id)?),
            UserId::from_uuid(parse_uuid(&self.user_id)?),
            self.donation_id
                .as_deref()
                .map(parse_uuid)
                .transpose()?
                .map(DonationId::from_uuid),
            parse_datetime(&self.created_at)?,
        );

        Ok(Transaction::from_parts(
            id,
            user_id,
            donation_id,
            amount,
            kind,
            status,
            self.gateway_reference,
            self.idempotency_key,
            self.failure_reason,
            created_at,
        ))
    }
}
