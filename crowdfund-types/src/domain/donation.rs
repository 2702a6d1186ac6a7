//! Donation domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::campaign::CampaignId;
use super::money::Money;
use super::user::UserId;

/// Unique identifier for a Donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DonationId(Uuid);

impl DonationId {
    /// Creates a new random DonationId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a DonationId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DonationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DonationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DonationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A user's pledge record against a campaign.
///
/// A user may fund a given campaign only once: the ledger enforces
/// uniqueness over (user_id, campaign_id). Donations are immutable once
/// written; any later movement is a new transaction referencing the same
/// donation. Creating a donation never changes a campaign's raised total
/// by itself - only its transactions do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    /// Unique identifier
    pub id: DonationId,
    /// The donating user
    pub user_id: UserId,
    /// The funded campaign
    pub campaign_id: CampaignId,
    /// Pledged amount
    pub amount: Money,
    /// When the donation was created
    pub created_at: DateTime<Utc>,
}

impl Donation {
    /// Creates a new donation record.
    pub fn new(user_id: UserId, campaign_id: CampaignId, amount: Money) -> Self {
        Self {
            id: DonationId::new(),
            user_id,
            campaign_id,
            amount,
            created_at: Utc::now(),
        }
    }

    /// Reconstructs a donation from database fields.
    pub fn from_parts(
        id: DonationId,
        user_id: UserId,
        campaign_id: CampaignId,
        amount: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            campaign_id,
            amount,
            created_at,
        }
    }
}
