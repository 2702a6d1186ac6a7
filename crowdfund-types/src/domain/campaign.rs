//! Campaign domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::{Currency, Money};
use super::user::UserId;
use crate::error::DomainError;

/// Unique identifier for a Campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(Uuid);

impl CampaignId {
    /// Creates a new random CampaignId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a CampaignId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CampaignId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CampaignId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CampaignId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A fundraising campaign with a cached total of funds raised.
///
/// `raised_amount` is a derived cache: it must always equal the sum of
/// completed donation transactions for this campaign. Only the storage
/// layer mutates it, inside the same atomic unit that finalizes a
/// transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique identifier
    pub id: CampaignId,
    /// Human-readable campaign title
    pub title: String,
    /// Funding target
    pub goal_amount: Money,
    /// Cached total of completed donations
    pub raised_amount: Money,
    /// Inactive campaigns reject new donations
    pub active: bool,
    /// The user who owns this campaign
    pub creator_id: UserId,
    /// When the campaign was created
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Creates a new active campaign with zero raised.
    ///
    /// # Validation
    /// - Title cannot be empty
    /// - Goal must be positive
    pub fn new(title: String, goal_amount: Money, creator_id: UserId) -> Result<Self, DomainError> {
        if title.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Campaign title cannot be empty".into(),
            ));
        }
        if goal_amount.is_zero() {
            return Err(DomainError::ValidationError(
                "Campaign goal must be positive".into(),
            ));
        }

        Ok(Self {
            id: CampaignId::new(),
            title,
            goal_amount,
            raised_amount: Money::zero(goal_amount.currency()),
            active: true,
            creator_id,
            created_at: Utc::now(),
        })
    }

    /// Reconstructs a campaign from database fields.
    pub fn from_parts(
        id: CampaignId,
        title: String,
        goal_amount: Money,
        raised_amount: Money,
        active: bool,
        creator_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            goal_amount,
            raised_amount,
            active,
            creator_id,
            created_at,
        }
    }

    /// Returns the currency of this campaign.
    pub fn currency(&self) -> Currency {
        self.goal_amount.currency()
    }

    /// Adds a completed donation amount to the cached total.
    pub fn credit_raised(&mut self, amount: Money) -> Result<(), DomainError> {
        self.raised_amount = self.raised_amount.checked_add(amount)?;
        Ok(())
    }

    /// Validates that this campaign can accept a donation in `amount`.
    pub fn accepts(&self, amount: &Money) -> Result<(), DomainError> {
        if !self.active {
            return Err(DomainError::CampaignInactive(self.id));
        }
        amount.require_currency(self.currency())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal(amount: i64) -> Money {
        Money::new(amount, Currency::USD).unwrap()
    }

    #[test]
    fn test_campaign_creation() {
        let campaign = Campaign::new("Clean water".to_string(), goal(100_000), UserId::new())
            .unwrap();
        assert_eq!(campaign.title, "Clean water");
        assert!(campaign.active);
        assert_eq!(campaign.raised_amount.amount(), 0);
        assert_eq!(campaign.currency(), Currency::USD);
    }

    #[test]
    fn test_empty_title_fails() {
        let result = Campaign::new("  ".to_string(), goal(100_000), UserId::new());
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[test]
    fn test_zero_goal_fails() {
        let result = Campaign::new(
            "Ambitionless".to_string(),
            Money::zero(Currency::USD),
            UserId::new(),
        );
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[test]
    fn test_credit_raised() {
        let mut campaign =
            Campaign::new("Test".to_string(), goal(100_000), UserId::new()).unwrap();
        campaign.credit_raised(goal(25_000)).unwrap();
        assert_eq!(campaign.raised_amount.amount(), 25_000);
    }

    #[test]
    fn test_inactive_campaign_rejects_donations() {
        let mut campaign =
            Campaign::new("Test".to_string(), goal(100_000), UserId::new()).unwrap();
        campaign.active = false;
        let result = campaign.accepts(&goal(1_000));
        assert!(matches!(result, Err(DomainError::CampaignInactive(_))));
    }

    #[test]
    fn test_wrong_currency_rejected() {
        let campaign = Campaign::new("Test".to_string(), goal(100_000), UserId::new()).unwrap();
        let mwk = Money::new(1_000, Currency::MWK).unwrap();
        assert!(matches!(
            campaign.accepts(&mwk),
            Err(DomainError::CurrencyMismatch { .. })
        ));
    }
}
