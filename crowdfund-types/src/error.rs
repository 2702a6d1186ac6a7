//! Error types for the ledger engine.

use crate::domain::{CampaignId, Currency, TransactionStatus, UserId};

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: Currency, got: Currency },

    #[error("Campaign is no longer active: {0}")]
    CampaignInactive(CampaignId),

    #[error("Campaign not found: {0}")]
    CampaignNotFound(CampaignId),

    #[error("User {user_id} has already donated to campaign {campaign_id}")]
    DuplicateDonation {
        user_id: UserId,
        campaign_id: CampaignId,
    },

    #[error("Invalid transaction state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Errors from a payment gateway adapter.
///
/// A timeout is indeterminate, never a decline: the charge may still be in
/// flight on the gateway side. Declines are not errors at all - they come
/// back as a `Declined` charge status.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway call timed out; outcome unknown")]
    Timeout,

    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),
}

/// Application-level errors surfaced to the caller of the engine.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User {user_id} has already donated to campaign {campaign_id}")]
    DuplicateDonation {
        user_id: UserId,
        campaign_id: CampaignId,
    },

    #[error("Campaign is no longer active: {0}")]
    CampaignInactive(CampaignId),

    #[error("Invalid transaction state transition: {0}")]
    InvalidStateTransition(String),

    #[error("No transaction matches gateway reference {0}")]
    UnknownReference(String),

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(DomainError::DuplicateDonation {
                user_id,
                campaign_id,
            }) => AppError::DuplicateDonation {
                user_id,
                campaign_id,
            },
            RepoError::Domain(DomainError::CampaignInactive(id)) => AppError::CampaignInactive(id),
            RepoError::Domain(DomainError::CampaignNotFound(id)) => {
                AppError::NotFound(format!("Campaign not found: {}", id))
            }
            RepoError::Domain(e @ DomainError::InvalidStateTransition { .. }) => {
                AppError::InvalidStateTransition(e.to_string())
            }
            RepoError::Domain(DomainError::ValidationError(msg)) => AppError::BadRequest(msg),
            RepoError::Domain(e) => AppError::BadRequest(e.to_string()),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::BadRequest(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_donation_maps_to_app_error() {
        let err = RepoError::Domain(DomainError::DuplicateDonation {
            user_id: UserId::new(),
            campaign_id: CampaignId::new(),
        });
        assert!(matches!(
            AppError::from(err),
            AppError::DuplicateDonation { .. }
        ));
    }

    #[test]
    fn test_invalid_transition_maps_to_app_error() {
        let err = RepoError::Domain(DomainError::InvalidStateTransition {
            from: TransactionStatus::Completed,
            to: TransactionStatus::Failed,
        });
        assert!(matches!(
            AppError::from(err),
            AppError::InvalidStateTransition(_)
        ));
    }
}
