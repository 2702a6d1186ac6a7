//! Transaction domain model and its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::donation::DonationId;
use super::money::Money;
use super::user::UserId;
use crate::error::DomainError;

/// Unique identifier for a Transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Creates a new random TransactionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a TransactionId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TransactionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The kind of monetary movement a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money pledged to a campaign
    Donation,
    /// Money leaving a campaign to its creator
    Withdrawal,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Donation => write!(f, "DONATION"),
            TransactionType::Withdrawal => write!(f, "WITHDRAWAL"),
        }
    }
}

/// Lifecycle state of a transaction.
///
/// `Pending` is the only non-terminal state. A transaction transitions at
/// most once, to `Completed` or `Failed`, and is never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "PENDING"),
            TransactionStatus::Completed => write!(f, "COMPLETED"),
            TransactionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// A definitive gateway outcome applied to a pending transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionOutcome {
    Completed,
    Failed { reason: Option<String> },
}

impl TransactionOutcome {
    /// The terminal status this outcome resolves to.
    pub fn status(&self) -> TransactionStatus {
        match self {
            TransactionOutcome::Completed => TransactionStatus::Completed,
            TransactionOutcome::Failed { .. } => TransactionStatus::Failed,
        }
    }
}

/// A ledger entry representing one monetary movement and its gateway
/// outcome.
///
/// Transactions are immutable apart from the single pending-to-terminal
/// transition. They are the only entity whose changes move a campaign's
/// raised total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier
    pub id: TransactionId,
    /// The user who initiated the movement
    pub user_id: UserId,
    /// The donation this movement settles (None for withdrawals)
    pub donation_id: Option<DonationId>,
    /// Amount moved
    pub amount: Money,
    /// Kind of movement
    pub kind: TransactionType,
    /// Lifecycle state
    pub status: TransactionStatus,
    /// Correlation reference issued by the payment gateway
    pub gateway_reference: Option<String>,
    /// Key correlating retried requests
    pub idempotency_key: Option<String>,
    /// Gateway-declared reason when failed
    pub failure_reason: Option<String>,
    /// When the transaction was created
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Creates a new donation transaction in the given initial status.
    pub fn donation(
        user_id: UserId,
        donation_id: DonationId,
        amount: Money,
        status: TransactionStatus,
        gateway_reference: Option<String>,
        idempotency_key: Option<String>,
        failure_reason: Option<String>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            user_id,
            donation_id: Some(donation_id),
            amount,
            kind: TransactionType::Donation,
            status,
            gateway_reference,
            idempotency_key,
            failure_reason,
            created_at: Utc::now(),
        }
    }

    /// Creates a new withdrawal transaction.
    pub fn withdrawal(
        user_id: UserId,
        amount: Money,
        status: TransactionStatus,
        gateway_reference: Option<String>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            user_id,
            donation_id: None,
            amount,
            kind: TransactionType::Withdrawal,
            status,
            gateway_reference,
            idempotency_key: None,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Reconstructs a transaction from database fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: TransactionId,
        user_id: UserId,
        donation_id: Option<DonationId>,
        amount: Money,
        kind: TransactionType,
        status: TransactionStatus,
        gateway_reference: Option<String>,
        idempotency_key: Option<String>,
        failure_reason: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            donation_id,
            amount,
            kind,
            status,
            gateway_reference,
            idempotency_key,
            failure_reason,
            created_at,
        }
    }

    /// Applies a definitive outcome to this transaction.
    ///
    /// Returns `Ok(true)` when the pending-to-terminal transition happened,
    /// `Ok(false)` when the transaction already carries the same terminal
    /// status (idempotent repeat), and `InvalidStateTransition` when the
    /// requested outcome conflicts with an already-terminal status.
    pub fn finalize(&mut self, outcome: &TransactionOutcome) -> Result<bool, DomainError> {
        let target = outcome.status();
        match self.status {
            TransactionStatus::Pending => {
                self.status = target;
                if let TransactionOutcome::Failed { reason } = outcome {
                    self.failure_reason = reason.clone();
                }
                Ok(true)
            }
            current if current == target => Ok(false),
            current => Err(DomainError::InvalidStateTransition {
                from: current,
                to: target,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Currency;

    fn pending_donation() -> Transaction {
        Transaction::donation(
            UserId::new(),
            DonationId::new(),
            Money::new(10_000, Currency::USD).unwrap(),
            TransactionStatus::Pending,
            Some("ref-123".to_string()),
            None,
            None,
        )
    }

    #[test]
    fn test_donation_creation() {
        let tx = pending_donation();
        assert_eq!(tx.kind, TransactionType::Donation);
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.donation_id.is_some());
    }

    #[test]
    fn test_withdrawal_has_no_donation() {
        let tx = Transaction::withdrawal(
            UserId::new(),
            Money::new(5_000, Currency::USD).unwrap(),
            TransactionStatus::Pending,
            None,
        );
        assert_eq!(tx.kind, TransactionType::Withdrawal);
        assert!(tx.donation_id.is_none());
    }

    #[test]
    fn test_pending_completes() {
        let mut tx = pending_donation();
        let transitioned = tx.finalize(&TransactionOutcome::Completed).unwrap();
        assert!(transitioned);
        assert_eq!(tx.status, TransactionStatus::Completed);
    }

    #[test]
    fn test_pending_fails_with_reason() {
        let mut tx = pending_donation();
        let outcome = TransactionOutcome::Failed {
            reason: Some("insufficient balance".to_string()),
        };
        assert!(tx.finalize(&outcome).unwrap());
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert_eq!(tx.failure_reason.as_deref(), Some("insufficient balance"));
    }

    #[test]
    fn test_repeat_outcome_is_noop() {
        let mut tx = pending_donation();
        tx.finalize(&TransactionOutcome::Completed).unwrap();
        let transitioned = tx.finalize(&TransactionOutcome::Completed).unwrap();
        assert!(!transitioned);
        assert_eq!(tx.status, TransactionStatus::Completed);
    }

    #[test]
    fn test_conflicting_outcome_rejected() {
        let mut tx = pending_donation();
        tx.finalize(&TransactionOutcome::Completed).unwrap();
        let result = tx.finalize(&TransactionOutcome::Failed { reason: None });
        assert!(matches!(
            result,
            Err(DomainError::InvalidStateTransition {
                from: TransactionStatus::Completed,
                to: TransactionStatus::Failed,
            })
        ));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
    }
}
