//! SQLite ledger adapter.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;

use crowdfund_types::{
    Campaign, CampaignId, CommitDonation, CreateCampaignRequest, Donation, DonationReceipt,
    DomainError, LedgerRepository, Money, ReconcileReport, RepoError, Transaction, TransactionId,
    TransactionOutcome, TransactionStatus, TransactionType, UserId,
};

use crate::types::{
    DbCampaign, DbCampaignFunds, DbCampaignGate, DbDonation, DbTotal, DbTransaction,
    parse_currency,
};

const TX_COLUMNS: &str = "id, user_id, donation_id, amount, currency, kind, status, \
                          gateway_reference, idempotency_key, failure_reason, created_at";

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite ledger implementation.
///
/// SQLite serializes writers at the database level, which is what makes
/// the relative `raised_amount = raised_amount + ?` increments safe here;
/// the finalize path additionally guards its read-then-write with a
/// status-conditional update.
#[derive(Clone)]
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            // Remove query parameters
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let ddl = include_str!("../migrations/0001_create_tables.sql");
        sqlx::query(ddl).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Maps a donation insert failure, turning the (user_id, campaign_id)
/// unique violation into the domain error so concurrent racers lose
/// cleanly.
fn map_donation_insert_error(e: sqlx::Error, user_id: UserId, campaign_id: CampaignId) -> RepoError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return RepoError::Domain(DomainError::DuplicateDonation {
                user_id,
                campaign_id,
            });
        }
    }
    RepoError::Database(e.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl LedgerRepository for SqliteRepo {
    async fn create_campaign(&self, req: CreateCampaignRequest) -> Result<Campaign, RepoError> {
        let goal = Money::new(req.goal_amount, req.currency).map_err(RepoError::Domain)?;
        let campaign =
            Campaign::new(req.title, goal, req.creator_id).map_err(RepoError::Domain)?;

        sqlx::query(
            r#"INSERT INTO campaigns (id, title, goal_amount, raised_amount, currency, active, creator_id, created_at)
               VALUES (?, ?, ?, 0, ?, 1, ?, ?)"#,
        )
        .bind(campaign.id.to_string())
        .bind(&campaign.title)
        .bind(campaign.goal_amount.amount())
        .bind(campaign.currency().to_string())
        .bind(campaign.creator_id.to_string())
        .bind(campaign.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(campaign)
    }

    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>, RepoError> {
        let row: Option<DbCampaign> = sqlx::query_as(
            r#"SELECT id, title, goal_amount, raised_amount, currency, active, creator_id, created_at
               FROM campaigns WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbCampaign::into_domain).transpose()
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>, RepoError> {
        let rows: Vec<DbCampaign> = sqlx::query_as(
            r#"SELECT id, title, goal_amount, raised_amount, currency, active, creator_id, created_at
               FROM campaigns ORDER BY created_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbCampaign::into_domain).collect()
    }

    async fn set_campaign_active(&self, id: CampaignId, active: bool) -> Result<(), RepoError> {
        let result = sqlx::query(r#"UPDATE campaigns SET active = ? WHERE id = ?"#)
            .bind(active as i64)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn commit_donation(&self, req: CommitDonation) -> Result<DonationReceipt, RepoError> {
        let amount = Money::new(req.amount, req.currency).map_err(RepoError::Domain)?;
        let campaign_id_str = req.campaign_id.to_string();

        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        let gate: Option<DbCampaignGate> =
            sqlx::query_as(r#"SELECT active, currency FROM campaigns WHERE id = ?"#)
                .bind(&campaign_id_str)
                .fetch_optional(&mut *db_tx)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

        let gate = gate.ok_or(RepoError::Domain(DomainError::CampaignNotFound(
            req.campaign_id,
        )))?;
        if !gate.is_active() {
            return Err(RepoError::Domain(DomainError::CampaignInactive(
                req.campaign_id,
            )));
        }
        amount
            .require_currency(parse_currency(&gate.currency)?)
            .map_err(RepoError::Domain)?;

        let donation = Donation::new(req.user_id, req.campaign_id, amount);
        let transaction = Transaction::donation(
            req.user_id,
            donation.id,
            amount,
            req.initial_status,
            req.gateway_reference,
            req.idempotency_key,
            req.failure_reason,
        );

        sqlx::query(
            r#"INSERT INTO donations (id, user_id, campaign_id, amount, currency, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(donation.id.to_string())
        .bind(donation.user_id.to_string())
        .bind(&campaign_id_str)
        .bind(donation.amount.amount())
        .bind(donation.amount.currency().to_string())
        .bind(donation.created_at.to_rfc3339())
        .execute(&mut *db_tx)
        .await
        .map_err(|e| map_donation_insert_error(e, req.user_id, req.campaign_id))?;

        sqlx::query(
            r#"INSERT INTO transactions (id, user_id, donation_id, amount, currency, kind, status, gateway_reference, idempotency_key, failure_reason, created_at)
               VALUES (?, ?, ?, ?, ?, 'DONATION', ?, ?, ?, ?, ?)"#,
        )
        .bind(transaction.id.to_string())
        .bind(transaction.user_id.to_string())
        .bind(donation.id.to_string())
        .bind(transaction.amount.amount())
        .bind(transaction.amount.currency().to_string())
        .bind(transaction.status.to_string())
        .bind(&transaction.gateway_reference)
        .bind(&transaction.idempotency_key)
        .bind(&transaction.failure_reason)
        .bind(transaction.created_at.to_rfc3339())
        .execute(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        // Synchronous fast path: the increment rides in the same unit as
        // the insert, so no pending state is ever observable.
        if transaction.status == TransactionStatus::Completed {
            sqlx::query(r#"UPDATE campaigns SET raised_amount = raised_amount + ? WHERE id = ?"#)
                .bind(amount.amount())
                .bind(&campaign_id_str)
                .execute(&mut *db_tx)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;
        }

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(DonationReceipt {
            donation,
            transaction,
        })
    }

    async fn finalize_transaction(
        &self,
        id: TransactionId,
        outcome: TransactionOutcome,
    ) -> Result<Transaction, RepoError> {
        let id_str = id.to_string();

        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        let row: Option<DbTransaction> = sqlx::query_as(&format!(
            "SELECT {} FROM transactions WHERE id = ?",
            TX_COLUMNS
        ))
        .bind(&id_str)
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let mut transaction = row.ok_or(RepoError::NotFound)?.into_domain()?;

        // The domain type decides; storage only applies the decision.
        if !transaction.finalize(&outcome).map_err(RepoError::Domain)? {
            return Ok(transaction);
        }

        let result = sqlx::query(
            r#"UPDATE transactions SET status = ?, failure_reason = ? WHERE id = ? AND status = 'PENDING'"#,
        )
        .bind(transaction.status.to_string())
        .bind(&transaction.failure_reason)
        .bind(&id_str)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::Conflict(
                "transaction was finalized concurrently".into(),
            ));
        }

        if transaction.status == TransactionStatus::Completed
            && transaction.kind == TransactionType::Donation
        {
            if let Some(donation_id) = transaction.donation_id {
                let campaign_id: String =
                    sqlx::query_scalar(r#"SELECT campaign_id FROM donations WHERE id = ?"#)
                        .bind(donation_id.to_string())
                        .fetch_one(&mut *db_tx)
                        .await
                        .map_err(|e| RepoError::Database(e.to_string()))?;

                sqlx::query(
                    r#"UPDATE campaigns SET raised_amount = raised_amount + ? WHERE id = ?"#,
                )
                .bind(transaction.amount.amount())
                .bind(&campaign_id)
                .execute(&mut *db_tx)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;
            }
        }

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(transaction)
    }

    async fn find_donation(
        &self,
        user_id: UserId,
        campaign_id: CampaignId,
    ) -> Result<Option<Donation>, RepoError> {
        let row: Option<DbDonation> = sqlx::query_as(
            r#"SELECT id, user_id, campaign_id, amount, currency, created_at
               FROM donations WHERE user_id = ? AND campaign_id = ?"#,
        )
        .bind(user_id.to_string())
        .bind(campaign_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbDonation::into_domain).transpose()
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Transaction>, RepoError> {
        let row: Option<DbTransaction> = sqlx::query_as(&format!(
            "SELECT {} FROM transactions WHERE idempotency_key = ?",
            TX_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbTransaction::into_domain).transpose()
    }

    async fn find_by_gateway_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, RepoError> {
        let row: Option<DbTransaction> = sqlx::query_as(&format!(
            "SELECT {} FROM transactions WHERE gateway_reference = ?",
            TX_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbTransaction::into_domain).transpose()
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError> {
        let row: Option<DbTransaction> = sqlx::query_as(&format!(
            "SELECT {} FROM transactions WHERE id = ?",
            TX_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbTransaction::into_domain).transpose()
    }

    async fn list_transactions_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Transaction>, RepoError> {
        let rows: Vec<DbTransaction> = sqlx::query_as(&format!(
            "SELECT {} FROM transactions WHERE user_id = ? ORDER BY created_at DESC",
            TX_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbTransaction::into_domain).collect()
    }

    async fn recompute_raised(&self, campaign_id: CampaignId) -> Result<Money, RepoError> {
        let currency: Option<String> =
            sqlx::query_scalar(r#"SELECT currency FROM campaigns WHERE id = ?"#)
                .bind(campaign_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

        let currency = parse_currency(&currency.ok_or(RepoError::Domain(
            DomainError::CampaignNotFound(campaign_id),
        ))?)?;

        let row: DbTotal = sqlx::query_as(
            r#"SELECT COALESCE(SUM(t.amount), 0) AS total
               FROM transactions t
               JOIN donations d ON t.donation_id = d.id
               WHERE d.campaign_id = ? AND t.kind = 'DONATION' AND t.status = 'COMPLETED'"#,
        )
        .bind(campaign_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Money::new(row.total, currency).map_err(RepoError::Domain)
    }

    async fn reconcile_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<ReconcileReport, RepoError> {
        let campaign_id_str = campaign_id.to_string();

        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        let funds: Option<DbCampaignFunds> =
            sqlx::query_as(r#"SELECT raised_amount, currency FROM campaigns WHERE id = ?"#)
                .bind(&campaign_id_str)
                .fetch_optional(&mut *db_tx)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

        let funds = funds.ok_or(RepoError::Domain(DomainError::CampaignNotFound(
            campaign_id,
        )))?;
        let currency = parse_currency(&funds.currency)?;
        let cached = Money::new(funds.raised_amount, currency).map_err(RepoError::Domain)?;

        let row: DbTotal = sqlx::query_as(
            r#"SELECT COALESCE(SUM(t.amount), 0) AS total
               FROM transactions t
               JOIN donations d ON t.donation_id = d.id
               WHERE d.campaign_id = ? AND t.kind = 'DONATION' AND t.status = 'COMPLETED'"#,
        )
        .bind(&campaign_id_str)
        .fetch_one(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let recomputed = Money::new(row.total, currency).map_err(RepoError::Domain)?;

        let corrected = if cached != recomputed {
            sqlx::query(r#"UPDATE campaigns SET raised_amount = ? WHERE id = ?"#)
                .bind(recomputed.amount())
                .bind(&campaign_id_str)
                .execute(&mut *db_tx)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;
            true
        } else {
            false
        };

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(ReconcileReport {
            campaign_id,
            cached,
            recomputed,
            corrected,
        })
    }
}
