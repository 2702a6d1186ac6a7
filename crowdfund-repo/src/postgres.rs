//! PostgreSQL ledger adapter.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

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
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL ledger implementation with row-level locking.
///
/// Concurrent increments to the same campaign serialize on the campaign
/// row: relative updates take the row lock for the statement, and the
/// finalize/reconcile paths lock explicitly with `FOR UPDATE`.
#[derive(Clone)]
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        execute_migration(
            &pool,
            include_str!("../migrations/0001_create_tables_pg.sql"),
            "0001",
        )
        .await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

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
impl LedgerRepository for PostgresRepo {
    async fn create_campaign(&self, req: CreateCampaignRequest) -> Result<Campaign, RepoError> {
        let goal = Money::new(req.goal_amount, req.currency).map_err(RepoError::Domain)?;
        let campaign =
            Campaign::new(req.title, goal, req.creator_id).map_err(RepoError::Domain)?;

        sqlx::query(
            r#"INSERT INTO campaigns (id, title, goal_amount, raised_amount, currency, active, creator_id, created_at)
               VALUES ($1, $2, $3, 0, $4, TRUE, $5, $6)"#,
        )
        .bind(campaign.id.as_uuid())
        .bind(&campaign.title)
        .bind(campaign.goal_amount.amount())
        .bind(campaign.currency().to_string())
        .bind(campaign.creator_id.as_uuid())
        .bind(campaign.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(campaign)
    }

    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>, RepoError> {
        let row: Option<DbCampaign> = sqlx::query_as(
            r#"SELECT id, title, goal_amount, raised_amount, currency, active, creator_id, created_at
               FROM campaigns WHERE id = $1"#,
        )
        .bind(id.as_uuid())
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
        let result = sqlx::query(r#"UPDATE campaigns SET active = $1 WHERE id = $2"#)
            .bind(active)
            .bind(id.as_uuid())
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

        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        // Lock the campaign row for the duration of the commit.
        let gate: Option<DbCampaignGate> =
            sqlx::query_as(r#"SELECT active, currency FROM campaigns WHERE id = $1 FOR UPDATE"#)
                .bind(req.campaign_id.as_uuid())
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
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(donation.id.as_uuid())
        .bind(donation.user_id.as_uuid())
        .bind(donation.campaign_id.as_uuid())
        .bind(donation.amount.amount())
        .bind(donation.amount.currency().to_string())
        .bind(donation.created_at)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| map_donation_insert_error(e, req.user_id, req.campaign_id))?;

        sqlx::query(
            r#"INSERT INTO transactions (id, user_id, donation_id, amount, currency, kind, status, gateway_reference, idempotency_key, failure_reason, created_at)
               VALUES ($1, $2, $3, $4, $5, 'DONATION', $6, $7, $8, $9, $10)"#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.user_id.as_uuid())
        .bind(donation.id.as_uuid())
        .bind(transaction.amount.amount())
        .bind(transaction.amount.currency().to_string())
        .bind(transaction.status.to_string())
        .bind(&transaction.gateway_reference)
        .bind(&transaction.idempotency_key)
        .bind(&transaction.failure_reason)
        .bind(transaction.created_at)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if transaction.status == TransactionStatus::Completed {
            sqlx::query(r#"UPDATE campaigns SET raised_amount = raised_amount + $1 WHERE id = $2"#)
                .bind(amount.amount())
                .bind(req.campaign_id.as_uuid())
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
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        // Lock the transaction row so concurrent finalizes serialize here.
        let row: Option<DbTransaction> = sqlx::query_as(&format!(
            "SELECT {} FROM transactions WHERE id = $1 FOR UPDATE",
            TX_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let mut transaction = row.ok_or(RepoError::NotFound)?.into_domain()?;

        if !transaction.finalize(&outcome).map_err(RepoError::Domain)? {
            return Ok(transaction);
        }

        let result = sqlx::query(
            r#"UPDATE transactions SET status = $1, failure_reason = $2 WHERE id = $3 AND status = 'PENDING'"#,
        )
        .bind(transaction.status.to_string())
        .bind(&transaction.failure_reason)
        .bind(id.as_uuid())
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
                let campaign_id: Uuid =
                    sqlx::query_scalar(r#"SELECT campaign_id FROM donations WHERE id = $1"#)
                        .bind(donation_id.as_uuid())
                        .fetch_one(&mut *db_tx)
                        .await
                        .map_err(|e| RepoError::Database(e.to_string()))?;

                sqlx::query(
                    r#"UPDATE campaigns SET raised_amount = raised_amount + $1 WHERE id = $2"#,
                )
                .bind(transaction.amount.amount())
                .bind(campaign_id)
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
               FROM donations WHERE user_id = $1 AND campaign_id = $2"#,
        )
        .bind(user_id.as_uuid())
        .bind(campaign_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbDonation::into_domain).transpose()
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Transaction>, RepoError> {
        let row: Option<DbTransaction> = sqlx::query_as(&format!(
            "SELECT {} FROM transactions WHERE idempotency_key = $1",
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
            "SELECT {} FROM transactions WHERE gateway_reference = $1",
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
            "SELECT {} FROM transactions WHERE id = $1",
            TX_COLUMNS
        ))
        .bind(id.as_uuid())
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
            "SELECT {} FROM transactions WHERE user_id = $1 ORDER BY created_at DESC",
            TX_COLUMNS
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbTransaction::into_domain).collect()
    }

    async fn recompute_raised(&self, campaign_id: CampaignId) -> Result<Money, RepoError> {
        let currency: Option<String> =
            sqlx::query_scalar(r#"SELECT currency FROM campaigns WHERE id = $1"#)
                .bind(campaign_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

        let currency = parse_currency(&currency.ok_or(RepoError::Domain(
            DomainError::CampaignNotFound(campaign_id),
        ))?)?;

        let row: DbTotal = sqlx::query_as(
            r#"SELECT COALESCE(SUM(t.amount), 0)::BIGINT AS total
               FROM transactions t
               JOIN donations d ON t.donation_id = d.id
               WHERE d.campaign_id = $1 AND t.kind = 'DONATION' AND t.status = 'COMPLETED'"#,
        )
        .bind(campaign_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Money::new(row.total, currency).map_err(RepoError::Domain)
    }

    async fn reconcile_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<ReconcileReport, RepoError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        // Hold the campaign row so no increment lands between the
        // recompute and the correction.
        let funds: Option<DbCampaignFunds> = sqlx::query_as(
            r#"SELECT raised_amount, currency FROM campaigns WHERE id = $1 FOR UPDATE"#,
        )
        .bind(campaign_id.as_uuid())
        .fetch_optional(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let funds = funds.ok_or(RepoError::Domain(DomainError::CampaignNotFound(
            campaign_id,
        )))?;
        let currency = parse_currency(&funds.currency)?;
        let cached = Money::new(funds.raised_amount, currency).map_err(RepoError::Domain)?;

        let row: DbTotal = sqlx::query_as(
            r#"SELECT COALESCE(SUM(t.amount), 0)::BIGINT AS total
               FROM transactions t
               JOIN donations d ON t.donation_id = d.id
               WHERE d.campaign_id = $1 AND t.kind = 'DONATION' AND t.status = 'COMPLETED'"#,
        )
        .bind(campaign_id.as_uuid())
        .fetch_one(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let recomputed = Money::new(row.total, currency).map_err(RepoError::Domain)?;

        let corrected = if cached != recomputed {
            sqlx::query(r#"UPDATE campaigns SET raised_amount = $1 WHERE id = $2"#)
                .bind(recomputed.amount())
                .bind(campaign_id.as_uuid())
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
