//! Fund aggregate read path and drift reconciliation.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crowdfund_types::{
    AppError, Campaign, CampaignId, CampaignSummary, LedgerRepository, Money, ReconcileReport,
};

/// How the raised total is served on reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregateStrategy {
    /// Trust the increments applied inside the storage transactions.
    #[default]
    Incremental,
    /// Recompute from completed transactions on every read.
    RecomputeOnRead,
}

impl std::str::FromStr for AggregateStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "incremental" => Ok(AggregateStrategy::Incremental),
            "recompute" | "recompute_on_read" => Ok(AggregateStrategy::RecomputeOnRead),
            _ => Err(format!("Unknown aggregate strategy: {}", s)),
        }
    }
}

/// Owns the read path for campaign raised totals.
///
/// Whatever the read strategy, the periodic sweep recomputes every
/// campaign from the ledger and corrects the cache when a bypassed write
/// path let it drift. Drift is logged and repaired, never surfaced as a
/// request failure.
#[derive(Clone)]
pub struct FundAggregator<R: LedgerRepository + Clone> {
    repo: R,
    strategy: AggregateStrategy,
}

impl<R: LedgerRepository + Clone> FundAggregator<R> {
    /// Creates an aggregator over the given ledger.
    pub fn new(repo: R, strategy: AggregateStrategy) -> Self {
        Self { repo, strategy }
    }

    /// The configured read strategy.
    pub fn strategy(&self) -> AggregateStrategy {
        self.strategy
    }

    /// The raised total for an already-loaded campaign.
    pub async fn raised(&self, campaign: &Campaign) -> Result<Money, AppError> {
        match self.strategy {
            AggregateStrategy::Incremental => Ok(campaign.raised_amount),
            AggregateStrategy::RecomputeOnRead => self
                .repo
                .recompute_raised(campaign.id)
                .await
                .map_err(Into::into),
        }
    }

    /// Funding summary for a campaign.
    pub async fn summary(&self, campaign_id: CampaignId) -> Result<CampaignSummary, AppError> {
        let campaign = self
            .repo
            .get_campaign(campaign_id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::NotFound(format!("Campaign {}", campaign_id)))?;

        let raised = self.raised(&campaign).await?;

        Ok(CampaignSummary {
            campaign_id,
            raised_amount: raised.amount(),
            goal_amount: campaign.goal_amount.amount(),
            currency: campaign.currency(),
            active: campaign.active,
        })
    }

    /// Reconciles every campaign's cache against the ledger.
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> Result<Vec<ReconcileReport>, AppError> {
        let campaigns = self.repo.list_campaigns().await.map_err(AppError::from)?;
        let mut reports = Vec::with_capacity(campaigns.len());

        for campaign in campaigns {
            let report = self
                .repo
                .reconcile_campaign(campaign.id)
                .await
                .map_err(AppError::from)?;

            if report.corrected {
                warn!(
                    campaign_id = %report.campaign_id,
                    cached = report.cached.amount(),
                    recomputed = report.recomputed.amount(),
                    "aggregate drift detected and corrected"
                );
            }
            reports.push(report);
        }

        Ok(reports)
    }

    /// Runs the periodic reconciliation sweep until the task is dropped.
    #[instrument(skip(self))]
    pub async fn run(self, interval: Duration) {
        info!("Starting aggregate reconciliation sweep every {:?}", interval);
        loop {
            if let Err(e) = self.sweep().await {
                error!("Reconciliation sweep failed: {}", e);
            }
            sleep(interval).await;
        }
    }
}
