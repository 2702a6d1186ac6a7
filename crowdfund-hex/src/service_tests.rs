//! DonationService unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crowdfund_gateways::{SimulatedBehavior, SimulatedGateway};
    use crowdfund_types::dto::CallbackOutcome;
    use crowdfund_types::{
        AppError, Campaign, CampaignId, CommitDonation, CreateCampaignRequest, Currency,
        DomainError, DonateRequest, Donation, DonationReceipt, GatewayCallback, GatewayKind,
        GatewayRegistry, LedgerRepository, Money, PaymentGateway, PaymentInstrument,
        ReconcileReport, RepoError, Transaction, TransactionId, TransactionOutcome,
        TransactionStatus, TransactionType, UserId,
    };

    use crate::aggregator::AggregateStrategy;
    use crate::service::DonationService;

    /// Simple in-memory ledger for testing the service layer.
    #[derive(Clone, Default)]
    pub struct MockRepo {
        campaigns: Arc<Mutex<HashMap<CampaignId, Campaign>>>,
        donations: Arc<Mutex<Vec<Donation>>>,
        transactions: Arc<Mutex<Vec<Transaction>>>,
    }

    impl MockRepo {
        fn completed_total(&self, campaign_id: CampaignId) -> i64 {
            let donations = self.donations.lock().unwrap();
            let transactions = self.transactions.lock().unwrap();
            transactions
                .iter()
                .filter(|t| {
                    t.kind == TransactionType::Donation
                        && t.status == TransactionStatus::Completed
                        && t.donation_id.is_some_and(|id| {
                            donations
                                .iter()
                                .any(|d| d.id == id && d.campaign_id == campaign_id)
                        })
                })
                .map(|t| t.amount.amount())
                .sum()
        }

        /// Overwrites the cached raised total, bypassing the ledger.
        fn corrupt_cache(&self, campaign_id: CampaignId, amount: i64) {
            let mut campaigns = self.campaigns.lock().unwrap();
            let campaign = campaigns.get_mut(&campaign_id).unwrap();
            campaign.raised_amount = Money::new(amount, campaign.currency()).unwrap();
        }

        fn transaction_count(&self) -> usize {
            self.transactions.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LedgerRepository for MockRepo {
        async fn create_campaign(
            &self,
            req: CreateCampaignRequest,
        ) -> Result<Campaign, RepoError> {
            let goal = Money::new(req.goal_amount, req.currency).map_err(RepoError::Domain)?;
            let campaign =
                Campaign::new(req.title, goal, req.creator_id).map_err(RepoError::Domain)?;
            self.campaigns
                .lock()
                .unwrap()
                .insert(campaign.id, campaign.clone());
            Ok(campaign)
        }

        async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>, RepoError> {
            Ok(self.campaigns.lock().unwrap().get(&id).cloned())
        }

        async fn list_campaigns(&self) -> Result<Vec<Campaign>, RepoError> {
            Ok(self.campaigns.lock().unwrap().values().cloned().collect())
        }

        async fn set_campaign_active(
            &self,
            id: CampaignId,
            active: bool,
        ) -> Result<(), RepoError> {
            let mut campaigns = self.campaigns.lock().unwrap();
            let campaign = campaigns.get_mut(&id).ok_or(RepoError::NotFound)?;
            campaign.active = active;
            Ok(())
        }

        async fn commit_donation(
            &self,
            req: CommitDonation,
        ) -> Result<DonationReceipt, RepoError> {
            let amount = Money::new(req.amount, req.currency).map_err(RepoError::Domain)?;

            let mut campaigns = self.campaigns.lock().unwrap();
            let campaign = campaigns
                .get_mut(&req.campaign_id)
                .ok_or(RepoError::Domain(DomainError::CampaignNotFound(
                    req.campaign_id,
                )))?;
            campaign.accepts(&amount).map_err(RepoError::Domain)?;

            let mut donations = self.donations.lock().unwrap();
            if donations
                .iter()
                .any(|d| d.user_id == req.user_id && d.campaign_id == req.campaign_id)
            {
                return Err(RepoError::Domain(DomainError::DuplicateDonation {
                    user_id: req.user_id,
                    campaign_id: req.campaign_id,
                }));
            }

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

            if transaction.status == TransactionStatus::Completed {
                campaign.credit_raised(amount).map_err(RepoError::Domain)?;
            }

            donations.push(donation.clone());
            self.transactions.lock().unwrap().push(transaction.clone());

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
            let mut transactions = self.transactions.lock().unwrap();
            let stored = transactions
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or(RepoError::NotFound)?;

            if !stored.finalize(&outcome).map_err(RepoError::Domain)? {
                return Ok(stored.clone());
            }
            let finalized = stored.clone();
            drop(transactions);

            if finalized.status == TransactionStatus::Completed
                && finalized.kind == TransactionType::Donation
            {
                if let Some(donation_id) = finalized.donation_id {
                    let campaign_id = self
                        .donations
                        .lock()
                        .unwrap()
                        .iter()
                        .find(|d| d.id == donation_id)
                        .map(|d| d.campaign_id);
                    if let Some(campaign_id) = campaign_id {
                        let mut campaigns = self.campaigns.lock().unwrap();
                        if let Some(campaign) = campaigns.get_mut(&campaign_id) {
                            campaign
                                .credit_raised(finalized.amount)
                                .map_err(RepoError::Domain)?;
                        }
                    }
                }
            }

            Ok(finalized)
        }

        async fn find_donation(
            &self,
            user_id: UserId,
            campaign_id: CampaignId,
        ) -> Result<Option<Donation>, RepoError> {
            Ok(self
                .donations
                .lock()
                .unwrap()
                .iter()
                .find(|d| d.user_id == user_id && d.campaign_id == campaign_id)
                .cloned())
        }

        async fn find_by_idempotency_key(
            &self,
            key: &str,
        ) -> Result<Option<Transaction>, RepoError> {
            Ok(self
                .transactions
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.idempotency_key.as_deref() == Some(key))
                .cloned())
        }

        async fn find_by_gateway_reference(
            &self,
            reference: &str,
        ) -> Result<Option<Transaction>, RepoError> {
            Ok(self
                .transactions
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.gateway_reference.as_deref() == Some(reference))
                .cloned())
        }

        async fn get_transaction(
            &self,
            id: TransactionId,
        ) -> Result<Option<Transaction>, RepoError> {
            Ok(self
                .transactions
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.id == id)
                .cloned())
        }

        async fn list_transactions_for_user(
            &self,
            user_id: UserId,
        ) -> Result<Vec<Transaction>, RepoError> {
            let mut transactions: Vec<Transaction> = self
                .transactions
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.user_id == user_id)
                .cloned()
                .collect();
            transactions.reverse();
            Ok(transactions)
        }

        async fn recompute_raised(&self, campaign_id: CampaignId) -> Result<Money, RepoError> {
            let currency = self
                .campaigns
                .lock()
                .unwrap()
                .get(&campaign_id)
                .map(|c| c.currency())
                .ok_or(RepoError::Domain(DomainError::CampaignNotFound(
                    campaign_id,
                )))?;
            Money::new(self.completed_total(campaign_id), currency).map_err(RepoError::Domain)
        }

        async fn reconcile_campaign(
            &self,
            campaign_id: CampaignId,
        ) -> Result<ReconcileReport, RepoError> {
            let total = self.completed_total(campaign_id);
            let mut campaigns = self.campaigns.lock().unwrap();
            let campaign = campaigns
                .get_mut(&campaign_id)
                .ok_or(RepoError::Domain(DomainError::CampaignNotFound(
                    campaign_id,
                )))?;

            let cached = campaign.raised_amount;
            let recomputed = Money::new(total, campaign.currency()).map_err(RepoError::Domain)?;
            let corrected = cached != recomputed;
            if corrected {
                campaign.raised_amount = recomputed;
            }

            Ok(ReconcileReport {
                campaign_id,
                cached,
                recomputed,
                corrected,
            })
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Test harness
    // ─────────────────────────────────────────────────────────────────────────

    const SECRET: &str = "test-secret";

    struct Harness {
        service: DonationService<MockRepo>,
        repo: MockRepo,
        momo: Arc<SimulatedGateway>,
    }

    fn harness(card: SimulatedBehavior, momo: SimulatedBehavior) -> Harness {
        harness_with_strategy(card, momo, AggregateStrategy::Incremental)
    }

    fn harness_with_strategy(
        card: SimulatedBehavior,
        momo: SimulatedBehavior,
        strategy: AggregateStrategy,
    ) -> Harness {
        let repo = MockRepo::default();
        let card = Arc::new(SimulatedGateway::new(GatewayKind::Card, card, SECRET));
        let momo = Arc::new(SimulatedGateway::new(GatewayKind::MobileMoney, momo, SECRET));
        let registry = GatewayRegistry::new()
            .register(card as Arc<dyn PaymentGateway>)
            .register(momo.clone() as Arc<dyn PaymentGateway>);
        let service = DonationService::new(repo.clone(), registry, strategy);
        Harness {
            service,
            repo,
            momo,
        }
    }

    async fn create_campaign(service: &DonationService<MockRepo>, goal_amount: i64) -> Campaign {
        service
            .create_campaign(CreateCampaignRequest {
                title: "Community well".to_string(),
                goal_amount,
                currency: Currency::USD,
                creator_id: UserId::new(),
            })
            .await
            .unwrap()
    }

    fn card_instrument() -> PaymentInstrument {
        PaymentInstrument::Card {
            token: "tok_visa".to_string(),
        }
    }

    fn momo_instrument() -> PaymentInstrument {
        PaymentInstrument::MobileMoney {
            msisdn: "+265991234567".to_string(),
            email: None,
        }
    }

    fn donate_req(
        user_id: UserId,
        campaign_id: CampaignId,
        amount: i64,
        instrument: PaymentInstrument,
        nonce: Option<&str>,
    ) -> DonateRequest {
        DonateRequest {
            user_id,
            campaign_id,
            amount,
            currency: Currency::USD,
            instrument,
            nonce: nonce.map(String::from),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_campaign_validation() {
        let h = harness(SimulatedBehavior::Approve, SimulatedBehavior::Pend);

        let empty_title = h
            .service
            .create_campaign(CreateCampaignRequest {
                title: "   ".to_string(),
                goal_amount: 100_000,
                currency: Currency::USD,
                creator_id: UserId::new(),
            })
            .await;
        assert!(matches!(empty_title, Err(AppError::BadRequest(_))));

        let zero_goal = h
            .service
            .create_campaign(CreateCampaignRequest {
                title: "Water".to_string(),
                goal_amount: 0,
                currency: Currency::USD,
                creator_id: UserId::new(),
            })
            .await;
        assert!(matches!(zero_goal, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_sync_approved_donation() {
        let h = harness(SimulatedBehavior::Approve, SimulatedBehavior::Pend);
        let campaign = create_campaign(&h.service, 100_000).await;

        let tx = h
            .service
            .donate(donate_req(
                UserId::new(),
                campaign.id,
                25_000,
                card_instrument(),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Completed);
        assert!(tx.gateway_reference.is_some());

        let summary = h.service.campaign_summary(campaign.id).await.unwrap();
        assert_eq!(summary.raised_amount, 25_000);
        assert_eq!(summary.goal_amount, 100_000);
    }

    #[tokio::test]
    async fn test_sync_declined_donation() {
        let h = harness(
            SimulatedBehavior::Decline {
                reason: "card expired".to_string(),
            },
            SimulatedBehavior::Pend,
        );
        let campaign = create_campaign(&h.service, 100_000).await;

        let tx = h
            .service
            .donate(donate_req(
                UserId::new(),
                campaign.id,
                25_000,
                card_instrument(),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Failed);
        assert_eq!(tx.failure_reason.as_deref(), Some("card expired"));

        let summary = h.service.campaign_summary(campaign.id).await.unwrap();
        assert_eq!(summary.raised_amount, 0);
    }

    #[tokio::test]
    async fn test_async_pending_then_approved_callback() {
        let h = harness(SimulatedBehavior::Approve, SimulatedBehavior::Pend);
        let campaign = create_campaign(&h.service, 100_000).await;

        let tx = h
            .service
            .donate(donate_req(
                UserId::new(),
                campaign.id,
                10_000,
                momo_instrument(),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Pending);
        let reference = tx.gateway_reference.clone().unwrap();

        let summary = h.service.campaign_summary(campaign.id).await.unwrap();
        assert_eq!(summary.raised_amount, 0);

        let signed = h
            .momo
            .settle(&reference, CallbackOutcome::Approved, None)
            .unwrap();
        let resolved = h.service.resolve_callback(signed.callback.clone()).await.unwrap();
        assert_eq!(resolved.status, TransactionStatus::Completed);

        let summary = h.service.campaign_summary(campaign.id).await.unwrap();
        assert_eq!(summary.raised_amount, 10_000);

        // a replayed callback changes nothing
        let replayed = h.service.resolve_callback(signed.callback).await.unwrap();
        assert_eq!(replayed.status, TransactionStatus::Completed);

        let summary = h.service.campaign_summary(campaign.id).await.unwrap();
        assert_eq!(summary.raised_amount, 10_000);
    }

    #[tokio::test]
    async fn test_callback_conflicting_outcome_rejected() {
        let h = harness(SimulatedBehavior::Approve, SimulatedBehavior::Pend);
        let campaign = create_campaign(&h.service, 100_000).await;

        let tx = h
            .service
            .donate(donate_req(
                UserId::new(),
                campaign.id,
                10_000,
                momo_instrument(),
                None,
            ))
            .await
            .unwrap();
        let reference = tx.gateway_reference.clone().unwrap();

        let signed = h
            .momo
            .settle(&reference, CallbackOutcome::Approved, None)
            .unwrap();
        h.service.resolve_callback(signed.callback).await.unwrap();

        let conflicting = GatewayCallback {
            reference,
            outcome: CallbackOutcome::Declined,
            reason: Some("late rejection".to_string()),
            payload: serde_json::Value::Null,
        };
        let result = h.service.resolve_callback(conflicting).await;
        assert!(matches!(result, Err(AppError::InvalidStateTransition(_))));
    }

    #[tokio::test]
    async fn test_callback_unknown_reference() {
        let h = harness(SimulatedBehavior::Approve, SimulatedBehavior::Pend);

        let result = h
            .service
            .resolve_callback(GatewayCallback {
                reference: "mm_ghost".to_string(),
                outcome: CallbackOutcome::Approved,
                reason: None,
                payload: serde_json::Value::Null,
            })
            .await;

        assert!(matches!(result, Err(AppError::UnknownReference(_))));
    }

    #[tokio::test]
    async fn test_duplicate_donation_rejected() {
        let h = harness(SimulatedBehavior::Approve, SimulatedBehavior::Pend);
        let campaign = create_campaign(&h.service, 100_000).await;
        let donor = UserId::new();

        h.service
            .donate(donate_req(donor, campaign.id, 25_000, card_instrument(), None))
            .await
            .unwrap();

        let result = h
            .service
            .donate(donate_req(donor, campaign.id, 5_000, card_instrument(), None))
            .await;
        assert!(matches!(result, Err(AppError::DuplicateDonation { .. })));

        let summary = h.service.campaign_summary(campaign.id).await.unwrap();
        assert_eq!(summary.raised_amount, 25_000);
    }

    #[tokio::test]
    async fn test_idempotent_retry_returns_same_transaction() {
        let h = harness(SimulatedBehavior::Approve, SimulatedBehavior::Pend);
        let campaign = create_campaign(&h.service, 100_000).await;
        let donor = UserId::new();

        let first = h
            .service
            .donate(donate_req(
                donor,
                campaign.id,
                25_000,
                card_instrument(),
                Some("retry-nonce"),
            ))
            .await
            .unwrap();

        let second = h
            .service
            .donate(donate_req(
                donor,
                campaign.id,
                25_000,
                card_instrument(),
                Some("retry-nonce"),
            ))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(h.repo.transaction_count(), 1);

        let summary = h.service.campaign_summary(campaign.id).await.unwrap();
        assert_eq!(summary.raised_amount, 25_000);
    }

    #[tokio::test]
    async fn test_timeout_leaves_pending() {
        let h = harness(SimulatedBehavior::Timeout, SimulatedBehavior::Pend);
        let campaign = create_campaign(&h.service, 100_000).await;

        let tx = h
            .service
            .donate(donate_req(
                UserId::new(),
                campaign.id,
                25_000,
                card_instrument(),
                Some("timeout-nonce"),
            ))
            .await
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.gateway_reference.is_none());

        let summary = h.service.campaign_summary(campaign.id).await.unwrap();
        assert_eq!(summary.raised_amount, 0);

        // the poll path later learns the charge went through
        let finalized = h
            .repo
            .finalize_transaction(tx.id, TransactionOutcome::Completed)
            .await
            .unwrap();
        assert_eq!(finalized.status, TransactionStatus::Completed);

        let summary = h.service.campaign_summary(campaign.id).await.unwrap();
        assert_eq!(summary.raised_amount, 25_000);

        // resolving again does not double-increment
        h.repo
            .finalize_transaction(tx.id, TransactionOutcome::Completed)
            .await
            .unwrap();
        let summary = h.service.campaign_summary(campaign.id).await.unwrap();
        assert_eq!(summary.raised_amount, 25_000);
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_is_unavailable() {
        let repo = MockRepo::default();
        let card = Arc::new(SimulatedGateway::new(
            GatewayKind::Card,
            SimulatedBehavior::Approve,
            SECRET,
        ));
        let registry = GatewayRegistry::new().register(card as Arc<dyn PaymentGateway>);
        let service = DonationService::new(
            repo.clone(),
            registry,
            AggregateStrategy::Incremental,
        );
        let campaign = create_campaign(&service, 100_000).await;

        let result = service
            .donate(donate_req(
                UserId::new(),
                campaign.id,
                25_000,
                momo_instrument(),
                None,
            ))
            .await;

        assert!(matches!(result, Err(AppError::GatewayUnavailable(_))));
        assert_eq!(repo.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_amount_validation() {
        let h = harness(SimulatedBehavior::Approve, SimulatedBehavior::Pend);
        let campaign = create_campaign(&h.service, 100_000).await;

        for amount in [0, -100] {
            let result = h
                .service
                .donate(donate_req(
                    UserId::new(),
                    campaign.id,
                    amount,
                    card_instrument(),
                    None,
                ))
                .await;
            assert!(matches!(result, Err(AppError::BadRequest(_))));
        }
    }

    #[tokio::test]
    async fn test_closed_campaign_rejects_donations() {
        let h = harness(SimulatedBehavior::Approve, SimulatedBehavior::Pend);
        let campaign = create_campaign(&h.service, 100_000).await;
        h.service.close_campaign(campaign.id).await.unwrap();

        let result = h
            .service
            .donate(donate_req(
                UserId::new(),
                campaign.id,
                25_000,
                card_instrument(),
                None,
            ))
            .await;

        assert!(matches!(result, Err(AppError::CampaignInactive(_))));
    }

    #[tokio::test]
    async fn test_concurrent_donors_sum_exactly() {
        let h = harness(SimulatedBehavior::Approve, SimulatedBehavior::Pend);
        let campaign = create_campaign(&h.service, 1_000_000).await;
        let service = Arc::new(h.service);

        let amounts: Vec<i64> = (1..=8).map(|i| i * 1_000).collect();
        let mut handles = Vec::new();
        for amount in amounts.clone() {
            let service = service.clone();
            let campaign_id = campaign.id;
            handles.push(tokio::spawn(async move {
                service
                    .donate(donate_req(
                        UserId::new(),
                        campaign_id,
                        amount,
                        card_instrument(),
                        None,
                    ))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let summary = service.campaign_summary(campaign.id).await.unwrap();
        assert_eq!(summary.raised_amount, amounts.iter().sum::<i64>());

        // the cache agrees with the recomputed ledger truth
        let total = service.donation_total(campaign.id).await.unwrap();
        assert_eq!(total.amount(), summary.raised_amount);
    }

    #[tokio::test]
    async fn test_sweep_corrects_drift() {
        let h = harness(SimulatedBehavior::Approve, SimulatedBehavior::Pend);
        let campaign = create_campaign(&h.service, 100_000).await;

        h.service
            .donate(donate_req(
                UserId::new(),
                campaign.id,
                25_000,
                card_instrument(),
                None,
            ))
            .await
            .unwrap();

        h.repo.corrupt_cache(campaign.id, 999);

        let reports = h.service.reconcile_now().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].corrected);
        assert!(reports[0].drifted());
        assert_eq!(reports[0].recomputed.amount(), 25_000);

        let summary = h.service.campaign_summary(campaign.id).await.unwrap();
        assert_eq!(summary.raised_amount, 25_000);

        // a clean pass reports no drift
        let reports = h.service.reconcile_now().await.unwrap();
        assert!(!reports[0].corrected);
    }

    #[tokio::test]
    async fn test_recompute_on_read_ignores_stale_cache() {
        let h = harness_with_strategy(
            SimulatedBehavior::Approve,
            SimulatedBehavior::Pend,
            AggregateStrategy::RecomputeOnRead,
        );
        let campaign = create_campaign(&h.service, 100_000).await;

        h.service
            .donate(donate_req(
                UserId::new(),
                campaign.id,
                25_000,
                card_instrument(),
                None,
            ))
            .await
            .unwrap();

        h.repo.corrupt_cache(campaign.id, 999);

        let summary = h.service.campaign_summary(campaign.id).await.unwrap();
        assert_eq!(summary.raised_amount, 25_000);
    }

    #[tokio::test]
    async fn test_recent_transactions_limit() {
        let h = harness(SimulatedBehavior::Approve, SimulatedBehavior::Pend);
        let donor = UserId::new();

        for _ in 0..3 {
            let campaign = create_campaign(&h.service, 100_000).await;
            h.service
                .donate(donate_req(donor, campaign.id, 1_000, card_instrument(), None))
                .await
                .unwrap();
        }

        let all = h.service.list_transactions(donor).await.unwrap();
        assert_eq!(all.len(), 3);

        let recent = h.service.recent_transactions(donor, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        // newest first
        assert_eq!(recent[0].id, all[0].id);
    }

    /// The full lifecycle: a synchronous approval, a duplicate rejection,
    /// and an asynchronous decline, with the aggregate checked at every
    /// quiescent point.
    #[tokio::test]
    async fn test_mixed_gateway_scenario() {
        let h = harness(SimulatedBehavior::Approve, SimulatedBehavior::Pend);
        let campaign = create_campaign(&h.service, 100_000).await;
        let alice = UserId::new();
        let bob = UserId::new();

        // Alice donates 250.00 through the card gateway
        let tx = h
            .service
            .donate(donate_req(alice, campaign.id, 25_000, card_instrument(), None))
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        let summary = h.service.campaign_summary(campaign.id).await.unwrap();
        assert_eq!(summary.raised_amount, 25_000);

        // Alice tries again
        let result = h
            .service
            .donate(donate_req(alice, campaign.id, 25_000, card_instrument(), None))
            .await;
        assert!(matches!(result, Err(AppError::DuplicateDonation { .. })));

        // Bob donates 100.00 through mobile money
        let tx = h
            .service
            .donate(donate_req(bob, campaign.id, 10_000, momo_instrument(), None))
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        let summary = h.service.campaign_summary(campaign.id).await.unwrap();
        assert_eq!(summary.raised_amount, 25_000);

        // the wallet rejects the charge
        let signed = h
            .momo
            .settle(
                &tx.gateway_reference.clone().unwrap(),
                CallbackOutcome::Declined,
                Some("wallet rejected".to_string()),
            )
            .unwrap();
        let resolved = h.service.resolve_callback(signed.callback).await.unwrap();
        assert_eq!(resolved.status, TransactionStatus::Failed);
        assert_eq!(resolved.failure_reason.as_deref(), Some("wallet rejected"));

        let summary = h.service.campaign_summary(campaign.id).await.unwrap();
        assert_eq!(summary.raised_amount, 25_000);

        let total = h.service.donation_total(campaign.id).await.unwrap();
        assert_eq!(total.amount(), 25_000);
    }
}
