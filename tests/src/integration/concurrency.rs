//! # Concurrency
//!
//! Racing writers on one pass, independent passes in parallel, and the
//! ambiguous-submit paths.

#[cfg(test)]
mod tests {
    use super::super::{Harness, AUTHORITY, CASHIER};
    use futures::future::join_all;
    use loyalty_protocol::{
        invariant_history_consistent, invariant_tier_consistent, AwardPointsParams,
        GiftPointsParams, LoyaltyError, LoyaltyProgramApi, Multiplier, PassId, ProtocolConfig,
        RetryConfig, Tier, UpdateProgramParams,
    };
    use std::time::Duration;

    const WRITERS: usize = 10;

    fn racing_config() -> ProtocolConfig {
        // Each writer loses at most once per competing commit.
        ProtocolConfig {
            retry: RetryConfig {
                max_attempts: (WRITERS as u32) * 2,
                base_delay_ms: 1,
                max_delay_ms: 5,
                jitter: true,
            },
            ..ProtocolConfig::for_testing()
        }
    }

    fn purchase(pass: PassId) -> AwardPointsParams {
        AwardPointsParams {
            pass,
            action: "purchase".to_string(),
            multiplier: Multiplier::default(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_awards_all_land() {
        let h = Harness::with_config(racing_config()).await;
        h.ledger.set_yield_on_read(true);

        let handles: Vec<_> = (0..WRITERS)
            .map(|i| {
                let protocol = h.protocol.clone();
                let pass = h.alice_pass;
                let signer = if i % 2 == 0 { AUTHORITY } else { CASHIER };
                tokio::spawn(async move { protocol.award_points(purchase(pass), signer).await })
            })
            .collect();

        for result in join_all(handles).await {
            result.expect("task panicked").expect("award failed");
        }

        let asset = h.ledger.asset(&h.alice_pass).unwrap().value;
        assert_eq!(asset.xp, 50 * WRITERS as u64);
        assert_eq!(asset.action_history.len(), WRITERS);
        assert!(invariant_history_consistent(&asset));

        let tiers = h.protocol.get_program_tiers(h.collection).await.unwrap();
        assert!(invariant_tier_consistent(&asset, &tiers));
        assert_eq!(asset.current_tier, "Gold");

        let metrics = h.protocol.metrics();
        assert_eq!(metrics.conflicts_exhausted, 0);
        assert!(metrics.commits >= WRITERS as u64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_independent_passes_progress_in_parallel() {
        let h = Harness::with_config(racing_config()).await;
        h.ledger.set_yield_on_read(true);

        let mut handles = Vec::new();
        for pass in [h.alice_pass, h.bob_pass] {
            for _ in 0..WRITERS / 2 {
                let protocol = h.protocol.clone();
                handles.push(tokio::spawn(async move {
                    protocol
                        .gift_points(
                            GiftPointsParams {
                                pass,
                                points_to_gift: 7,
                                action: "promo".to_string(),
                            },
                            AUTHORITY,
                        )
                        .await
                }));
            }
        }
        for result in join_all(handles).await {
            result.expect("task panicked").expect("gift failed");
        }

        for pass in [h.alice_pass, h.bob_pass] {
            let asset = h.ledger.asset(&pass).unwrap().value;
            assert_eq!(asset.xp, 7 * (WRITERS / 2) as u64);
            assert!(invariant_history_consistent(&asset));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_program_update_does_not_block_awards() {
        let h = Harness::with_config(racing_config()).await;
        h.ledger.set_yield_on_read(true);

        let update = {
            let protocol = h.protocol.clone();
            let collection = h.collection;
            tokio::spawn(async move {
                protocol
                    .update_loyalty_program(
                        UpdateProgramParams {
                            collection,
                            new_tiers: Some(vec![
                                Tier::new("Bronze", 0, vec![]),
                                Tier::new("Silver", 100, vec![]),
                                Tier::new("Gold", 1_000, vec![]),
                                Tier::new("Platinum", 5_000, vec![]),
                            ]),
                            ..Default::default()
                        },
                        AUTHORITY,
                    )
                    .await
            })
        };
        let awards: Vec<_> = (0..4)
            .map(|_| {
                let protocol = h.protocol.clone();
                let pass = h.alice_pass;
                tokio::spawn(async move { protocol.award_points(purchase(pass), CASHIER).await })
            })
            .collect();

        update.await.expect("task panicked").expect("update failed");
        for result in join_all(awards).await {
            result.expect("task panicked").expect("award failed");
        }

        let asset = h.ledger.asset(&h.alice_pass).unwrap().value;
        assert_eq!(asset.xp, 200);
        let tiers = h.protocol.get_program_tiers(h.collection).await.unwrap();
        assert_eq!(tiers.len(), 4);
        assert!(invariant_tier_consistent(&asset, &tiers));
    }

    #[tokio::test]
    async fn test_points_commit_retries_after_tier_table_moves() {
        let h = Harness::new().await;
        h.ledger.set_submit_delay(Some(Duration::from_millis(150)));

        let gift = {
            let protocol = h.protocol.clone();
            let pass = h.alice_pass;
            tokio::spawn(async move {
                protocol
                    .gift_points(
                        GiftPointsParams {
                            pass,
                            points_to_gift: 150,
                            action: "promo".to_string(),
                        },
                        AUTHORITY,
                    )
                    .await
            })
        };

        // Let the gift read its snapshot and stall inside submit.
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.ledger.set_submit_delay(None);
        h.protocol
            .update_loyalty_program(
                UpdateProgramParams {
                    collection: h.collection,
                    new_tiers: Some(vec![
                        Tier::new("Bronze", 0, vec![]),
                        Tier::new("Silver", 1_000, vec![]),
                    ]),
                    ..Default::default()
                },
                AUTHORITY,
            )
            .await
            .unwrap();

        let outcome = gift.await.expect("task panicked").expect("gift failed");
        assert_eq!(outcome.points, 150);
        assert!(outcome.new_tier.is_none());

        let asset = h.ledger.asset(&h.alice_pass).unwrap().value;
        let tiers = h.protocol.get_program_tiers(h.collection).await.unwrap();
        assert_eq!(asset.current_tier, "Bronze");
        assert!(invariant_tier_consistent(&asset, &tiers));
        assert_eq!(asset.action_history.len(), 1);
        assert!(h.protocol.metrics().conflicts_retried >= 1);
    }

    // =============================================================================
    // AMBIGUOUS SUBMITS
    // =============================================================================

    #[tokio::test]
    async fn test_lost_ack_is_indeterminate_but_applied() {
        let h = Harness::new().await;
        h.ledger.inject_lost_acks(1);

        let err = h
            .protocol
            .award_points(purchase(h.alice_pass), AUTHORITY)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::Indeterminate(_)));
        assert!(err.requires_refetch());

        let refetched = h.protocol.get_asset_data(h.alice_pass).await.unwrap().asset;
        assert_eq!(refetched.xp, 50);
        assert_eq!(refetched.action_history.len(), 1);
        assert_eq!(h.protocol.metrics().indeterminate, 1);
    }

    #[tokio::test]
    async fn test_slow_submit_times_out_without_retry() {
        let config = ProtocolConfig {
            submit_timeout_ms: 20,
            ..ProtocolConfig::for_testing()
        };
        let h = Harness::with_config(config).await;
        h.ledger.set_submit_delay(Some(Duration::from_millis(300)));
        let committed = h.ledger.committed();

        let err = h
            .protocol
            .award_points(purchase(h.alice_pass), AUTHORITY)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::Indeterminate(_)));
        assert_eq!(h.ledger.committed(), committed);
        assert_eq!(h.protocol.metrics().conflicts_retried, 0);

        h.ledger.set_submit_delay(None);
        let outcome = h
            .protocol
            .award_points(purchase(h.alice_pass), AUTHORITY)
            .await
            .unwrap();
        assert_eq!(outcome.points, 50);
    }

    #[tokio::test]
    async fn test_injected_timeout_is_not_retried() {
        let h = Harness::new().await;
        h.ledger.inject_timeouts(1);
        let before = h.ledger.asset(&h.alice_pass).unwrap();

        let err = h
            .protocol
            .award_points(purchase(h.alice_pass), AUTHORITY)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::Indeterminate(_)));
        assert_eq!(h.ledger.asset(&h.alice_pass).unwrap(), before);
    }

    #[tokio::test]
    async fn test_conflicts_then_success() {
        let h = Harness::new().await;
        h.ledger.inject_conflicts(3);

        let outcome = h
            .protocol
            .award_points(purchase(h.alice_pass), AUTHORITY)
            .await
            .unwrap();
        assert_eq!(outcome.points, 50);
        assert_eq!(h.protocol.metrics().conflicts_retried, 3);

        let asset = h.ledger.asset(&h.alice_pass).unwrap().value;
        assert_eq!(asset.action_history.len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_conflicts_surface() {
        let h = Harness::new().await;
        h.ledger.inject_conflicts(10);

        let err = h
            .protocol
            .award_points(purchase(h.alice_pass), AUTHORITY)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoyaltyError::ConcurrentModification { attempts: 5 }
        ));
        assert_eq!(h.protocol.metrics().conflicts_exhausted, 1);
        assert_eq!(h.ledger.asset(&h.alice_pass).unwrap().value.xp, 0);
    }
}
