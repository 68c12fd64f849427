//! # Points Flow
//!
//! Award, revoke, gift and transfer through the full service stack.

#[cfg(test)]
mod tests {
    use super::super::{Harness, ALICE, AUTHORITY, BOB, CASHIER, MALLORY};
    use loyalty_protocol::{
        invariant_history_consistent, invariant_tier_consistent, replay_history, ActionKind,
        AwardPointsParams, GiftPointsParams, IssuePassParams, LoyaltyError, LoyaltyProgramApi,
        Multiplier, PassId, RevokePointsParams, Tier, UpdateProgramParams,
    };
    use proptest::prelude::*;

    fn purchase(pass: PassId) -> AwardPointsParams {
        AwardPointsParams {
            pass,
            action: "purchase".to_string(),
            multiplier: Multiplier::default(),
        }
    }

    fn gift(pass: PassId, points: i64) -> GiftPointsParams {
        GiftPointsParams {
            pass,
            points_to_gift: points,
            action: "welcome-bonus".to_string(),
        }
    }

    // =============================================================================
    // TIER TRANSITIONS
    // =============================================================================

    #[tokio::test]
    async fn test_bronze_to_silver_then_no_transition() {
        let h = Harness::new().await;
        h.protocol
            .gift_points(gift(h.alice_pass, 80), AUTHORITY)
            .await
            .unwrap();

        let first = h
            .protocol
            .award_points(purchase(h.alice_pass), AUTHORITY)
            .await
            .unwrap();
        assert_eq!(first.points, 130);
        assert_eq!(first.new_tier.as_ref().map(|t| t.name.as_str()), Some("Silver"));
        assert_eq!(first.previous_tier, "Bronze");

        let second = h
            .protocol
            .award_points(purchase(h.alice_pass), AUTHORITY)
            .await
            .unwrap();
        assert_eq!(second.points, 180);
        assert!(second.new_tier.is_none());

        let data = h.protocol.get_asset_data(h.alice_pass).await.unwrap();
        assert_eq!(data.asset.current_tier, "Silver");
        assert_eq!(data.rewards, vec!["free-pastry".to_string()]);
        assert_eq!(data.asset.last_action.as_deref(), Some("purchase"));
    }

    #[tokio::test]
    async fn test_tier_updated_at_tracks_tier_changes_only() {
        let h = Harness::new().await;
        h.clock.advance(1_000);
        h.protocol
            .gift_points(gift(h.alice_pass, 100), AUTHORITY)
            .await
            .unwrap();
        let promoted_at = h.protocol.get_asset_data(h.alice_pass).await.unwrap().asset.tier_updated_at;

        h.clock.advance(1_000);
        h.protocol
            .award_points(purchase(h.alice_pass), AUTHORITY)
            .await
            .unwrap();
        let asset = h.protocol.get_asset_data(h.alice_pass).await.unwrap().asset;
        assert_eq!(asset.tier_updated_at, promoted_at);
        assert!(asset.action_history[1].timestamp > promoted_at);
    }

    #[tokio::test]
    async fn test_revoke_saturates_and_downgrades() {
        let h = Harness::new().await;
        h.protocol
            .gift_points(gift(h.alice_pass, 120), AUTHORITY)
            .await
            .unwrap();
        let outcome = h
            .protocol
            .revoke_points(
                RevokePointsParams {
                    pass: h.alice_pass,
                    points_to_revoke: 500,
                },
                CASHIER,
            )
            .await
            .unwrap();
        assert_eq!(outcome.points, 0);
        assert_eq!(outcome.delta, -120);
        assert_eq!(outcome.new_tier.map(|t| t.name), Some("Bronze".to_string()));

        let asset = h.ledger.asset(&h.alice_pass).unwrap().value;
        assert_eq!(asset.action_history[1].kind, ActionKind::Revoke);
        assert_eq!(asset.action_history[1].points, -120);
        assert!(invariant_history_consistent(&asset));
    }

    #[tokio::test]
    async fn test_fractional_multiplier_floors() {
        let h = Harness::new().await;
        let outcome = h
            .protocol
            .award_points(
                AwardPointsParams {
                    pass: h.alice_pass,
                    action: "review".to_string(),
                    multiplier: Multiplier::new(5, 4).unwrap(),
                },
                AUTHORITY,
            )
            .await
            .unwrap();
        assert_eq!(outcome.points, 12);
    }

    // =============================================================================
    // REJECTIONS LEAVE NO TRACE
    // =============================================================================

    #[tokio::test]
    async fn test_negative_gift_writes_nothing() {
        let h = Harness::new().await;
        let before = h.ledger.asset(&h.alice_pass).unwrap();
        let err = h
            .protocol
            .gift_points(gift(h.alice_pass, -5), AUTHORITY)
            .await
            .unwrap_err();
        assert_eq!(err, LoyaltyError::InvalidAmount(-5));
        assert_eq!(h.ledger.asset(&h.alice_pass).unwrap(), before);
    }

    #[tokio::test]
    async fn test_unknown_action_writes_nothing() {
        let h = Harness::new().await;
        let err = h
            .protocol
            .award_points(
                AwardPointsParams {
                    pass: h.alice_pass,
                    action: "referral".to_string(),
                    multiplier: Multiplier::default(),
                },
                AUTHORITY,
            )
            .await
            .unwrap_err();
        assert_eq!(err, LoyaltyError::UnknownAction("referral".to_string()));
        assert!(h.ledger.asset(&h.alice_pass).unwrap().value.action_history.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_signers_change_nothing() {
        let h = Harness::new().await;
        let before = h.ledger.asset(&h.alice_pass).unwrap();
        let committed = h.ledger.committed();

        for signer in [ALICE, BOB, MALLORY] {
            let err = h
                .protocol
                .award_points(purchase(h.alice_pass), signer)
                .await
                .unwrap_err();
            assert!(matches!(err, LoyaltyError::Unauthorized(_)), "{:?}", err);
        }
        let err = h
            .protocol
            .revoke_points(
                RevokePointsParams {
                    pass: h.alice_pass,
                    points_to_revoke: 1,
                },
                ALICE,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::Unauthorized(_)));

        assert_eq!(h.ledger.asset(&h.alice_pass).unwrap(), before);
        assert_eq!(h.ledger.committed(), committed);
        assert_eq!(h.protocol.metrics().unauthorized, 4);
    }

    #[tokio::test]
    async fn test_removed_point_authority_loses_access() {
        let h = Harness::new().await;
        h.protocol
            .award_points(purchase(h.alice_pass), CASHIER)
            .await
            .unwrap();

        h.protocol
            .update_loyalty_program(
                UpdateProgramParams {
                    collection: h.collection,
                    new_point_authorities: Some([AUTHORITY].into_iter().collect()),
                    ..Default::default()
                },
                AUTHORITY,
            )
            .await
            .unwrap();

        let err = h
            .protocol
            .award_points(purchase(h.alice_pass), CASHIER)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::Unauthorized(_)));
    }

    // =============================================================================
    // PROGRAM UPDATES
    // =============================================================================

    #[tokio::test]
    async fn test_tier_update_applies_on_next_change() {
        let h = Harness::new().await;
        h.protocol
            .gift_points(gift(h.alice_pass, 80), AUTHORITY)
            .await
            .unwrap();

        let new_tiers = vec![
            Tier::new("Bronze", 0, vec![]),
            Tier::new("Silver", 50, vec![]),
            Tier::new("Gold", 200, vec![]),
        ];
        h.protocol
            .update_loyalty_program(
                UpdateProgramParams {
                    collection: h.collection,
                    new_tiers: Some(new_tiers.clone()),
                    ..Default::default()
                },
                AUTHORITY,
            )
            .await
            .unwrap();

        let asset = h.ledger.asset(&h.alice_pass).unwrap().value;
        assert_eq!(asset.current_tier, "Bronze");

        let outcome = h
            .protocol
            .gift_points(gift(h.alice_pass, 1), AUTHORITY)
            .await
            .unwrap();
        assert_eq!(outcome.new_tier.map(|t| t.name), Some("Silver".to_string()));
        let asset = h.ledger.asset(&h.alice_pass).unwrap().value;
        assert!(invariant_tier_consistent(&asset, &new_tiers));
    }

    #[tokio::test]
    async fn test_update_rejects_malformed_tiers() {
        let h = Harness::new().await;
        let err = h
            .protocol
            .update_loyalty_program(
                UpdateProgramParams {
                    collection: h.collection,
                    new_tiers: Some(vec![
                        Tier::new("Silver", 100, vec![]),
                        Tier::new("Silver", 200, vec![]),
                    ]),
                    ..Default::default()
                },
                AUTHORITY,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::MalformedTierTable(_)));
    }

    #[tokio::test]
    async fn test_program_details_counts_mints() {
        let h = Harness::new().await;
        let details = h.protocol.get_program_details(h.collection).await.unwrap();
        assert_eq!(details.program.num_minted, 2);
        assert_eq!(details.total_broadcasts, 0);
        assert_eq!(details.program.metadata.organization_name, "Bean Co");
    }

    // =============================================================================
    // TRANSFERS
    // =============================================================================

    #[tokio::test]
    async fn test_transfer_keeps_points() {
        let h = Harness::new().await;
        h.protocol
            .gift_points(gift(h.alice_pass, 40), AUTHORITY)
            .await
            .unwrap();
        h.protocol
            .approve_transfer(h.alice_pass, BOB, ALICE)
            .await
            .unwrap();

        let bob_passes = h.protocol.get_wallet_loyalty_passes(BOB).await.unwrap();
        assert_eq!(bob_passes.len(), 2);
        assert!(bob_passes.windows(2).all(|w| w[0].pass < w[1].pass));
        let moved = bob_passes.iter().find(|a| a.pass == h.alice_pass).unwrap();
        assert_eq!(moved.xp, 40);
        assert_eq!(moved.action_history.len(), 1);

        let err = h
            .protocol
            .approve_transfer(h.alice_pass, ALICE, ALICE)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_update_authority_can_transfer() {
        let h = Harness::new().await;
        h.protocol
            .approve_transfer(h.bob_pass, ALICE, AUTHORITY)
            .await
            .unwrap();
        assert_eq!(h.ledger.asset(&h.bob_pass).unwrap().value.owner, ALICE);
    }

    #[tokio::test]
    async fn test_wallet_passes_span_programs() {
        let h = Harness::new().await;
        let mut params = super::super::coffee_club();
        params.name = "Tea Club".to_string();
        let tea = h
            .protocol
            .create_loyalty_program(params, AUTHORITY)
            .await
            .unwrap()
            .collection;
        h.protocol
            .issue_loyalty_pass(
                IssuePassParams {
                    collection: tea,
                    recipient: ALICE,
                    pass_name: "Alice tea".to_string(),
                    pass_metadata_uri: String::new(),
                },
                AUTHORITY,
            )
            .await
            .unwrap();

        let passes = h.protocol.get_wallet_loyalty_passes(ALICE).await.unwrap();
        assert_eq!(passes.len(), 2);
        assert!(passes.windows(2).all(|w| w[0].pass < w[1].pass));
        assert!(passes.iter().any(|p| p.collection == tea));
    }

    #[tokio::test]
    async fn test_issue_requires_update_authority() {
        let h = Harness::new().await;
        let err = h
            .protocol
            .issue_loyalty_pass(
                IssuePassParams {
                    collection: h.collection,
                    recipient: MALLORY,
                    pass_name: "free pass".to_string(),
                    pass_metadata_uri: String::new(),
                },
                CASHIER,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::Unauthorized(_)));
        assert!(h.protocol.get_wallet_loyalty_passes(MALLORY).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commits_exported_to_prometheus() {
        loyalty_telemetry::register_metrics().unwrap();
        let h = Harness::new().await;
        h.protocol
            .gift_points(gift(h.alice_pass, 100), AUTHORITY)
            .await
            .unwrap();

        let text = loyalty_telemetry::encode_metrics().unwrap();
        assert!(text.contains("loyalty_operations_total"));
        assert!(text.contains("loyalty_tier_transitions_total"));
        assert!(text.contains("loyalty_ledger_submit_duration_seconds"));
    }

    // =============================================================================
    // HISTORY
    // =============================================================================

    #[tokio::test]
    async fn test_clock_skew_keeps_history_ordered() {
        let h = Harness::new().await;
        h.protocol
            .award_points(purchase(h.alice_pass), AUTHORITY)
            .await
            .unwrap();
        h.clock.set(1_000);
        h.protocol
            .award_points(purchase(h.alice_pass), AUTHORITY)
            .await
            .unwrap();

        let asset = h.ledger.asset(&h.alice_pass).unwrap().value;
        assert!(asset.action_history[1].timestamp >= asset.action_history[0].timestamp);
        assert!(invariant_history_consistent(&asset));
    }

    #[derive(Clone, Debug)]
    enum Step {
        Award,
        Revoke(i64),
        Gift(i64),
    }

    fn arb_step() -> impl Strategy<Value = Step> {
        prop_oneof![
            Just(Step::Award),
            (1i64..300).prop_map(Step::Revoke),
            (1i64..300).prop_map(Step::Gift),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_service_history_replays(steps in prop::collection::vec(arb_step(), 1..20)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let h = Harness::new().await;
                for step in &steps {
                    h.clock.advance(5);
                    match step {
                        Step::Award => {
                            h.protocol.award_points(purchase(h.alice_pass), AUTHORITY).await.unwrap();
                        }
                        Step::Revoke(points) => {
                            h.protocol
                                .revoke_points(
                                    RevokePointsParams { pass: h.alice_pass, points_to_revoke: *points },
                                    AUTHORITY,
                                )
                                .await
                                .unwrap();
                        }
                        Step::Gift(points) => {
                            h.protocol.gift_points(gift(h.alice_pass, *points), CASHIER).await.unwrap();
                        }
                    }
                }

                let asset = h.ledger.asset(&h.alice_pass).unwrap().value;
                let tiers = h.protocol.get_program_tiers(h.collection).await.unwrap();
                let (xp, tier) = replay_history(&asset.action_history, &tiers).unwrap();
                assert_eq!(xp, asset.xp);
                assert_eq!(tier.name, asset.current_tier);
                assert_eq!(asset.action_history.len(), steps.len());
            });
        }
    }
}
