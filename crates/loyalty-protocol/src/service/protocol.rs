//! # Loyalty Protocol Service
//!
//! Application service driving the points engine against the ledger.
//!
//! Every mutation follows the same cycle: read the versioned snapshot,
//! check the signer's capability, compute the next record, then submit it
//! with the version it was read at. A stale version re-runs the whole cycle
//! under [`retry_with_backoff`].

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use loyalty_telemetry::log_event;

use crate::algorithms::{
    apply_points, authorize, resolve_tier, retry_with_backoff, OperationKind, PointsOperation,
};
use crate::config::ProtocolConfig;
use crate::domain::{
    invariant_tier_table, short_hex, Address, AssetData, AssetRecord, CollectionId, LedgerError,
    LoyaltyError, NewPass, PassId, PointsPerAction, ProgramDetails, ProgramRecord, Result, Tier,
    TxSignature, Versioned,
};
use crate::metrics::{MetricsSnapshot, ProtocolMetrics};
use crate::ports::{
    AwardPointsParams, Committed, CreateProgramParams, CreatedProgram, GiftPointsParams,
    Instruction, InstructionPayload, IssuePassParams, IssuedPass, LedgerClient,
    LoyaltyProgramApi, MessageStore, MintMetadata, PointsOutcome, Registry, RevokePointsParams,
    SystemTimeSource, TimeSource, UpdateProgramParams,
};

pub(crate) const SUBSYSTEM: &str = "loyalty";

/// Loyalty protocol service - implements [`LoyaltyProgramApi`] and
/// [`crate::ports::MessagingApi`] over injected collaborators.
pub struct LoyaltyProtocol<L: LedgerClient, R: Registry, M: MessageStore> {
    pub(crate) config: ProtocolConfig,
    pub(crate) ledger: Arc<L>,
    pub(crate) registry: Arc<R>,
    pub(crate) messages: Arc<M>,
    pub(crate) clock: Arc<dyn TimeSource>,
    pub(crate) metrics: Arc<ProtocolMetrics>,
}

impl<L: LedgerClient, R: Registry, M: MessageStore> Clone for LoyaltyProtocol<L, R, M> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            ledger: Arc::clone(&self.ledger),
            registry: Arc::clone(&self.registry),
            messages: Arc::clone(&self.messages),
            clock: Arc::clone(&self.clock),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<L: LedgerClient, R: Registry, M: MessageStore> LoyaltyProtocol<L, R, M> {
    /// Create a service reading the system clock.
    pub fn new(config: ProtocolConfig, ledger: Arc<L>, registry: Arc<R>, messages: Arc<M>) -> Self {
        Self {
            config,
            ledger,
            registry,
            messages,
            clock: Arc::new(SystemTimeSource),
            metrics: Arc::new(ProtocolMetrics::new()),
        }
    }

    /// Replace the clock.
    pub fn with_time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Ledger collaborator.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Asset registry collaborator.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Counter values.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) async fn load_asset(&self, pass: &PassId) -> Result<Versioned<AssetRecord>> {
        let asset = self
            .ledger
            .fetch_asset(pass)
            .await
            .map_err(LedgerError::into_read_error)?;
        tracing::debug!(pass = %short_hex(pass), version = asset.version, "[loyalty] asset read");
        Ok(asset)
    }

    pub(crate) async fn load_program(
        &self,
        collection: &CollectionId,
    ) -> Result<Versioned<ProgramRecord>> {
        self.ledger
            .fetch_program(collection)
            .await
            .map_err(LedgerError::into_read_error)
    }

    /// Authority check that also counts rejections.
    pub(crate) fn guard(
        &self,
        operation: OperationKind,
        signer: &Address,
        program: &ProgramRecord,
        pass_owner: Option<&Address>,
    ) -> Result<()> {
        authorize(operation, signer, program, pass_owner).map_err(|err| {
            self.metrics.record_unauthorized(operation.as_str());
            err
        })
    }

    /// Signer must be the account named in the request.
    pub(crate) fn require_signer(
        &self,
        operation: &'static str,
        signer: &Address,
        expected: &Address,
    ) -> Result<()> {
        if signer == expected {
            return Ok(());
        }
        self.metrics.record_unauthorized(operation);
        Err(LoyaltyError::Unauthorized(format!(
            "signer {} does not match {}",
            short_hex(signer),
            short_hex(expected)
        )))
    }

    /// Submit with the configured timeout. A submit that does not answer in
    /// time may still land, so it is reported as `Indeterminate`.
    async fn commit(
        &self,
        operation: &'static str,
        instruction: Instruction,
        expected_version: u64,
    ) -> Result<TxSignature> {
        let label = instruction.label();
        let timer = self.metrics.submit_timer(operation);
        let submitted = tokio::time::timeout(
            self.config.submit_timeout(),
            self.ledger.submit(instruction, expected_version),
        )
        .await;
        drop(timer);

        match submitted {
            Ok(Ok(signature)) => {
                self.metrics.record_commit(operation);
                Ok(signature)
            }
            Ok(Err(err)) => {
                let err = err.into_submit_error();
                match &err {
                    LoyaltyError::Indeterminate(_) => {
                        self.metrics.record_indeterminate(operation);
                        log_event!(
                            warn,
                            SUBSYSTEM,
                            "[loyalty] submit outcome unknown, re-fetch before acting",
                            operation = operation
                        );
                    }
                    LoyaltyError::Unauthorized(_) => self.metrics.record_unauthorized(operation),
                    _ => {}
                }
                Err(err)
            }
            Err(_elapsed) => {
                self.metrics.record_indeterminate(operation);
                log_event!(
                    warn,
                    SUBSYSTEM,
                    "[loyalty] submit timed out, outcome unknown",
                    operation = operation,
                    timeout_ms = self.config.submit_timeout_ms
                );
                Err(LoyaltyError::Indeterminate(format!(
                    "{} not confirmed within {} ms",
                    label, self.config.submit_timeout_ms
                )))
            }
        }
    }

    async fn update_cycle(&self, params: &UpdateProgramParams, signer: Address) -> Result<Committed> {
        let program = self.load_program(&params.collection).await?;
        self.guard(OperationKind::UpdateProgram, &signer, &program.value, None)?;

        let instruction = Instruction::new(
            signer,
            InstructionPayload::UpdateProgram {
                collection: params.collection,
                tiers: params.new_tiers.clone(),
                points_per_action: params.new_points_per_action.clone(),
                point_authorities: params.new_point_authorities.clone(),
            },
        );
        let signature = self
            .commit(OperationKind::UpdateProgram.as_str(), instruction, program.version)
            .await?;
        Ok(Committed { signature })
    }

    async fn points_cycle(
        &self,
        op: &PointsOperation,
        pass: PassId,
        signer: Address,
        attempt: u32,
    ) -> Result<PointsOutcome> {
        let operation = op.operation_kind();
        let asset = self.load_asset(&pass).await?;
        let program = self.load_program(&asset.value.collection).await?;
        self.guard(operation, &signer, &program.value, Some(&asset.value.owner))?;

        let transition = apply_points(&asset.value, &program.value, op, self.clock.now())?;
        let instruction = Instruction::new(
            signer,
            InstructionPayload::CommitPoints {
                next: transition.next.clone(),
                program_version: program.version,
            },
        );
        let signature = self
            .commit(operation.as_str(), instruction, asset.version)
            .await?;

        if transition.new_tier.is_some() {
            self.metrics.record_tier_transition(transition.delta > 0);
        }
        log_event!(
            info,
            SUBSYSTEM,
            "[loyalty] points committed",
            operation = operation.as_str(),
            pass = %short_hex(&pass),
            attempt = attempt,
            xp = transition.next.xp,
            delta = transition.delta,
            tier = %transition.next.current_tier
        );

        Ok(PointsOutcome {
            points: transition.next.xp,
            delta: transition.delta,
            signature,
            new_tier: transition.new_tier,
            previous_tier: transition.previous_tier,
        })
    }

    /// Validate, then run the points cycle with conflict retries.
    async fn execute_points(
        &self,
        op: PointsOperation,
        pass: PassId,
        signer: Address,
    ) -> Result<PointsOutcome> {
        op.validate()?;
        let op = &op;
        retry_with_backoff(
            &self.config.retry,
            &self.metrics,
            op.operation_kind().as_str(),
            move |attempt| self.points_cycle(op, pass, signer, attempt),
        )
        .await
    }

    async fn transfer_cycle(&self, pass: PassId, to: Address, signer: Address) -> Result<Committed> {
        let asset = self.load_asset(&pass).await?;
        let program = self.load_program(&asset.value.collection).await?;
        self.guard(
            OperationKind::ApproveTransfer,
            &signer,
            &program.value,
            Some(&asset.value.owner),
        )?;

        let instruction =
            Instruction::new(signer, InstructionPayload::TransferPass { pass, new_owner: to });
        let signature = self
            .commit(OperationKind::ApproveTransfer.as_str(), instruction, asset.version)
            .await?;

        log_event!(
            info,
            SUBSYSTEM,
            "[loyalty] pass transferred",
            pass = %short_hex(&pass),
            from = %short_hex(&asset.value.owner),
            to = %short_hex(&to)
        );
        Ok(Committed { signature })
    }
}

#[async_trait]
impl<L: LedgerClient, R: Registry, M: MessageStore> LoyaltyProgramApi for LoyaltyProtocol<L, R, M> {
    async fn create_loyalty_program(
        &self,
        params: CreateProgramParams,
        signer: Address,
    ) -> Result<CreatedProgram> {
        self.require_signer("create_program", &signer, &params.program_authority)?;
        invariant_tier_table(&params.tiers)?;

        let update_authority = params.update_authority.unwrap_or(params.program_authority);
        let point_authorities = params
            .point_authorities
            .unwrap_or_else(|| BTreeSet::from([update_authority]));

        let collection = self
            .registry
            .mint_collection(
                &params.program_authority,
                &MintMetadata {
                    name: params.name.clone(),
                    uri: params.metadata_uri.clone(),
                },
            )
            .await
            .map_err(LedgerError::into_submit_error)?;

        let program = ProgramRecord {
            collection,
            name: params.name,
            metadata_uri: params.metadata_uri,
            metadata: params.metadata,
            program_authority: params.program_authority,
            update_authority,
            point_authorities,
            creator: signer,
            tiers: params.tiers,
            points_per_action: params.points_per_action,
            num_minted: 0,
        };
        let signature = self
            .commit(
                "create_program",
                Instruction::new(signer, InstructionPayload::CreateProgram(program)),
                0,
            )
            .await?;

        log_event!(
            info,
            SUBSYSTEM,
            "[loyalty] program created",
            collection = %short_hex(&collection),
            authority = %short_hex(&params.program_authority)
        );
        Ok(CreatedProgram {
            collection,
            signature,
            program_authority: params.program_authority,
        })
    }

    async fn update_loyalty_program(
        &self,
        params: UpdateProgramParams,
        signer: Address,
    ) -> Result<Committed> {
        if let Some(tiers) = &params.new_tiers {
            invariant_tier_table(tiers)?;
        }
        let params = &params;
        let committed = retry_with_backoff(
            &self.config.retry,
            &self.metrics,
            OperationKind::UpdateProgram.as_str(),
            move |_| self.update_cycle(params, signer),
        )
        .await?;

        log_event!(
            info,
            SUBSYSTEM,
            "[loyalty] program updated",
            collection = %short_hex(&params.collection),
            tiers_changed = params.new_tiers.is_some(),
            points_changed = params.new_points_per_action.is_some()
        );
        Ok(committed)
    }

    async fn issue_loyalty_pass(
        &self,
        params: IssuePassParams,
        signer: Address,
    ) -> Result<IssuedPass> {
        let program = self.load_program(&params.collection).await?;
        self.guard(OperationKind::IssuePass, &signer, &program.value, None)?;
        let initial_tier = resolve_tier(0, &program.value.tiers)?;

        let pass = self
            .registry
            .mint_asset(
                &params.collection,
                &params.recipient,
                &MintMetadata {
                    name: params.pass_name.clone(),
                    uri: params.pass_metadata_uri.clone(),
                },
            )
            .await
            .map_err(LedgerError::into_submit_error)?;

        let asset = AssetRecord::issue(NewPass {
            pass,
            collection: params.collection,
            owner: params.recipient,
            name: params.pass_name,
            uri: params.pass_metadata_uri,
            initial_tier: initial_tier.name,
            issued_at: self.clock.now(),
        });
        let signature = self
            .commit(
                OperationKind::IssuePass.as_str(),
                Instruction::new(signer, InstructionPayload::IssuePass(asset)),
                0,
            )
            .await
            .map_err(|err| {
                // The registry mint is not rolled back.
                log_event!(
                    warn,
                    SUBSYSTEM,
                    "[loyalty] pass minted but not recorded",
                    pass = %short_hex(&pass),
                    error = %err
                );
                err
            })?;

        log_event!(
            info,
            SUBSYSTEM,
            "[loyalty] pass issued",
            collection = %short_hex(&params.collection),
            pass = %short_hex(&pass),
            recipient = %short_hex(&params.recipient)
        );
        Ok(IssuedPass { pass, signature })
    }

    async fn award_points(
        &self,
        params: AwardPointsParams,
        signer: Address,
    ) -> Result<PointsOutcome> {
        let op = PointsOperation::Award {
            action: params.action,
            multiplier: params.multiplier,
        };
        self.execute_points(op, params.pass, signer).await
    }

    async fn revoke_points(
        &self,
        params: RevokePointsParams,
        signer: Address,
    ) -> Result<PointsOutcome> {
        let op = PointsOperation::Revoke {
            points: params.points_to_revoke,
        };
        self.execute_points(op, params.pass, signer).await
    }

    async fn gift_points(&self, params: GiftPointsParams, signer: Address) -> Result<PointsOutcome> {
        let op = PointsOperation::Gift {
            points: params.points_to_gift,
            action: params.action,
        };
        self.execute_points(op, params.pass, signer).await
    }

    async fn approve_transfer(&self, pass: PassId, to: Address, signer: Address) -> Result<Committed> {
        retry_with_backoff(
            &self.config.retry,
            &self.metrics,
            OperationKind::ApproveTransfer.as_str(),
            move |_| self.transfer_cycle(pass, to, signer),
        )
        .await
    }

    async fn get_asset_data(&self, pass: PassId) -> Result<AssetData> {
        let asset = self.load_asset(&pass).await?.value;
        let program = self.load_program(&asset.collection).await?.value;
        let rewards = program
            .tier_named(&asset.current_tier)
            .map(|tier| tier.rewards)
            .unwrap_or_default();

        Ok(AssetData {
            asset,
            rewards,
            metadata: program.metadata,
            reward_tiers: program.tiers,
        })
    }

    async fn get_program_details(&self, collection: CollectionId) -> Result<ProgramDetails> {
        let program = self.load_program(&collection).await?.value;
        let total_broadcasts = self
            .messages
            .list_broadcasts(&collection)
            .await
            .map_err(LedgerError::into_read_error)?
            .len();
        Ok(ProgramDetails {
            program,
            total_broadcasts,
        })
    }

    async fn get_wallet_loyalty_passes(&self, wallet: Address) -> Result<Vec<AssetRecord>> {
        let mut passes = self
            .ledger
            .fetch_assets_by_owner(&wallet)
            .await
            .map_err(LedgerError::into_read_error)?;
        passes.sort_by_key(|asset| asset.pass);
        tracing::debug!(wallet = %short_hex(&wallet), count = passes.len(), "[loyalty] wallet passes read");
        Ok(passes)
    }

    async fn get_program_tiers(&self, collection: CollectionId) -> Result<Vec<Tier>> {
        Ok(self.load_program(&collection).await?.value.tiers)
    }

    async fn get_points_per_action(&self, collection: CollectionId) -> Result<PointsPerAction> {
        Ok(self.load_program(&collection).await?.value.points_per_action)
    }
}
