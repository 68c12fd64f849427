//! # Inbound Ports
//!
//! API traits defining what the loyalty protocol can do, plus their
//! request and response types.

use crate::domain::{
    Address, AssetData, AssetRecord, Broadcast, BroadcastView, CollectionId, LoyaltyError,
    Message, MessageFeed, MessageId, Multiplier, PassId, PointsPerAction, ProgramDetails,
    ProgramMetadata, RecipientFilter, Tier, TxSignature,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Input for [`LoyaltyProgramApi::create_loyalty_program`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProgramParams {
    /// Program name.
    pub name: String,
    /// Off-chain metadata location.
    pub metadata_uri: String,
    /// Owning signer; must sign the creation.
    pub program_authority: Address,
    /// Defaults to `program_authority`.
    pub update_authority: Option<Address>,
    /// Branding.
    #[serde(default)]
    pub metadata: ProgramMetadata,
    /// Tier table, ascending.
    pub tiers: Vec<Tier>,
    /// Base points per action.
    pub points_per_action: PointsPerAction,
    /// Defaults to `{update_authority}`.
    pub point_authorities: Option<BTreeSet<Address>>,
}

/// Result of creating a program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedProgram {
    /// New collection id.
    pub collection: CollectionId,
    /// Ledger confirmation.
    pub signature: TxSignature,
    /// Owning signer.
    pub program_authority: Address,
}

/// Input for [`LoyaltyProgramApi::update_loyalty_program`]. `None` keeps a field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgramParams {
    /// Target program.
    pub collection: CollectionId,
    /// Replacement tier table.
    pub new_tiers: Option<Vec<Tier>>,
    /// Replacement points table.
    pub new_points_per_action: Option<PointsPerAction>,
    /// Replacement point-granting signers.
    pub new_point_authorities: Option<BTreeSet<Address>>,
}

/// Input for [`LoyaltyProgramApi::issue_loyalty_pass`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePassParams {
    /// Program issuing the pass.
    pub collection: CollectionId,
    /// First holder.
    pub recipient: Address,
    /// Pass name.
    pub pass_name: String,
    /// Off-chain metadata location.
    pub pass_metadata_uri: String,
}

/// Result of issuing a pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedPass {
    /// New pass id.
    pub pass: PassId,
    /// Ledger confirmation.
    pub signature: TxSignature,
}

/// Input for [`LoyaltyProgramApi::award_points`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardPointsParams {
    /// Target pass.
    pub pass: PassId,
    /// Configured action name.
    pub action: String,
    /// Scaling of the base points.
    #[serde(default)]
    pub multiplier: Multiplier,
}

/// Input for [`LoyaltyProgramApi::revoke_points`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokePointsParams {
    /// Target pass.
    pub pass: PassId,
    /// Must be positive.
    pub points_to_revoke: i64,
}

/// Input for [`LoyaltyProgramApi::gift_points`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftPointsParams {
    /// Target pass.
    pub pass: PassId,
    /// Must be positive.
    pub points_to_gift: i64,
    /// Audit label.
    pub action: String,
}

/// Result of a committed points operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointsOutcome {
    /// XP after the operation.
    pub points: u64,
    /// Applied delta; smaller than requested when a revoke hit zero.
    pub delta: i64,
    /// Ledger confirmation.
    pub signature: TxSignature,
    /// Present only when the tier changed.
    pub new_tier: Option<Tier>,
    /// Tier name before the operation.
    pub previous_tier: String,
}

/// Ledger confirmation of a mutation with no other payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Committed {
    /// Ledger confirmation.
    pub signature: TxSignature,
}

/// Input for [`MessagingApi::send_message`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageParams {
    /// Recipient pass.
    pub pass: PassId,
    /// Body.
    pub content: String,
    /// Must equal the signer.
    pub sender: Address,
}

/// Input for [`MessagingApi::send_broadcast`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendBroadcastParams {
    /// Program whose passes are addressed.
    pub collection: CollectionId,
    /// Body.
    pub content: String,
    /// Must equal the signer.
    pub sender: Address,
    /// `None` addresses every pass.
    pub recipients: Option<RecipientFilter>,
}

/// Result of a mark-read call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkReadOutcome {
    /// The item was already read before this call.
    pub already_read: bool,
}

/// Loyalty program API - inbound port.
#[async_trait]
pub trait LoyaltyProgramApi: Send + Sync {
    /// Create a program and its collection.
    async fn create_loyalty_program(
        &self,
        params: CreateProgramParams,
        signer: Address,
    ) -> Result<CreatedProgram, LoyaltyError>;

    /// Replace a program's tiers, points table or point authorities.
    async fn update_loyalty_program(
        &self,
        params: UpdateProgramParams,
        signer: Address,
    ) -> Result<Committed, LoyaltyError>;

    /// Mint a zero-XP pass to a recipient.
    ///
    /// The registry mint happens before the ledger commit and is not undone
    /// when the commit fails, so a failed or `Indeterminate` issue can leave
    /// an asset with no pass record.
    async fn issue_loyalty_pass(
        &self,
        params: IssuePassParams,
        signer: Address,
    ) -> Result<IssuedPass, LoyaltyError>;

    /// Award the configured points for an action.
    async fn award_points(
        &self,
        params: AwardPointsParams,
        signer: Address,
    ) -> Result<PointsOutcome, LoyaltyError>;

    /// Remove points, flooring XP at zero.
    async fn revoke_points(
        &self,
        params: RevokePointsParams,
        signer: Address,
    ) -> Result<PointsOutcome, LoyaltyError>;

    /// Add a discretionary amount.
    async fn gift_points(
        &self,
        params: GiftPointsParams,
        signer: Address,
    ) -> Result<PointsOutcome, LoyaltyError>;

    /// Move a pass to a new holder.
    async fn approve_transfer(
        &self,
        pass: PassId,
        to: Address,
        signer: Address,
    ) -> Result<Committed, LoyaltyError>;

    /// Pass plus its program's tier context.
    async fn get_asset_data(&self, pass: PassId) -> Result<AssetData, LoyaltyError>;

    /// Program plus broadcast count.
    async fn get_program_details(
        &self,
        collection: CollectionId,
    ) -> Result<ProgramDetails, LoyaltyError>;

    /// Every pass held by a wallet, ordered by pass id.
    async fn get_wallet_loyalty_passes(
        &self,
        wallet: Address,
    ) -> Result<Vec<AssetRecord>, LoyaltyError>;

    /// Tier table of a program.
    async fn get_program_tiers(&self, collection: CollectionId)
        -> Result<Vec<Tier>, LoyaltyError>;

    /// Points table of a program.
    async fn get_points_per_action(
        &self,
        collection: CollectionId,
    ) -> Result<PointsPerAction, LoyaltyError>;
}

/// Pass messaging API - inbound port.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Post a direct message to a pass.
    async fn send_message(
        &self,
        params: SendMessageParams,
        signer: Address,
    ) -> Result<Message, LoyaltyError>;

    /// Mark a direct message read. Idempotent.
    async fn mark_message_read(
        &self,
        pass: PassId,
        message_id: MessageId,
        signer: Address,
    ) -> Result<MarkReadOutcome, LoyaltyError>;

    /// Messages of a pass with read counts.
    async fn get_asset_messages(&self, pass: PassId)
        -> Result<MessageFeed<Message>, LoyaltyError>;

    /// Post a broadcast to a program's passes.
    async fn send_broadcast(
        &self,
        params: SendBroadcastParams,
        signer: Address,
    ) -> Result<Broadcast, LoyaltyError>;

    /// Mark a broadcast read for one pass. Idempotent.
    async fn mark_broadcast_read(
        &self,
        collection: CollectionId,
        broadcast_id: MessageId,
        pass: PassId,
        signer: Address,
    ) -> Result<MarkReadOutcome, LoyaltyError>;

    /// Broadcasts addressed to a pass, with its own read state.
    async fn get_pass_broadcasts(
        &self,
        pass: PassId,
    ) -> Result<MessageFeed<BroadcastView>, LoyaltyError>;

    /// Every broadcast of a program.
    async fn get_program_broadcasts(
        &self,
        collection: CollectionId,
    ) -> Result<Vec<Broadcast>, LoyaltyError>;
}
