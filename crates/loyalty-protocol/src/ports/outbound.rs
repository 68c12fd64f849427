//! # Outbound Ports
//!
//! Collaborators the protocol drives: the ledger, the asset registry, the
//! message store and the clock.

use crate::domain::{
    Address, AssetRecord, Broadcast, CollectionId, LedgerError, Message, MessageId, PassId,
    PointsPerAction, ProgramRecord, Tier, Timestamp, TxSignature, Versioned,
};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Application-level mutation committed atomically by the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstructionPayload {
    /// Store a new program account.
    CreateProgram(ProgramRecord),
    /// Replace parts of a program's configuration.
    UpdateProgram {
        /// Target program.
        collection: CollectionId,
        /// Replacement tier table.
        tiers: Option<Vec<Tier>>,
        /// Replacement points table.
        points_per_action: Option<PointsPerAction>,
        /// Replacement point-granting signers.
        point_authorities: Option<BTreeSet<Address>>,
    },
    /// Store a new pass account and bump the program's mint count.
    IssuePass(AssetRecord),
    /// Replace a pass with its next points state. Rejected with a conflict
    /// when the program moved past `program_version` since it was read.
    CommitPoints {
        /// Next pass state.
        next: AssetRecord,
        /// Program version the tier and points were computed against.
        program_version: u64,
    },
    /// Change a pass's owner.
    TransferPass {
        /// Target pass.
        pass: PassId,
        /// Recipient.
        new_owner: Address,
    },
}

/// A payload plus the signer the ledger authorizes it against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    /// Signing account.
    pub signer: Address,
    /// Mutation.
    pub payload: InstructionPayload,
}

impl Instruction {
    /// Pair a payload with its signer.
    pub fn new(signer: Address, payload: InstructionPayload) -> Self {
        Self { signer, payload }
    }

    /// Account whose version `expected_version` refers to.
    pub fn target(&self) -> Address {
        match &self.payload {
            InstructionPayload::CreateProgram(program) => program.collection,
            InstructionPayload::UpdateProgram { collection, .. } => *collection,
            InstructionPayload::IssuePass(asset)
            | InstructionPayload::CommitPoints { next: asset, .. } => asset.pass,
            InstructionPayload::TransferPass { pass, .. } => *pass,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match &self.payload {
            InstructionPayload::CreateProgram(_) => "create_program",
            InstructionPayload::UpdateProgram { .. } => "update_program",
            InstructionPayload::IssuePass(_) => "issue_pass",
            InstructionPayload::CommitPoints { .. } => "commit_points",
            InstructionPayload::TransferPass { .. } => "transfer_pass",
        }
    }
}

/// Ledger client - outbound port.
///
/// Every account carries a version. `expected_version == 0` means the target
/// account must not exist yet.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Read a pass with its version.
    async fn fetch_asset(&self, pass: &PassId) -> Result<Versioned<AssetRecord>, LedgerError>;

    /// Read a program with its version.
    async fn fetch_program(
        &self,
        collection: &CollectionId,
    ) -> Result<Versioned<ProgramRecord>, LedgerError>;

    /// All passes currently held by `owner`.
    async fn fetch_assets_by_owner(&self, owner: &Address)
        -> Result<Vec<AssetRecord>, LedgerError>;

    /// Commit `instruction` if the target is still at `expected_version`.
    async fn submit(
        &self,
        instruction: Instruction,
        expected_version: u64,
    ) -> Result<TxSignature, LedgerError>;
}

/// Descriptive data handed to the registry when minting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintMetadata {
    /// Display name.
    pub name: String,
    /// Metadata location.
    pub uri: String,
}

/// Asset/collection registry - outbound port.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Create a collection owned by `authority`.
    async fn mint_collection(
        &self,
        authority: &Address,
        metadata: &MintMetadata,
    ) -> Result<CollectionId, LedgerError>;

    /// Create an asset in `collection` held by `owner`.
    async fn mint_asset(
        &self,
        collection: &CollectionId,
        owner: &Address,
        metadata: &MintMetadata,
    ) -> Result<PassId, LedgerError>;
}

/// Message persistence - outbound port. Each call is atomic.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a direct message to a pass inbox.
    async fn append_message(&self, pass: &PassId, message: Message) -> Result<(), LedgerError>;

    /// Messages of a pass, oldest first.
    async fn list_messages(&self, pass: &PassId) -> Result<Vec<Message>, LedgerError>;

    /// Set `read`; returns whether it changed. `NotFound` for unknown ids.
    async fn mark_message_read(&self, pass: &PassId, id: &MessageId)
        -> Result<bool, LedgerError>;

    /// Append a broadcast to a collection.
    async fn append_broadcast(
        &self,
        collection: &CollectionId,
        broadcast: Broadcast,
    ) -> Result<(), LedgerError>;

    /// Broadcasts of a collection, oldest first.
    async fn list_broadcasts(
        &self,
        collection: &CollectionId,
    ) -> Result<Vec<Broadcast>, LedgerError>;

    /// One broadcast by id.
    async fn get_broadcast(
        &self,
        collection: &CollectionId,
        id: &MessageId,
    ) -> Result<Option<Broadcast>, LedgerError>;

    /// Add `reader` to the read set; returns whether it changed.
    async fn mark_broadcast_read(
        &self,
        collection: &CollectionId,
        id: &MessageId,
        reader: &PassId,
    ) -> Result<bool, LedgerError>;
}

/// Time source for consistent timestamp handling.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Returns the current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}
