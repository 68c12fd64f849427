//! # Loyalty Protocol
//!
//! Client-side protocol layer for an on-ledger loyalty program: passes,
//! tiered experience points and pass messaging.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Issue loyalty passes into a program collection
//! - Award, revoke and gift points with deterministic tier resolution
//! - Commit every mutation with optimistic concurrency and bounded retries
//! - Direct messages and tier-filtered broadcasts
//!
//! ## Guarantees
//!
//! | Rule | Enforcement |
//! |------|-------------|
//! | Tier follows XP | Recomputed on every points commit |
//! | History append-only | Ledger rejects commits that rewrite it |
//! | Holder is not the point mutator | Point authority checked client- and ledger-side |
//! | Ambiguous commits surface | Submit timeout is `Indeterminate`, never retried |
//!
//! ## Module Structure
//!
//! ```text
//! loyalty-protocol/
//! ├── domain/          # Records, value objects, errors, invariants
//! ├── algorithms/      # Tier resolver, points machine, authority guard, retry
//! ├── ports/           # LoyaltyProgramApi, MessagingApi, LedgerClient, Registry
//! ├── service/         # LoyaltyProtocol
//! └── adapters/        # In-memory ledger, registry, message store, clock
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{
    InMemoryLedger, InMemoryMessageStore, InMemoryRegistry, ManualTimeSource, MintedAsset,
};
pub use algorithms::{
    apply_points, authorize, backoff_delay, check, replay_history, resolve_tier,
    retry_with_backoff, tier_rank, Capability, OperationKind, PointsOperation, PointsTransition,
    REVOKE_ACTION,
};
pub use config::{ProtocolConfig, RetryConfig};
pub use domain::{
    invariant_history_consistent, invariant_tier_consistent, invariant_tier_table, ActionKind,
    ActionRecord, Address, AssetData, AssetRecord, Broadcast, BroadcastView, CollectionId,
    LedgerError, LoyaltyError, Message, MessageFeed, MessageId, MessageStats, Multiplier,
    PassId, PointsPerAction, ProgramDetails, ProgramMetadata, ProgramRecord, RecipientFilter,
    Tier, Timestamp, TxSignature, Versioned, BASE_TIER_NAME,
};
pub use metrics::{MetricsSnapshot, ProtocolMetrics};
pub use ports::{
    AwardPointsParams, Committed, CreateProgramParams, CreatedProgram, GiftPointsParams,
    Instruction, InstructionPayload, IssuePassParams, IssuedPass, LedgerClient,
    LoyaltyProgramApi, MarkReadOutcome, MessageStore, MessagingApi, MintMetadata, PointsOutcome,
    Registry, RevokePointsParams, SendBroadcastParams, SendMessageParams, SystemTimeSource,
    TimeSource, UpdateProgramParams,
};
pub use service::LoyaltyProtocol;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
