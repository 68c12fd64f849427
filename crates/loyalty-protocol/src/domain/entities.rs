//! # Domain Entities
//!
//! Ledger-resident records (programs, passes) and messaging records.

use super::errors::{Address, CollectionId, PassId, Timestamp};
use super::value_objects::{ActionKind, PointsPerAction, ProgramMetadata, RecipientFilter, Tier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Identifier of a message or broadcast.
pub type MessageId = Uuid;

/// One loyalty program (the collection account).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramRecord {
    /// Collection account id.
    pub collection: CollectionId,
    /// Program name.
    pub name: String,
    /// Off-chain metadata location.
    pub metadata_uri: String,
    /// Branding.
    pub metadata: ProgramMetadata,
    /// Owning signer that created the program.
    pub program_authority: Address,
    /// Signer allowed to edit tiers and points, and to issue passes.
    pub update_authority: Address,
    /// Signers allowed to award, revoke and gift points.
    pub point_authorities: BTreeSet<Address>,
    /// Account that paid for creation.
    pub creator: Address,
    /// Tier table, ascending by `xp_required`.
    pub tiers: Vec<Tier>,
    /// Base points per action.
    pub points_per_action: PointsPerAction,
    /// Passes issued so far.
    pub num_minted: u64,
}

impl ProgramRecord {
    /// `program_authority` or `update_authority`.
    pub fn is_program_authority(&self, signer: &Address) -> bool {
        self.program_authority == *signer || self.update_authority == *signer
    }

    /// Designated point-granting signer.
    pub fn is_point_authority(&self, signer: &Address) -> bool {
        self.point_authorities.contains(signer)
    }

    /// Look up a tier by name, including the base sentinel.
    pub fn tier_named(&self, name: &str) -> Option<Tier> {
        if name == super::value_objects::BASE_TIER_NAME {
            return Some(Tier::base());
        }
        self.tiers.iter().find(|t| t.name == name).cloned()
    }
}

/// One entry of a pass's append-only points history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    /// Mutation kind.
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Action name for awards and gifts.
    pub action: Option<String>,
    /// Applied delta (`new_total - previous total`).
    pub points: i64,
    /// Commit time.
    pub timestamp: Timestamp,
    /// XP after this entry.
    pub new_total: u64,
}

/// One loyalty pass (the asset account).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    /// Pass account id.
    pub pass: PassId,
    /// Program the pass belongs to.
    pub collection: CollectionId,
    /// Current holder.
    pub owner: Address,
    /// Pass name.
    pub name: String,
    /// Off-chain metadata location.
    pub uri: String,
    /// Accrued experience points.
    pub xp: u64,
    /// Tier name derived from `xp` at the last mutation.
    pub current_tier: String,
    /// When `current_tier` last changed.
    pub tier_updated_at: Timestamp,
    /// Action name of the latest mutation.
    pub last_action: Option<String>,
    /// Append-only points history.
    pub action_history: Vec<ActionRecord>,
}

impl AssetRecord {
    /// Timestamp of the most recent history entry.
    pub fn last_history_timestamp(&self) -> Option<Timestamp> {
        self.action_history.last().map(|entry| entry.timestamp)
    }
}

/// Parameters for a freshly issued pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPass {
    /// Pass account id from the registry.
    pub pass: PassId,
    /// Owning program.
    pub collection: CollectionId,
    /// Recipient.
    pub owner: Address,
    /// Pass name.
    pub name: String,
    /// Metadata location.
    pub uri: String,
    /// Tier at zero XP.
    pub initial_tier: String,
    /// Issue time.
    pub issued_at: Timestamp,
}

impl AssetRecord {
    /// Build a zero-XP pass.
    pub fn issue(params: NewPass) -> Self {
        Self {
            pass: params.pass,
            collection: params.collection,
            owner: params.owner,
            name: params.name,
            uri: params.uri,
            xp: 0,
            current_tier: params.initial_tier,
            tier_updated_at: params.issued_at,
            last_action: None,
            action_history: Vec::new(),
        }
    }
}

/// Direct message attached to a pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within the pass.
    pub id: MessageId,
    /// Body.
    pub content: String,
    /// Sending account.
    pub sender: Address,
    /// Send time.
    pub timestamp: Timestamp,
    /// Set once by the recipient.
    pub read: bool,
}

/// Collection-wide announcement. Read state is kept per recipient pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Broadcast {
    /// Unique within the collection.
    pub id: MessageId,
    /// Body.
    pub content: String,
    /// Sending authority.
    pub sender: Address,
    /// Send time.
    pub timestamp: Timestamp,
    /// Addressed passes.
    pub recipients: RecipientFilter,
    /// Passes that marked this broadcast read.
    pub read_by: BTreeSet<PassId>,
}

impl Broadcast {
    /// Whether the pass is addressed.
    pub fn targets(&self, pass: &AssetRecord) -> bool {
        self.recipients.targets(&pass.pass, &pass.current_tier)
    }

    /// Recipient-side view of this broadcast.
    pub fn view_for(&self, pass: &PassId) -> BroadcastView {
        BroadcastView {
            id: self.id,
            content: self.content.clone(),
            sender: self.sender,
            timestamp: self.timestamp,
            read: self.read_by.contains(pass),
            recipients: self.recipients.clone(),
        }
    }
}

/// A broadcast as seen by one recipient pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastView {
    /// Broadcast id.
    pub id: MessageId,
    /// Body.
    pub content: String,
    /// Sending authority.
    pub sender: Address,
    /// Send time.
    pub timestamp: Timestamp,
    /// Read by this recipient.
    pub read: bool,
    /// Addressing filter.
    pub recipients: RecipientFilter,
}

/// Anything with a read flag that can be summarized in a feed.
pub trait Readable {
    /// Whether the item has been read.
    fn is_read(&self) -> bool;
}

impl Readable for Message {
    fn is_read(&self) -> bool {
        self.read
    }
}

impl Readable for BroadcastView {
    fn is_read(&self) -> bool {
        self.read
    }
}

/// Read/unread counts of a feed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStats {
    /// All items.
    pub total: usize,
    /// Items not yet read.
    pub unread: usize,
    /// Items read.
    pub read: usize,
}

/// Items plus stats derived from them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageFeed<T> {
    stats: MessageStats,
    messages: Vec<T>,
}

impl<T: Readable> MessageFeed<T> {
    /// Build a feed; stats always match `messages`.
    pub fn new(messages: Vec<T>) -> Self {
        let read = messages.iter().filter(|m| m.is_read()).count();
        let stats = MessageStats {
            total: messages.len(),
            unread: messages.len() - read,
            read,
        };
        Self { stats, messages }
    }

    /// Counts.
    pub fn stats(&self) -> MessageStats {
        self.stats
    }

    /// Items, oldest first.
    pub fn messages(&self) -> &[T] {
        &self.messages
    }

    /// Take the items.
    pub fn into_messages(self) -> Vec<T> {
        self.messages
    }
}

/// Pass plus program context, as returned to wallets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetData {
    /// The pass.
    #[serde(flatten)]
    pub asset: AssetRecord,
    /// Rewards of the current tier.
    pub rewards: Vec<String>,
    /// Program branding.
    pub metadata: ProgramMetadata,
    /// Full tier table of the program.
    pub reward_tiers: Vec<Tier>,
}

/// Program plus messaging counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramDetails {
    /// The program.
    #[serde(flatten)]
    pub program: ProgramRecord,
    /// Broadcasts sent in this collection.
    pub total_broadcasts: usize,
}
