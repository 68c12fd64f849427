//! # Domain Errors
//!
//! Caller-facing error taxonomy for the loyalty protocol, plus the
//! collaborator-facing `LedgerError` and the mapping between the two.

use thiserror::Error;

/// Account key (signer, owner, authority).
pub type Address = [u8; 32];

/// Loyalty pass identifier (an asset account).
pub type PassId = Address;

/// Loyalty program identifier (a collection account).
pub type CollectionId = Address;

/// Confirmation returned by the ledger for a committed instruction.
pub type TxSignature = [u8; 32];

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, LoyaltyError>;

/// Errors surfaced to protocol callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoyaltyError {
    /// Signer lacks the capability required by the operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Action is not configured in the program's points table.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Point amount must be strictly positive.
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Multiplier must be a positive ratio.
    #[error("Invalid multiplier: {numerator}/{denominator}")]
    InvalidMultiplier {
        /// Multiplier numerator
        numerator: u64,
        /// Multiplier denominator
        denominator: u64,
    },

    /// Tier table is not strictly increasing or has bad names.
    #[error("Malformed tier table: {0}")]
    MalformedTierTable(String),

    /// Optimistic commit kept losing to concurrent writers.
    #[error("Concurrent modification: gave up after {attempts} attempts")]
    ConcurrentModification {
        /// Attempts made before giving up
        attempts: u32,
    },

    /// Account does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Commit outcome is unknown; re-read state before acting again.
    #[error("Indeterminate outcome: {0}")]
    Indeterminate(String),

    /// Transport failure talking to a collaborator.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Ledger refused the instruction for a reason other than conflict or authority.
    #[error("Ledger rejected instruction: {0}")]
    LedgerRejected(String),

    /// XP total would exceed `u64::MAX`.
    #[error("Points overflow: {current} + {delta}")]
    PointsOverflow {
        /// XP before the operation
        current: u64,
        /// Requested increase
        delta: u64,
    },

    /// Broadcast recipient filter is invalid for the program.
    #[error("Invalid recipient filter: {0}")]
    InvalidRecipientFilter(String),

    /// Message content rejected.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Message or broadcast id not present in its scope.
    #[error("Message not found: {0}")]
    MessageNotFound(String),
}

impl LoyaltyError {
    /// Only stale-snapshot conflicts are worth re-running the cycle for.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }

    /// Caller must re-query ledger state before retrying a mutation.
    pub fn requires_refetch(&self) -> bool {
        matches!(self, Self::Indeterminate(_))
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::UnknownAction(_) => "unknown_action",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InvalidMultiplier { .. } => "invalid_multiplier",
            Self::MalformedTierTable(_) => "malformed_tier_table",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::NotFound(_) => "not_found",
            Self::Indeterminate(_) => "indeterminate",
            Self::NetworkError(_) => "network_error",
            Self::LedgerRejected(_) => "ledger_rejected",
            Self::PointsOverflow { .. } => "points_overflow",
            Self::InvalidRecipientFilter(_) => "invalid_recipient_filter",
            Self::InvalidMessage(_) => "invalid_message",
            Self::MessageNotFound(_) => "message_not_found",
        }
    }
}

/// Failures reported by the ledger, registry and message-store collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Account does not exist.
    #[error("account not found: {0}")]
    NotFound(String),

    /// Stored version differs from the expected one.
    #[error("version conflict: expected {expected}, found {found}")]
    ConcurrentModification {
        /// Version the caller read
        expected: u64,
        /// Version currently stored
        found: u64,
    },

    /// Ledger-side authority check failed.
    #[error("unauthorized signer: {0}")]
    Unauthorized(String),

    /// Instruction refused.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Transport failure.
    #[error("network: {0}")]
    Network(String),

    /// No answer in time.
    #[error("timed out")]
    Timeout,
}

impl LedgerError {
    /// Map a failure from a read call. A read timeout cannot have mutated state.
    pub fn into_read_error(self) -> LoyaltyError {
        match self {
            LedgerError::Timeout => LoyaltyError::NetworkError("read timed out".to_string()),
            other => other.into(),
        }
    }

    /// Map a failure from a submit call. A submit timeout may have landed.
    pub fn into_submit_error(self) -> LoyaltyError {
        match self {
            LedgerError::Timeout => {
                LoyaltyError::Indeterminate("submit timed out; re-fetch state".to_string())
            }
            other => other.into(),
        }
    }
}

impl From<LedgerError> for LoyaltyError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(what) => LoyaltyError::NotFound(what),
            LedgerError::ConcurrentModification { .. } => {
                LoyaltyError::ConcurrentModification { attempts: 1 }
            }
            LedgerError::Unauthorized(why) => LoyaltyError::Unauthorized(why),
            LedgerError::Rejected(why) => LoyaltyError::LedgerRejected(why),
            LedgerError::Network(why) => LoyaltyError::NetworkError(why),
            LedgerError::Timeout => LoyaltyError::Indeterminate("timed out".to_string()),
        }
    }
}

/// Render a 32-byte key as a short hex prefix for log lines.
pub fn short_hex(bytes: &[u8; 32]) -> String {
    hex::encode(&bytes[..4])
}
