//! # Authority & Permission Guard
//!
//! Stateless capability checks. Reads only the records passed in.
//!
//! | Operation | Required capability |
//! |-----------|---------------------|
//! | `update_loyalty_program` | update authority |
//! | `issue_loyalty_pass` | update authority |
//! | `award_points` / `revoke_points` / `gift_points` | point authority |
//! | `approve_transfer` | pass owner or update authority |
//! | `send_message` | pass owner or program authority |
//! | `send_broadcast` | program authority |
//! | `mark_message_read` / `mark_broadcast_read` | pass owner |

use crate::domain::{short_hex, Address, LoyaltyError, ProgramRecord};

/// Protocol operations that mutate state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Edit tiers, points table or point authorities.
    UpdateProgram,
    /// Mint a pass into the collection.
    IssuePass,
    /// Award points for an action.
    AwardPoints,
    /// Remove points.
    RevokePoints,
    /// Grant discretionary points.
    GiftPoints,
    /// Move a pass to a new owner.
    ApproveTransfer,
    /// Post a direct message to a pass.
    SendMessage,
    /// Post a collection broadcast.
    SendBroadcast,
    /// Mark a direct message read.
    MarkMessageRead,
    /// Mark a broadcast read.
    MarkBroadcastRead,
}

impl OperationKind {
    /// Capability table.
    pub fn required_capability(self) -> Capability {
        match self {
            Self::UpdateProgram | Self::IssuePass => Capability::UpdateAuthority,
            Self::AwardPoints | Self::RevokePoints | Self::GiftPoints => Capability::PointAuthority,
            Self::ApproveTransfer => Capability::OwnerOrUpdateAuthority,
            Self::SendMessage => Capability::OwnerOrProgramAuthority,
            Self::SendBroadcast => Capability::ProgramAuthority,
            Self::MarkMessageRead | Self::MarkBroadcastRead => Capability::PassOwner,
        }
    }

    /// Snake-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UpdateProgram => "update_program",
            Self::IssuePass => "issue_pass",
            Self::AwardPoints => "award_points",
            Self::RevokePoints => "revoke_points",
            Self::GiftPoints => "gift_points",
            Self::ApproveTransfer => "approve_transfer",
            Self::SendMessage => "send_message",
            Self::SendBroadcast => "send_broadcast",
            Self::MarkMessageRead => "mark_message_read",
            Self::MarkBroadcastRead => "mark_broadcast_read",
        }
    }
}

/// What a signer must hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The program's `update_authority`.
    UpdateAuthority,
    /// `program_authority` or `update_authority`.
    ProgramAuthority,
    /// A member of `point_authorities`.
    PointAuthority,
    /// Holder of the pass.
    PassOwner,
    /// Holder of the pass or `update_authority`.
    OwnerOrUpdateAuthority,
    /// Holder of the pass, `program_authority` or `update_authority`.
    OwnerOrProgramAuthority,
}

/// Check that `signer` holds `capability` for `program`.
///
/// `pass_owner` is required for owner-based capabilities; a missing owner is
/// treated as "signer is not the owner".
pub fn check(
    capability: Capability,
    signer: &Address,
    program: &ProgramRecord,
    pass_owner: Option<&Address>,
) -> Result<(), LoyaltyError> {
    let is_owner = pass_owner == Some(signer);
    let allowed = match capability {
        Capability::UpdateAuthority => program.update_authority == *signer,
        Capability::ProgramAuthority => program.is_program_authority(signer),
        Capability::PointAuthority => program.is_point_authority(signer),
        Capability::PassOwner => is_owner,
        Capability::OwnerOrUpdateAuthority => is_owner || program.update_authority == *signer,
        Capability::OwnerOrProgramAuthority => is_owner || program.is_program_authority(signer),
    };

    if allowed {
        Ok(())
    } else {
        Err(LoyaltyError::Unauthorized(format!(
            "signer {} lacks {:?} on program {}",
            short_hex(signer),
            capability,
            short_hex(&program.collection)
        )))
    }
}

/// Check the capability an operation requires.
pub fn authorize(
    operation: OperationKind,
    signer: &Address,
    program: &ProgramRecord,
    pass_owner: Option<&Address>,
) -> Result<(), LoyaltyError> {
    check(operation.required_capability(), signer, program, pass_owner).map_err(|err| {
        tracing::debug!(
            operation = operation.as_str(),
            signer = %short_hex(signer),
            "[loyalty] authority check failed"
        );
        err
    })
}
