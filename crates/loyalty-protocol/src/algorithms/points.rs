//! # Points State Machine
//!
//! Computes the next pass record for an award, revoke or gift. Pure: the
//! caller supplies the snapshot, the program and the clock reading.

use super::authority::OperationKind;
use super::tier_resolver::resolve_tier;
use crate::domain::{
    ActionKind, ActionRecord, AssetRecord, LoyaltyError, Multiplier, ProgramRecord, Tier,
    Timestamp,
};

/// `last_action` recorded for revokes, which carry no action name.
pub const REVOKE_ACTION: &str = "revoke";

/// A requested points mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PointsOperation {
    /// `points_per_action[action] * multiplier`.
    Award {
        /// Configured action name.
        action: String,
        /// Scaling applied to the base points.
        multiplier: Multiplier,
    },
    /// Remove points, flooring XP at zero.
    Revoke {
        /// Must be positive.
        points: i64,
    },
    /// Add a fixed amount tagged with an action name.
    Gift {
        /// Must be positive.
        points: i64,
        /// Audit label.
        action: String,
    },
}

impl PointsOperation {
    /// History kind.
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Award { .. } => ActionKind::Award,
            Self::Revoke { .. } => ActionKind::Revoke,
            Self::Gift { .. } => ActionKind::Gift,
        }
    }

    /// Operation kind for the authority guard.
    pub fn operation_kind(&self) -> OperationKind {
        match self {
            Self::Award { .. } => OperationKind::AwardPoints,
            Self::Revoke { .. } => OperationKind::RevokePoints,
            Self::Gift { .. } => OperationKind::GiftPoints,
        }
    }

    /// Action name carried into history.
    pub fn action(&self) -> Option<&str> {
        match self {
            Self::Award { action, .. } | Self::Gift { action, .. } => Some(action),
            Self::Revoke { .. } => None,
        }
    }

    /// Argument checks that need no ledger state.
    pub fn validate(&self) -> Result<(), LoyaltyError> {
        match self {
            Self::Award { multiplier, .. } => multiplier.validate(),
            Self::Revoke { points } | Self::Gift { points, .. } if *points <= 0 => {
                Err(LoyaltyError::InvalidAmount(*points))
            }
            Self::Revoke { .. } | Self::Gift { .. } => Ok(()),
        }
    }
}

/// Result of applying an operation to a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointsTransition {
    /// Record to commit.
    pub next: AssetRecord,
    /// Applied delta.
    pub delta: i64,
    /// Tier name before the operation.
    pub previous_tier: String,
    /// Present only when the tier changed.
    pub new_tier: Option<Tier>,
}

/// Apply `op` to `asset` under `program`'s tables at time `now`.
pub fn apply_points(
    asset: &AssetRecord,
    program: &ProgramRecord,
    op: &PointsOperation,
    now: Timestamp,
) -> Result<PointsTransition, LoyaltyError> {
    op.validate()?;

    let current = asset.xp;
    let new_xp = match op {
        PointsOperation::Award { action, multiplier } => {
            let base = program.points_per_action.points_for(action)?;
            let amount = multiplier.apply(base).ok_or(LoyaltyError::PointsOverflow {
                current,
                delta: u64::MAX,
            })?;
            checked_credit(current, amount)?
        }
        PointsOperation::Gift { points, .. } => checked_credit(current, *points as u64)?,
        PointsOperation::Revoke { points } => current.saturating_sub(*points as u64),
    };

    let delta = i64::try_from(i128::from(new_xp) - i128::from(current)).map_err(|_| {
        LoyaltyError::PointsOverflow {
            current,
            delta: new_xp.abs_diff(current),
        }
    })?;

    let resolved = resolve_tier(new_xp, &program.tiers)?;
    let transitioned = resolved.name != asset.current_tier;

    // Never let history go backwards in time.
    let timestamp = asset
        .last_history_timestamp()
        .map_or(now, |last| last.max(now));

    let mut next = asset.clone();
    next.xp = new_xp;
    next.last_action = Some(op.action().unwrap_or(REVOKE_ACTION).to_string());
    next.action_history.push(ActionRecord {
        kind: op.kind(),
        action: op.action().map(str::to_string),
        points: delta,
        timestamp,
        new_total: new_xp,
    });
    if transitioned {
        next.current_tier = resolved.name.clone();
        next.tier_updated_at = timestamp;
    }

    Ok(PointsTransition {
        next,
        delta,
        previous_tier: asset.current_tier.clone(),
        new_tier: transitioned.then_some(resolved),
    })
}

fn checked_credit(current: u64, amount: u64) -> Result<u64, LoyaltyError> {
    current
        .checked_add(amount)
        .ok_or(LoyaltyError::PointsOverflow {
            current,
            delta: amount,
        })
}

/// Re-run a history from zero XP; returns the final XP and its tier.
pub fn replay_history(
    history: &[ActionRecord],
    tiers: &[Tier],
) -> Result<(u64, Tier), LoyaltyError> {
    let xp = history.iter().fold(0u64, |xp, entry| {
        let next = i128::from(xp) + i128::from(entry.points);
        u64::try_from(next.max(0)).unwrap_or(u64::MAX)
    });
    Ok((xp, resolve_tier(xp, tiers)?))
}
