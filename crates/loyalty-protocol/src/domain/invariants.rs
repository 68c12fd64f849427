//! # Domain Invariants
//!
//! Checks for the rules every program and pass record must satisfy.

use super::entities::AssetRecord;
use super::errors::LoyaltyError;
use super::value_objects::{Tier, BASE_TIER_NAME};
use std::collections::HashSet;

/// Invariant: tier table is strictly increasing by `xp_required` and names
/// are non-empty and unique. The base sentinel name is reserved.
pub fn invariant_tier_table(tiers: &[Tier]) -> Result<(), LoyaltyError> {
    let mut names = HashSet::with_capacity(tiers.len());
    for (i, tier) in tiers.iter().enumerate() {
        if tier.name == BASE_TIER_NAME || tier.name.trim().is_empty() {
            return Err(LoyaltyError::MalformedTierTable(format!(
                "tier {} has an empty name",
                i
            )));
        }
        if !names.insert(tier.name.as_str()) {
            return Err(LoyaltyError::MalformedTierTable(format!(
                "duplicate tier name {:?}",
                tier.name
            )));
        }
        if i > 0 && tier.xp_required <= tiers[i - 1].xp_required {
            return Err(LoyaltyError::MalformedTierTable(format!(
                "threshold of {:?} ({}) is not above {:?} ({})",
                tier.name,
                tier.xp_required,
                tiers[i - 1].name,
                tiers[i - 1].xp_required
            )));
        }
    }
    Ok(())
}

/// Invariant: each history entry's `new_total` follows from the previous one
/// plus its delta (floored at zero), timestamps never go backwards, and the
/// last total equals the pass's `xp`.
pub fn invariant_history_consistent(asset: &AssetRecord) -> bool {
    let mut running: u64 = 0;
    let mut last_ts = 0;
    for entry in &asset.action_history {
        if entry.timestamp < last_ts {
            return false;
        }
        let next = (i128::from(running) + i128::from(entry.points)).max(0);
        if next != i128::from(entry.new_total) {
            return false;
        }
        running = entry.new_total;
        last_ts = entry.timestamp;
    }
    running == asset.xp
}

/// Invariant: the stored tier is the one the table assigns to `xp`.
pub fn invariant_tier_consistent(asset: &AssetRecord, tiers: &[Tier]) -> bool {
    crate::algorithms::resolve_tier(asset.xp, tiers)
        .map(|tier| tier.name == asset.current_tier)
        .unwrap_or(false)
}
