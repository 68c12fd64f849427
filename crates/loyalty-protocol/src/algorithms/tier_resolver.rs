//! # Tier Resolver
//!
//! Pure mapping from an XP total to the tier it unlocks.

use crate::domain::{invariant_tier_table, LoyaltyError, Tier};

/// Select the tier with the largest `xp_required <= xp`.
///
/// Returns [`Tier::base`] when no tier qualifies (empty table, or `xp` below
/// the first threshold). Fails with `MalformedTierTable` if the table is not
/// strictly increasing or has empty/duplicate names.
pub fn resolve_tier(xp: u64, tiers: &[Tier]) -> Result<Tier, LoyaltyError> {
    invariant_tier_table(tiers)?;

    // Thresholds are strictly increasing, so the qualifying tiers form a prefix.
    let qualifying = tiers.partition_point(|tier| tier.xp_required <= xp);
    Ok(match qualifying {
        0 => Tier::base(),
        n => tiers[n - 1].clone(),
    })
}

/// Position of a tier name in ascending order: base is 0, `tiers[i]` is `i + 1`.
pub fn tier_rank(name: &str, tiers: &[Tier]) -> Option<usize> {
    if name == crate::domain::BASE_TIER_NAME {
        return Some(0);
    }
    tiers.iter().position(|t| t.name == name).map(|i| i + 1)
}
