//! # Domain Value Objects
//!
//! Immutable value types: tiers, the validated points table, multipliers,
//! history kinds and broadcast recipient filters.

use super::errors::{LoyaltyError, PassId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Name reported for the implicit base tier below every threshold.
pub const BASE_TIER_NAME: &str = "";

/// A named reward bracket unlocked at `xp_required`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    /// Unique within the program.
    pub name: String,
    /// Minimum XP for membership.
    pub xp_required: u64,
    /// Reward identifiers granted by this tier.
    pub rewards: Vec<String>,
}

impl Tier {
    /// Create a tier.
    pub fn new(name: impl Into<String>, xp_required: u64, rewards: Vec<String>) -> Self {
        Self {
            name: name.into(),
            xp_required,
            rewards,
        }
    }

    /// The sentinel returned when no configured tier qualifies.
    pub fn base() -> Self {
        Self {
            name: BASE_TIER_NAME.to_string(),
            xp_required: 0,
            rewards: Vec::new(),
        }
    }

    /// Whether this is the base sentinel.
    pub fn is_base(&self) -> bool {
        self.name == BASE_TIER_NAME
    }
}

/// Validated mapping from action name to base point value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, u64>", into = "BTreeMap<String, u64>")]
pub struct PointsPerAction(BTreeMap<String, u64>);

impl PointsPerAction {
    /// Build from raw entries, rejecting empty action names.
    pub fn new(entries: BTreeMap<String, u64>) -> Result<Self, LoyaltyError> {
        if let Some(bad) = entries.keys().find(|k| k.trim().is_empty()) {
            return Err(LoyaltyError::UnknownAction(format!(
                "action name must be non-empty, got {:?}",
                bad
            )));
        }
        Ok(Self(entries))
    }

    /// Build from `(name, points)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, LoyaltyError>
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        Self::new(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Base points for an action.
    pub fn points_for(&self, action: &str) -> Result<u64, LoyaltyError> {
        self.0
            .get(action)
            .copied()
            .ok_or_else(|| LoyaltyError::UnknownAction(action.to_string()))
    }

    /// Whether the action is configured.
    pub fn contains(&self, action: &str) -> bool {
        self.0.contains_key(action)
    }

    /// Iterate entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &u64)> {
        self.0.iter()
    }

    /// Number of configured actions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no action is configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<BTreeMap<String, u64>> for PointsPerAction {
    type Error = LoyaltyError;

    fn try_from(entries: BTreeMap<String, u64>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<PointsPerAction> for BTreeMap<String, u64> {
    fn from(table: PointsPerAction) -> Self {
        table.0
    }
}

/// Positive rational applied to an action's base points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multiplier {
    numerator: u64,
    denominator: u64,
}

impl Multiplier {
    /// Create a multiplier; both parts must be non-zero.
    pub fn new(numerator: u64, denominator: u64) -> Result<Self, LoyaltyError> {
        if numerator == 0 || denominator == 0 {
            return Err(LoyaltyError::InvalidMultiplier {
                numerator,
                denominator,
            });
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// Whole-number multiplier.
    pub fn whole(factor: u64) -> Result<Self, LoyaltyError> {
        Self::new(factor, 1)
    }

    /// Numerator.
    pub fn numerator(&self) -> u64 {
        self.numerator
    }

    /// Denominator.
    pub fn denominator(&self) -> u64 {
        self.denominator
    }

    /// `floor(base * numerator / denominator)`, or `None` past `u64::MAX`.
    pub fn apply(&self, base: u64) -> Option<u64> {
        let scaled = u128::from(base) * u128::from(self.numerator) / u128::from(self.denominator);
        u64::try_from(scaled).ok()
    }

    /// Re-check the invariant on values that bypassed `new` (e.g. deserialized).
    pub fn validate(&self) -> Result<(), LoyaltyError> {
        Self::new(self.numerator, self.denominator).map(|_| ())
    }
}

impl Default for Multiplier {
    fn default() -> Self {
        Self {
            numerator: 1,
            denominator: 1,
        }
    }
}

/// Kind of points mutation recorded in a pass history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Points earned through a configured action.
    Award,
    /// Points removed by an authority.
    Revoke,
    /// Discretionary points granted by an authority.
    Gift,
}

impl ActionKind {
    /// Lower-case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Award => "award",
            Self::Revoke => "revoke",
            Self::Gift => "gift",
        }
    }
}

/// Program branding carried on program and pass views.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramMetadata {
    /// Display name of the issuing organization.
    pub organization_name: String,
    /// Optional brand color, e.g. `#ff6600`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_color: Option<String>,
}

/// Who a broadcast is addressed to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum RecipientFilter {
    /// Every pass in the collection.
    #[default]
    All,
    /// Passes whose current tier is one of these names.
    Tier(BTreeSet<String>),
    /// These passes only.
    Specific(BTreeSet<PassId>),
}

impl RecipientFilter {
    /// Whether a pass with the given id and tier is addressed.
    pub fn targets(&self, pass: &PassId, current_tier: &str) -> bool {
        match self {
            Self::All => true,
            Self::Tier(names) => names.contains(current_tier),
            Self::Specific(passes) => passes.contains(pass),
        }
    }
}

/// A ledger value paired with the account version it was read at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<T> {
    /// Snapshot contents.
    pub value: T,
    /// Account version at read time.
    pub version: u64,
}

impl<T> Versioned<T> {
    /// Pair a value with its version.
    pub fn new(value: T, version: u64) -> Self {
        Self { value, version }
    }
}
