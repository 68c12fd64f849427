//! # Algorithms Module
//!
//! Pure protocol logic: tier resolution, the points state machine, the
//! authority guard and the conflict-retry loop.

pub mod authority;
pub mod backoff;
pub mod points;
pub mod tier_resolver;

pub use authority::{authorize, check, Capability, OperationKind};
pub use backoff::{backoff_delay, retry_with_backoff};
pub use points::{apply_points, replay_history, PointsOperation, PointsTransition, REVOKE_ACTION};
pub use tier_resolver::{resolve_tier, tier_rank};
