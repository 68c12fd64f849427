//! # Adapters Layer (Hexagonal Architecture)
//!
//! In-memory implementations of the outbound ports.

mod clock;
mod ledger;
mod message_store;
mod registry;

pub use clock::ManualTimeSource;
pub use ledger::InMemoryLedger;
pub use message_store::InMemoryMessageStore;
pub use registry::{InMemoryRegistry, MintedAsset};
