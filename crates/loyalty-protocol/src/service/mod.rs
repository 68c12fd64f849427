//! # Service Module
//!
//! Application services implementing the inbound ports.

mod messaging;
mod protocol;

pub use protocol::LoyaltyProtocol;
