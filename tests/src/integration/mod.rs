//! # Integration Flows
//!
//! End-to-end scenarios driving [`LoyaltyProtocol`] over the in-memory
//! ledger, registry and message store.

pub mod concurrency;
pub mod points_flow;

use std::sync::Arc;

use loyalty_protocol::{
    Address, CollectionId, CreateProgramParams, InMemoryLedger, InMemoryMessageStore,
    InMemoryRegistry, IssuePassParams, LoyaltyProgramApi, LoyaltyProtocol, ManualTimeSource,
    PassId, PointsPerAction, ProgramMetadata, ProtocolConfig, Tier,
};

/// Protocol wired to in-memory adapters.
pub type TestProtocol = LoyaltyProtocol<InMemoryLedger, InMemoryRegistry, InMemoryMessageStore>;

/// Owner and update authority of the fixture program.
pub const AUTHORITY: Address = [0xA1; 32];
/// Extra point-granting signer.
pub const CASHIER: Address = [0xC4; 32];
/// Holder of the first pass.
pub const ALICE: Address = [0x0A; 32];
/// Holder of the second pass.
pub const BOB: Address = [0x0B; 32];
/// Signer with no capability.
pub const MALLORY: Address = [0xEE; 32];

/// A program with two issued passes.
pub struct Harness {
    /// Service under test.
    pub protocol: TestProtocol,
    /// Shared ledger for fault injection and direct inspection.
    pub ledger: Arc<InMemoryLedger>,
    /// Manual clock.
    pub clock: Arc<ManualTimeSource>,
    /// Fixture program.
    pub collection: CollectionId,
    /// Pass held by [`ALICE`].
    pub alice_pass: PassId,
    /// Pass held by [`BOB`].
    pub bob_pass: PassId,
}

/// Bronze/Silver/Gold with `purchase = 50`, `review = 10`.
pub fn coffee_club() -> CreateProgramParams {
    CreateProgramParams {
        name: "Coffee Club".to_string(),
        metadata_uri: "https://example.org/coffee-club.json".to_string(),
        program_authority: AUTHORITY,
        update_authority: None,
        metadata: ProgramMetadata {
            organization_name: "Bean Co".to_string(),
            brand_color: Some("#6f4e37".to_string()),
        },
        tiers: vec![
            Tier::new("Bronze", 0, vec!["free-refill".to_string()]),
            Tier::new("Silver", 100, vec!["free-pastry".to_string()]),
            Tier::new("Gold", 500, vec!["free-drink".to_string()]),
        ],
        points_per_action: PointsPerAction::from_pairs([("purchase", 50), ("review", 10)])
            .expect("valid table"),
        point_authorities: Some([AUTHORITY, CASHIER].into_iter().collect()),
    }
}

impl Harness {
    /// Build with the test config.
    pub async fn new() -> Self {
        Self::with_config(ProtocolConfig::for_testing()).await
    }

    /// Build with a specific config.
    pub async fn with_config(config: ProtocolConfig) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let clock = Arc::new(ManualTimeSource::new(1_700_000_000_000));
        let protocol = LoyaltyProtocol::new(
            config,
            Arc::clone(&ledger),
            Arc::new(InMemoryRegistry::new()),
            Arc::new(InMemoryMessageStore::new()),
        )
        .with_time_source(clock.clone());

        let collection = protocol
            .create_loyalty_program(coffee_club(), AUTHORITY)
            .await
            .expect("create program")
            .collection;

        let mut passes = Vec::new();
        for (holder, name) in [(ALICE, "Alice"), (BOB, "Bob")] {
            let issued = protocol
                .issue_loyalty_pass(
                    IssuePassParams {
                        collection,
                        recipient: holder,
                        pass_name: format!("{}'s pass", name),
                        pass_metadata_uri: format!("https://example.org/{}.json", name),
                    },
                    AUTHORITY,
                )
                .await
                .expect("issue pass");
            passes.push(issued.pass);
        }

        Self {
            protocol,
            ledger,
            clock,
            collection,
            alice_pass: passes[0],
            bob_pass: passes[1],
        }
    }
}
