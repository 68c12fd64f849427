//! In-Memory Ledger Adapter
//!
//! Implements `LedgerClient` with versioned accounts and atomic commits.
//! Used as the reference ledger in tests; faults can be injected to exercise
//! the retry and indeterminate-outcome paths.

use crate::algorithms::{authorize, check, Capability, OperationKind};
use crate::domain::{
    invariant_tier_table, short_hex, Address, AssetRecord, CollectionId, LedgerError, PassId,
    ProgramRecord, TxSignature, Versioned,
};
use crate::ports::outbound::{Instruction, InstructionPayload, LedgerClient};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Default)]
struct Accounts {
    programs: HashMap<CollectionId, Versioned<ProgramRecord>>,
    assets: HashMap<PassId, Versioned<AssetRecord>>,
}

#[derive(Default)]
struct Faults {
    /// Submits that lose to a simulated competing writer.
    conflicts: u32,
    /// Submits that time out without landing.
    timeouts: u32,
    /// Submits that land but whose acknowledgement is lost.
    lost_acks: u32,
    /// Every call fails with a transport error.
    network_down: bool,
    /// Latency added before each submit.
    submit_delay: Option<Duration>,
}

/// Versioned in-memory ledger.
#[derive(Default)]
pub struct InMemoryLedger {
    accounts: RwLock<Accounts>,
    faults: Mutex<Faults>,
    slot: AtomicU64,
    yield_on_read: AtomicBool,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield to the scheduler inside every read so concurrent callers interleave.
    pub fn set_yield_on_read(&self, enabled: bool) {
        self.yield_on_read.store(enabled, Ordering::SeqCst);
    }

    /// Next `n` submits find their target modified by another writer.
    pub fn inject_conflicts(&self, n: u32) {
        self.faults.lock().conflicts = n;
    }

    /// Next `n` submits time out without being applied.
    pub fn inject_timeouts(&self, n: u32) {
        self.faults.lock().timeouts = n;
    }

    /// Next `n` submits are applied but report a timeout.
    pub fn inject_lost_acks(&self, n: u32) {
        self.faults.lock().lost_acks = n;
    }

    /// Toggle transport failure for every call.
    pub fn set_network_down(&self, down: bool) {
        self.faults.lock().network_down = down;
    }

    /// Delay each submit, e.g. beyond the caller's submit timeout.
    pub fn set_submit_delay(&self, delay: Option<Duration>) {
        self.faults.lock().submit_delay = delay;
    }

    /// Stored program, bypassing faults.
    pub fn program(&self, collection: &CollectionId) -> Option<Versioned<ProgramRecord>> {
        self.accounts.read().programs.get(collection).cloned()
    }

    /// Stored pass, bypassing faults.
    pub fn asset(&self, pass: &PassId) -> Option<Versioned<AssetRecord>> {
        self.accounts.read().assets.get(pass).cloned()
    }

    /// Number of committed instructions.
    pub fn committed(&self) -> u64 {
        self.slot.load(Ordering::SeqCst)
    }

    async fn before_read(&self) -> Result<(), LedgerError> {
        if self.yield_on_read.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        if self.faults.lock().network_down {
            return Err(LedgerError::Network("ledger unreachable".to_string()));
        }
        Ok(())
    }

    fn signature_for(&self, instruction: &Instruction) -> TxSignature {
        let slot = self.slot.fetch_add(1, Ordering::SeqCst) + 1;
        let mut hasher = Sha256::new();
        hasher.update(slot.to_le_bytes());
        hasher.update(instruction.signer);
        hasher.update(format!("{:?}", instruction.payload).as_bytes());

        let mut signature = [0u8; 32];
        signature.copy_from_slice(&hasher.finalize());
        signature
    }

    fn apply(&self, instruction: &Instruction, expected_version: u64) -> Result<(), LedgerError> {
        let mut guard = self.accounts.write();
        let Accounts { programs, assets } = &mut *guard;
        let signer = &instruction.signer;

        match &instruction.payload {
            InstructionPayload::CreateProgram(program) => {
                expect_version(programs.get(&program.collection).map(|p| p.version), expected_version)?;
                if program.program_authority != *signer {
                    return Err(LedgerError::Unauthorized(format!(
                        "{} is not the program authority",
                        short_hex(signer)
                    )));
                }
                invariant_tier_table(&program.tiers).map_err(|e| LedgerError::Rejected(e.to_string()))?;
                programs.insert(program.collection, Versioned::new(program.clone(), 1));
            }
            InstructionPayload::UpdateProgram {
                collection,
                tiers,
                points_per_action,
                point_authorities,
            } => {
                let entry = programs.get_mut(collection).ok_or_else(|| not_found("program", collection))?;
                expect_version(Some(entry.version), expected_version)?;
                authorize(OperationKind::UpdateProgram, signer, &entry.value, None)
                    .map_err(|e| LedgerError::Unauthorized(e.to_string()))?;
                if let Some(tiers) = tiers {
                    invariant_tier_table(tiers).map_err(|e| LedgerError::Rejected(e.to_string()))?;
                    entry.value.tiers = tiers.clone();
                }
                if let Some(table) = points_per_action {
                    entry.value.points_per_action = table.clone();
                }
                if let Some(authorities) = point_authorities {
                    entry.value.point_authorities = authorities.clone();
                }
                entry.version += 1;
            }
            InstructionPayload::IssuePass(asset) => {
                expect_version(assets.get(&asset.pass).map(|a| a.version), expected_version)?;
                let program = programs
                    .get_mut(&asset.collection)
                    .ok_or_else(|| not_found("program", &asset.collection))?;
                authorize(OperationKind::IssuePass, signer, &program.value, None)
                    .map_err(|e| LedgerError::Unauthorized(e.to_string()))?;
                program.value.num_minted += 1;
                program.version += 1;
                assets.insert(asset.pass, Versioned::new(asset.clone(), 1));
            }
            InstructionPayload::CommitPoints {
                next,
                program_version,
            } => {
                let entry = assets.get_mut(&next.pass).ok_or_else(|| not_found("pass", &next.pass))?;
                expect_version(Some(entry.version), expected_version)?;
                let program = programs
                    .get(&entry.value.collection)
                    .ok_or_else(|| not_found("program", &entry.value.collection))?;
                // Tier and points were derived from this program snapshot.
                expect_version(Some(program.version), *program_version)?;
                check(Capability::PointAuthority, signer, &program.value, Some(&entry.value.owner))
                    .map_err(|e| LedgerError::Unauthorized(e.to_string()))?;
                if !extends(&entry.value, next) {
                    return Err(LedgerError::Rejected(
                        "points commit must append exactly one history entry to the same pass"
                            .to_string(),
                    ));
                }
                entry.value = next.clone();
                entry.version += 1;
            }
            InstructionPayload::TransferPass { pass, new_owner } => {
                let entry = assets.get_mut(pass).ok_or_else(|| not_found("pass", pass))?;
                expect_version(Some(entry.version), expected_version)?;
                let program = programs
                    .get(&entry.value.collection)
                    .ok_or_else(|| not_found("program", &entry.value.collection))?;
                authorize(
                    OperationKind::ApproveTransfer,
                    signer,
                    &program.value,
                    Some(&entry.value.owner),
                )
                .map_err(|e| LedgerError::Unauthorized(e.to_string()))?;
                entry.value.owner = *new_owner;
                entry.version += 1;
            }
        }
        Ok(())
    }

    /// Bump the target's version as if another writer committed first.
    fn simulate_competing_write(&self, target: &Address) -> Option<u64> {
        let mut accounts = self.accounts.write();
        if let Some(program) = accounts.programs.get_mut(target) {
            program.version += 1;
            return Some(program.version);
        }
        accounts.assets.get_mut(target).map(|asset| {
            asset.version += 1;
            asset.version
        })
    }
}

fn expect_version(stored: Option<u64>, expected: u64) -> Result<(), LedgerError> {
    let found = stored.unwrap_or(0);
    if found != expected {
        return Err(LedgerError::ConcurrentModification { expected, found });
    }
    Ok(())
}

fn not_found(kind: &str, id: &Address) -> LedgerError {
    LedgerError::NotFound(format!("{} {}", kind, short_hex(id)))
}

/// Same pass, same holder, history grown by exactly one entry.
fn extends(current: &AssetRecord, next: &AssetRecord) -> bool {
    next.collection == current.collection
        && next.owner == current.owner
        && next.action_history.len() == current.action_history.len() + 1
        && next.action_history.starts_with(&current.action_history)
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn fetch_asset(&self, pass: &PassId) -> Result<Versioned<AssetRecord>, LedgerError> {
        self.before_read().await?;
        self.accounts
            .read()
            .assets
            .get(pass)
            .cloned()
            .ok_or_else(|| not_found("pass", pass))
    }

    async fn fetch_program(
        &self,
        collection: &CollectionId,
    ) -> Result<Versioned<ProgramRecord>, LedgerError> {
        self.before_read().await?;
        self.accounts
            .read()
            .programs
            .get(collection)
            .cloned()
            .ok_or_else(|| not_found("program", collection))
    }

    async fn fetch_assets_by_owner(
        &self,
        owner: &Address,
    ) -> Result<Vec<AssetRecord>, LedgerError> {
        self.before_read().await?;
        Ok(self
            .accounts
            .read()
            .assets
            .values()
            .filter(|asset| asset.value.owner == *owner)
            .map(|asset| asset.value.clone())
            .collect())
    }

    async fn submit(
        &self,
        instruction: Instruction,
        expected_version: u64,
    ) -> Result<TxSignature, LedgerError> {
        let delay = self.faults.lock().submit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let (conflict, timeout, lose_ack) = {
            let mut faults = self.faults.lock();
            if faults.network_down {
                return Err(LedgerError::Network("ledger unreachable".to_string()));
            }
            let conflict = take(&mut faults.conflicts);
            let timeout = !conflict && take(&mut faults.timeouts);
            let lose_ack = !conflict && !timeout && take(&mut faults.lost_acks);
            (conflict, timeout, lose_ack)
        };

        let target = instruction.target();
        if conflict {
            let found = self.simulate_competing_write(&target).unwrap_or(expected_version + 1);
            debug!(
                "[loyalty] injected conflict on {} (expected {}, now {})",
                short_hex(&target),
                expected_version,
                found
            );
            return Err(LedgerError::ConcurrentModification {
                expected: expected_version,
                found,
            });
        }
        if timeout {
            return Err(LedgerError::Timeout);
        }

        self.apply(&instruction, expected_version)?;
        let signature = self.signature_for(&instruction);
        info!(
            "[loyalty] ledger committed {} on {} at version {}",
            instruction.label(),
            short_hex(&target),
            expected_version + 1
        );

        if lose_ack {
            return Err(LedgerError::Timeout);
        }
        Ok(signature)
    }
}

fn take(counter: &mut u32) -> bool {
    if *counter == 0 {
        return false;
    }
    *counter -= 1;
    true
}
