//! In-Memory Registry Adapter
//!
//! Mints collection and asset ids deterministically from a counter.

use crate::domain::{short_hex, Address, CollectionId, LedgerError, PassId};
use crate::ports::outbound::{MintMetadata, Registry};
use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// A minted asset as the registry sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintedAsset {
    /// Owning collection.
    pub collection: CollectionId,
    /// First holder.
    pub owner: Address,
    /// Name and uri.
    pub metadata: MintMetadata,
}

/// Registry keeping minted ids in memory.
#[derive(Default)]
pub struct InMemoryRegistry {
    collections: RwLock<HashMap<CollectionId, (Address, MintMetadata)>>,
    assets: RwLock<HashMap<PassId, MintedAsset>>,
    counter: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every mint fail with a transport error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Asset minted under `pass`, if any.
    pub fn minted_asset(&self, pass: &PassId) -> Option<MintedAsset> {
        self.assets.read().get(pass).cloned()
    }

    /// Collections minted so far.
    pub fn collection_count(&self) -> usize {
        self.collections.read().len()
    }

    /// Assets minted so far, recorded on the ledger or not.
    pub fn asset_count(&self) -> usize {
        self.assets.read().len()
    }

    fn next_id(&self, domain: &[u8], owner: &Address) -> Address {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let mut hasher = Sha256::new();
        hasher.update(domain);
        hasher.update(n.to_le_bytes());
        hasher.update(owner);

        let mut id = [0u8; 32];
        id.copy_from_slice(&hasher.finalize());
        id
    }

    fn ensure_available(&self) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Network("registry unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn mint_collection(
        &self,
        authority: &Address,
        metadata: &MintMetadata,
    ) -> Result<CollectionId, LedgerError> {
        self.ensure_available()?;
        let collection = self.next_id(b"collection", authority);
        self.collections
            .write()
            .insert(collection, (*authority, metadata.clone()));
        debug!(
            "[loyalty] minted collection {} ({})",
            short_hex(&collection),
            metadata.name
        );
        Ok(collection)
    }

    async fn mint_asset(
        &self,
        collection: &CollectionId,
        owner: &Address,
        metadata: &MintMetadata,
    ) -> Result<PassId, LedgerError> {
        self.ensure_available()?;
        if !self.collections.read().contains_key(collection) {
            return Err(LedgerError::NotFound(format!(
                "collection {}",
                short_hex(collection)
            )));
        }

        let pass = self.next_id(b"asset", owner);
        self.assets.write().insert(
            pass,
            MintedAsset {
                collection: *collection,
                owner: *owner,
                metadata: metadata.clone(),
            },
        );
        debug!(
            "[loyalty] minted asset {} in {}",
            short_hex(&pass),
            short_hex(collection)
        );
        Ok(pass)
    }
}
