//! In-Memory Message Store Adapter

use crate::domain::{
    short_hex, Broadcast, CollectionId, LedgerError, Message, MessageId, PassId,
};
use crate::ports::outbound::MessageStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Pass inboxes and collection broadcast lists.
#[derive(Default)]
pub struct InMemoryMessageStore {
    inboxes: RwLock<HashMap<PassId, Vec<Message>>>,
    broadcasts: RwLock<HashMap<CollectionId, Vec<Broadcast>>>,
}

impl InMemoryMessageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append_message(&self, pass: &PassId, message: Message) -> Result<(), LedgerError> {
        self.inboxes.write().entry(*pass).or_default().push(message);
        Ok(())
    }

    async fn list_messages(&self, pass: &PassId) -> Result<Vec<Message>, LedgerError> {
        Ok(self.inboxes.read().get(pass).cloned().unwrap_or_default())
    }

    async fn mark_message_read(
        &self,
        pass: &PassId,
        id: &MessageId,
    ) -> Result<bool, LedgerError> {
        let mut inboxes = self.inboxes.write();
        let message = inboxes
            .get_mut(pass)
            .and_then(|inbox| inbox.iter_mut().find(|m| m.id == *id))
            .ok_or_else(|| {
                LedgerError::NotFound(format!("message {} on {}", id, short_hex(pass)))
            })?;
        let changed = !message.read;
        message.read = true;
        Ok(changed)
    }

    async fn append_broadcast(
        &self,
        collection: &CollectionId,
        broadcast: Broadcast,
    ) -> Result<(), LedgerError> {
        self.broadcasts
            .write()
            .entry(*collection)
            .or_default()
            .push(broadcast);
        Ok(())
    }

    async fn list_broadcasts(
        &self,
        collection: &CollectionId,
    ) -> Result<Vec<Broadcast>, LedgerError> {
        Ok(self
            .broadcasts
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_broadcast(
        &self,
        collection: &CollectionId,
        id: &MessageId,
    ) -> Result<Option<Broadcast>, LedgerError> {
        Ok(self
            .broadcasts
            .read()
            .get(collection)
            .and_then(|list| list.iter().find(|b| b.id == *id).cloned()))
    }

    async fn mark_broadcast_read(
        &self,
        collection: &CollectionId,
        id: &MessageId,
        reader: &PassId,
    ) -> Result<bool, LedgerError> {
        let mut broadcasts = self.broadcasts.write();
        let broadcast = broadcasts
            .get_mut(collection)
            .and_then(|list| list.iter_mut().find(|b| b.id == *id))
            .ok_or_else(|| {
                LedgerError::NotFound(format!("broadcast {} on {}", id, short_hex(collection)))
            })?;
        Ok(broadcast.read_by.insert(*reader))
    }
}
