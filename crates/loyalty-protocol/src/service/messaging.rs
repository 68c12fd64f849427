//! # Pass Messaging
//!
//! Direct messages on a pass and broadcasts on a collection, gated by the
//! same authority guard as the points engine.

use async_trait::async_trait;
use loyalty_telemetry::log_event;
use uuid::Uuid;

use super::protocol::{LoyaltyProtocol, SUBSYSTEM};
use crate::algorithms::OperationKind;
use crate::domain::{
    short_hex, Address, Broadcast, BroadcastView, CollectionId, LedgerError, LoyaltyError,
    Message, MessageFeed, MessageId, PassId, ProgramRecord, RecipientFilter, Result,
};
use crate::ports::{
    LedgerClient, MarkReadOutcome, MessageStore, MessagingApi, Registry, SendBroadcastParams,
    SendMessageParams,
};

impl<L: LedgerClient, R: Registry, M: MessageStore> LoyaltyProtocol<L, R, M> {
    fn check_content(&self, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(LoyaltyError::InvalidMessage("content is empty".to_string()));
        }
        if content.len() > self.config.max_message_len {
            return Err(LoyaltyError::InvalidMessage(format!(
                "content is {} bytes, limit {}",
                content.len(),
                self.config.max_message_len
            )));
        }
        Ok(())
    }

    fn store_error(id: &MessageId, err: LedgerError) -> LoyaltyError {
        match err {
            LedgerError::NotFound(_) => LoyaltyError::MessageNotFound(id.to_string()),
            other => other.into_submit_error(),
        }
    }
}

/// Tier names must exist in the program and sets must be non-empty.
fn validate_filter(filter: &RecipientFilter, program: &ProgramRecord) -> Result<()> {
    match filter {
        RecipientFilter::All => Ok(()),
        RecipientFilter::Tier(names) => {
            if names.is_empty() {
                return Err(LoyaltyError::InvalidRecipientFilter(
                    "tier filter names no tiers".to_string(),
                ));
            }
            match names.iter().find(|name| program.tier_named(name).is_none()) {
                Some(unknown) => Err(LoyaltyError::InvalidRecipientFilter(format!(
                    "unknown tier {:?}",
                    unknown
                ))),
                None => Ok(()),
            }
        }
        RecipientFilter::Specific(passes) if passes.is_empty() => Err(
            LoyaltyError::InvalidRecipientFilter("specific filter names no passes".to_string()),
        ),
        RecipientFilter::Specific(_) => Ok(()),
    }
}

#[async_trait]
impl<L: LedgerClient, R: Registry, M: MessageStore> MessagingApi for LoyaltyProtocol<L, R, M> {
    async fn send_message(&self, params: SendMessageParams, signer: Address) -> Result<Message> {
        self.check_content(&params.content)?;
        let operation = OperationKind::SendMessage;
        self.require_signer(operation.as_str(), &signer, &params.sender)?;

        let asset = self.load_asset(&params.pass).await?.value;
        let program = self.load_program(&asset.collection).await?.value;
        self.guard(operation, &signer, &program, Some(&asset.owner))?;

        let message = Message {
            id: Uuid::new_v4(),
            content: params.content,
            sender: params.sender,
            timestamp: self.clock.now(),
            read: false,
        };
        self.messages
            .append_message(&params.pass, message.clone())
            .await
            .map_err(LedgerError::into_submit_error)?;

        log_event!(
            info,
            SUBSYSTEM,
            "[loyalty] message sent",
            pass = %short_hex(&params.pass),
            sender = %short_hex(&params.sender),
            id = %message.id
        );
        Ok(message)
    }

    async fn mark_message_read(
        &self,
        pass: PassId,
        message_id: MessageId,
        signer: Address,
    ) -> Result<MarkReadOutcome> {
        let asset = self.load_asset(&pass).await?.value;
        let program = self.load_program(&asset.collection).await?.value;
        self.guard(
            OperationKind::MarkMessageRead,
            &signer,
            &program,
            Some(&asset.owner),
        )?;

        let changed = self
            .messages
            .mark_message_read(&pass, &message_id)
            .await
            .map_err(|err| Self::store_error(&message_id, err))?;
        tracing::debug!(pass = %short_hex(&pass), id = %message_id, changed, "[loyalty] message read");
        Ok(MarkReadOutcome {
            already_read: !changed,
        })
    }

    async fn get_asset_messages(&self, pass: PassId) -> Result<MessageFeed<Message>> {
        self.load_asset(&pass).await?;
        let messages = self
            .messages
            .list_messages(&pass)
            .await
            .map_err(LedgerError::into_read_error)?;
        Ok(MessageFeed::new(messages))
    }

    async fn send_broadcast(
        &self,
        params: SendBroadcastParams,
        signer: Address,
    ) -> Result<Broadcast> {
        self.check_content(&params.content)?;
        let operation = OperationKind::SendBroadcast;
        self.require_signer(operation.as_str(), &signer, &params.sender)?;

        let program = self.load_program(&params.collection).await?.value;
        self.guard(operation, &signer, &program, None)?;

        let recipients = params.recipients.unwrap_or_default();
        validate_filter(&recipients, &program)?;

        let broadcast = Broadcast {
            id: Uuid::new_v4(),
            content: params.content,
            sender: params.sender,
            timestamp: self.clock.now(),
            recipients,
            read_by: Default::default(),
        };
        self.messages
            .append_broadcast(&params.collection, broadcast.clone())
            .await
            .map_err(LedgerError::into_submit_error)?;

        log_event!(
            info,
            SUBSYSTEM,
            "[loyalty] broadcast sent",
            collection = %short_hex(&params.collection),
            id = %broadcast.id
        );
        Ok(broadcast)
    }

    async fn mark_broadcast_read(
        &self,
        collection: CollectionId,
        broadcast_id: MessageId,
        pass: PassId,
        signer: Address,
    ) -> Result<MarkReadOutcome> {
        let asset = self.load_asset(&pass).await?.value;
        let program = self.load_program(&collection).await?.value;
        let operation = OperationKind::MarkBroadcastRead;
        self.guard(operation, &signer, &program, Some(&asset.owner))?;

        let broadcast = self
            .messages
            .get_broadcast(&collection, &broadcast_id)
            .await
            .map_err(LedgerError::into_read_error)?
            .ok_or_else(|| LoyaltyError::MessageNotFound(broadcast_id.to_string()))?;

        if asset.collection != collection || !broadcast.targets(&asset) {
            self.metrics.record_unauthorized(operation.as_str());
            return Err(LoyaltyError::Unauthorized(format!(
                "pass {} is not a recipient of broadcast {}",
                short_hex(&pass),
                broadcast_id
            )));
        }

        let changed = self
            .messages
            .mark_broadcast_read(&collection, &broadcast_id, &pass)
            .await
            .map_err(|err| Self::store_error(&broadcast_id, err))?;
        tracing::debug!(pass = %short_hex(&pass), id = %broadcast_id, changed, "[loyalty] broadcast read");
        Ok(MarkReadOutcome {
            already_read: !changed,
        })
    }

    async fn get_pass_broadcasts(&self, pass: PassId) -> Result<MessageFeed<BroadcastView>> {
        let asset = self.load_asset(&pass).await?.value;
        let views = self
            .messages
            .list_broadcasts(&asset.collection)
            .await
            .map_err(LedgerError::into_read_error)?
            .iter()
            .filter(|broadcast| broadcast.targets(&asset))
            .map(|broadcast| broadcast.view_for(&pass))
            .collect();
        Ok(MessageFeed::new(views))
    }

    async fn get_program_broadcasts(&self, collection: CollectionId) -> Result<Vec<Broadcast>> {
        self.load_program(&collection).await?;
        self.messages
            .list_broadcasts(&collection)
            .await
            .map_err(LedgerError::into_read_error)
    }
}
