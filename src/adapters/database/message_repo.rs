use crate::adapters::database::records::MessageRecord;
use crate::adapters::database::{
    Direction, DocumentStore, FieldMutation, Query, Snapshot, Subscription, WriteBatch, server_timestamp,
};
use crate::domain::matching::MatchId;
use crate::domain::message::{Message, NewMessage};
use crate::domain::user::UserId;
use crate::error::{AppError, Result};
use serde_json::json;
use std::sync::Arc;

/// Messages of one conversation live in their own sub-collection.
#[must_use]
pub fn conversation_collection(id: &MatchId) -> String {
    format!("chats/{id}/messages")
}

#[derive(Clone, Debug)]
pub struct MessageRepository {
    store: Arc<dyn DocumentStore>,
}

impl MessageRepository {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Records a new unread message stamped with the store's clock.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    #[tracing::instrument(level = "debug", skip(self, message), fields(conversation_id = %message.conversation_id), err)]
    pub(crate) async fn create(&self, message: NewMessage) -> Result<Message> {
        let collection = conversation_collection(&message.conversation_id);
        let data = json!({
            "sender": message.sender.as_str(),
            "receiver": message.receiver.as_str(),
            "text": message.text,
            "timestamp": server_timestamp(),
            "read": false,
        });

        let id = self.store.add(&collection, data).await?;
        let snapshot = self.store.get(&collection, &id).await?.ok_or(AppError::Internal)?;
        MessageRecord::from_snapshot(snapshot, &message.conversation_id)
    }

    /// Messages of the conversation, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub(crate) async fn list(&self, conversation_id: &MatchId) -> Result<Vec<Message>> {
        let snapshots = self.store.query(&conversation_collection(conversation_id), &Self::ordered()).await?;
        Self::decode(conversation_id, snapshots)
    }

    /// Flags every message addressed to `reader` as read. Returns how many changed.
    ///
    /// # Errors
    /// Returns an error if the query or the commit fails.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub(crate) async fn mark_read(&self, conversation_id: &MatchId, reader: &UserId) -> Result<usize> {
        let collection = conversation_collection(conversation_id);
        let unread = self.store.query(&collection, &Self::unread(reader)).await?;
        if unread.is_empty() {
            return Ok(0);
        }

        let count = unread.len();
        let batch = unread.into_iter().fold(WriteBatch::new(), |batch, snapshot| {
            batch.update(&collection, &snapshot.id, vec![FieldMutation::set("read", true)])
        });
        self.store.commit(batch).await?;
        Ok(count)
    }

    /// Live, ordered message list of one conversation.
    ///
    /// # Errors
    /// Returns an error if the subscription cannot be opened.
    pub(crate) async fn subscribe(&self, conversation_id: &MatchId, capacity: usize) -> Result<Subscription> {
        self.store.subscribe(&conversation_collection(conversation_id), Self::ordered(), capacity).await
    }

    /// Live set of messages in the conversation that `reader` has not read yet.
    ///
    /// # Errors
    /// Returns an error if the subscription cannot be opened.
    pub(crate) async fn subscribe_unread(
        &self,
        conversation_id: &MatchId,
        reader: &UserId,
        capacity: usize,
    ) -> Result<Subscription> {
        self.store.subscribe(&conversation_collection(conversation_id), Self::unread(reader), capacity).await
    }

    pub(crate) fn decode(conversation_id: &MatchId, snapshots: Vec<Snapshot>) -> Result<Vec<Message>> {
        snapshots.into_iter().map(|s| MessageRecord::from_snapshot(s, conversation_id)).collect()
    }

    fn ordered() -> Query {
        Query::new().order_by("timestamp", Direction::Asc)
    }

    fn unread(reader: &UserId) -> Query {
        Query::new().eq("receiver", reader.as_str()).eq("read", false)
    }
}
