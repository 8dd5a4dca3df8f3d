use crate::api::schemas::profile::ProfilePreview;
use crate::domain::message::Message;
use crate::services::chat_service::Conversation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub conversation_id: String,
    pub counterpart: ProfilePreview,
}

impl From<&Conversation> for ConversationResponse {
    fn from(conversation: &Conversation) -> Self {
        Self {
            conversation_id: conversation.id.to_string(),
            counterpart: ProfilePreview::from(&conversation.counterpart),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: Option<i64>,
    pub read: bool,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            sender: message.sender.to_string(),
            receiver: message.receiver.to_string(),
            text: message.text,
            timestamp: message
                .timestamp
                .map(|t| i64::try_from(t.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)),
            read: message.read,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub updated: usize,
}

/// Frame pushed over the live conversation socket.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConversationEvent {
    Messages { messages: Vec<MessageResponse> },
}
