use crate::adapters::database::Snapshot;
use crate::adapters::database::records::timestamp_from_micros;
use crate::domain::matching::MatchId;
use crate::domain::message::Message;
use crate::domain::user::UserId;
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub(crate) sender: UserId,
    pub(crate) receiver: UserId,
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) timestamp: Option<i64>,
    #[serde(default)]
    pub(crate) read: bool,
}

impl MessageRecord {
    pub(crate) fn into_message(self, id: String, conversation_id: MatchId) -> Message {
        Message {
            id,
            conversation_id,
            sender: self.sender,
            receiver: self.receiver,
            text: self.text,
            timestamp: timestamp_from_micros(self.timestamp),
            read: self.read,
        }
    }

    pub(crate) fn from_snapshot(snapshot: Snapshot, conversation_id: &MatchId) -> Result<Message> {
        let record: Self = serde_json::from_value(snapshot.data)?;
        Ok(record.into_message(snapshot.id, conversation_id.clone()))
    }
}
