use crate::adapters::database::Snapshot;
use crate::adapters::database::records::timestamp_from_micros;
use crate::domain::matching::{Match, MatchId};
use crate::domain::user::UserId;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub(crate) users: Vec<UserId>,
    #[serde(default)]
    pub(crate) chat_slug: Option<String>,
    #[serde(default)]
    pub(crate) created_at: Option<i64>,
}

impl TryFrom<Snapshot> for Match {
    type Error = AppError;

    fn try_from(snapshot: Snapshot) -> Result<Self> {
        let record: MatchRecord = serde_json::from_value(snapshot.data)?;
        let users: [UserId; 2] = record
            .users
            .try_into()
            .map_err(|_| AppError::InternalMsg(format!("Match {} does not have two participants", snapshot.id)))?;
        Ok(Self { id: MatchId::from_raw(snapshot.id), users, created_at: timestamp_from_micros(record.created_at) })
    }
}
