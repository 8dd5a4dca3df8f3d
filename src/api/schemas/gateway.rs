use crate::api::schemas::chat::ConversationResponse;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

/// Frames pushed over `/v1/gateway`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GatewayEvent {
    Unread { counts: BTreeMap<String, u64>, total: u64 },
    Matches { conversations: Vec<ConversationResponse> },
}
