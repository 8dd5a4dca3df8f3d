use crate::api::schemas::profile::CandidateCard;
use crate::domain::feed::{SwipeDirection, SwipeOutcome};
use crate::services::feed_service::{FeedSnapshot, SwipeResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub candidates: Vec<CandidateCard>,
    pub backlog: usize,
    pub likes_used: u32,
    pub like_quota: u32,
    pub total_eligible: u64,
    pub catalog_exhausted: bool,
    pub likes_received: usize,
    pub match_count: usize,
}

impl From<FeedSnapshot> for FeedResponse {
    fn from(feed: FeedSnapshot) -> Self {
        Self {
            candidates: feed.visible.iter().map(CandidateCard::from).collect(),
            backlog: feed.backlog,
            likes_used: feed.likes_used,
            like_quota: feed.like_quota,
            total_eligible: feed.total_eligible,
            catalog_exhausted: feed.catalog_exhausted,
            likes_received: feed.likes_received,
            match_count: feed.match_count,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwipeRequest {
    pub direction: SwipeDirection,
    pub candidate_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwipeResponse {
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    /// Page to open after a match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    pub feed: FeedResponse,
}

impl From<SwipeResult> for SwipeResponse {
    fn from(result: SwipeResult) -> Self {
        let outcome = result.outcome.label().to_string();
        let (conversation_id, notice, redirect) = match result.outcome {
            SwipeOutcome::Matched { conversation_id } => (
                Some(conversation_id.to_string()),
                Some("It's a match!".to_string()),
                Some(format!("/chats/{conversation_id}")),
            ),
            SwipeOutcome::MissedMatch => (None, Some("You missed a match!".to_string()), None),
            SwipeOutcome::Liked | SwipeOutcome::Disliked => (None, None, None),
        };
        Self { outcome, conversation_id, notice, redirect, feed: result.feed.into() }
    }
}
