use crate::api::AppState;
use crate::api::middleware::CompleteProfile;
use crate::api::schemas::feed::{FeedQuery, FeedResponse, SwipeRequest, SwipeResponse};
use crate::domain::user::UserId;
use crate::error::Result;
use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

pub async fn get_feed(
    CompleteProfile(session): CompleteProfile,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse> {
    let feed = if query.refresh {
        state.feed_service.load(session.user_id()).await?
    } else {
        state.feed_service.current(session.user_id()).await?
    };
    Ok(Json(FeedResponse::from(feed)))
}

pub async fn swipe(
    CompleteProfile(session): CompleteProfile,
    State(state): State<AppState>,
    Json(payload): Json<SwipeRequest>,
) -> Result<impl IntoResponse> {
    let candidate = UserId::new(payload.candidate_id);
    let result = state.feed_service.swipe(session.user_id(), payload.direction, &candidate).await?;
    Ok(Json(SwipeResponse::from(result)))
}
