use crate::api::AppState;
use crate::api::middleware::{AuthSession, CompleteProfile};
use crate::api::schemas::profile::{
    LikesResponse, PhotoUploadQuery, PhotoUploadResponse, ProfileForm, ProfilePreview, ProfileResponse,
};
use crate::error::{AppError, Result};
use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};

pub async fn get_profile(AuthSession(session): AuthSession, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let profile = state.profile_service.get(session.user_id()).await?;
    Ok(Json(ProfileResponse::from(profile)))
}

pub async fn save_profile(
    AuthSession(session): AuthSession,
    State(state): State<AppState>,
    Json(form): Json<ProfileForm>,
) -> Result<impl IntoResponse> {
    let profile = state.profile_service.save(session.user_id(), form.into()).await?;
    Ok(Json(ProfileResponse::from(profile)))
}

pub async fn upload_photo(
    AuthSession(session): AuthSession,
    State(state): State<AppState>,
    Query(query): Query<PhotoUploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Content-Type".into()))?;

    let url = state.profile_service.upload_photo(session.user_id(), &query.file_name, content_type, body).await?;
    Ok((StatusCode::CREATED, Json(PhotoUploadResponse { url })))
}

pub async fn likes(CompleteProfile(session): CompleteProfile, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let inbox = state.profile_service.likes_inbox(session.user_id()).await?;
    Ok(Json(LikesResponse {
        profiles: inbox.profiles.iter().map(ProfilePreview::from).collect(),
        like_count: inbox.like_count,
        match_count: inbox.match_count,
    }))
}
