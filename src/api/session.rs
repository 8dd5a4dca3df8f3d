use crate::api::AppState;
use crate::api::middleware::AuthSession;
use crate::api::schemas::session::{RouteDecision, SessionResponse, SignInRequest};
use crate::domain::session::{Route, authorize, landing_route};
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

pub async fn sign_in(State(state): State<AppState>, Json(payload): Json<SignInRequest>) -> Result<impl IntoResponse> {
    let sign_in = state.account_service.sign_in(&payload.id_token).await?;
    let mut response = SessionResponse::new(&sign_in.session, &sign_in.landing);
    response.created = Some(sign_in.created);

    let status = if sign_in.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(response)))
}

pub async fn current(AuthSession(session): AuthSession) -> Result<impl IntoResponse> {
    let landing = landing_route(session.profile_complete);
    Ok(Json(SessionResponse::new(&session, &landing)))
}

pub async fn sign_out(AuthSession(session): AuthSession, State(state): State<AppState>) -> Result<impl IntoResponse> {
    state.account_service.sign_out(session.user_id());
    Ok(StatusCode::NO_CONTENT)
}

/// Gate decision for a client-side page.
pub async fn route_access(session: Option<AuthSession>, path: Option<Path<String>>) -> Result<impl IntoResponse> {
    let path = path.map(|Path(p)| p).unwrap_or_default();
    let route = Route::parse(&path).ok_or(AppError::NotFound)?;
    let session = session.map(|AuthSession(s)| s);
    let access = authorize(&route, session.as_ref());
    Ok(Json(RouteDecision::new(&route, &access)))
}
