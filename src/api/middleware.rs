use crate::api::AppState;
use crate::domain::session::Session;
use crate::error::AppError;
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};

/// Pulls the identity token out of an `Authorization: Bearer` header.
fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let auth_header = parts.headers.get(header::AUTHORIZATION).ok_or(AppError::AuthError)?;
    let auth_str = auth_header.to_str().map_err(|_| AppError::AuthError)?;
    auth_str.strip_prefix("Bearer ").ok_or(AppError::AuthError)
}

fn record_user(session: &Session) {
    tracing::Span::current().record("user_id", tracing::field::display(session.user_id()));
}

/// A verified identity together with the persisted completeness flag.
#[derive(Debug)]
pub struct AuthSession(pub Session);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let session = state.account_service.authenticate(token).await?;
        record_user(&session);
        Ok(Self(session))
    }
}

impl OptionalFromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Option<Self>, Self::Rejection> {
        match <Self as FromRequestParts<AppState>>::from_request_parts(parts, state).await {
            Ok(session) => Ok(Some(session)),
            Err(AppError::AuthError) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// A session whose profile is complete; pages behind the gate require it.
#[derive(Debug)]
pub struct CompleteProfile(pub Session);

impl FromRequestParts<AppState> for CompleteProfile {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthSession(session) =
            <AuthSession as FromRequestParts<AppState>>::from_request_parts(parts, state).await?;
        if !session.profile_complete {
            tracing::debug!(user_id = %session.user_id(), "Profile incomplete, access denied");
            return Err(AppError::Forbidden);
        }
        Ok(Self(session))
    }
}
