use crate::api::AppState;
use crate::api::middleware::CompleteProfile;
use crate::api::schemas::chat::{
    ConversationEvent, ConversationResponse, MarkReadResponse, MessageResponse, SendMessageRequest,
};
use crate::api::schemas::gateway::WsParams;
use crate::domain::matching::MatchId;
use crate::domain::session::Session;
use crate::error::{AppError, Result};
use crate::services::chat_service::LiveConversation;
use axum::{
    Json,
    extract::{
        Path, Query, State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use tracing::Instrument;

pub async fn list_conversations(
    CompleteProfile(session): CompleteProfile,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    let conversations = state.chat_service.list(session.user_id()).await?;
    Ok(Json(conversations.iter().map(ConversationResponse::from).collect::<Vec<_>>()))
}

pub async fn get_conversation(
    CompleteProfile(session): CompleteProfile,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let conversation = state.chat_service.conversation(session.user_id(), &MatchId::from_raw(id)).await?;
    Ok(Json(ConversationResponse::from(&conversation)))
}

pub async fn list_messages(
    CompleteProfile(session): CompleteProfile,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let messages = state.chat_service.messages(session.user_id(), &MatchId::from_raw(id)).await?;
    Ok(Json(messages.into_iter().map(MessageResponse::from).collect::<Vec<_>>()))
}

pub async fn send_message(
    CompleteProfile(session): CompleteProfile,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    let message = state.chat_service.send(session.user_id(), &MatchId::from_raw(id), &payload.text).await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

pub async fn mark_read(
    CompleteProfile(session): CompleteProfile,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let updated = state.chat_service.mark_read(session.user_id(), &MatchId::from_raw(id)).await?;
    Ok(Json(MarkReadResponse { updated }))
}

/// Authenticates a WebSocket handshake from the `token` query parameter.
pub(crate) async fn ws_session(state: &AppState, token: &str) -> Result<Session> {
    let session = state.account_service.authenticate(token).await?;
    if !session.profile_complete {
        return Err(AppError::Forbidden);
    }
    Ok(session)
}

pub async fn live_conversation(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let session = match ws_session(&state, &params.token).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, "Live conversation handshake rejected");
            return e.into_response();
        }
    };

    let id = MatchId::from_raw(id);
    let live = match state.chat_service.live(session.user_id(), &id).await {
        Ok(live) => live,
        Err(e) => return e.into_response(),
    };

    let span = tracing::info_span!("live_conversation", user_id = %session.user_id(), conversation_id = %id);
    ws.on_upgrade(move |socket| stream_conversation(socket, state, session, live).instrument(span))
}

async fn stream_conversation(socket: WebSocket, state: AppState, session: Session, mut live: LiveConversation) {
    tracing::debug!("Live conversation opened");
    let (mut ws_sink, mut ws_stream) = socket.split();
    let connection = state.registry.connect(session.user_id());
    let mut shutdown_rx = state.shutdown_rx.clone();

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => break,
            () = connection.revoked() => break,

            msg = ws_stream.next() => match msg {
                Some(Ok(WsMessage::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },

            update = live.next() => match update {
                Some(Ok(messages)) => {
                    let event = ConversationEvent::Messages {
                        messages: messages.into_iter().map(MessageResponse::from).collect(),
                    };
                    let Ok(text) = serde_json::to_string(&event) else { continue };
                    if ws_sink.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Err(e)) => tracing::warn!(error = %e, "Skipping malformed message snapshot"),
                None => break,
            },
        }
    }

    live.cancel();
    let _ = ws_sink.send(WsMessage::Close(None)).await;
    tracing::debug!("Live conversation closed");
}
