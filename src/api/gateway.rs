use crate::api::AppState;
use crate::api::chats::ws_session;
use crate::api::schemas::chat::ConversationResponse;
use crate::api::schemas::gateway::{GatewayEvent, WsParams};
use crate::domain::session::Session;
use crate::services::unread::{UnreadProjection, UnreadState};
use axum::{
    extract::{
        Query, State,
        ws::{CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade, close_code},
    },
    response::{IntoResponse, Response},
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use opentelemetry::global;
use tracing::Instrument;
use uuid::Uuid;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    let session = match ws_session(&state, &params.token).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket handshake failed");
            return e.into_response();
        }
    };

    let projection = match state.chat_service.unread(session.user_id()).await {
        Ok(projection) => projection,
        Err(e) => return e.into_response(),
    };

    let span = tracing::info_span!(
        "websocket_session",
        user_id = %session.user_id(),
        otel.kind = "server",
        ws.session_id = %Uuid::new_v4()
    );
    ws.on_upgrade(move |socket| handle_socket(socket, state, session, projection).instrument(span))
}

type Sink = SplitSink<WebSocket, WsMessage>;

async fn send_event(sink: &mut Sink, event: &GatewayEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(text) => sink.send(WsMessage::Text(text.into())).await.is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode gateway event");
            true
        }
    }
}

/// Pushes the match list (when it changed) and the unread counts.
async fn publish(
    sink: &mut Sink,
    state: &AppState,
    session: &Session,
    current: &UnreadState,
    previous: Option<&UnreadState>,
) -> bool {
    if previous.is_none_or(|p| p.matches != current.matches) {
        match state.chat_service.conversations(session.user_id(), &current.matches).await {
            Ok(conversations) => {
                let event = GatewayEvent::Matches {
                    conversations: conversations.iter().map(ConversationResponse::from).collect(),
                };
                if !send_event(sink, &event).await {
                    return false;
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to resolve conversations"),
        }
    }

    if previous.is_none_or(|p| p.counts != current.counts) {
        let event = GatewayEvent::Unread {
            counts: current.counts.iter().map(|(id, n)| (id.to_string(), *n)).collect(),
            total: current.total(),
        };
        return send_event(sink, &event).await;
    }
    true
}

async fn handle_socket(socket: WebSocket, state: AppState, session: Session, mut projection: UnreadProjection) {
    let meter = global::meter("uni-server");
    let active_connections = meter
        .i64_up_down_counter("uni_websocket_active_connections")
        .with_description("Number of active WebSocket connections")
        .build();
    active_connections.add(1, &[]);
    tracing::info!("WebSocket connected");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let connection = state.registry.connect(session.user_id());
    let mut shutdown_rx = state.shutdown_rx.clone();

    let mut last = projection.current();
    if !publish(&mut ws_sink, &state, &session, &last, None).await {
        active_connections.add(-1, &[]);
        return;
    }

    loop {
        if *shutdown_rx.borrow() {
            tracing::info!("Shutdown signal received, closing WebSocket");
            let _ = ws_sink
                .send(WsMessage::Close(Some(CloseFrame { code: close_code::AWAY, reason: "Server shutting down".into() })))
                .await;
            break;
        }

        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {}

            () = connection.revoked() => {
                let _ = ws_sink
                    .send(WsMessage::Close(Some(CloseFrame { code: close_code::NORMAL, reason: "Signed out".into() })))
                    .await;
                break;
            }

            msg = ws_stream.next() => match msg {
                Some(Ok(WsMessage::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },

            next = projection.next() => {
                let Some(state_now) = next else { break };
                if !publish(&mut ws_sink, &state, &session, &state_now, Some(&last)).await {
                    break;
                }
                last = state_now;
            }
        }
    }

    drop(projection);
    active_connections.add(-1, &[]);
    tracing::info!("WebSocket disconnected");
}
