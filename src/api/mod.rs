use crate::config::Config;
use crate::services::account_service::AccountService;
use crate::services::chat_service::ChatService;
use crate::services::feed_service::FeedService;
use crate::services::health_service::HealthService;
use crate::services::profile_service::ProfileService;
use crate::services::session_registry::SessionRegistry;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, Request};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod chats;
pub mod feed;
pub mod gateway;
pub mod health;
pub mod middleware;
pub mod profiles;
pub mod schemas;
pub mod session;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub account_service: AccountService,
    pub profile_service: ProfileService,
    pub feed_service: FeedService,
    pub chat_service: ChatService,
    pub registry: SessionRegistry,
    pub shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

#[derive(Debug)]
pub struct ServiceContainer {
    pub account_service: AccountService,
    pub profile_service: ProfileService,
    pub feed_service: FeedService,
    pub chat_service: ChatService,
    pub registry: SessionRegistry,
}

/// Configures and returns the primary application router.
pub fn app_router(config: Config, services: ServiceContainer, shutdown_rx: tokio::sync::watch::Receiver<bool>) -> Router {
    let photo_limit = config.storage.max_photo_bytes;

    let state = AppState {
        config,
        account_service: services.account_service,
        profile_service: services.profile_service,
        feed_service: services.feed_service,
        chat_service: services.chat_service,
        registry: services.registry,
        shutdown_rx,
    };

    let session_routes = Router::new()
        .route("/session", post(session::sign_in).get(session::current).delete(session::sign_out))
        .route("/routes", get(session::route_access))
        .route("/routes/{*path}", get(session::route_access));

    let profile_routes = Router::new()
        .route("/profile", get(profiles::get_profile).put(profiles::save_profile))
        .route("/profile/photos", post(profiles::upload_photo).layer(DefaultBodyLimit::max(photo_limit)))
        .route("/likes", get(profiles::likes));

    let feed_routes = Router::new().route("/feed", get(feed::get_feed)).route("/feed/swipes", post(feed::swipe));

    let chat_routes = Router::new()
        .route("/chats", get(chats::list_conversations))
        .route("/chats/{id}", get(chats::get_conversation))
        .route("/chats/{id}/messages", get(chats::list_messages).post(chats::send_message))
        .route("/chats/{id}/read", post(chats::mark_read))
        .route("/chats/{id}/live", get(chats::live_conversation))
        .route("/gateway", get(gateway::websocket_handler));

    Router::new()
        .nest("/v1", session_routes.merge(profile_routes).merge(feed_routes).merge(chat_routes))
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(REQUEST_ID_HEADER)))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<RequestId>()
                        .and_then(|id| id.header_value().to_str().ok())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                        "user_id" = tracing::field::Empty,
                    )
                })
                .on_response(|response: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                    let status = response.status();
                    span.record("http.response.status_code", status.as_u16());

                    tracing::info!(
                        latency_ms = %latency.as_millis(),
                        status = %status.as_u16(),
                        "request completed"
                    );
                })
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(HeaderName::from_static(REQUEST_ID_HEADER), MakeRequestUuid))
        .with_state(state)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}
