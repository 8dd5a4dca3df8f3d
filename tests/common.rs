#![allow(dead_code)]
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message};
use uni_server::AppBuilder;
use uni_server::adapters::database::{DocumentStore, MemoryStore, PostgresStore, postgres};
use uni_server::adapters::storage::MemoryStorage;
use uni_server::api::MgmtState;
use uni_server::config::Config;
use uni_server::domain::identity::IdTokenClaims;

static INIT: Once = Once::new();

pub const TEST_SECRET: &str = "test_identity_secret";

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("uni_server=debug".parse().unwrap())
            .add_directive("sqlx=warn".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap())
            .add_directive("tungstenite=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

pub fn get_test_config() -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.mgmt_port = 0;
    config.identity.token_secret = TEST_SECRET.to_string();
    config.retry.min_delay_ms = 1;
    config
}

/// Postgres-backed document store; the change relay runs until this is dropped.
pub struct PgTestStore {
    pub store: Arc<PostgresStore>,
    _shutdown_tx: watch::Sender<bool>,
}

/// Connects to `DATABASE_URL` and runs migrations. `None` when no database is configured.
pub async fn get_test_store() -> Option<PgTestStore> {
    setup_tracing();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        tracing::warn!("DATABASE_URL is not set, skipping Postgres store test");
        return None;
    };

    let mut config = get_test_config();
    config.store.url = Some(database_url);
    config.store.max_connections = 30;

    let pool = postgres::init_pool(&config.store).await.expect("Failed to connect to DB. Is Postgres running?");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let store = PostgresStore::start(pool, config.store.change_capacity, config.retry.clone(), shutdown_rx)
        .await
        .expect("Failed to start Postgres store");

    Some(PgTestStore { store: Arc::new(store), _shutdown_tx: shutdown_tx })
}

/// Collection name no other test run shares.
pub fn unique_collection(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}

/// Mints an identity token the way the provider would.
pub fn mint_token(uid: &str, name: &str) -> String {
    let mut claims = IdTokenClaims::new(uid, 3600);
    claims.name = Some(name.to_string());
    claims.email = Some(format!("{uid}@campus.example"));
    claims.encode(TEST_SECRET).unwrap()
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub uid: String,
    pub token: String,
}

pub struct TestApp {
    pub server_url: String,
    pub mgmt_url: String,
    pub ws_url: String,
    pub client: reqwest::Client,
    pub config: Config,
    pub store: Arc<MemoryStore>,
    pub storage: Arc<MemoryStorage>,
    pub shutdown_tx: watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        setup_tracing();

        let store = Arc::new(MemoryStore::new(config.store.change_capacity));
        let storage = Arc::new(MemoryStorage::new("https://cdn.campus.example"));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let app = AppBuilder::new(config.clone())
            .with_store(store.clone())
            .with_storage(storage.clone())
            .build()
            .unwrap();

        let app_router = uni_server::api::app_router(config.clone(), app.services, shutdown_rx.clone());
        let mgmt_router = uni_server::api::mgmt_router(MgmtState { health_service: app.health_service });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mgmt_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_addr = mgmt_listener.local_addr().unwrap();

        let mut api_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(listener, app_router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = api_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });
        let mut mgmt_rx = shutdown_rx;
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_router)
                .with_graceful_shutdown(async move {
                    let _ = mgmt_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        Self {
            server_url: format!("http://{addr}"),
            mgmt_url: format!("http://{mgmt_addr}"),
            ws_url: format!("ws://{addr}"),
            client: reqwest::Client::new(),
            config,
            store,
            storage,
            shutdown_tx,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.server_url)
    }

    pub async fn sign_in(&self, uid: &str, name: &str) -> TestUser {
        let token = mint_token(uid, name);
        let resp = self.client.post(self.url("/session")).json(&json!({ "idToken": token })).send().await.unwrap();
        assert!(resp.status().is_success(), "sign-in failed: {}", resp.status());
        TestUser { uid: uid.to_string(), token }
    }

    /// Signs in and fills the profile form so the user enters the feed.
    pub async fn complete_user(&self, uid: &str, name: &str, gender: &str, interested_in: &str) -> TestUser {
        let user = self.sign_in(uid, name).await;
        self.save_profile(&user, name, gender, interested_in).await;
        user
    }

    /// Submits a complete profile form for an already signed-in user.
    pub async fn save_profile(&self, user: &TestUser, name: &str, gender: &str, interested_in: &str) -> Value {
        let form = json!({
            "name": name,
            "age": 21,
            "university": "bitjpr",
            "gender": gender,
            "interestedIn": interested_in,
            "bio": format!("Hi, I am {name}"),
            "prompts": [{ "label": "Fun Fact", "answer": "I juggle" }],
            "photos": [format!("https://cdn.campus.example/users/{}/1.jpg", user.uid)],
        });
        let resp = self.client.put(self.url("/profile")).bearer_auth(&user.token).json(&form).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["profileComplete"], true);
        body
    }

    pub async fn get_json(&self, user: &TestUser, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).bearer_auth(&user.token).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    pub async fn post_json(&self, user: &TestUser, path: &str, body: Value) -> (u16, Value) {
        let resp = self.client.post(self.url(path)).bearer_auth(&user.token).json(&body).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    pub async fn feed(&self, user: &TestUser) -> Value {
        let (status, body) = self.get_json(user, "/feed").await;
        assert_eq!(status, 200, "feed failed: {body}");
        body
    }

    pub async fn swipe(&self, user: &TestUser, direction: &str, candidate: &str) -> (u16, Value) {
        self.post_json(user, "/feed/swipes", json!({ "direction": direction, "candidateId": candidate })).await
    }

    pub async fn connect_ws(&self, path: &str, token: &str) -> TestWsClient {
        let url = format!("{}/v1{path}?token={token}", self.ws_url);
        let (stream, _) = connect_async(url).await.expect("Failed to connect WebSocket");
        TestWsClient { stream }
    }

    /// Raw `users` document as persisted.
    pub async fn user_doc(&self, uid: &str) -> Value {
        self.store.get("users", uid).await.unwrap().expect("profile document missing").data
    }

    pub async fn match_doc(&self, id: &str) -> Option<Value> {
        self.store.get("matches", id).await.unwrap().map(|s| s.data)
    }

    /// Both users like each other; returns the conversation id.
    pub async fn make_match(&self, a: &TestUser, b: &TestUser) -> String {
        let (status, _) = self.swipe(b, "like", &a.uid).await;
        assert_eq!(status, 200);
        let (status, body) = self.swipe(a, "like", &b.uid).await;
        assert_eq!(status, 200);
        assert_eq!(body["outcome"], "matched");
        body["conversationId"].as_str().unwrap().to_string()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

pub fn list_contains(doc: &Value, field: &str, id: &str) -> bool {
    doc[field].as_array().is_some_and(|items| items.iter().any(|v| v == id))
}

pub fn candidate_ids(feed: &Value) -> Vec<String> {
    feed["candidates"].as_array().unwrap().iter().map(|c| c["uid"].as_str().unwrap().to_string()).collect()
}

pub struct TestWsClient {
    pub stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestWsClient {
    /// Next JSON text frame, or `None` on close or timeout.
    pub async fn receive_json_timeout(&mut self, timeout: Duration) -> Option<Value> {
        loop {
            match tokio::time::timeout(timeout, self.stream.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => return serde_json::from_str(&text).ok(),
                Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {}
                _ => return None,
            }
        }
    }

    /// Reads frames until one satisfies `predicate`.
    pub async fn wait_for(&mut self, predicate: impl Fn(&Value) -> bool) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline {
            let frame = self.receive_json_timeout(Duration::from_secs(5)).await?;
            if predicate(&frame) {
                return Some(frame);
            }
        }
        None
    }

    /// Whether the server closes the socket within `timeout`.
    pub async fn closed_within(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, self.stream.next()).await {
                Ok(Some(Ok(Message::Close(_))) | None | Some(Err(_))) => return true,
                Ok(Some(Ok(_))) => {}
                Err(_) => return false,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.stream.send(Message::Close(None)).await;
    }
}
