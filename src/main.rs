#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;
use uni_server::adapters::database::{self, DocumentStore, MemoryStore, PostgresStore};
use uni_server::adapters::storage::{MemoryStorage, ObjectStorage, S3Storage};
use uni_server::api::MgmtState;
use uni_server::config::{Config, StorageBackend, StoreBackend};
use uni_server::{AppBuilder, telemetry};

async fn open_store(config: &Config, shutdown_rx: watch::Receiver<bool>) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory document store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new(config.store.change_capacity)))
        }
        StoreBackend::Postgres => {
            let pool = database::postgres::init_pool(&config.store).await?;
            let store = PostgresStore::start(pool, config.store.change_capacity, config.retry.clone(), shutdown_rx).await?;
            Ok(Arc::new(store))
        }
    }
}

async fn open_storage(config: &Config) -> Arc<dyn ObjectStorage> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory photo storage; uploads are lost on restart");
            let base_url = config.storage.public_base_url.clone().unwrap_or_else(|| "memory://photos".to_string());
            Arc::new(MemoryStorage::new(base_url))
        }
        StorageBackend::S3 => {
            let client = S3Storage::client_from_config(&config.storage).await;
            Arc::new(S3Storage::new(client, &config.storage))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    uni_server::setup_panic_hook();

    let boot_span = tracing::info_span!("boot_server");
    let (api_listener, mgmt_listener, app_router, mgmt_app, shutdown_tx, shutdown_rx) = async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        uni_server::spawn_signal_handler(shutdown_tx.clone());

        let store = open_store(&config, shutdown_rx.clone()).await?;
        let storage = open_storage(&config).await;

        let app = AppBuilder::new(config.clone())
            .with_store(store)
            .with_storage(storage)
            .build()?;

        tokio::spawn(
            app.services
                .feed_service
                .clone()
                .run_sweeper(Duration::from_secs(config.feed.sweep_interval_secs.max(1)), shutdown_rx.clone())
                .instrument(tracing::info_span!("feed_session_sweeper")),
        );

        let app_router = uni_server::api::app_router(config.clone(), app.services, shutdown_rx.clone());
        let mgmt_app = uni_server::api::mgmt_router(MgmtState { health_service: app.health_service });

        let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;

        tracing::info!(address = %api_addr, "listening");
        tracing::info!(address = %mgmt_addr, "management server listening");

        let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
        let mgmt_listener = tokio::net::TcpListener::bind(mgmt_addr).await?;

        Ok::<
            (
                tokio::net::TcpListener,
                tokio::net::TcpListener,
                axum::Router,
                axum::Router,
                watch::Sender<bool>,
                watch::Receiver<bool>,
            ),
            anyhow::Error,
        >((api_listener, mgmt_listener, app_router, mgmt_app, shutdown_tx, shutdown_rx))
    }
    .instrument(boot_span)
    .await?;

    let mut api_rx = shutdown_rx.clone();
    let api_server = axum::serve(api_listener, app_router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = api_rx.wait_for(|&s| s).await;
        });

    let mut mgmt_rx = shutdown_rx.clone();
    let mgmt_server = axum::serve(mgmt_listener, mgmt_app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = mgmt_rx.wait_for(|&s| s).await;
        });

    let servers = async { tokio::try_join!(api_server, mgmt_server) };
    tokio::select! {
        result = servers => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Server error");
            }
        }
        () = async {
            let mut rx = shutdown_rx.clone();
            let _ = rx.wait_for(|&s| s).await;
            tokio::time::sleep(Duration::from_secs(config.server.shutdown_timeout_secs)).await;
        } => {
            tracing::warn!("Timeout waiting for connections to drain.");
        }
    }

    let _ = shutdown_tx.send(true);
    telemetry_guard.shutdown();
    Ok(())
}
