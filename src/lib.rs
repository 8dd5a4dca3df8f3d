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

use crate::adapters::database::DocumentStore;
use crate::adapters::database::match_repo::MatchRepository;
use crate::adapters::database::message_repo::MessageRepository;
use crate::adapters::database::profile_repo::ProfileRepository;
use crate::adapters::storage::ObjectStorage;
use crate::api::ServiceContainer;
use crate::config::Config;
use crate::domain::feed::FeedSettings;
use crate::services::account_service::AccountService;
use crate::services::chat_service::ChatService;
use crate::services::feed_service::FeedService;
use crate::services::health_service::HealthService;
use crate::services::profile_service::ProfileService;
use crate::services::session_registry::SessionRegistry;
use std::sync::Arc;
use tokio::sync::watch;

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;

/// Everything the two routers need, wired from one configuration.
#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
}

#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    store: Option<Arc<dyn DocumentStore>>,
    storage: Option<Arc<dyn ObjectStorage>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, store: None, storage: None }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn ObjectStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Wires repositories and services together.
    ///
    /// # Errors
    /// Returns an error if the store or storage was not provided.
    pub fn build(self) -> anyhow::Result<App> {
        let store = self.store.ok_or_else(|| anyhow::anyhow!("Document store is required"))?;
        let storage = self.storage.ok_or_else(|| anyhow::anyhow!("Object storage is required"))?;

        let profiles = ProfileRepository::new(Arc::clone(&store));
        let matches = MatchRepository::new(Arc::clone(&store));
        let messages = MessageRepository::new(Arc::clone(&store));

        let registry = SessionRegistry::new();
        let feed_service = FeedService::new(
            profiles.clone(),
            matches.clone(),
            FeedSettings::from(&self.config.feed),
            self.config.retry.clone(),
        );
        let account_service = AccountService::new(
            profiles.clone(),
            feed_service.clone(),
            registry.clone(),
            self.config.identity.clone(),
        );
        let profile_service = ProfileService::new(
            profiles.clone(),
            Arc::clone(&storage),
            feed_service.clone(),
            self.config.storage.max_photo_bytes,
        );
        let chat_service = ChatService::new(matches, messages, profiles, self.config.chat.clone());
        let health_service = HealthService::new(store, storage, self.config.health.clone());

        Ok(App {
            services: ServiceContainer { account_service, profile_service, feed_service, chat_service, registry },
            health_service,
        })
    }
}

/// Routes panics through tracing so they reach the structured log.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map(ToString::to_string).unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_default();
        tracing::error!(panic.location = %location, panic.payload = %payload, "Thread panicked");
    }));
}

/// Flips the shutdown flag on Ctrl-C or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}
