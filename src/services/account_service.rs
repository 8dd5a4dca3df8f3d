use crate::adapters::database::profile_repo::ProfileRepository;
use crate::config::IdentityConfig;
use crate::domain::identity::{IdTokenClaims, Identity};
use crate::domain::profile::Profile;
use crate::domain::session::{Route, Session, landing_route};
use crate::domain::user::UserId;
use crate::error::Result;
use crate::services::feed_service::FeedService;
use crate::services::session_registry::SessionRegistry;
use opentelemetry::{KeyValue, global, metrics::Counter};

#[derive(Clone, Debug)]
struct Metrics {
    sign_ins_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("uni-server");
        Self {
            sign_ins_total: meter
                .u64_counter("uni_sign_ins_total")
                .with_description("Total successful sign-ins, by whether a profile was created")
                .build(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignIn {
    pub session: Session,
    pub created: bool,
    pub landing: Route,
}

#[derive(Clone, Debug)]
pub struct AccountService {
    profiles: ProfileRepository,
    feed: FeedService,
    registry: SessionRegistry,
    config: IdentityConfig,
    metrics: Metrics,
}

impl AccountService {
    #[must_use]
    pub fn new(
        profiles: ProfileRepository,
        feed: FeedService,
        registry: SessionRegistry,
        config: IdentityConfig,
    ) -> Self {
        Self { profiles, feed, registry, config, metrics: Metrics::new() }
    }

    /// Verifies an identity provider token.
    ///
    /// # Errors
    /// Returns `AppError::AuthError` if the token is invalid or expired.
    pub fn verify(&self, token: &str) -> Result<Identity> {
        IdTokenClaims::decode(token, &self.config).map(Identity::from)
    }

    /// Builds the session for a verified identity from the persisted profile.
    ///
    /// # Errors
    /// Returns an error if the profile cannot be read.
    pub async fn session_for(&self, identity: Identity) -> Result<Session> {
        let profile_complete = self.profiles.get(&identity.user_id).await?.is_some_and(|p| p.profile_complete);
        Ok(Session { identity, profile_complete })
    }

    /// Verifies the token and initializes the session from persisted state.
    ///
    /// # Errors
    /// Returns `AppError::AuthError` for invalid tokens.
    pub async fn authenticate(&self, token: &str) -> Result<Session> {
        let identity = self.verify(token)?;
        self.session_for(identity).await
    }

    /// Signs a user in, creating the skeleton profile on first visit.
    ///
    /// # Errors
    /// Returns `AppError::AuthError` for invalid tokens, or a store error.
    #[tracing::instrument(err(level = "warn"), skip(self, token), fields(user_id = tracing::field::Empty))]
    pub async fn sign_in(&self, token: &str) -> Result<SignIn> {
        let identity = self.verify(token)?;
        tracing::Span::current().record("user_id", tracing::field::display(&identity.user_id));

        let (profile_complete, created) = match self.profiles.get(&identity.user_id).await? {
            Some(profile) => (profile.profile_complete, false),
            None => {
                self.profiles.create(&Profile::skeleton(&identity)).await?;
                tracing::info!("Created profile on first sign-in");
                (false, true)
            }
        };

        self.metrics.sign_ins_total.add(1, &[KeyValue::new("created", created)]);
        Ok(SignIn { landing: landing_route(profile_complete), session: Session { identity, profile_complete }, created })
    }

    /// Drops everything the service holds for the user.
    pub fn sign_out(&self, user_id: &UserId) {
        self.feed.invalidate(user_id);
        self.registry.revoke(user_id);
        tracing::info!(user_id = %user_id, "Signed out");
    }
}
