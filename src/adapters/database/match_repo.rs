use crate::adapters::database::profile_repo::ProfileRepository;
use crate::adapters::database::{
    DocumentStore, MATCHES, Query, SetMode, Snapshot, Subscription, USERS, WriteBatch, server_timestamp,
};
use crate::domain::matching::{Match, MatchId};
use crate::domain::user::UserId;
use crate::error::Result;
use serde_json::json;
use std::sync::Arc;

/// Typed access to the `matches` collection.
#[derive(Clone, Debug)]
pub struct MatchRepository {
    store: Arc<dyn DocumentStore>,
}

impl MatchRepository {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// # Errors
    /// Returns an error if the read fails or the document is malformed.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub(crate) async fn get(&self, id: &MatchId) -> Result<Option<Match>> {
        self.store.get(MATCHES, id.as_str()).await?.map(Match::try_from).transpose()
    }

    /// # Errors
    /// Returns an error if the query fails.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub(crate) async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Match>> {
        let snapshots = self.store.query(MATCHES, &Self::involving(user_id)).await?;
        Self::decode(snapshots)
    }

    /// Live match list of `user_id`.
    ///
    /// # Errors
    /// Returns an error if the subscription cannot be opened.
    pub(crate) async fn subscribe_for_user(&self, user_id: &UserId, capacity: usize) -> Result<Subscription> {
        self.store.subscribe(MATCHES, Self::involving(user_id), capacity).await
    }

    pub(crate) fn decode(snapshots: Vec<Snapshot>) -> Result<Vec<Match>> {
        snapshots.into_iter().map(Match::try_from).collect()
    }

    /// Creates the match between `acting` and `candidate` and promotes the
    /// pending likes on both sides in one atomic commit.
    ///
    /// Fails with `AppError::Conflict` if the match already exists or
    /// `candidate` no longer has a pending like on `acting`.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` when a precondition does not hold.
    #[tracing::instrument(level = "debug", skip(self), err(level = "debug"))]
    pub(crate) async fn create_with_promotion(&self, acting: &UserId, candidate: &UserId) -> Result<MatchId> {
        let id = MatchId::for_pair(acting, candidate);
        let record = json!({
            "users": [acting.as_str(), candidate.as_str()],
            "chatSlug": id.as_str(),
            "createdAt": server_timestamp(),
        });

        let batch = WriteBatch::new()
            .require_missing(MATCHES, id.as_str())
            .require_array_contains(USERS, acting.as_str(), "likedBy", candidate.as_str())
            .set(MATCHES, id.as_str(), record, SetMode::Overwrite)
            .update(USERS, acting.as_str(), ProfileRepository::promotion(candidate))
            .update(USERS, candidate.as_str(), ProfileRepository::promotion(acting));

        self.store.commit(batch).await?;
        Ok(id)
    }

    fn involving(user_id: &UserId) -> Query {
        Query::new().array_contains("users", user_id.as_str())
    }
}
