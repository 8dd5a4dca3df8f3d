use crate::adapters::database::records::ProfileRecord;
use crate::adapters::database::{DocumentStore, FieldMutation, Query, SetMode, USERS};
use crate::domain::profile::{FeedPreferences, Profile, ProfileDetails};
use crate::domain::user::UserId;
use crate::error::{AppError, Result};
use serde_json::json;
use std::sync::Arc;

const LIKED_BY: &str = "likedBy";
const MATCHES: &str = "matches";
const DISLIKES: &str = "dislikes";
const VISITED: &str = "visited_profiles";
const PHOTOS: &str = "photos";

/// Typed access to the `users` collection.
#[derive(Clone, Debug)]
pub struct ProfileRepository {
    store: Arc<dyn DocumentStore>,
}

impl ProfileRepository {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// # Errors
    /// Returns `AppError::Store` / `AppError::Database` if the read fails.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub(crate) async fn get(&self, user_id: &UserId) -> Result<Option<Profile>> {
        let snapshot = self.store.get(USERS, user_id.as_str()).await?;
        snapshot.map(Profile::try_from).transpose()
    }

    /// Writes a whole profile document, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error if the document cannot be encoded or written.
    #[tracing::instrument(level = "debug", skip(self, profile), fields(user_id = %profile.id), err)]
    pub(crate) async fn create(&self, profile: &Profile) -> Result<()> {
        let data = serde_json::to_value(ProfileRecord::from(profile))?;
        self.store.set(USERS, profile.id.as_str(), data, SetMode::Overwrite).await
    }

    /// Merges the form fields and the recomputed completeness flag. Relationship
    /// lists are left untouched.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    #[tracing::instrument(level = "debug", skip(self, details), err)]
    pub(crate) async fn save_details(&self, user_id: &UserId, details: &ProfileDetails) -> Result<bool> {
        let complete = details.is_complete();
        let data = json!({
            "uid": user_id.as_str(),
            "name": details.name,
            "age": details.age,
            "university": details.university,
            "gender": details.gender,
            "interestedIn": details.interested_in,
            "bio": details.bio,
            "prompts": details.prompts,
            "photos": details.photos,
            "profileComplete": complete,
        });
        self.store.set(USERS, user_id.as_str(), data, SetMode::Merge).await?;
        Ok(complete)
    }

    /// # Errors
    /// Returns an error if the write fails.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub(crate) async fn append_photo(&self, user_id: &UserId, url: &str) -> Result<()> {
        self.mutate(user_id, vec![FieldMutation::add_to_set(PHOTOS, url)]).await
    }

    /// Marks `candidate` as shown to `user_id`.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` when both ids are the same.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub(crate) async fn add_visited(&self, user_id: &UserId, candidate: &UserId) -> Result<()> {
        ensure_distinct(user_id, candidate)?;
        self.mutate(user_id, vec![FieldMutation::add_to_set(VISITED, candidate.as_str())]).await
    }

    /// # Errors
    /// Returns an error if the write fails.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub(crate) async fn clear_visited(&self, user_id: &UserId) -> Result<()> {
        self.mutate(user_id, vec![FieldMutation::set(VISITED, json!([]))]).await
    }

    /// Records a pending like from `liker` on `candidate`'s profile.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` when both ids are the same.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub(crate) async fn add_liked_by(&self, candidate: &UserId, liker: &UserId) -> Result<()> {
        ensure_distinct(candidate, liker)?;
        self.mutate(candidate, vec![FieldMutation::add_to_set(LIKED_BY, liker.as_str())]).await
    }

    /// # Errors
    /// Returns an error if the write fails.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub(crate) async fn remove_liked_by(&self, user_id: &UserId, liker: &UserId) -> Result<()> {
        self.mutate(user_id, vec![FieldMutation::remove_from_set(LIKED_BY, liker.as_str())]).await
    }

    /// # Errors
    /// Returns `AppError::BadRequest` when both ids are the same.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub(crate) async fn add_dislike(&self, user_id: &UserId, candidate: &UserId) -> Result<()> {
        ensure_distinct(user_id, candidate)?;
        self.mutate(user_id, vec![FieldMutation::add_to_set(DISLIKES, candidate.as_str())]).await
    }

    /// Moves `counterpart` from pending likes into matches on `user_id`'s side.
    /// Safe to repeat.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` when both ids are the same.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub(crate) async fn promote_to_match(&self, user_id: &UserId, counterpart: &UserId) -> Result<()> {
        ensure_distinct(user_id, counterpart)?;
        self.mutate(user_id, Self::promotion(counterpart)).await
    }

    pub(crate) fn promotion(counterpart: &UserId) -> Vec<FieldMutation> {
        vec![
            FieldMutation::add_to_set(MATCHES, counterpart.as_str()),
            FieldMutation::remove_from_set(LIKED_BY, counterpart.as_str()),
        ]
    }

    /// Size of the population `user_id` may be shown.
    ///
    /// # Errors
    /// Returns an error if the count fails.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub(crate) async fn count_eligible(&self, prefs: FeedPreferences, user_id: &UserId) -> Result<u64> {
        self.store.count(USERS, &Self::eligible(prefs, user_id)).await
    }

    /// # Errors
    /// Returns an error if the query fails or a document cannot be decoded.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub(crate) async fn fetch_eligible(
        &self,
        prefs: FeedPreferences,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<Profile>> {
        let snapshots = self.store.query(USERS, &Self::eligible(prefs, user_id).limit(limit)).await?;
        snapshots.into_iter().map(Profile::try_from).collect()
    }

    fn eligible(prefs: FeedPreferences, user_id: &UserId) -> Query {
        Query::new()
            .eq("gender", prefs.gender.as_str())
            .eq("university", prefs.university.code())
            .not_eq("uid", user_id.as_str())
    }

    /// Applies `mutations`; a missing profile is a no-op.
    async fn mutate(&self, user_id: &UserId, mutations: Vec<FieldMutation>) -> Result<()> {
        match self.store.update(USERS, user_id.as_str(), mutations).await {
            Err(AppError::NotFound) => {
                tracing::debug!(user_id = %user_id, "Profile missing, skipping update");
                Ok(())
            }
            other => other,
        }
    }
}

fn ensure_distinct(owner: &UserId, other: &UserId) -> Result<()> {
    if owner == other {
        return Err(AppError::BadRequest("A profile cannot reference itself".into()));
    }
    Ok(())
}
