use crate::adapters::database::profile_repo::ProfileRepository;
use crate::adapters::storage::ObjectStorage;
use crate::domain::profile::{Profile, ProfileDetails};
use crate::domain::user::UserId;
use crate::error::{AppError, Result};
use crate::services::feed_service::FeedService;
use bytes::Bytes;
use std::sync::Arc;

const MIN_AGE: u8 = 18;
const MAX_BIO_CHARS: usize = 500;

/// Profiles that liked the user and are still waiting on a decision.
#[derive(Debug, Clone)]
pub struct LikesInbox {
    pub profiles: Vec<Profile>,
    pub like_count: usize,
    pub match_count: usize,
}

#[derive(Clone, Debug)]
pub struct ProfileService {
    profiles: ProfileRepository,
    storage: Arc<dyn ObjectStorage>,
    feed: FeedService,
    max_photo_bytes: usize,
}

impl ProfileService {
    #[must_use]
    pub fn new(
        profiles: ProfileRepository,
        storage: Arc<dyn ObjectStorage>,
        feed: FeedService,
        max_photo_bytes: usize,
    ) -> Self {
        Self { profiles, storage, feed, max_photo_bytes }
    }

    /// # Errors
    /// Returns `AppError::NotFound` if the user has no profile.
    pub async fn get(&self, user_id: &UserId) -> Result<Profile> {
        self.profiles.get(user_id).await?.ok_or(AppError::NotFound)
    }

    /// Saves the profile form and recomputes completeness.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` for invalid form values.
    #[tracing::instrument(err(level = "warn"), skip(self, details), fields(user_id = %user_id))]
    pub async fn save(&self, user_id: &UserId, details: ProfileDetails) -> Result<Profile> {
        let details = Self::validate(details)?;
        self.get(user_id).await?;

        let complete = self.profiles.save_details(user_id, &details).await?;
        tracing::debug!(complete, "Profile saved");

        // Preferences may have changed; the next feed read selects afresh.
        self.feed.reselect(user_id).await;
        self.get(user_id).await
    }

    /// Stores a photo under the user's prefix and appends its URL to the profile.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` for empty, oversized or non-image uploads.
    #[tracing::instrument(err(level = "warn"), skip(self, body), fields(user_id = %user_id, size = body.len()))]
    pub async fn upload_photo(
        &self,
        user_id: &UserId,
        file_name: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<String> {
        if !content_type.starts_with("image/") {
            return Err(AppError::BadRequest("Only image uploads are accepted".into()));
        }
        if body.is_empty() {
            return Err(AppError::BadRequest("Photo is empty".into()));
        }
        if body.len() > self.max_photo_bytes {
            return Err(AppError::BadRequest(format!("Photo exceeds {} bytes", self.max_photo_bytes)));
        }
        let file_name = sanitize_file_name(file_name)?;
        let profile = self.get(user_id).await?;

        let key = format!("users/{user_id}/{file_name}");
        self.storage.put(&key, body, content_type).await?;
        let url = self.storage.public_url(&key);

        self.profiles.append_photo(user_id, &url).await?;

        let mut details = profile.details;
        if !details.photos.contains(&url) {
            details.photos.push(url.clone());
        }
        if details.is_complete() != profile.profile_complete {
            self.profiles.save_details(user_id, &details).await?;
        }

        tracing::info!(key = %key, "Photo uploaded");
        Ok(url)
    }

    /// Profiles listed in the user's pending likes, in the order they arrived.
    ///
    /// # Errors
    /// Returns an error if a profile cannot be read.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(user_id = %user_id))]
    pub async fn likes_inbox(&self, user_id: &UserId) -> Result<LikesInbox> {
        let me = self.get(user_id).await?;

        let mut profiles = Vec::with_capacity(me.relationships.liked_by.len());
        for liker in &me.relationships.liked_by {
            match self.profiles.get(liker).await? {
                Some(profile) => profiles.push(profile),
                None => tracing::debug!(liker = %liker, "Skipping like from deleted profile"),
            }
        }

        Ok(LikesInbox {
            profiles,
            like_count: me.relationships.liked_by.len(),
            match_count: me.relationships.matches.len(),
        })
    }

    fn validate(mut details: ProfileDetails) -> Result<ProfileDetails> {
        details.name = details.name.trim().to_string();
        details.bio = details.bio.trim().to_string();

        if details.age.is_some_and(|age| age < MIN_AGE) {
            return Err(AppError::BadRequest(format!("You must be at least {MIN_AGE}")));
        }
        if details.bio.chars().count() > MAX_BIO_CHARS {
            return Err(AppError::BadRequest(format!("Bio exceeds {MAX_BIO_CHARS} characters")));
        }
        details.prompts.retain(|p| !p.label.trim().is_empty());
        Ok(details)
    }
}

fn sanitize_file_name(file_name: &str) -> Result<String> {
    let name = file_name.trim();
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(AppError::BadRequest("Invalid file name".into()));
    }
    Ok(name.to_string())
}
