use crate::adapters::database::match_repo::MatchRepository;
use crate::adapters::database::profile_repo::ProfileRepository;
use crate::config::RetryConfig;
use crate::domain::feed::{
    Advance, FeedQueue, FeedSettings, LikeCounter, SwipeDirection, SwipeOutcome, catalog_exhausted, like_quota,
    rank_candidates,
};
use crate::domain::matching::MatchId;
use crate::domain::profile::Profile;
use crate::domain::user::UserId;
use crate::error::{AppError, Result};
use backon::{ExponentialBuilder, Retryable};
use dashmap::DashMap;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::{Date, OffsetDateTime};
use tokio::sync::{Mutex, OwnedMutexGuard, watch};

#[derive(Clone, Debug)]
struct Metrics {
    swipes_total: Counter<u64>,
    matches_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("uni-server");
        Self {
            swipes_total: meter
                .u64_counter("uni_swipes_total")
                .with_description("Total swipe decisions by direction and outcome")
                .build(),
            matches_total: meter.u64_counter("uni_matches_total").with_description("Total matches created").build(),
        }
    }
}

/// Per-user working state of the feed.
#[derive(Debug)]
struct FeedSession {
    queue: FeedQueue,
    likes: LikeCounter,
    quota: u32,
    total_eligible: u64,
    catalog_exhausted: bool,
    loaded: bool,
    last_active: Instant,
}

impl FeedSession {
    fn new(today: Date) -> Self {
        Self {
            queue: FeedQueue::default(),
            likes: LikeCounter::new(today),
            quota: 0,
            total_eligible: 0,
            catalog_exhausted: false,
            loaded: false,
            last_active: Instant::now(),
        }
    }

    /// Whether dropping it loses nothing but the cached queue.
    fn evictable(&mut self, today: Date, max_idle: Duration) -> bool {
        self.last_active.elapsed() >= max_idle && self.likes.used(today) == 0
    }
}

/// What the client renders after every feed operation.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub visible: Vec<Profile>,
    pub backlog: usize,
    pub likes_used: u32,
    pub like_quota: u32,
    pub total_eligible: u64,
    pub catalog_exhausted: bool,
    pub likes_received: usize,
    pub match_count: usize,
}

#[derive(Debug, Clone)]
pub struct SwipeResult {
    pub outcome: SwipeOutcome,
    pub feed: FeedSnapshot,
}

#[derive(Clone, Debug)]
pub struct FeedService {
    profiles: ProfileRepository,
    matches: MatchRepository,
    settings: FeedSettings,
    retry: RetryConfig,
    sessions: Arc<DashMap<UserId, Arc<Mutex<FeedSession>>>>,
    metrics: Metrics,
}

impl FeedService {
    #[must_use]
    pub fn new(
        profiles: ProfileRepository,
        matches: MatchRepository,
        settings: FeedSettings,
        retry: RetryConfig,
    ) -> Self {
        Self { profiles, matches, settings, retry, sessions: Arc::new(DashMap::new()), metrics: Metrics::new() }
    }

    async fn session(&self, user_id: &UserId) -> OwnedMutexGuard<FeedSession> {
        let session = {
            let entry = self
                .sessions
                .entry(user_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(FeedSession::new(today()))));
            Arc::clone(entry.value())
        };
        let mut session = session.lock_owned().await;
        session.last_active = Instant::now();
        session
    }

    /// Drops the user's queue and like counter.
    pub fn invalidate(&self, user_id: &UserId) {
        if self.sessions.remove(user_id).is_some() {
            tracing::debug!(user_id = %user_id, "Feed session dropped");
        }
    }

    /// Reruns selection on the next read. Likes counted today are kept.
    pub async fn reselect(&self, user_id: &UserId) {
        let session = self.sessions.get(user_id).map(|entry| Arc::clone(entry.value()));
        if let Some(session) = session {
            session.lock().await.loaded = false;
            tracing::debug!(user_id = %user_id, "Feed marked for reselection");
        }
    }

    /// Drops sessions idle for at least `max_idle` that hold no likes for today.
    /// Returns how many were dropped.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let today = today();
        let mut evicted = 0;
        self.sessions.retain(|_, session| {
            // A session borrowed by an in-flight request has other owners.
            let keep = Arc::get_mut(session).is_none_or(|s| !s.get_mut().evictable(today, max_idle));
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    /// Periodically evicts idle sessions until shutdown.
    pub async fn run_sweeper(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.evict_idle(self.settings.session_idle);
                    if evicted > 0 {
                        tracing::debug!(evicted, remaining = self.sessions.len(), "Idle feed sessions evicted");
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Feed session sweeper shutting down...");
    }

    /// Runs candidate selection from a fresh read of the user's profile.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read or written.
    #[tracing::instrument(err(level = "warn"), skip(self, user_id), fields(user_id = %user_id))]
    pub async fn load(&self, user_id: &UserId) -> Result<FeedSnapshot> {
        let mut session = self.session(user_id).await;
        let me = self.select(user_id, &mut session).await?;
        Ok(Self::snapshot(&mut session, me.as_ref()))
    }

    /// Current feed, selecting candidates first if none have been loaded yet.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read or written.
    #[tracing::instrument(err(level = "warn"), skip(self, user_id), fields(user_id = %user_id))]
    pub async fn current(&self, user_id: &UserId) -> Result<FeedSnapshot> {
        let mut session = self.session(user_id).await;
        let me = if session.loaded { self.profiles.get(user_id).await? } else { self.select(user_id, &mut session).await? };
        Ok(Self::snapshot(&mut session, me.as_ref()))
    }

    /// Applies one swipe decision. Decisions of one user are processed strictly in order.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the candidate is not on screen and
    /// `AppError::QuotaExceeded` once the daily like quota is spent.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, user_id, candidate_id, direction),
        fields(
            user_id = %user_id,
            candidate_id = %candidate_id,
            direction = direction.as_str(),
            outcome = tracing::field::Empty
        )
    )]
    pub async fn swipe(
        &self,
        user_id: &UserId,
        direction: SwipeDirection,
        candidate_id: &UserId,
    ) -> Result<SwipeResult> {
        if user_id == candidate_id {
            return Err(AppError::BadRequest("You cannot swipe on yourself".into()));
        }

        let mut session = self.session(user_id).await;
        if !session.loaded {
            self.select(user_id, &mut session).await?;
        }
        if session.queue.find_visible(candidate_id).is_none() {
            return Err(AppError::NotFound);
        }

        self.profiles.add_visited(user_id, candidate_id).await?;

        let outcome = match direction {
            SwipeDirection::Like => self.like(user_id, candidate_id, &mut session).await?,
            SwipeDirection::Dislike => self.dislike(user_id, candidate_id).await?,
        };
        tracing::Span::current().record("outcome", outcome.label());
        self.metrics.swipes_total.add(
            1,
            &[KeyValue::new("direction", direction.as_str()), KeyValue::new("outcome", outcome.label())],
        );

        let me = match session.queue.take(candidate_id, self.settings.rotation_threshold) {
            Advance::NeedsRotation => {
                tracing::debug!("Window running dry, rotating catalog");
                self.select(user_id, &mut session).await?
            }
            Advance::Promoted | Advance::Idle => self.profiles.get(user_id).await?,
        };

        Ok(SwipeResult { outcome, feed: Self::snapshot(&mut session, me.as_ref()) })
    }

    async fn like(&self, user_id: &UserId, candidate_id: &UserId, session: &mut FeedSession) -> Result<SwipeOutcome> {
        let today = today();
        let used = session.likes.used(today);
        if used >= session.quota {
            return Err(AppError::QuotaExceeded { used, quota: session.quota });
        }

        self.profiles.add_liked_by(candidate_id, user_id).await?;
        session.likes.record(today);

        let reciprocated = self.profiles.get(user_id).await?.is_some_and(|me| me.relationships.is_liked_by(candidate_id));
        if reciprocated { self.create_match(user_id, candidate_id).await } else { Ok(SwipeOutcome::Liked) }
    }

    async fn dislike(&self, user_id: &UserId, candidate_id: &UserId) -> Result<SwipeOutcome> {
        self.profiles.add_dislike(user_id, candidate_id).await?;

        let missed = self.profiles.get(user_id).await?.is_some_and(|me| me.relationships.is_liked_by(candidate_id));
        if missed {
            self.profiles.remove_liked_by(user_id, candidate_id).await?;
            return Ok(SwipeOutcome::MissedMatch);
        }
        Ok(SwipeOutcome::Disliked)
    }

    /// Promotes a mutual like into a match, retrying transient store failures.
    async fn create_match(&self, user_id: &UserId, candidate_id: &UserId) -> Result<SwipeOutcome> {
        let retry_strategy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.retry.min_delay_ms))
            .with_max_times(self.retry.max_attempts.saturating_sub(1));

        let result = (|| async { self.matches.create_with_promotion(user_id, candidate_id).await })
            .retry(&retry_strategy)
            .when(AppError::is_transient)
            .notify(|e, duration| {
                tracing::warn!(error = %e, "Match commit failed, retrying in {:?}", duration);
            })
            .await;

        match result {
            Ok(conversation_id) => {
                self.metrics.matches_total.add(1, &[]);
                tracing::info!(conversation_id = %conversation_id, "Match created");
                Ok(SwipeOutcome::Matched { conversation_id })
            }
            Err(AppError::Conflict(reason)) => {
                let conversation_id = MatchId::for_pair(user_id, candidate_id);
                if self.matches.get(&conversation_id).await?.is_none() {
                    tracing::debug!(reason = %reason, "Pending like vanished before the match commit");
                    return Ok(SwipeOutcome::Liked);
                }
                // The other side committed first; make sure both profiles reflect it.
                self.profiles.promote_to_match(user_id, candidate_id).await?;
                self.profiles.promote_to_match(candidate_id, user_id).await?;
                Ok(SwipeOutcome::Matched { conversation_id })
            }
            Err(e) => Err(e),
        }
    }

    /// Steps 1 to 7 of candidate selection. Returns the profile it read.
    async fn select(&self, user_id: &UserId, session: &mut FeedSession) -> Result<Option<Profile>> {
        session.loaded = true;

        let Some(mut me) = self.profiles.get(user_id).await? else {
            tracing::debug!("No profile yet, feed is empty");
            Self::reset(session);
            return Ok(None);
        };
        let Some(prefs) = me.feed_preferences() else {
            tracing::debug!("Profile lacks university or preference, feed is empty");
            Self::reset(session);
            return Ok(Some(me));
        };

        let total = self.profiles.count_eligible(prefs, user_id).await?;
        session.total_eligible = total;
        session.quota = like_quota(total, self.settings.quota_ratio);
        session.catalog_exhausted = catalog_exhausted(me.relationships.visited.len(), total);

        if session.catalog_exhausted && !me.relationships.visited.is_empty() {
            tracing::info!(visited = me.relationships.visited.len(), total, "Catalog exhausted, clearing visited");
            self.profiles.clear_visited(user_id).await?;
            me.relationships.visited.clear();
        }

        let fetched = self.profiles.fetch_eligible(prefs, user_id, self.settings.page_size).await?;
        let ranked = rank_candidates(fetched, user_id, &me.relationships);
        session.queue = FeedQueue::from_ranked(ranked, self.settings.visible_window);

        tracing::debug!(visible = session.queue.visible().len(), backlog = session.queue.backlog_len(), "Feed selected");
        Ok(Some(me))
    }

    fn reset(session: &mut FeedSession) {
        session.queue = FeedQueue::default();
        session.total_eligible = 0;
        session.quota = 0;
        session.catalog_exhausted = false;
    }

    fn snapshot(session: &mut FeedSession, me: Option<&Profile>) -> FeedSnapshot {
        FeedSnapshot {
            visible: session.queue.visible().to_vec(),
            backlog: session.queue.backlog_len(),
            likes_used: session.likes.used(today()),
            like_quota: session.quota,
            total_eligible: session.total_eligible,
            catalog_exhausted: session.catalog_exhausted,
            likes_received: me.map_or(0, |p| p.relationships.liked_by.len()),
            match_count: me.map_or(0, |p| p.relationships.matches.len()),
        }
    }
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::{DocumentStore, MemoryStore};

    fn service() -> FeedService {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::default());
        FeedService::new(
            ProfileRepository::new(Arc::clone(&store)),
            MatchRepository::new(store),
            FeedSettings::default(),
            RetryConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_idle_sessions_without_likes_are_evicted() {
        let feed = service();
        let (idle, liker) = (UserId::new("idle"), UserId::new("liker"));
        feed.load(&idle).await.unwrap();
        feed.load(&liker).await.unwrap();
        feed.session(&liker).await.likes.record(today());

        assert_eq!(feed.evict_idle(Duration::from_secs(3600)), 0);
        assert_eq!(feed.evict_idle(Duration::ZERO), 1);
        assert!(!feed.sessions.contains_key(&idle));
        assert!(feed.sessions.contains_key(&liker));
    }

    #[tokio::test]
    async fn test_session_in_use_is_not_evicted() {
        let feed = service();
        let user = UserId::new("busy");
        let guard = feed.session(&user).await;

        assert_eq!(feed.evict_idle(Duration::ZERO), 0);
        drop(guard);
        assert_eq!(feed.evict_idle(Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn test_reselect_keeps_todays_likes() {
        let feed = service();
        let user = UserId::new("u");
        feed.load(&user).await.unwrap();
        feed.session(&user).await.likes.record(today());

        feed.reselect(&user).await;
        let mut session = feed.session(&user).await;
        assert!(!session.loaded);
        assert_eq!(session.likes.used(today()), 1);
    }
}
