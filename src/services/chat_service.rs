use crate::adapters::database::Subscription;
use crate::adapters::database::match_repo::MatchRepository;
use crate::adapters::database::message_repo::MessageRepository;
use crate::adapters::database::profile_repo::ProfileRepository;
use crate::config::ChatConfig;
use crate::domain::matching::{Match, MatchId};
use crate::domain::message::{Message, NewMessage};
use crate::domain::profile::Profile;
use crate::domain::user::UserId;
use crate::error::{AppError, Result};
use crate::services::unread::UnreadProjection;
use opentelemetry::{KeyValue, global, metrics::Counter};

#[derive(Clone, Debug)]
struct Metrics {
    sent_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("uni-server");
        Self {
            sent_total: meter
                .u64_counter("uni_messages_sent_total")
                .with_description("Total chat messages sent")
                .build(),
        }
    }
}

/// A conversation as listed for one participant.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: MatchId,
    pub counterpart: Profile,
}

/// Message stream of one conversation; ends when the subscription is cancelled.
#[derive(Debug)]
pub struct LiveConversation {
    id: MatchId,
    subscription: Subscription,
}

impl LiveConversation {
    pub async fn next(&mut self) -> Option<Result<Vec<Message>>> {
        let snapshot = self.subscription.next().await?;
        Some(MessageRepository::decode(&self.id, snapshot))
    }

    pub fn cancel(&self) {
        self.subscription.cancel();
    }
}

#[derive(Clone, Debug)]
pub struct ChatService {
    matches: MatchRepository,
    messages: MessageRepository,
    profiles: ProfileRepository,
    config: ChatConfig,
    metrics: Metrics,
}

impl ChatService {
    #[must_use]
    pub fn new(
        matches: MatchRepository,
        messages: MessageRepository,
        profiles: ProfileRepository,
        config: ChatConfig,
    ) -> Self {
        Self { matches, messages, profiles, config, metrics: Metrics::new() }
    }

    /// Every conversation of the user, skipping counterparts whose profile is gone.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    #[tracing::instrument(err(level = "warn"), skip(self, user_id), fields(user_id = %user_id))]
    pub async fn list(&self, user_id: &UserId) -> Result<Vec<Conversation>> {
        let matches = self.matches.list_for_user(user_id).await?;
        self.conversations(user_id, &matches).await
    }

    /// Resolves counterpart profiles for a list of matches.
    ///
    /// # Errors
    /// Returns an error if a profile cannot be read.
    pub async fn conversations(&self, user_id: &UserId, matches: &[Match]) -> Result<Vec<Conversation>> {
        let mut conversations = Vec::with_capacity(matches.len());
        for m in matches {
            let Some(counterpart) = m.counterpart(user_id) else { continue };
            match self.profiles.get(counterpart).await? {
                Some(profile) => conversations.push(Conversation { id: m.id.clone(), counterpart: profile }),
                None => tracing::debug!(counterpart = %counterpart, "Skipping match with deleted profile"),
            }
        }
        Ok(conversations)
    }

    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist and
    /// `AppError::Forbidden` if the user is not part of it.
    #[tracing::instrument(err(level = "warn"), skip(self, user_id), fields(user_id = %user_id))]
    pub async fn conversation(&self, user_id: &UserId, id: &MatchId) -> Result<Conversation> {
        let m = self.authorize(user_id, id).await?;
        let counterpart = m.counterpart(user_id).ok_or(AppError::Forbidden)?;
        let profile = self.profiles.get(counterpart).await?.ok_or(AppError::NotFound)?;
        Ok(Conversation { id: m.id, counterpart: profile })
    }

    /// Messages of the conversation, oldest first.
    ///
    /// # Errors
    /// Same access rules as [`Self::conversation`].
    #[tracing::instrument(err(level = "warn"), skip(self, user_id), fields(user_id = %user_id))]
    pub async fn messages(&self, user_id: &UserId, id: &MatchId) -> Result<Vec<Message>> {
        self.authorize(user_id, id).await?;
        self.messages.list(id).await
    }

    /// # Errors
    /// Returns `AppError::BadRequest` for empty or oversized text.
    #[tracing::instrument(err(level = "warn"), skip(self, user_id, text), fields(user_id = %user_id))]
    pub async fn send(&self, user_id: &UserId, id: &MatchId, text: &str) -> Result<Message> {
        let m = self.authorize(user_id, id).await?;
        let receiver = m.counterpart(user_id).ok_or(AppError::Forbidden)?.clone();
        let message = NewMessage::new(id.clone(), user_id.clone(), receiver, text, self.config.max_message_len)
            .map_err(AppError::BadRequest)?;

        match self.messages.create(message).await {
            Ok(message) => {
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "success")]);
                Ok(message)
            }
            Err(e) => {
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "failure")]);
                Err(e)
            }
        }
    }

    /// Flags every message addressed to the user as read.
    ///
    /// # Errors
    /// Same access rules as [`Self::conversation`].
    #[tracing::instrument(err(level = "warn"), skip(self, user_id), fields(user_id = %user_id))]
    pub async fn mark_read(&self, user_id: &UserId, id: &MatchId) -> Result<usize> {
        self.authorize(user_id, id).await?;
        let updated = self.messages.mark_read(id, user_id).await?;
        tracing::debug!(updated, "Conversation marked read");
        Ok(updated)
    }

    /// # Errors
    /// Same access rules as [`Self::conversation`].
    pub async fn live(&self, user_id: &UserId, id: &MatchId) -> Result<LiveConversation> {
        self.authorize(user_id, id).await?;
        let subscription = self.messages.subscribe(id, self.config.channel_capacity).await?;
        Ok(LiveConversation { id: id.clone(), subscription })
    }

    /// # Errors
    /// Returns an error if the match-list subscription cannot be opened.
    pub async fn unread(&self, user_id: &UserId) -> Result<UnreadProjection> {
        UnreadProjection::start(&self.matches, self.messages.clone(), user_id.clone(), self.config.channel_capacity)
            .await
    }

    async fn authorize(&self, user_id: &UserId, id: &MatchId) -> Result<Match> {
        let m = self.matches.get(id).await?.ok_or(AppError::NotFound)?;
        if !m.involves(user_id) {
            return Err(AppError::Forbidden);
        }
        Ok(m)
    }
}
