//! Live unread-message counts for one user.
//!
//! One subscription follows the user's match list and one more follows the
//! unread messages of each conversation. The per-conversation tasks write
//! their counts straight into the shared state, so nothing is recomputed by
//! polling.

use crate::adapters::database::match_repo::MatchRepository;
use crate::adapters::database::Subscription;
use crate::adapters::database::message_repo::MessageRepository;
use crate::domain::matching::{Match, MatchId};
use crate::domain::user::UserId;
use crate::error::Result;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnreadState {
    pub matches: Vec<Match>,
    pub counts: BTreeMap<MatchId, u64>,
}

impl UnreadState {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Handle on a running projection. Dropping it cancels every subscription.
#[derive(Debug)]
pub struct UnreadProjection {
    state: watch::Receiver<UnreadState>,
    token: CancellationToken,
}

impl UnreadProjection {
    /// Opens the match-list subscription and starts following conversations.
    ///
    /// # Errors
    /// Returns an error if the match-list subscription cannot be opened.
    pub async fn start(
        matches: &MatchRepository,
        messages: MessageRepository,
        user_id: UserId,
        capacity: usize,
    ) -> Result<Self> {
        let mut match_list = matches.subscribe_for_user(&user_id, capacity).await?;
        let (tx, state) = watch::channel(UnreadState::default());
        let token = CancellationToken::new();
        let task_token = token.clone();
        let span = tracing::debug_span!("unread_projection", user_id = %user_id);

        tokio::spawn(
            async move {
                let mut followed: HashMap<MatchId, CancellationToken> = HashMap::new();

                loop {
                    let snapshot = tokio::select! {
                        () = task_token.cancelled() => break,
                        snapshot = match_list.next() => snapshot,
                    };
                    let Some(snapshot) = snapshot else { break };

                    let list = match MatchRepository::decode(snapshot) {
                        Ok(list) => list,
                        Err(e) => {
                            tracing::warn!(error = %e, "Skipping malformed match list");
                            continue;
                        }
                    };

                    followed.retain(|id, conversation| {
                        let keep = list.iter().any(|m| &m.id == id);
                        if !keep {
                            conversation.cancel();
                            tx.send_modify(|s| {
                                s.counts.remove(id);
                            });
                            tracing::debug!(conversation_id = %id, "Stopped following conversation");
                        }
                        keep
                    });

                    for m in &list {
                        if followed.contains_key(&m.id) {
                            continue;
                        }
                        let conversation = task_token.child_token();
                        match messages.subscribe_unread(&m.id, &user_id, capacity).await {
                            Ok(unread) => {
                                tx.send_modify(|s| {
                                    s.counts.insert(m.id.clone(), 0);
                                });
                                tokio::spawn(follow_conversation(
                                    m.id.clone(),
                                    unread,
                                    tx.clone(),
                                    conversation.clone(),
                                ));
                                followed.insert(m.id.clone(), conversation);
                            }
                            Err(e) => tracing::warn!(error = %e, conversation_id = %m.id, "Failed to follow conversation"),
                        }
                    }

                    tx.send_modify(|s| s.matches = list);
                }

                task_token.cancel();
                tracing::debug!("Unread projection stopped");
            }
            .instrument(span),
        );

        Ok(Self { state, token })
    }

    #[must_use]
    pub fn current(&self) -> UnreadState {
        self.state.borrow().clone()
    }

    /// Waits for the next change. `None` once the projection has stopped.
    pub async fn next(&mut self) -> Option<UnreadState> {
        tokio::select! {
            () = self.token.cancelled() => None,
            changed = self.state.changed() => {
                changed.ok()?;
                Some(self.state.borrow_and_update().clone())
            }
        }
    }
}

impl Drop for UnreadProjection {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn follow_conversation(
    id: MatchId,
    mut unread: Subscription,
    tx: watch::Sender<UnreadState>,
    token: CancellationToken,
) {
    loop {
        let snapshot = tokio::select! {
            () = token.cancelled() => break,
            snapshot = unread.next() => snapshot,
        };
        let Some(snapshot) = snapshot else { break };
        let count = snapshot.len() as u64;

        // The cancellation check runs under the watch lock so a removed
        // conversation can never be written back.
        tx.send_if_modified(|s| {
            if token.is_cancelled() || s.counts.get(&id) == Some(&count) {
                return false;
            }
            s.counts.insert(id.clone(), count);
            true
        });
    }
    unread.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::profile_repo::ProfileRepository;
    use crate::adapters::database::{DocumentStore, MATCHES, MemoryStore, SetMode, USERS};
    use crate::domain::message::NewMessage;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    async fn wait_for(projection: &mut UnreadProjection, pred: impl Fn(&UnreadState) -> bool) -> UnreadState {
        let current = projection.current();
        if pred(&current) {
            return current;
        }
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let state = projection.next().await.expect("projection stopped");
                if pred(&state) {
                    return state;
                }
            }
        })
        .await
        .expect("timed out waiting for projection")
    }

    #[tokio::test]
    async fn test_counts_follow_messages_and_match_list() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::default());
        let matches = MatchRepository::new(store.clone());
        let messages = MessageRepository::new(store.clone());
        let profiles = ProfileRepository::new(store.clone());
        let (a, b) = (UserId::new("a"), UserId::new("b"));
        for id in ["a", "b"] {
            store.set(USERS, id, json!({"uid": id}), SetMode::Overwrite).await.unwrap();
        }
        profiles.add_liked_by(&a, &b).await.unwrap();
        let conv = matches.create_with_promotion(&a, &b).await.unwrap();

        let mut projection = UnreadProjection::start(&matches, messages.clone(), a.clone(), 8).await.unwrap();
        wait_for(&mut projection, |s| s.matches.len() == 1 && s.counts.get(&conv) == Some(&0)).await;

        for text in ["hi", "there"] {
            messages.create(NewMessage::new(conv.clone(), b.clone(), a.clone(), text, 100).unwrap()).await.unwrap();
        }
        let state = wait_for(&mut projection, |s| s.counts.get(&conv) == Some(&2)).await;
        assert_eq!(state.total(), 2);

        messages.mark_read(&conv, &a).await.unwrap();
        wait_for(&mut projection, |s| s.counts.get(&conv) == Some(&0)).await;

        // The conversation leaves the user's match list.
        store.set(MATCHES, conv.as_str(), json!({"users": ["b", "c"]}), SetMode::Overwrite).await.unwrap();
        let state = wait_for(&mut projection, |s| s.matches.is_empty()).await;
        assert!(state.counts.is_empty());

        messages.create(NewMessage::new(conv.clone(), b.clone(), a.clone(), "late", 100).unwrap()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(projection.current().counts.is_empty());
    }
}
