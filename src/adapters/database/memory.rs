use crate::adapters::database::subscription::spawn_snapshot_pump;
use crate::adapters::database::{
    DocumentStore, FieldMutation, Query, SetMode, Snapshot, Subscription, Write, WriteBatch, apply_mutations,
    apply_set, ensure_object, precondition_holds,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, BTreeMap<String, Value>>,
    last_timestamp: i64,
}

impl State {
    /// Strictly increasing microsecond clock so server timestamps never tie.
    fn tick(&mut self) -> i64 {
        let now = i64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000).unwrap_or(i64::MAX);
        self.last_timestamp = now.max(self.last_timestamp + 1);
        self.last_timestamp
    }

    fn doc(&self, collection: &str, id: &str) -> Option<&Value> {
        self.collections.get(collection).and_then(|docs| docs.get(id))
    }

    fn apply(&mut self, write: Write, now: i64) -> Result<()> {
        match write {
            Write::Set { collection, id, data, mode } => {
                ensure_object(&data)?;
                let docs = self.collections.entry(collection).or_default();
                let next = apply_set(docs.remove(&id), data, mode, now);
                docs.insert(id, next);
            }
            Write::Update { collection, id, mutations } => {
                let doc = self
                    .collections
                    .get_mut(&collection)
                    .and_then(|docs| docs.get_mut(&id))
                    .ok_or(AppError::NotFound)?;
                apply_mutations(doc, &mutations, now);
            }
        }
        Ok(())
    }
}

/// In-process document store for development and tests.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    changes: broadcast::Sender<String>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(256)
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new(change_capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(change_capacity.max(1));
        Self { state: Arc::new(RwLock::new(State::default())), changes }
    }

    fn notify(&self, collection: &str) {
        // No receivers just means nobody is subscribed.
        let _ = self.changes.send(collection.to_string());
    }

    async fn run_query(state: &RwLock<State>, collection: &str, query: &Query) -> Vec<Snapshot> {
        let state = state.read().await;
        state.collections.get(collection).map_or_else(Vec::new, |docs| {
            query.apply(docs.iter()).into_iter().map(|(id, data)| Snapshot { id, data }).collect()
        })
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Snapshot>> {
        let state = self.state.read().await;
        Ok(state.doc(collection, id).map(|data| Snapshot { id: id.to_string(), data: data.clone() }))
    }

    async fn set(&self, collection: &str, id: &str, data: Value, mode: SetMode) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let now = state.tick();
            state.apply(Write::Set { collection: collection.to_string(), id: id.to_string(), data, mode }, now)?;
        }
        self.notify(collection);
        Ok(())
    }

    async fn add(&self, collection: &str, data: Value) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        self.set(collection, &id, data, SetMode::Overwrite).await?;
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, mutations: Vec<FieldMutation>) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let now = state.tick();
            state.apply(Write::Update { collection: collection.to_string(), id: id.to_string(), mutations }, now)?;
        }
        self.notify(collection);
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Snapshot>> {
        Ok(Self::run_query(&self.state, collection, query).await)
    }

    async fn count(&self, collection: &str, query: &Query) -> Result<u64> {
        let state = self.state.read().await;
        let count = state.collections.get(collection).map_or(0, |docs| docs.values().filter(|d| query.matches(d)).count());
        Ok(count as u64)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let touched: Vec<String> = {
            let mut state = self.state.write().await;

            for precondition in &batch.preconditions {
                let (collection, id) = precondition.target();
                if !precondition_holds(precondition, state.doc(collection, id)) {
                    return Err(AppError::Conflict(format!("Precondition failed on {collection}/{id}")));
                }
            }

            // Stage on a copy of every touched collection so a failing write leaves no trace.
            let mut staged = State { collections: HashMap::new(), last_timestamp: state.last_timestamp };
            for write in &batch.writes {
                let collection = write.collection();
                if !staged.collections.contains_key(collection) {
                    let current = state.collections.get(collection).cloned().unwrap_or_default();
                    staged.collections.insert(collection.to_string(), current);
                }
            }
            let now = state.tick();
            let touched = staged.collections.keys().cloned().collect();
            for write in batch.writes {
                staged.apply(write, now)?;
            }
            state.collections.extend(staged.collections);
            touched
        };

        for collection in touched {
            self.notify(&collection);
        }
        Ok(())
    }

    async fn subscribe(&self, collection: &str, query: Query, capacity: usize) -> Result<Subscription> {
        let state = Arc::clone(&self.state);
        let target = collection.to_string();
        let subscription = spawn_snapshot_pump(collection.to_string(), self.changes.subscribe(), capacity, move || {
            let state = Arc::clone(&state);
            let target = target.clone();
            let query = query.clone();
            async move { Ok(Self::run_query(&state, &target, &query).await) }
        });
        Ok(subscription)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::server_timestamp;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let store = MemoryStore::default();
        let result = store.update("users", "nobody", vec![FieldMutation::add_to_set("likedBy", "a")]).await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn test_query_count_and_limit() {
        let store = MemoryStore::default();
        for (id, gender) in [("a", "Male"), ("b", "Female"), ("c", "Female"), ("d", "Female")] {
            store.set("users", id, json!({"uid": id, "gender": gender}), SetMode::Overwrite).await.unwrap();
        }

        let query = Query::new().eq("gender", "Female").not_eq("uid", "c");
        assert_eq!(store.count("users", &query).await.unwrap(), 2);

        let hits = store.query("users", &query.limit(1)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = MemoryStore::default();
        store.set("users", "a", json!({"likedBy": []}), SetMode::Overwrite).await.unwrap();

        let failing = WriteBatch::new()
            .require_missing("matches", "a_b")
            .set("matches", "a_b", json!({"users": ["a", "b"]}), SetMode::Overwrite)
            .update("users", "a", vec![FieldMutation::add_to_set("matches", "b")])
            .update("users", "b", vec![FieldMutation::add_to_set("matches", "a")]);
        assert!(matches!(store.commit(failing).await, Err(AppError::NotFound)));
        assert!(store.get("matches", "a_b").await.unwrap().is_none());
        assert_eq!(store.get("users", "a").await.unwrap().unwrap().data, json!({"likedBy": []}));

        store.set("matches", "a_b", json!({}), SetMode::Overwrite).await.unwrap();
        let conflicting = WriteBatch::new()
            .require_missing("matches", "a_b")
            .update("users", "a", vec![FieldMutation::add_to_set("matches", "b")]);
        assert!(matches!(store.commit(conflicting).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_server_timestamps_increase() {
        let store = MemoryStore::default();
        let first = store.add("chats/x/messages", json!({"timestamp": server_timestamp()})).await.unwrap();
        let second = store.add("chats/x/messages", json!({"timestamp": server_timestamp()})).await.unwrap();

        let a = store.get("chats/x/messages", &first).await.unwrap().unwrap().data["timestamp"].as_i64().unwrap();
        let b = store.get("chats/x/messages", &second).await.unwrap().unwrap().data["timestamp"].as_i64().unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_subscription_pushes_changes_until_cancelled() {
        let store = MemoryStore::default();
        let mut sub = store.subscribe("matches", Query::new().array_contains("users", "a"), 4).await.unwrap();

        let initial = sub.next().await.unwrap();
        assert!(initial.is_empty());

        store.set("matches", "a_b", json!({"users": ["a", "b"]}), SetMode::Overwrite).await.unwrap();
        let updated = tokio::time::timeout(Duration::from_secs(1), sub.next()).await.unwrap().unwrap();
        assert_eq!(updated.len(), 1);

        sub.cancel();
        store.set("matches", "a_c", json!({"users": ["a", "c"]}), SetMode::Overwrite).await.unwrap();
        assert!(sub.next().await.is_none());
    }
}
