pub mod match_repo;
pub mod memory;
pub mod message_repo;
pub mod postgres;
pub mod profile_repo;
pub mod query;
pub mod records;
pub mod subscription;

use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use query::{Direction, Filter, Query};
pub use subscription::Subscription;

pub const USERS: &str = "users";
pub const MATCHES: &str = "matches";

/// Field value replaced by the store's clock at write time.
const SERVER_TIMESTAMP_KEY: &str = "$serverTimestamp";

/// Sentinel standing in for a server-assigned timestamp.
#[must_use]
pub fn server_timestamp() -> Value {
    let mut sentinel = Map::new();
    sentinel.insert(SERVER_TIMESTAMP_KEY.to_string(), Value::Bool(true));
    Value::Object(sentinel)
}

/// A document together with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: String,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    Overwrite,
    /// Upsert that only replaces the top-level fields present in the new data.
    Merge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldMutation {
    Set(String, Value),
    AddToSet(String, Vec<Value>),
    RemoveFromSet(String, Vec<Value>),
}

impl FieldMutation {
    #[must_use]
    pub fn set(field: &str, value: impl Into<Value>) -> Self {
        Self::Set(field.to_string(), value.into())
    }

    #[must_use]
    pub fn add_to_set(field: &str, value: impl Into<Value>) -> Self {
        Self::AddToSet(field.to_string(), vec![value.into()])
    }

    #[must_use]
    pub fn remove_from_set(field: &str, value: impl Into<Value>) -> Self {
        Self::RemoveFromSet(field.to_string(), vec![value.into()])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    Missing { collection: String, id: String },
    ArrayContains { collection: String, id: String, field: String, value: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Set { collection: String, id: String, data: Value, mode: SetMode },
    Update { collection: String, id: String, mutations: Vec<FieldMutation> },
}

impl Write {
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::Set { collection, .. } | Self::Update { collection, .. } => collection,
        }
    }
}

/// Writes applied all-or-nothing, guarded by preconditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub preconditions: Vec<Precondition>,
    pub writes: Vec<Write>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn require_missing(mut self, collection: &str, id: &str) -> Self {
        self.preconditions.push(Precondition::Missing { collection: collection.to_string(), id: id.to_string() });
        self
    }

    #[must_use]
    pub fn require_array_contains(mut self, collection: &str, id: &str, field: &str, value: impl Into<Value>) -> Self {
        self.preconditions.push(Precondition::ArrayContains {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn set(mut self, collection: &str, id: &str, data: Value, mode: SetMode) -> Self {
        self.writes.push(Write::Set { collection: collection.to_string(), id: id.to_string(), data, mode });
        self
    }

    #[must_use]
    pub fn update(mut self, collection: &str, id: &str, mutations: Vec<FieldMutation>) -> Self {
        self.writes.push(Write::Update { collection: collection.to_string(), id: id.to_string(), mutations });
        self
    }
}

/// Generic document database: the profile, match and message stores are all
/// built on top of this port.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug + 'static {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Snapshot>>;

    async fn set(&self, collection: &str, id: &str, data: Value, mode: SetMode) -> Result<()>;

    /// Creates a document under a store-generated id and returns the id.
    async fn add(&self, collection: &str, data: Value) -> Result<String>;

    /// Applies field mutations atomically. Fails with `NotFound` when the document is missing.
    async fn update(&self, collection: &str, id: &str, mutations: Vec<FieldMutation>) -> Result<()>;

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Snapshot>>;

    async fn count(&self, collection: &str, query: &Query) -> Result<u64>;

    /// Applies every write of the batch or none. Fails with `Conflict` when a
    /// precondition does not hold.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Pushes the full result set of `query` now and after every change to the collection.
    async fn subscribe(&self, collection: &str, query: Query, capacity: usize) -> Result<Subscription>;

    async fn ping(&self) -> Result<()>;
}

/// Replaces top-level server timestamp sentinels with `now_micros`.
pub(crate) fn resolve_server_timestamps(data: &mut Value, now_micros: i64) {
    if let Value::Object(fields) = data {
        for value in fields.values_mut() {
            if value.get(SERVER_TIMESTAMP_KEY).is_some() {
                *value = Value::from(now_micros);
            }
        }
    }
}

pub(crate) fn ensure_object(data: &Value) -> Result<()> {
    if data.is_object() { Ok(()) } else { Err(AppError::BadRequest("Documents must be JSON objects".into())) }
}

/// Applies a `set` of `incoming` onto `existing` and returns the new document.
pub(crate) fn apply_set(existing: Option<Value>, mut incoming: Value, mode: SetMode, now_micros: i64) -> Value {
    resolve_server_timestamps(&mut incoming, now_micros);
    match (mode, existing) {
        (SetMode::Merge, Some(Value::Object(mut current))) => {
            if let Value::Object(fields) = incoming {
                current.extend(fields);
            }
            Value::Object(current)
        }
        _ => incoming,
    }
}

/// Applies field mutations in place with add-to-set / remove-from-set semantics.
pub(crate) fn apply_mutations(doc: &mut Value, mutations: &[FieldMutation], now_micros: i64) {
    let Value::Object(fields) = doc else {
        return;
    };

    for mutation in mutations {
        match mutation {
            FieldMutation::Set(field, value) => {
                let mut value = value.clone();
                if value.get(SERVER_TIMESTAMP_KEY).is_some() {
                    value = Value::from(now_micros);
                }
                fields.insert(field.clone(), value);
            }
            FieldMutation::AddToSet(field, values) => {
                let entry = fields.entry(field.clone()).or_insert_with(|| Value::Array(Vec::new()));
                if !entry.is_array() {
                    *entry = Value::Array(Vec::new());
                }
                if let Value::Array(items) = entry {
                    for value in values {
                        if !items.contains(value) {
                            items.push(value.clone());
                        }
                    }
                }
            }
            FieldMutation::RemoveFromSet(field, values) => {
                if let Some(Value::Array(items)) = fields.get_mut(field) {
                    items.retain(|item| !values.contains(item));
                } else {
                    fields.insert(field.clone(), Value::Array(Vec::new()));
                }
            }
        }
    }
}

/// Evaluates a precondition against the current state of its document.
pub(crate) fn precondition_holds(precondition: &Precondition, current: Option<&Value>) -> bool {
    match precondition {
        Precondition::Missing { .. } => current.is_none(),
        Precondition::ArrayContains { field, value, .. } => current
            .and_then(|doc| doc.get(field))
            .and_then(Value::as_array)
            .is_some_and(|items| items.contains(value)),
    }
}

impl Precondition {
    #[must_use]
    pub fn target(&self) -> (&str, &str) {
        match self {
            Self::Missing { collection, id }
            | Self::ArrayContains { collection, id, .. } => (collection.as_str(), id.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_to_set_is_idempotent_and_ordered() {
        let mut doc = json!({"likedBy": ["a"]});
        apply_mutations(&mut doc, &[FieldMutation::add_to_set("likedBy", "b")], 0);
        apply_mutations(&mut doc, &[FieldMutation::add_to_set("likedBy", "a")], 0);
        assert_eq!(doc["likedBy"], json!(["a", "b"]));
    }

    #[test]
    fn test_remove_from_set_on_missing_field() {
        let mut doc = json!({});
        apply_mutations(&mut doc, &[FieldMutation::remove_from_set("likedBy", "a")], 0);
        assert_eq!(doc["likedBy"], json!([]));
    }

    #[test]
    fn test_merge_keeps_untouched_fields() {
        let merged = apply_set(Some(json!({"a": 1, "b": 2})), json!({"b": 3}), SetMode::Merge, 0);
        assert_eq!(merged, json!({"a": 1, "b": 3}));

        let replaced = apply_set(Some(json!({"a": 1, "b": 2})), json!({"b": 3}), SetMode::Overwrite, 0);
        assert_eq!(replaced, json!({"b": 3}));
    }

    #[test]
    fn test_server_timestamp_is_resolved() {
        let doc = apply_set(None, json!({"createdAt": server_timestamp()}), SetMode::Overwrite, 42);
        assert_eq!(doc["createdAt"], json!(42));
    }
}
