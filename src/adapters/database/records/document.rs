use crate::adapters::database::Snapshot;
use serde_json::Value;
use sqlx::types::Json;

#[derive(Debug, sqlx::FromRow)]
pub struct DocumentRecord {
    pub(crate) id: String,
    pub(crate) data: Json<Value>,
}

impl From<DocumentRecord> for Snapshot {
    fn from(record: DocumentRecord) -> Self {
        Self { id: record.id, data: record.data.0 }
    }
}
