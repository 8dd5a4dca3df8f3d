use crate::adapters::database::records::DocumentRecord;
use crate::adapters::database::subscription::spawn_snapshot_pump;
use crate::adapters::database::{
    Direction, DocumentStore, FieldMutation, Filter, Query, SetMode, Snapshot, Subscription, Write, WriteBatch,
    apply_mutations, apply_set, ensure_object, precondition_holds,
};
use crate::config::{RetryConfig, StoreConfig};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use serde_json::Value;
use sqlx::postgres::{PgListener, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::Instrument;
use uuid::Uuid;

const CHANGE_CHANNEL: &str = "document_changes";

/// Initializes the database connection pool.
///
/// # Errors
/// Returns `sqlx::Error` if the connection fails.
pub async fn init_pool(config: &StoreConfig) -> std::result::Result<PgPool, sqlx::Error> {
    let url = config.url.as_deref().ok_or_else(|| sqlx::Error::Configuration("UNI_DATABASE_URL is not set".into()))?;
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(url)
        .await
}

/// Document store over a single JSONB table; change notifications travel over `LISTEN/NOTIFY`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    changes: broadcast::Sender<String>,
    retry: RetryConfig,
}

impl PostgresStore {
    /// Runs migrations and starts relaying change notifications.
    ///
    /// # Errors
    /// Returns an error if migrations fail or the listener cannot connect.
    pub async fn start(
        pool: PgPool,
        change_capacity: usize,
        retry: RetryConfig,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<Self> {
        sqlx::migrate!().run(&pool).await?;

        let (changes, _) = broadcast::channel(change_capacity.max(1));
        let mut listener = PgListener::connect_with(&pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        tokio::spawn(
            Self::relay_changes(listener, changes.clone(), shutdown).instrument(tracing::info_span!("change_relay")),
        );

        Ok(Self { pool, changes, retry })
    }

    async fn relay_changes(
        mut listener: PgListener,
        changes: broadcast::Sender<String>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                notification = listener.recv() => match notification {
                    Ok(n) => {
                        let _ = changes.send(n.payload().to_string());
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Change listener error, reconnecting");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                },
            }
        }
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &Query) {
        for filter in &query.filters {
            match filter {
                Filter::Eq(field, value) => {
                    builder.push(" AND data -> ").push_bind(field.clone()).push(" = ").push_bind(Json(value.clone()));
                }
                Filter::NotEq(field, value) => {
                    builder
                        .push(" AND jsonb_typeof(data -> ")
                        .push_bind(field.clone())
                        .push(") <> 'null' AND data -> ")
                        .push_bind(field.clone())
                        .push(" <> ")
                        .push_bind(Json(value.clone()));
                }
                Filter::ArrayContains(field, value) => {
                    builder
                        .push(" AND data -> ")
                        .push_bind(field.clone())
                        .push(" @> jsonb_build_array(")
                        .push_bind(Json(value.clone()))
                        .push(")");
                }
            }
        }
    }

    async fn run_query(pool: &PgPool, collection: &str, query: &Query) -> Result<Vec<Snapshot>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT id, data FROM documents WHERE collection = ");
        builder.push_bind(collection.to_string());
        Self::push_filters(&mut builder, query);

        match &query.order_by {
            Some((field, direction)) => {
                builder.push(" ORDER BY data -> ").push_bind(field.clone()).push(match direction {
                    Direction::Asc => " ASC, id ASC",
                    Direction::Desc => " DESC, id ASC",
                });
            }
            None => {
                builder.push(" ORDER BY id ASC");
            }
        }
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let records = builder.build_query_as::<DocumentRecord>().fetch_all(pool).await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn now_micros(conn: &mut PgConnection) -> Result<i64> {
        let micros: i64 =
            sqlx::query_scalar("SELECT (EXTRACT(EPOCH FROM clock_timestamp()) * 1000000)::BIGINT").fetch_one(conn).await?;
        Ok(micros)
    }

    async fn lock_document(conn: &mut PgConnection, collection: &str, id: &str) -> Result<Option<Value>> {
        let data: Option<Json<Value>> =
            sqlx::query_scalar("SELECT data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE")
                .bind(collection)
                .bind(id)
                .fetch_optional(conn)
                .await?;
        Ok(data.map(|d| d.0))
    }

    async fn upsert(conn: &mut PgConnection, collection: &str, id: &str, data: Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(data))
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn notify(conn: &mut PgConnection, collection: &str) -> Result<()> {
        sqlx::query("SELECT pg_notify($1, $2)").bind(CHANGE_CHANNEL).bind(collection).execute(conn).await?;
        Ok(())
    }

    async fn apply_write(conn: &mut PgConnection, write: Write, now: i64) -> Result<()> {
        match write {
            Write::Set { collection, id, data, mode } => {
                ensure_object(&data)?;
                let existing = Self::lock_document(conn, &collection, &id).await?;
                let next = apply_set(existing, data, mode, now);
                Self::upsert(conn, &collection, &id, next).await
            }
            Write::Update { collection, id, mutations } => {
                let mut doc = Self::lock_document(conn, &collection, &id).await?.ok_or(AppError::NotFound)?;
                apply_mutations(&mut doc, &mutations, now);
                Self::upsert(conn, &collection, &id, doc).await
            }
        }
    }

    /// Commits the batch, rerunning it when Postgres aborts it over a concurrent writer.
    async fn write_all(&self, batch: WriteBatch) -> Result<()> {
        let retry_strategy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.retry.min_delay_ms))
            .with_max_times(self.retry.store_attempts.saturating_sub(1))
            .with_jitter();

        (|| async { self.write_once(batch.clone()).await })
            .retry(&retry_strategy)
            .when(AppError::is_serialization_failure)
            .notify(|e, duration| {
                tracing::debug!(error = %e, "Write lost a race, retrying in {:?}", duration);
            })
            .await
    }

    async fn write_once(&self, batch: WriteBatch) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        // Row locks serialize plain read-modify-writes; preconditions on missing
        // documents additionally need predicate locks.
        let isolation = if batch.preconditions.is_empty() {
            "SET TRANSACTION ISOLATION LEVEL READ COMMITTED"
        } else {
            "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE"
        };
        sqlx::query(isolation).execute(&mut *tx).await?;

        for precondition in &batch.preconditions {
            let (collection, id) = precondition.target();
            let current = Self::lock_document(&mut tx, collection, id).await?;
            if !precondition_holds(precondition, current.as_ref()) {
                return Err(AppError::Conflict(format!("Precondition failed on {collection}/{id}")));
            }
        }

        let now = Self::now_micros(&mut tx).await?;
        let touched: BTreeSet<String> = batch.writes.iter().map(|w| w.collection().to_string()).collect();
        for write in batch.writes {
            Self::apply_write(&mut tx, write, now).await?;
        }
        for collection in &touched {
            Self::notify(&mut tx, collection).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Snapshot>> {
        let record = sqlx::query_as::<_, DocumentRecord>("SELECT id, data FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self, data))]
    async fn set(&self, collection: &str, id: &str, data: Value, mode: SetMode) -> Result<()> {
        self.write_all(WriteBatch::new().set(collection, id, data, mode)).await
    }

    #[tracing::instrument(level = "debug", skip(self, data))]
    async fn add(&self, collection: &str, data: Value) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        self.write_all(WriteBatch::new().set(collection, &id, data, SetMode::Overwrite)).await?;
        Ok(id)
    }

    #[tracing::instrument(level = "debug", skip(self, mutations))]
    async fn update(&self, collection: &str, id: &str, mutations: Vec<FieldMutation>) -> Result<()> {
        self.write_all(WriteBatch::new().update(collection, id, mutations)).await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Snapshot>> {
        Self::run_query(&self.pool, collection, query).await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn count(&self, collection: &str, query: &Query) -> Result<u64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents WHERE collection = ");
        builder.push_bind(collection.to_string());
        Self::push_filters(&mut builder, query);

        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    #[tracing::instrument(level = "debug", skip(self, batch), fields(writes = batch.writes.len()))]
    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.write_all(batch).await
    }

    async fn subscribe(&self, collection: &str, query: Query, capacity: usize) -> Result<Subscription> {
        let pool = self.pool.clone();
        let target = collection.to_string();
        Ok(spawn_snapshot_pump(collection.to_string(), self.changes.subscribe(), capacity, move || {
            let pool = pool.clone();
            let target = target.clone();
            let query = query.clone();
            async move { Self::run_query(&pool, &target, &query).await }
        }))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
