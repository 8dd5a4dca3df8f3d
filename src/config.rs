use clap::{Args, Parser, ValueEnum};

#[derive(Clone, Debug, Default, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub store: StoreConfig,

    #[command(flatten)]
    pub identity: IdentityConfig,

    #[command(flatten)]
    pub feed: FeedConfig,

    #[command(flatten)]
    pub chat: ChatConfig,

    #[command(flatten)]
    pub storage: StorageConfig,

    #[command(flatten)]
    pub retry: RetryConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "UNI_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "UNI_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management (health) server
    #[arg(long, env = "UNI_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Seconds to wait for background tasks on shutdown
    #[arg(long, env = "UNI_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 3000, mgmt_port: 9090, shutdown_timeout_secs: 5 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Clone, Debug, Args)]
pub struct StoreConfig {
    /// Document store backend
    #[arg(long = "store-backend", env = "UNI_STORE_BACKEND", value_enum, default_value_t = StoreBackend::Memory)]
    pub backend: StoreBackend,

    /// Database connection URL (postgres backend only)
    #[arg(long = "database-url", env = "UNI_DATABASE_URL")]
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    #[arg(long = "db-max-connections", env = "UNI_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    /// Minimum number of idle connections in the pool
    #[arg(long = "db-min-connections", env = "UNI_DB_MIN_CONNECTIONS", default_value_t = 1)]
    pub min_connections: u32,

    /// Seconds to wait when acquiring a connection
    #[arg(long = "db-acquire-timeout-secs", env = "UNI_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// Capacity of the change feed used by live subscriptions
    #[arg(long = "store-change-capacity", env = "UNI_STORE_CHANGE_CAPACITY", default_value_t = 256)]
    pub change_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: None,
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 5,
            change_capacity: 256,
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct IdentityConfig {
    /// Shared secret used to verify identity provider ID tokens
    #[arg(long = "identity-secret", env = "UNI_IDENTITY_SECRET", default_value = "")]
    pub token_secret: String,

    /// Expected `iss` claim, if any
    #[arg(long = "identity-issuer", env = "UNI_IDENTITY_ISSUER")]
    pub issuer: Option<String>,

    /// Expected `aud` claim, if any
    #[arg(long = "identity-audience", env = "UNI_IDENTITY_AUDIENCE")]
    pub audience: Option<String>,

    /// Clock skew tolerated when checking `exp`
    #[arg(long = "identity-leeway-secs", env = "UNI_IDENTITY_LEEWAY_SECS", default_value_t = 30)]
    pub leeway_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self { token_secret: String::new(), issuer: None, audience: None, leeway_secs: 30 }
    }
}

#[derive(Clone, Debug, Args)]
pub struct FeedConfig {
    /// Maximum number of candidates fetched per selection pass
    #[arg(long = "feed-page-size", env = "UNI_FEED_PAGE_SIZE", default_value_t = 50)]
    pub page_size: usize,

    /// Number of candidates presented at once
    #[arg(long = "feed-visible-window", env = "UNI_FEED_VISIBLE_WINDOW", default_value_t = 10)]
    pub visible_window: usize,

    /// Rotate the catalog once fewer visible candidates than this remain
    #[arg(long = "feed-rotation-threshold", env = "UNI_FEED_ROTATION_THRESHOLD", default_value_t = 2)]
    pub rotation_threshold: usize,

    /// Daily like quota as a fraction of the eligible population
    #[arg(long = "feed-quota-ratio", env = "UNI_FEED_QUOTA_RATIO", default_value_t = 1.0)]
    pub quota_ratio: f64,

    /// Seconds a cached feed session may sit idle before it can be evicted
    #[arg(long = "feed-session-idle-secs", env = "UNI_FEED_SESSION_IDLE_SECS", default_value_t = 3600)]
    pub session_idle_secs: u64,

    /// Seconds between sweeps for idle feed sessions
    #[arg(long = "feed-sweep-interval-secs", env = "UNI_FEED_SWEEP_INTERVAL_SECS", default_value_t = 300)]
    pub sweep_interval_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            visible_window: 10,
            rotation_threshold: 2,
            quota_ratio: 1.0,
            session_idle_secs: 3600,
            sweep_interval_secs: 300,
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct ChatConfig {
    /// Maximum length of a chat message in characters
    #[arg(long = "chat-max-message-len", env = "UNI_CHAT_MAX_MESSAGE_LEN", default_value_t = 2000)]
    pub max_message_len: usize,

    /// Capacity of per-subscription snapshot channels
    #[arg(long = "chat-channel-capacity", env = "UNI_CHAT_CHANNEL_CAPACITY", default_value_t = 16)]
    pub channel_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self { max_message_len: 2000, channel_capacity: 16 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    #[default]
    Memory,
    S3,
}

#[derive(Clone, Debug, Args)]
pub struct StorageConfig {
    /// Object storage backend
    #[arg(long = "storage-backend", env = "UNI_STORAGE_BACKEND", value_enum, default_value_t = StorageBackend::Memory)]
    pub backend: StorageBackend,

    /// S3 bucket name
    #[arg(long = "storage-bucket", env = "UNI_STORAGE_BUCKET", default_value = "uni-photos")]
    pub bucket: String,

    /// S3 region
    #[arg(long = "storage-region", env = "UNI_STORAGE_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Custom S3 endpoint (useful for MinIO)
    #[arg(long = "storage-endpoint", env = "UNI_STORAGE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// S3 access key
    #[arg(long = "storage-access-key", env = "UNI_STORAGE_ACCESS_KEY")]
    pub access_key: Option<String>,

    /// S3 secret key
    #[arg(long = "storage-secret-key", env = "UNI_STORAGE_SECRET_KEY")]
    pub secret_key: Option<String>,

    /// Force path style (required for many MinIO setups: http://host/bucket/key)
    #[arg(long = "storage-force-path-style", env = "UNI_STORAGE_FORCE_PATH_STYLE", default_value_t = false)]
    pub force_path_style: bool,

    /// Base URL that public download links are built from
    #[arg(long = "storage-public-base-url", env = "UNI_STORAGE_PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Max photo size in bytes (Default: 10MB)
    #[arg(long = "storage-max-photo-bytes", env = "UNI_STORAGE_MAX_PHOTO_BYTES", default_value_t = 10_485_760)]
    pub max_photo_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            bucket: "uni-photos".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            force_path_style: false,
            public_base_url: None,
            max_photo_bytes: 10_485_760,
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct RetryConfig {
    /// Attempts for the match commit before giving up
    #[arg(long = "retry-max-attempts", env = "UNI_RETRY_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: usize,

    /// Attempts for a store write that Postgres aborted over a concurrent writer
    #[arg(long = "retry-store-attempts", env = "UNI_RETRY_STORE_ATTEMPTS", default_value_t = 8)]
    pub store_attempts: usize,

    /// Initial backoff delay between attempts
    #[arg(long = "retry-min-delay-ms", env = "UNI_RETRY_MIN_DELAY_MS", default_value_t = 50)]
    pub min_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, store_attempts: 8, min_delay_ms: 50 }
    }
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the document store readiness check
    #[arg(long = "health-store-timeout-ms", env = "UNI_HEALTH_STORE_TIMEOUT_MS", default_value_t = 2000)]
    pub store_timeout_ms: u64,

    /// Timeout for the object storage readiness check
    #[arg(long = "health-storage-timeout-ms", env = "UNI_HEALTH_STORAGE_TIMEOUT_MS", default_value_t = 2000)]
    pub storage_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { store_timeout_ms: 2000, storage_timeout_ms: 2000 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Default, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long = "log-format", env = "UNI_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; telemetry export is disabled when unset
    #[arg(long = "otlp-endpoint", env = "UNI_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}
