use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Full runtime configuration for the pipeline, loaded from environment
/// variables. See [`crate::load_app_config`].
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,

    /// A window closes at this many items even if the max wait has not elapsed.
    pub window_max_items: usize,
    /// A window closes after this many seconds even when under-filled.
    pub window_max_wait_secs: u64,

    /// Upper bound on distinct mention IDs the dedup window retains.
    pub dedup_capacity: usize,
    /// Entries older than this are evicted from the dedup window.
    pub dedup_ttl_secs: u64,

    pub classifier_max_retries: u32,
    pub classifier_backoff_base_ms: u64,
    pub sink_max_retries: u32,
    pub sink_backoff_base_ms: u64,
    pub transport_max_retries: u32,
    pub transport_backoff_base_ms: u64,

    /// Number of transport partitions, and therefore consumer workers.
    pub partitions: usize,

    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,

    /// Directory for batches persisted after the sink retry ceiling is hit.
    pub fallback_dir: PathBuf,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("window_max_items", &self.window_max_items)
            .field("window_max_wait_secs", &self.window_max_wait_secs)
            .field("dedup_capacity", &self.dedup_capacity)
            .field("dedup_ttl_secs", &self.dedup_ttl_secs)
            .field("classifier_max_retries", &self.classifier_max_retries)
            .field(
                "classifier_backoff_base_ms",
                &self.classifier_backoff_base_ms,
            )
            .field("sink_max_retries", &self.sink_max_retries)
            .field("sink_backoff_base_ms", &self.sink_backoff_base_ms)
            .field("transport_max_retries", &self.transport_max_retries)
            .field("transport_backoff_base_ms", &self.transport_backoff_base_ms)
            .field("partitions", &self.partitions)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("fallback_dir", &self.fallback_dir)
            .finish()
    }
}
