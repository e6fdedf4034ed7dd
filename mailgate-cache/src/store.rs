use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Connection(String),

    #[error("store command failed: {0}")]
    Command(#[from] redis::RedisError),

    #[error("failed to encode cached record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A string key-value store with per-key expiry.
///
/// This is the seam between the routing cache and its storage. Production
/// uses Redis so that all gateway instances share one cache; tests use the
/// in-process [`crate::MemoryStore`].
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
    -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// All live keys matching `pattern`, where `pattern` is a literal with
    /// an optional trailing `*` wildcard.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Values for `keys` in order, with `None` for keys that have expired or
    /// never existed.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError>;
}
