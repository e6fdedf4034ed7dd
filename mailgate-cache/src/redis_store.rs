use std::time::Duration;

use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::info;

use crate::store::{KeyValueStore, StoreError};

/// Redis-backed [`KeyValueStore`], shared by every gateway instance.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connect and ping. An unreachable store is a boot failure, not
    /// something to retry at request time.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        info!("Connecting to redis");

        let client =
            redis::Client::open(url).map_err(|err| StoreError::Connection(err.to_string()))?;
        let mut manager = ConnectionManager::new(client)
            .await
            .map_err(|err| StoreError::Connection(err.to_string()))?;

        redis::cmd("PING")
            .query_async::<()>(&mut manager)
            .await
            .map_err(|err| StoreError::Connection(err.to_string()))?;

        Ok(Self { manager })
    }
}

#[async_trait::async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.get(key).await?)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let () = conn.del(key).await?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.keys(pattern).await?)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.manager.clone();
        Ok(conn.mget(keys).await?)
    }
}
