use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use tokio::sync::Mutex;

use crate::store::{KeyValueStore, StoreError};

/// In-process [`KeyValueStore`] with lazy expiry, for tests and local runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(pattern: &str, key: &str) -> bool {
    pattern
        .strip_suffix('*')
        .map_or(pattern == key, |prefix| key.starts_with(prefix))
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;

        match entries.get(key) {
            Some(entry) if entry.live() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.entries.lock().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .filter(|(key, entry)| entry.live() && matches(pattern, key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        let entries = self.entries.lock().await;
        Ok(keys
            .iter()
            .map(|key| {
                entries
                    .get(key)
                    .filter(|entry| entry.live())
                    .map(|entry| entry.value.clone())
            })
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn values_round_trip() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("mail:example.com", "{}", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            store.get("mail:example.com").await.unwrap(),
            Some("{}".into())
        );

        store.delete("mail:example.com").await.unwrap();
        assert_eq!(store.get("mail:example.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_values_are_gone() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("known:example.com", "false", Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.get("known:example.com").await.unwrap(), None);
        assert!(store.keys("known:*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn patterns_match_prefixes_only() {
        let store = MemoryStore::new();
        for key in ["mail:a.com", "mail:b.com", "known:a.com"] {
            store
                .set_with_ttl(key, "x", Duration::from_secs(60))
                .await
                .unwrap();
        }

        let mut keys = store.keys("mail:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, ["mail:a.com", "mail:b.com"]);

        assert_eq!(store.keys("mail:a.com").await.unwrap(), ["mail:a.com"]);
    }

    #[tokio::test]
    async fn get_many_preserves_order_and_gaps() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("mail:a.com", "a", Duration::from_secs(60))
            .await
            .unwrap();
        store
            .set_with_ttl("mail:c.com", "c", Duration::from_secs(60))
            .await
            .unwrap();

        let values = store
            .get_many(&[
                "mail:a.com".into(),
                "mail:b.com".into(),
                "mail:c.com".into(),
            ])
            .await
            .unwrap();

        assert_eq!(values, [Some("a".into()), None, Some("c".into())]);
    }
}
