use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::{BlobError, ObjectStore, PutRequest};

/// In-process [`ObjectStore`] for tests and local runs.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The keys currently held, in no particular order.
    pub async fn stored_keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, request: PutRequest) -> Result<String, BlobError> {
        let location = format!("memory://{}", request.key);
        self.objects.lock().await.insert(request.key, request.body);
        Ok(location)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        self.objects
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn objects_round_trip() {
        let store = MemoryStore::new();
        let location = store
            .put(PutRequest {
                key: "id/mime".into(),
                content_type: "message/rfc822".into(),
                metadata: Vec::new(),
                body: b"raw".to_vec(),
            })
            .await
            .unwrap();

        assert_eq!(location, "memory://id/mime");
        assert_eq!(store.get("id/mime").await.unwrap(), b"raw");
        assert!(matches!(
            store.get("id/other").await,
            Err(BlobError::NotFound(_))
        ));
    }
}
