use crate::{BlobError, ObjectStore, PutRequest};

/// The [`ObjectStore`] wired in for relay-only gateways.
///
/// A relay-only gateway never persists payloads; reaching this store means a
/// hosted-domain code path ran in a configuration that excludes it, which is
/// reported as an error rather than silently dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledStore;

#[async_trait::async_trait]
impl ObjectStore for DisabledStore {
    async fn put(&self, _request: PutRequest) -> Result<String, BlobError> {
        Err(BlobError::Disabled)
    }

    async fn get(&self, _key: &str) -> Result<Vec<u8>, BlobError> {
        Err(BlobError::Disabled)
    }
}
