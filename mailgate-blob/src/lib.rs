//! Object storage for message payloads.
//!
//! Only derived metadata travels through the backend API; the heavy payloads
//! (the raw MIME image, the full text and HTML bodies, and every attachment
//! or inline part) are written here and referenced by key.

pub mod keys;

mod disabled;
mod memory;
mod s3;

pub use disabled::DisabledStore;
pub use memory::MemoryStore;
pub use s3::S3Store;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("object {0} not found")]
    NotFound(String),

    /// The store is disabled; in relay-only mode nothing may touch it.
    #[error("object store is disabled")]
    Disabled,

    #[error("failed to upload object: {0}")]
    Upload(String),

    #[error("failed to download object: {0}")]
    Download(String),
}

/// One object to write, with the metadata the store keeps alongside it.
#[derive(Debug, Clone)]
pub struct PutRequest {
    pub key: String,
    pub content_type: String,
    pub metadata: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object and return its public location.
    async fn put(&self, request: PutRequest) -> Result<String, BlobError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError>;
}
