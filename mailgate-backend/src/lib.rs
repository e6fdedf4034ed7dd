//! Client for the backend mail API.
//!
//! The backend owns all durable state: which domains exist, their inboxes and
//! upstreams, and the message queues. The gateway talks to four endpoints,
//! authenticated with a shared secret in the `Authorization` header:
//!
//! - `GET  /mails/{host}`: look up the routing record for one domain
//! - `POST /mails/refresh`: exchange cached versions for changed records
//! - `POST /smtp/inbound`: hand over a received message
//! - `POST /smtp/outbound`: drain the outbound queue

pub mod http;
pub mod testing;
mod types;

use std::collections::HashMap;

use mailgate_common::model::{Mail, MailMessage};

pub use http::HttpBackend;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered, but with `success: false`.
    #[error("backend refused request: {0}")]
    Api(String),
}

#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// The routing record for `host`, or `None` when the backend does not
    /// know the domain.
    async fn mail_by_host(&self, host: &str) -> Result<Option<Mail>, BackendError>;

    /// Exchange the cached `{id: version}` map for every record that has
    /// changed since those versions.
    async fn refresh_mails(&self, versions: &HashMap<u64, i64>) -> Result<Vec<Mail>, BackendError>;

    /// Hand a received message over to the backend for storage.
    async fn push_inbound(&self, message: &MailMessage) -> Result<(), BackendError>;

    /// Drain the backend's outbound queue.
    async fn pull_outbound(&self) -> Result<Vec<MailMessage>, BackendError>;
}
