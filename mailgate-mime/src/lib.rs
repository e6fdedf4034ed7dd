//! MIME handling: parsing received payloads, persisting them, and
//! assembling wire images for relay and outbound delivery.

pub mod header_id;

mod build;
mod parse;
mod persist;

use chrono::{DateTime, Utc};

use mailgate_blob::BlobError;
use mailgate_common::model::Relation;

pub use build::{build_outbound, encode};
pub use parse::parse;
pub use persist::persist;

pub const CONTENT_TYPE_MIME: &str = "message/rfc822";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_HTML: &str = "text/html";

/// How much of the text and HTML bodies is carried inline on a
/// [`mailgate_common::model::MailMessage`]; the full bodies live in the
/// object store.
pub const BODY_PREVIEW_CHARS: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum MimeError {
    #[error("failed to parse message: {0}")]
    Parse(#[from] mailparse::MailParseError),

    #[error("failed to assemble message: {0}")]
    Build(String),

    #[error("failed to persist message payload: {0}")]
    Blob(#[from] BlobError),
}

/// A fully decoded message, the common shape between the relay path (which
/// re-encodes it) and the hosted path (which persists it).
#[derive(Debug, Clone, Default)]
pub struct ParsedMessage {
    /// The payload exactly as received.
    pub raw: Vec<u8>,

    pub message_id: String,
    pub in_reply_to: String,

    pub from: Option<Relation>,
    pub reply_to: Option<Relation>,
    pub to: Vec<Relation>,
    pub cc: Vec<Relation>,
    pub bcc: Vec<Relation>,

    pub date: DateTime<Utc>,
    pub subject: String,
    pub text: String,
    pub html: String,

    pub inlines: Vec<Part>,
    pub attachments: Vec<Part>,
}

/// One decoded attachment or inline part.
#[derive(Debug, Clone, Default)]
pub struct Part {
    pub content_type: String,
    pub file_name: String,
    pub content_id: String,
    pub content: Vec<u8>,
}
