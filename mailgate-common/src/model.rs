//! Wire model shared between the gateway, the backend API, and the caches.
//!
//! Field names follow the backend's JSON contract exactly; a record fetched
//! from the backend, cached, and fetched again must round-trip byte-for-byte
//! equal in meaning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A routing record for a single mail domain.
///
/// A record with `relay` set is forwarded verbatim to its upstreams; a hosted
/// record has its messages parsed, persisted, and pushed to the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mail {
    #[serde(default)]
    pub id: u64,
    pub host: String,
    #[serde(default)]
    pub relay: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub version: i64,
    #[serde(default, rename = "mail_inboxes", skip_serializing_if = "Vec::is_empty")]
    pub inboxes: Vec<Inbox>,
    #[serde(
        default,
        rename = "mail_upstreams",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub upstreams: Vec<Upstream>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(version: &i64) -> bool {
    *version == 0
}

impl Mail {
    /// The inbox whose address is exactly `address`. Addresses are stored
    /// canonically by the backend, so lookup is a plain string compare.
    #[must_use]
    pub fn inbox_for(&self, address: &str) -> Option<&Inbox> {
        self.inboxes.iter().find(|inbox| inbox.address == address)
    }
}

/// A hosted mailbox within a [`Mail`] domain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbox {
    #[serde(default)]
    pub id: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    pub address: String,
}

/// A relay target within a [`Mail`] domain, tried in ascending `priority`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upstream {
    pub target: String,
    #[serde(default)]
    pub priority: i32,
}

/// A named address, as it appears in message headers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    pub address: String,
}

impl Relation {
    #[must_use]
    pub fn new(display_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            address: address.into(),
        }
    }
}

/// Which part of a MIME message a [`MessageFile`] was cut from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Inline,
    #[default]
    Attachment,
}

impl Disposition {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured message, either parsed from an inbound DATA payload or
/// fetched from the backend's outbound queue.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    #[serde(default, skip_serializing_if = "id_is_unset")]
    pub id: u64,
    #[serde(default, skip_serializing_if = "id_is_unset")]
    pub inbox_id: u64,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub in_reply_to_id: String,
    #[serde(default)]
    pub from: Relation,
    #[serde(default)]
    pub to: Vec<Relation>,
    #[serde(default)]
    pub cc: Vec<Relation>,
    #[serde(default)]
    pub bcc: Vec<Relation>,
    #[serde(default = "Utc::now")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub is_delivered: bool,
    #[serde(default, rename = "mail_message_files")]
    pub files: Vec<MessageFile>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn id_is_unset(id: &u64) -> bool {
    *id == 0
}

impl MailMessage {
    /// Every envelope recipient of this message, in header order.
    #[must_use]
    pub fn recipients(&self) -> Vec<&Relation> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .collect()
    }
}

/// A message part persisted to the object store instead of being carried
/// inline in the [`MailMessage`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFile {
    #[serde(default, skip_serializing_if = "id_is_unset")]
    pub id: u64,
    #[serde(default, skip_serializing_if = "id_is_unset")]
    pub mail_message_id: u64,
    pub disposition: Disposition,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub url: String,
}

/// A delivery failure for one recipient of an outbound message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageError {
    #[serde(default, skip_serializing_if = "id_is_unset")]
    pub id: u64,
    #[serde(default, skip_serializing_if = "id_is_unset")]
    pub mail_message_id: u64,
    pub error: String,
}

impl MessageError {
    #[must_use]
    pub fn new(mail_message_id: u64, error: impl Into<String>) -> Self {
        Self {
            id: 0,
            mail_message_id,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mail_round_trips_through_backend_field_names() {
        let mail = Mail {
            id: 7,
            host: "example.com".into(),
            relay: true,
            version: 3,
            inboxes: vec![Inbox {
                id: 1,
                display_name: "User".into(),
                address: "user@example.com".into(),
            }],
            upstreams: vec![Upstream {
                target: "mx.example.com".into(),
                priority: 10,
            }],
        };

        let json = serde_json::to_string(&mail).unwrap();
        assert!(json.contains("\"mail_inboxes\""));
        assert!(json.contains("\"mail_upstreams\""));

        let back: Mail = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mail);
    }

    #[test]
    fn inbox_lookup_is_exact() {
        let mail = Mail {
            inboxes: vec![Inbox {
                address: "info@example.com".into(),
                ..Inbox::default()
            }],
            ..Mail::default()
        };

        assert!(mail.inbox_for("info@example.com").is_some());
        assert!(mail.inbox_for("INFO@example.com").is_none());
        assert!(mail.inbox_for("other@example.com").is_none());
    }

    #[test]
    fn message_recipients_cover_all_header_lists() {
        let message = MailMessage {
            to: vec![Relation::new("", "to@example.com")],
            cc: vec![Relation::new("", "cc@example.com")],
            bcc: vec![Relation::new("", "bcc@example.com")],
            ..MailMessage::default()
        };

        let recipients: Vec<_> = message
            .recipients()
            .into_iter()
            .map(|relation| relation.address.as_str())
            .collect();
        assert_eq!(
            recipients,
            ["to@example.com", "cc@example.com", "bcc@example.com"]
        );
    }

    #[test]
    fn empty_routing_fields_are_omitted_from_json() {
        let mail = Mail {
            id: 1,
            host: "example.com".into(),
            ..Mail::default()
        };
        let json = serde_json::to_string(&mail).unwrap();
        assert!(!json.contains("version"));
        assert!(!json.contains("mail_inboxes"));
        assert!(!json.contains("mail_upstreams"));
    }
}
