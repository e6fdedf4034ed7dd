use tracing::debug;

use mailgate_blob::{ObjectStore, PutRequest, keys};
use mailgate_common::model::{Disposition, MailMessage, MessageFile};

use crate::{
    BODY_PREVIEW_CHARS, CONTENT_TYPE_HTML, CONTENT_TYPE_MIME, CONTENT_TYPE_TEXT, MimeError, Part,
    ParsedMessage,
};

fn preview(body: &str) -> String {
    body.char_indices()
        .nth(BODY_PREVIEW_CHARS)
        .map_or_else(|| body.to_string(), |(end, _)| body[..end].to_string())
}

/// Persist a parsed message for a hosted inbox.
///
/// The raw image and the full bodies go to the object store, as does every
/// attachment and inline part; what comes back is the [`MailMessage`] the
/// backend stores, carrying body previews and file references only.
pub async fn persist(
    store: &dyn ObjectStore,
    message: &ParsedMessage,
    inbox_id: u64,
) -> Result<MailMessage, MimeError> {
    debug!("Persisting message {}", message.message_id);

    let mut stored = MailMessage {
        inbox_id,
        message_id: message.message_id.clone(),
        in_reply_to_id: message.in_reply_to.clone(),
        from: message.from.clone().unwrap_or_default(),
        to: message.to.clone(),
        cc: message.cc.clone(),
        bcc: message.bcc.clone(),
        date: message.date,
        subject: message.subject.clone(),
        text: preview(&message.text),
        html: preview(&message.html),
        ..MailMessage::default()
    };

    let id_metadata = vec![("Message-Id".to_string(), message.message_id.clone())];

    store
        .put(PutRequest {
            key: keys::mime(&message.message_id),
            content_type: CONTENT_TYPE_MIME.into(),
            metadata: id_metadata.clone(),
            body: message.raw.clone(),
        })
        .await?;

    store
        .put(PutRequest {
            key: keys::text(&message.message_id),
            content_type: CONTENT_TYPE_TEXT.into(),
            metadata: id_metadata.clone(),
            body: message.text.clone().into_bytes(),
        })
        .await?;

    store
        .put(PutRequest {
            key: keys::html(&message.message_id),
            content_type: CONTENT_TYPE_HTML.into(),
            metadata: id_metadata,
            body: message.html.clone().into_bytes(),
        })
        .await?;

    for (disposition, part) in parts(message) {
        stored
            .files
            .push(persist_part(store, &message.message_id, disposition, part).await?);
    }

    Ok(stored)
}

fn parts(message: &ParsedMessage) -> impl Iterator<Item = (Disposition, &Part)> {
    message
        .inlines
        .iter()
        .map(|part| (Disposition::Inline, part))
        .chain(
            message
                .attachments
                .iter()
                .map(|part| (Disposition::Attachment, part)),
        )
}

async fn persist_part(
    store: &dyn ObjectStore,
    message_id: &str,
    disposition: Disposition,
    part: &Part,
) -> Result<MessageFile, MimeError> {
    let key = keys::part(message_id, disposition.as_str(), &part.content_id);

    let url = store
        .put(PutRequest {
            key: key.clone(),
            content_type: part.content_type.clone(),
            metadata: vec![
                ("Message-Id".to_string(), message_id.to_string()),
                ("Content-Id".to_string(), part.content_id.clone()),
                ("Content-Disposition".to_string(), disposition.to_string()),
            ],
            body: part.content.clone(),
        })
        .await?;

    Ok(MessageFile {
        disposition,
        file_name: part.file_name.clone(),
        content_id: part.content_id.clone(),
        content_type: part.content_type.clone(),
        key,
        url,
        ..MessageFile::default()
    })
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use mailgate_blob::MemoryStore;
    use mailgate_common::model::Relation;

    use super::*;

    fn message() -> ParsedMessage {
        ParsedMessage {
            raw: b"raw mime image".to_vec(),
            message_id: "msg-1".into(),
            in_reply_to: "parent-1".into(),
            from: Some(Relation::new("Alice", "alice@example.com")),
            to: vec![Relation::new("", "bob@hosted.test")],
            date: Utc::now(),
            subject: "Stored".into(),
            text: "text body".into(),
            html: "<p>html body</p>".into(),
            inlines: vec![Part {
                content_type: "image/png".into(),
                file_name: "pixel.png".into(),
                content_id: "cid-1".into(),
                content: b"png".to_vec(),
            }],
            attachments: vec![Part {
                content_type: "application/pdf".into(),
                file_name: "doc.pdf".into(),
                content_id: "cid-2".into(),
                content: b"%PDF".to_vec(),
            }],
            ..ParsedMessage::default()
        }
    }

    #[tokio::test]
    async fn payloads_land_under_the_message_id() {
        let store = MemoryStore::new();
        let stored = persist(&store, &message(), 42).await.unwrap();

        assert_eq!(stored.inbox_id, 42);
        assert_eq!(stored.message_id, "msg-1");
        assert_eq!(stored.in_reply_to_id, "parent-1");
        assert_eq!(stored.text, "text body");

        assert_eq!(store.get("msg-1/mime").await.unwrap(), b"raw mime image");
        assert_eq!(store.get("msg-1/text").await.unwrap(), b"text body");
        assert_eq!(store.get("msg-1/html").await.unwrap(), b"<p>html body</p>");
        assert_eq!(store.get("msg-1/inline/cid-1").await.unwrap(), b"png");
        assert_eq!(store.get("msg-1/attachment/cid-2").await.unwrap(), b"%PDF");
    }

    #[tokio::test]
    async fn file_references_point_at_stored_objects() {
        let store = MemoryStore::new();
        let stored = persist(&store, &message(), 42).await.unwrap();

        assert_eq!(stored.files.len(), 2);

        let inline = &stored.files[0];
        assert_eq!(inline.disposition, Disposition::Inline);
        assert_eq!(inline.key, "msg-1/inline/cid-1");
        assert_eq!(inline.url, "memory://msg-1/inline/cid-1");

        let attachment = &stored.files[1];
        assert_eq!(attachment.disposition, Disposition::Attachment);
        assert_eq!(attachment.file_name, "doc.pdf");
        assert_eq!(attachment.key, "msg-1/attachment/cid-2");
    }

    #[tokio::test]
    async fn long_bodies_are_truncated_to_previews() {
        let store = MemoryStore::new();
        let mut long = message();
        long.text = "x".repeat(1000);

        let stored = persist(&store, &long, 1).await.unwrap();

        assert_eq!(stored.text.len(), BODY_PREVIEW_CHARS);
        // The store keeps the full body even though the record carries a
        // preview.
        assert_eq!(store.get("msg-1/text").await.unwrap().len(), 1000);
    }
}
