use std::time::SystemTime;

use lettre::message::{
    Attachment, Body, Mailbox, MessageBuilder, MultiPart, SinglePart, header::ContentType,
};
use tracing::debug;

use mailgate_blob::{ObjectStore, keys};
use mailgate_common::model::{Disposition, MailMessage, Relation};

use crate::{MimeError, Part, ParsedMessage, header_id};

fn mailbox(relation: &Relation) -> Result<Mailbox, MimeError> {
    let address = relation
        .address
        .parse()
        .map_err(|err| MimeError::Build(format!("bad address {}: {err}", relation.address)))?;

    let name = (!relation.display_name.is_empty()).then(|| relation.display_name.clone());
    Ok(Mailbox::new(name, address))
}

fn content_type(value: &str) -> ContentType {
    ContentType::parse(value)
        .or_else(|_| ContentType::parse("application/octet-stream"))
        .unwrap_or(ContentType::TEXT_PLAIN)
}

fn file_part(
    disposition: Disposition,
    file_name: &str,
    content_id: &str,
    mime_type: &str,
    content: Vec<u8>,
) -> SinglePart {
    let attachment = match disposition {
        Disposition::Inline => Attachment::new_inline(content_id.to_string()),
        Disposition::Attachment => Attachment::new(file_name.to_string()),
    };

    attachment.body(Body::new(content), content_type(mime_type))
}

/// Assemble the body tree: an alternative part for the bodies, wrapped in a
/// mixed part when there are files.
fn assemble(
    builder: MessageBuilder,
    text: &str,
    html: &str,
    files: Vec<SinglePart>,
) -> Result<Vec<u8>, MimeError> {
    let text_part = (!text.trim().is_empty()).then(|| {
        SinglePart::builder()
            .header(ContentType::TEXT_PLAIN)
            .body(text.to_string())
    });
    let html_part = (!html.trim().is_empty()).then(|| {
        SinglePart::builder()
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
    });

    let body = match (text_part, html_part) {
        (Some(text), Some(html)) => MultiPart::alternative().singlepart(text).singlepart(html),
        (Some(part), None) | (None, Some(part)) => MultiPart::mixed().singlepart(part),
        (None, None) => MultiPart::mixed().singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_PLAIN)
                .body(String::new()),
        ),
    };

    let message = if files.is_empty() {
        builder.multipart(body)
    } else {
        let mut mixed = MultiPart::mixed().multipart(body);
        for file in files {
            mixed = mixed.singlepart(file);
        }
        builder.multipart(mixed)
    }
    .map_err(|err| MimeError::Build(err.to_string()))?;

    Ok(message.formatted())
}

/// Re-encode a parsed message for relaying.
///
/// The message is rebuilt from its decoded form, not forwarded raw, so every
/// relayed message leaves in a normalised shape. Existing ids are carried
/// over untouched.
pub fn encode(message: &ParsedMessage) -> Result<Vec<u8>, MimeError> {
    let from = message
        .from
        .as_ref()
        .ok_or_else(|| MimeError::Build("message has no From address".into()))?;

    let mut builder = lettre::Message::builder()
        .from(mailbox(from)?)
        .subject(message.subject.clone())
        .date(SystemTime::from(message.date));

    if !message.message_id.is_empty() {
        builder = builder.message_id(Some(header_id::encode_bare(&message.message_id)));
    }
    if !message.in_reply_to.is_empty() {
        builder = builder.in_reply_to(header_id::encode_bare(&message.in_reply_to));
    }
    if let Some(reply_to) = &message.reply_to {
        builder = builder.reply_to(mailbox(reply_to)?);
    }
    for to in &message.to {
        builder = builder.to(mailbox(to)?);
    }
    for cc in &message.cc {
        builder = builder.cc(mailbox(cc)?);
    }
    for bcc in &message.bcc {
        builder = builder.bcc(mailbox(bcc)?);
    }

    let files = message
        .inlines
        .iter()
        .map(inline_part)
        .chain(message.attachments.iter().map(attachment_part))
        .collect();

    assemble(builder, &message.text, &message.html, files)
}

fn inline_part(part: &Part) -> SinglePart {
    file_part(
        Disposition::Inline,
        &part.file_name,
        &part.content_id,
        &part.content_type,
        part.content.clone(),
    )
}

fn attachment_part(part: &Part) -> SinglePart {
    file_part(
        Disposition::Attachment,
        &part.file_name,
        &part.content_id,
        &part.content_type,
        part.content.clone(),
    )
}

/// Assemble the wire image of an outbound message.
///
/// The message arrives from the backend as metadata plus previews; the full
/// bodies and every file are pulled back out of the object store first.
pub async fn build_outbound(
    store: &dyn ObjectStore,
    message: &MailMessage,
) -> Result<Vec<u8>, MimeError> {
    debug!("Assembling outbound message {}", message.message_id);

    let mut builder = lettre::Message::builder()
        .from(mailbox(&message.from)?)
        .subject(message.subject.clone())
        .date(SystemTime::from(message.date))
        .message_id(Some(header_id::encode_bare(&message.message_id)))
        .in_reply_to(header_id::encode_bare(&message.in_reply_to_id));

    for to in &message.to {
        builder = builder.to(mailbox(to)?);
    }
    for cc in &message.cc {
        builder = builder.cc(mailbox(cc)?);
    }
    for bcc in &message.bcc {
        builder = builder.bcc(mailbox(bcc)?);
    }

    let text = store.get(&keys::text(&message.message_id)).await?;
    let html = store.get(&keys::html(&message.message_id)).await?;

    let mut files = Vec::with_capacity(message.files.len());
    for file in &message.files {
        let key = keys::part(
            &message.message_id,
            file.disposition.as_str(),
            &file.content_id,
        );
        let content = store.get(&key).await?;
        files.push(file_part(
            file.disposition,
            &file.file_name,
            &file.content_id,
            &file.content_type,
            content,
        ));
    }

    assemble(
        builder,
        &String::from_utf8_lossy(&text),
        &String::from_utf8_lossy(&html),
        files,
    )
}
