use chrono::{DateTime, Utc};
use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail};

use mailgate_common::model::Relation;

use crate::{MimeError, Part, ParsedMessage, header_id};

/// Decode a raw DATA payload into a [`ParsedMessage`].
///
/// Header problems are tolerated: an unparseable address list or date is
/// dropped rather than failing the whole message. Only a structurally
/// broken MIME tree is an error.
pub fn parse(raw: &[u8]) -> Result<ParsedMessage, MimeError> {
    let mail = mailparse::parse_mail(raw)?;

    let mut message = ParsedMessage {
        raw: raw.to_vec(),
        message_id: header_id::decode(
            &mail
                .headers
                .get_first_value("Message-Id")
                .unwrap_or_default(),
        ),
        in_reply_to: header_id::decode(
            &mail
                .headers
                .get_first_value("In-Reply-To")
                .unwrap_or_default(),
        ),
        from: first_relation(&mail, "From"),
        reply_to: first_relation(&mail, "Reply-To"),
        to: relations(&mail, "To"),
        cc: relations(&mail, "Cc"),
        bcc: relations(&mail, "Bcc"),
        date: date(&mail),
        subject: mail.headers.get_first_value("Subject").unwrap_or_default(),
        ..ParsedMessage::default()
    };

    collect(&mail, &mut message)?;

    Ok(message)
}

fn date(mail: &ParsedMail<'_>) -> DateTime<Utc> {
    mail.headers
        .get_first_value("Date")
        .and_then(|value| mailparse::dateparse(&value).ok())
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        .unwrap_or_else(Utc::now)
}

fn relations(mail: &ParsedMail<'_>, header: &str) -> Vec<Relation> {
    let Some(value) = mail.headers.get_first_value(header) else {
        return Vec::new();
    };

    let Ok(list) = mailparse::addrparse(&value) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for addr in list.iter() {
        match addr {
            MailAddr::Single(single) => out.push(Relation {
                display_name: single.display_name.clone().unwrap_or_default(),
                address: single.addr.clone(),
            }),
            MailAddr::Group(group) => out.extend(group.addrs.iter().map(|single| Relation {
                display_name: single.display_name.clone().unwrap_or_default(),
                address: single.addr.clone(),
            })),
        }
    }

    out
}

fn first_relation(mail: &ParsedMail<'_>, header: &str) -> Option<Relation> {
    relations(mail, header).into_iter().next()
}

/// Walk the MIME tree, filling in bodies and cutting out parts.
///
/// The first bare `text/plain` and `text/html` leaves become the bodies;
/// leaves with an attachment disposition become attachments; any other leaf
/// carrying a content id or file name becomes an inline part.
fn collect(part: &ParsedMail<'_>, message: &mut ParsedMessage) -> Result<(), MimeError> {
    let mimetype = part.ctype.mimetype.to_ascii_lowercase();

    if mimetype.starts_with("multipart/") {
        for sub in &part.subparts {
            collect(sub, message)?;
        }
        return Ok(());
    }

    let disposition = part.get_content_disposition();
    let content_id = part
        .headers
        .get_first_value("Content-ID")
        .map(|value| {
            value
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
        .unwrap_or_default();
    let file_name = disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .cloned()
        .unwrap_or_default();

    if disposition.disposition == DispositionType::Attachment {
        message.attachments.push(Part {
            content_type: mimetype,
            file_name,
            content_id,
            content: part.get_body_raw()?,
        });
        return Ok(());
    }

    let is_bare_body = content_id.is_empty() && file_name.is_empty();
    if mimetype == "text/plain" && is_bare_body && message.text.is_empty() {
        message.text = part.get_body()?;
    } else if mimetype == "text/html" && is_bare_body && message.html.is_empty() {
        message.html = part.get_body()?;
    } else if !is_bare_body {
        message.inlines.push(Part {
            content_type: mimetype,
            file_name,
            content_id,
            content: part.get_body_raw()?,
        });
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    const SIMPLE: &str = "Message-Id: <abc@example.com>\r\n\
        In-Reply-To: <parent@example.com>\r\n\
        From: Alice <alice@example.com>\r\n\
        To: Bob <bob@example.com>, carol@example.com\r\n\
        Cc: dave@example.com\r\n\
        Date: Mon, 23 Dec 2024 10:15:00 +0000\r\n\
        Subject: Greetings\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        Hello there\r\n";

    #[test]
    fn plain_messages_parse() {
        let message = parse(SIMPLE.as_bytes()).unwrap();

        assert_eq!(message.message_id, "abc@example.com");
        assert_eq!(message.in_reply_to, "parent@example.com");
        assert_eq!(
            message.from,
            Some(Relation::new("Alice", "alice@example.com"))
        );
        assert_eq!(message.to.len(), 2);
        assert_eq!(message.to[1].address, "carol@example.com");
        assert_eq!(message.cc.len(), 1);
        assert_eq!(message.subject, "Greetings");
        assert_eq!(message.text.trim(), "Hello there");
        assert_eq!(message.date.to_rfc3339(), "2024-12-23T10:15:00+00:00");
        assert_eq!(message.raw, SIMPLE.as_bytes());
    }

    #[test]
    fn multipart_bodies_and_attachments_are_separated() {
        let raw = "From: alice@example.com\r\n\
            Subject: Mixed\r\n\
            MIME-Version: 1.0\r\n\
            Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
            \r\n\
            --outer\r\n\
            Content-Type: multipart/alternative; boundary=\"inner\"\r\n\
            \r\n\
            --inner\r\n\
            Content-Type: text/plain\r\n\
            \r\n\
            plain body\r\n\
            --inner\r\n\
            Content-Type: text/html\r\n\
            \r\n\
            <p>html body</p>\r\n\
            --inner--\r\n\
            --outer\r\n\
            Content-Type: image/png; name=\"pixel.png\"\r\n\
            Content-Disposition: inline\r\n\
            Content-ID: <pixel-1>\r\n\
            Content-Transfer-Encoding: base64\r\n\
            \r\n\
            aGVsbG8=\r\n\
            --outer\r\n\
            Content-Type: application/pdf\r\n\
            Content-Disposition: attachment; filename=\"doc.pdf\"\r\n\
            Content-Transfer-Encoding: base64\r\n\
            \r\n\
            JVBERg==\r\n\
            --outer--\r\n";

        let message = parse(raw.as_bytes()).unwrap();

        assert_eq!(message.text.trim(), "plain body");
        assert_eq!(message.html.trim(), "<p>html body</p>");

        assert_eq!(message.inlines.len(), 1);
        assert_eq!(message.inlines[0].content_id, "pixel-1");
        assert_eq!(message.inlines[0].file_name, "pixel.png");
        assert_eq!(message.inlines[0].content, b"hello");

        assert_eq!(message.attachments.len(), 1);
        assert_eq!(message.attachments[0].file_name, "doc.pdf");
        assert_eq!(message.attachments[0].content_type, "application/pdf");
        assert_eq!(message.attachments[0].content, b"%PDF");
    }

    #[test]
    fn missing_headers_become_defaults() {
        let message = parse(b"Content-Type: text/plain\r\n\r\nbody\r\n").unwrap();

        assert!(message.message_id.is_empty());
        assert!(message.from.is_none());
        assert!(message.to.is_empty());
        assert!(message.subject.is_empty());
        assert_eq!(message.text.trim(), "body");
    }

    #[test]
    fn escaped_message_ids_are_decoded() {
        let raw = "Message-Id: <weird%20id@example.com>\r\n\
            Content-Type: text/plain\r\n\r\nbody\r\n";
        let message = parse(raw.as_bytes()).unwrap();

        assert_eq!(message.message_id, "weird id@example.com");
    }
}
