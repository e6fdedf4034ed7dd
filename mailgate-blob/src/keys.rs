//! Object key layout, all rooted at the message id:
//!
//! - `<message-id>/mime`: the raw message as received
//! - `<message-id>/text`: the full text body
//! - `<message-id>/html`: the full HTML body
//! - `<message-id>/<disposition>/<content-id>`: one attachment or inline part

#[must_use]
pub fn mime(message_id: &str) -> String {
    format!("{message_id}/mime")
}

#[must_use]
pub fn text(message_id: &str) -> String {
    format!("{message_id}/text")
}

#[must_use]
pub fn html(message_id: &str) -> String {
    format!("{message_id}/html")
}

#[must_use]
pub fn part(message_id: &str, disposition: &str, content_id: &str) -> String {
    format!("{message_id}/{disposition}/{content_id}")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn keys_are_rooted_at_the_message_id() {
        assert_eq!(mime("abc@example.com"), "abc@example.com/mime");
        assert_eq!(text("abc@example.com"), "abc@example.com/text");
        assert_eq!(html("abc@example.com"), "abc@example.com/html");
        assert_eq!(
            part("abc@example.com", "inline", "cid-1"),
            "abc@example.com/inline/cid-1"
        );
    }
}
