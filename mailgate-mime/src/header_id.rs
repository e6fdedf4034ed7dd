//! Codec for the `Message-Id` and `In-Reply-To` header values.
//!
//! The backend stores message ids in their decoded form. On the wire they
//! are percent-encoded and wrapped in angle brackets, except that `@` is
//! kept literal so the value still reads as an id to other mail software.

/// Decode a wire header value into the stored form.
///
/// Empty input stays empty. Undecodable input is kept as-is rather than
/// dropped, so an id is never lost to a malformed escape.
#[must_use]
pub fn decode(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let bare = value.trim_start_matches('<').trim_end_matches('>');
    match urlencoding::decode(bare) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => bare.to_string(),
    }
}

/// Encode a stored id into a bracketed wire header value.
///
/// The empty id encodes to `<>`.
#[must_use]
pub fn encode(value: &str) -> String {
    format!("<{}>", encode_bare(value))
}

/// [`encode`] without the angle brackets, for header builders that add
/// their own.
#[must_use]
pub fn encode_bare(value: &str) -> String {
    urlencoding::encode(value).replace("%40", "@")
}
