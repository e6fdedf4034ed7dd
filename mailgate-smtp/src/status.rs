use std::fmt::{Display, Formatter};

/// The reply codes this server sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Status {
    ServiceReady = 220,
    GoodBye = 221,
    AuthenticationSucceeded = 235,
    Ok = 250,
    ProvideCredentials = 334,
    StartMailInput = 354,
    ServiceClosing = 421,
    ActionAborted = 451,
    TooManyRecipients = 452,
    SyntaxError = 500,
    InvalidParameters = 501,
    BadSequence = 503,
    UnsupportedMechanism = 504,
    EncryptionRequired = 538,
    MailboxUnavailable = 550,
    ExceededStorage = 552,
    BadMailbox = 553,
}

impl Status {
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Permanent failures tell the client not to retry as-is.
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.code() >= 500
    }

    #[must_use]
    pub const fn is_temporary(self) -> bool {
        self.code() >= 400 && self.code() < 500
    }
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
        write!(fmt, "{}", self.code())
    }
}

/// One complete reply line, ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: Status,
    pub text: String,
}

impl Reply {
    pub fn new(status: Status, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }
}

impl Display for Reply {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
        write!(fmt, "{} {}", self.status, self.text)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn codes_match_the_protocol() {
        assert_eq!(Status::Ok.code(), 250);
        assert_eq!(Status::StartMailInput.code(), 354);
        assert_eq!(Status::BadSequence.code(), 503);
    }

    #[test]
    fn failure_classes_split_at_500() {
        assert!(Status::ActionAborted.is_temporary());
        assert!(!Status::ActionAborted.is_permanent());
        assert!(Status::MailboxUnavailable.is_permanent());
        assert!(!Status::Ok.is_permanent());
    }

    #[test]
    fn replies_format_as_wire_lines() {
        assert_eq!(Reply::new(Status::Ok, "OK").to_string(), "250 OK");
    }
}
