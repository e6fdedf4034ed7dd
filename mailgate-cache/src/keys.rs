//! Cache key layout.
//!
//! - `known:<host>`: `"true"` / `"false"`, is the domain known to the backend
//! - `mail:<host>`: the routing record, as JSON

use mailgate_common::address::normalize_host;

#[must_use]
pub fn known(host: &str) -> String {
    format!("known:{}", normalize_host(host))
}

#[must_use]
pub fn mail(host: &str) -> String {
    format!("mail:{}", normalize_host(host))
}

/// Pattern matching every cached routing record.
#[must_use]
pub fn all_mails() -> &'static str {
    "mail:*"
}
