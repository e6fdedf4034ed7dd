//! Lightweight address handling.
//!
//! The gateway never enforces full RFC 5321 syntax. Routing only needs the
//! domain portion of an address, so validation is limited to the shape that
//! routing requires and everything else is left to the receiving system.

/// Whether an address is usable for routing.
///
/// An address is rejected when it has no `@`, or when the last `@` is the
/// first character (an empty local part).
#[must_use]
pub fn is_valid(address: &str) -> bool {
    address.rfind('@').is_some_and(|at| at > 0)
}

/// The domain portion of an address, i.e. everything after the last `@`.
///
/// Returns `None` for addresses [`is_valid`] would reject and for addresses
/// with an empty domain.
#[must_use]
pub fn domain(address: &str) -> Option<&str> {
    let at = address.rfind('@').filter(|at| *at > 0)?;
    let domain = &address[at + 1..];
    (!domain.is_empty()).then_some(domain)
}

/// Normalised form of a host for use in cache keys: trimmed and lowercased.
#[must_use]
pub fn normalize_host(host: &str) -> String {
    host.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_addresses_are_valid() {
        assert!(is_valid("user@example.com"));
        assert!(is_valid("a@b"));
    }

    #[test]
    fn addresses_without_local_part_or_domain_marker_are_invalid() {
        assert!(!is_valid("userexample.com"));
        assert!(!is_valid("@example.com"));
        assert!(!is_valid(""));
    }

    #[test]
    fn domain_is_everything_after_the_last_at() {
        assert_eq!(domain("user@example.com"), Some("example.com"));
        assert_eq!(domain("weird@quoted@example.com"), Some("example.com"));
        assert_eq!(domain("user@"), None);
        assert_eq!(domain("@example.com"), None);
        assert_eq!(domain("nodomain"), None);
    }

    #[test]
    fn hosts_normalize_case_and_whitespace() {
        assert_eq!(normalize_host(" Example.COM "), "example.com");
        assert_eq!(normalize_host("already.lower"), "already.lower");
    }
}
