//! Derivation of stable, opaque owner identifiers from email addresses.

use sha2::{Digest, Sha256};

/// Compute the `owner_id` for an email address: the lower-cased email's
/// SHA-256 digest, hex-encoded and truncated to 16 characters.
///
/// Deterministic and host-independent, so the same person gets the same
/// `owner_id` on every machine without any shared state or network call.
#[must_use]
pub fn owner_id_from_email(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    let hex = hex_encode(&digest);
    hex[..16].to_owned()
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_email_is_stable() {
        let a = owner_id_from_email("user.a@example.com");
        let b = owner_id_from_email("user.a@example.com");
        assert_eq!(a, b);
    }

    #[test]
    fn is_case_insensitive() {
        assert_eq!(
            owner_id_from_email("User.A@Example.COM"),
            owner_id_from_email("user.a@example.com")
        );
    }

    #[test]
    fn different_emails_differ() {
        assert_ne!(
            owner_id_from_email("user.a@example.com"),
            owner_id_from_email("user.b@example.com")
        );
    }

    #[test]
    fn is_sixteen_hex_chars() {
        let id = owner_id_from_email("x@y.z");
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
