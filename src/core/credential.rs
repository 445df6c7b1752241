//! Opaque credential value.
//!
//! A credential is a secret string valid for the whole run. It is never
//! printed in full: progress output uses [`Credential::masked`], structured
//! logs and reports use [`Credential::fingerprint`].

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

/// Visible prefix length in masked output.
const MASK_PREFIX_LEN: usize = 10;

/// Secrets shorter than this are fully masked.
const MASK_MIN_LEN: usize = 12;

/// An opaque API credential.
///
/// Cheap to clone; equality and hashing use the full secret.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Credential(Arc<str>);

impl Credential {
    /// Wrap a secret string. Surrounding whitespace is trimmed.
    #[must_use]
    pub fn new(secret: impl AsRef<str>) -> Self {
        Self(Arc::from(secret.as_ref().trim()))
    }

    /// The raw secret, for the downstream call only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Prefix form used in progress output, e.g. `AIzaSyAbcd...`.
    #[must_use]
    pub fn masked(&self) -> String {
        if self.0.chars().count() < MASK_MIN_LEN {
            return "***".to_string();
        }
        let prefix: String = self.0.chars().take(MASK_PREFIX_LEN).collect();
        format!("{prefix}...")
    }

    /// First 12 hex chars of the SHA-256 of the secret.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(12);
        hex
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "AIzaSyA1234567890abcdefghijklmnopqrstu";

    #[test]
    fn masked_shows_prefix_only() {
        let cred = Credential::new(KEY);
        assert_eq!(cred.masked(), "AIzaSyA123...");
    }

    #[test]
    fn short_secrets_are_fully_masked() {
        assert_eq!(Credential::new("short").masked(), "***");
    }

    #[test]
    fn debug_and_display_never_leak() {
        let cred = Credential::new(KEY);
        let debug = format!("{cred:?}");
        let display = format!("{cred}");
        assert!(!debug.contains(KEY));
        assert!(!display.contains(KEY));
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = Credential::new(KEY);
        let b = Credential::new(format!("  {KEY}\n"));
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 12);
        assert_ne!(a.fingerprint(), Credential::new("another-secret-value").fingerprint());
    }
}
