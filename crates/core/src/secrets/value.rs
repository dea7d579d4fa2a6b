//! Erasable secret values.

use std::collections::BTreeMap;
use std::fmt;

use secrecy::{ExposeSecret, SecretBox, SecretString};

use crate::constants::REDACTED_MARKER;
use crate::entry::EntryType;

/// Raw secret bytes with a type tag and provider metadata.
///
/// The bytes live in a `secrecy::SecretBox`, which zeroizes them on drop.
/// `erase()` drops them early; afterwards `expose()` returns `None`.
pub struct SecretValue {
    bytes: Option<SecretBox<[u8]>>,
    entry_type: EntryType,
    metadata: BTreeMap<String, String>,
}

impl SecretValue {
    pub fn new(bytes: Vec<u8>, entry_type: EntryType) -> Self {
        Self {
            bytes: Some(SecretBox::new(bytes.into_boxed_slice())),
            entry_type,
            metadata: BTreeMap::new(),
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(text.into().into_bytes(), EntryType::String)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn expose(&self) -> Option<&[u8]> {
        self.bytes.as_ref().map(|bytes| bytes.expose_secret())
    }

    /// The bytes as UTF-8 text, if they are valid UTF-8 and not erased.
    pub fn expose_str(&self) -> Option<&str> {
        self.expose().and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    pub fn to_secret_string(&self) -> Option<SecretString> {
        self.expose_str()
            .map(|text| SecretString::new(text.to_owned().into()))
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn is_erased(&self) -> bool {
        self.bytes.is_none()
    }

    /// Drops (and zeroizes) the bytes. Idempotent.
    pub fn erase(&mut self) {
        self.bytes = None;
    }
}

impl Clone for SecretValue {
    fn clone(&self) -> Self {
        Self {
            bytes: self
                .expose()
                .map(|bytes| SecretBox::new(bytes.to_vec().into_boxed_slice())),
            entry_type: self.entry_type,
            metadata: self.metadata.clone(),
        }
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("type", &self.entry_type)
            .field("bytes", &REDACTED_MARKER)
            .field("erased", &self.is_erased())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_does_not_expose_bytes() {
        let secret = SecretValue::from_text("super-secret-password");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret-password"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_erase_drops_bytes() {
        let mut secret = SecretValue::from_text("abc").with_metadata("version", "3");
        assert_eq!(secret.expose_str(), Some("abc"));

        secret.erase();
        assert!(secret.is_erased());
        assert_eq!(secret.expose(), None);
        assert!(secret.to_secret_string().is_none());
        assert_eq!(secret.metadata().get("version").map(String::as_str), Some("3"));

        secret.erase();
        assert!(secret.is_erased());
    }

    #[test]
    fn test_clone_is_independent_of_erase() {
        let mut original = SecretValue::new(vec![1, 2, 3], EntryType::Bytes);
        let copy = original.clone();
        original.erase();
        assert_eq!(copy.expose(), Some(&[1_u8, 2, 3][..]));
        assert_eq!(copy.entry_type(), EntryType::Bytes);
    }

    #[test]
    fn test_non_utf8_has_no_text_form() {
        let secret = SecretValue::new(vec![0xff, 0xfe], EntryType::Bytes);
        assert!(secret.expose_str().is_none());
        assert!(secret.expose().is_some());
    }
}
