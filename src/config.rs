//! Store configuration

use crate::error::{ErrorCategory, ErrorKind, KeystoreError, Result};

/// Prefix the extension has always used for the secure namespace.
pub const DEFAULT_SECURE_PREFIX: &str = "pe_secure_";

/// Settings that shape how a [`crate::store::SecureKeyStore`] lays out its keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    secure_prefix: String,
}

impl StoreConfig {
    /// Build a config with a custom namespace prefix.
    ///
    /// The prefix must be non-empty and contain no whitespace. It also must
    /// not be the start of any regular setting name; the store enforces that
    /// part at write time.
    pub fn new(secure_prefix: impl Into<String>) -> Result<Self> {
        let secure_prefix = secure_prefix.into();
        if secure_prefix.is_empty() {
            return Err(KeystoreError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidConfig,
                "secure namespace prefix must not be empty",
            ));
        }
        if secure_prefix.chars().any(char::is_whitespace) {
            return Err(KeystoreError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidConfig,
                format!("secure namespace prefix {:?} contains whitespace", secure_prefix),
            ));
        }
        Ok(Self { secure_prefix })
    }

    pub fn secure_prefix(&self) -> &str {
        &self.secure_prefix
    }

    /// Storage key for a secret-classified name.
    pub fn secure_key(&self, name: &str) -> String {
        format!("{}{}", self.secure_prefix, name)
    }

    /// Inverse of [`StoreConfig::secure_key`]; `None` for regular keys.
    pub fn secure_name<'a>(&self, storage_key: &'a str) -> Option<&'a str> {
        storage_key.strip_prefix(self.secure_prefix.as_str())
    }

    pub fn is_secure_key(&self, storage_key: &str) -> bool {
        storage_key.starts_with(self.secure_prefix.as_str())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            secure_prefix: DEFAULT_SECURE_PREFIX.to_string(),
        }
    }
}
