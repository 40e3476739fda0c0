//! Passphrase selection for envelope encryption

use crate::error::{ErrorCategory, ErrorKind, KeystoreError, Result};
use std::fmt;
use zeroize::Zeroizing;

/// Extension identity used when the runtime cannot report one.
pub const FALLBACK_EXTENSION_ID: &str = "prompt-enhancer-extension";

/// Suffix appended to the extension identity to form the implicit passphrase.
const IMPLICIT_SUFFIX: &str = "-encryption-key-2024";

/// Where the passphrase for key derivation comes from.
#[derive(Clone)]
pub enum PassphraseSource {
    /// A caller-supplied passphrase. Must not be empty.
    Explicit(Zeroizing<String>),

    /// A passphrase derived deterministically from the extension identity.
    ///
    /// This only keeps the credential from sitting in storage as readable
    /// text. Anyone who can run code in the browser profile can rebuild this
    /// passphrase from public extension metadata and decrypt every envelope.
    ImplicitFromExtensionId(String),
}

impl PassphraseSource {
    pub fn explicit(passphrase: impl Into<String>) -> Self {
        PassphraseSource::Explicit(Zeroizing::new(passphrase.into()))
    }

    /// An empty identity falls back to [`FALLBACK_EXTENSION_ID`].
    pub fn implicit(extension_id: impl Into<String>) -> Self {
        PassphraseSource::ImplicitFromExtensionId(extension_id.into())
    }

    /// Produce the passphrase bytes handed to key derivation.
    pub fn resolve(&self) -> Result<Zeroizing<Vec<u8>>> {
        match self {
            PassphraseSource::Explicit(passphrase) => {
                if passphrase.is_empty() {
                    return Err(KeystoreError::with_kind(
                        ErrorCategory::User,
                        ErrorKind::PassphraseUnavailable,
                        "explicit passphrase must not be empty",
                    ));
                }
                Ok(Zeroizing::new(passphrase.as_bytes().to_vec()))
            }
            PassphraseSource::ImplicitFromExtensionId(extension_id) => {
                let id = if extension_id.is_empty() {
                    FALLBACK_EXTENSION_ID
                } else {
                    extension_id.as_str()
                };
                Ok(Zeroizing::new(
                    format!("{}{}", id, IMPLICIT_SUFFIX).into_bytes(),
                ))
            }
        }
    }
}

impl Default for PassphraseSource {
    fn default() -> Self {
        PassphraseSource::ImplicitFromExtensionId(FALLBACK_EXTENSION_ID.to_string())
    }
}

// Never print explicit passphrases.
impl fmt::Debug for PassphraseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassphraseSource::Explicit(_) => f.write_str("Explicit(<redacted>)"),
            PassphraseSource::ImplicitFromExtensionId(id) => f
                .debug_tuple("ImplicitFromExtensionId")
                .field(id)
                .finish(),
        }
    }
}
