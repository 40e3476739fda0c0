use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example, caused by corrupt synced data - merely
    /// that it cannot be confidently determined by the code.
    Internal,

    /// The caller provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Base64 decoding of the envelope text failed.
    ArmoringDecode,
    /// Envelope ended before the salt or nonce could be read.
    TruncatedInput,
    /// Authentication failed due to an incorrect passphrase, tampering
    /// or corruption.
    AuthenticationFailed,
    /// AES-GCM rejected the operation for reasons other than authentication.
    CipherFailure,
    /// Decrypted payload is not valid UTF-8.
    InvalidUtf8,
    /// Passphrase could not be obtained, or was empty.
    PassphraseUnavailable,
    /// The settings storage rejected a read, write, or delete.
    StorageFailure,
    /// A secure-namespace entry does not have the expected record shape.
    MalformedRecord,
    /// A regular setting name falls inside the secure namespace.
    NamespaceCollision,
    /// Store configuration is unusable.
    InvalidConfig,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
    /// Unexpected state reached within saltkeep logic.
    InternalInvariant,
}

impl ErrorKind {
    /// Whether this kind belongs to the "value unavailable" class produced by
    /// envelope decoding and decryption.
    pub fn is_crypto_failure(self) -> bool {
        matches!(
            self,
            ErrorKind::ArmoringDecode
                | ErrorKind::TruncatedInput
                | ErrorKind::AuthenticationFailed
                | ErrorKind::CipherFailure
                | ErrorKind::InvalidUtf8
        )
    }
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct KeystoreError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl KeystoreError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that retains the originating source error.
    pub fn with_source(
        category: ErrorCategory,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: None,
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Shorthand for a substrate failure, which is always attributed to the
    /// environment rather than the caller.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorCategory::Internal, ErrorKind::StorageFailure, msg)
    }

    /// The message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// True when the error means "the stored value cannot be recovered"
    /// rather than "the operation could not run".
    pub fn is_crypto_failure(&self) -> bool {
        self.kind.is_some_and(ErrorKind::is_crypto_failure)
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, KeystoreError>;
