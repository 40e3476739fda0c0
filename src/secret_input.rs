//! Reading secret values and passphrases without putting them on a command line

use crate::error::{ErrorCategory, ErrorKind, KeystoreError, Result};
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

/// Trait for reading a secret from some source
pub trait SecretReader {
    /// Read the secret as raw bytes.
    ///
    /// Returns the secret wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_secret(&mut self) -> Result<Zeroizing<Vec<u8>>>;

    /// Read the secret as UTF-8 text with surrounding whitespace (including
    /// the trailing newline of piped input) removed.
    fn read_secret_text(&mut self) -> Result<Zeroizing<String>> {
        let raw = self.read_secret()?;
        let text = std::str::from_utf8(&raw).map_err(|e| {
            KeystoreError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::InvalidUtf8,
                "secret input is not valid UTF-8",
                e,
            )
        })?;
        Ok(Zeroizing::new(text.trim().to_string()))
    }
}

/// Returns a fixed secret (for testing)
pub struct ConstantSecretReader {
    secret: Zeroizing<Vec<u8>>,
}

impl ConstantSecretReader {
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret: Zeroizing::new(secret),
        }
    }
}

impl SecretReader for ConstantSecretReader {
    fn read_secret(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.secret).clone()))
    }
}

/// Reads a secret from any io::Read source
pub struct ReaderSecretReader {
    reader: Box<dyn Read>,
}

impl ReaderSecretReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl SecretReader for ReaderSecretReader {
    fn read_secret(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            KeystoreError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading secret: {}", e),
                e,
            )
        })?;
        Ok(data)
    }
}

/// Reads a secret from the terminal with no echo
pub struct TerminalSecretReader {
    prompt: String,
}

impl TerminalSecretReader {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

impl SecretReader for TerminalSecretReader {
    /// Note: Terminal input is limited to UTF-8 due to rpassword library constraints.
    fn read_secret(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(KeystoreError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "cannot read secret from terminal - stdin is not a terminal",
            ));
        }

        let mut stderr = io::stderr();
        stderr
            .write_all(self.prompt.as_bytes())
            .and_then(|()| stderr.flush())
            .map_err(|e| {
                KeystoreError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    format!("failed to write prompt: {}", e),
                    e,
                )
            })?;

        // rpassword returns a plain String; move it into a zeroizing buffer right away.
        let secret = rpassword::read_password().map_err(|e| {
            KeystoreError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PassphraseUnavailable,
                format!("failure reading secret: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(secret.into_bytes()))
    }
}
