//! Envelope encryption using PBKDF2-HMAC-SHA256 + AES-256-GCM
//!
//! This module implements passphrase-based encryption using:
//! - PBKDF2 with HMAC-SHA256 for key derivation from passphrase
//! - AES-256-GCM for authenticated encryption
//!
//! The binary envelope format is:
//! - salt: 16 bytes
//! - nonce: 12 bytes
//! - ciphertext: variable length, followed by the 16-byte GCM tag
//!
//! Envelopes are stored as standard base64 (see [`crate::armor`]). All
//! sizes and the iteration count below are part of the stored format;
//! changing any of them makes existing envelopes unreadable.

use crate::armor;
use crate::error::{ErrorCategory, ErrorKind, KeystoreError, Result};
use crate::passphrase::PassphraseSource;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 12;

/// Length of derived key in bytes
pub const KEY_LEN: usize = 32;

/// Length of the GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Smallest decoded length accepted as "probably an envelope".
///
/// This is salt + nonce + 4 and predates the tag being counted. A real
/// envelope is never shorter than 44 bytes, but the floor stays at 32 so
/// that the structural check keeps accepting everything it always has.
pub const MIN_ENVELOPE_LEN: usize = 32;

/// Derive a 32-byte key from a passphrase and salt using PBKDF2-HMAC-SHA256
pub fn derive_key(passphrase: &[u8], salt: &[u8; SALT_LEN]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    if passphrase.is_empty() {
        return Err(KeystoreError::with_kind(
            ErrorCategory::User,
            ErrorKind::PassphraseUnavailable,
            "refusing to derive a key from an empty passphrase",
        ));
    }

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(passphrase, salt, PBKDF2_ITERATIONS, &mut *key);

    Ok(key)
}

/// Encrypt a string with a random salt and nonce, returning the armored envelope
pub fn encrypt(plaintext: &str, passphrase: &PassphraseSource) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let passphrase = passphrase.resolve()?;
    let sealed = seal(&passphrase, plaintext.as_bytes(), &salt, &nonce)?;
    Ok(armor::wrap(&sealed))
}

/// Encrypt a string using the provided salt and nonce
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates random salt/nonce.
pub fn encrypt_deterministic(
    plaintext: &str,
    passphrase: &PassphraseSource,
    salt: &[u8; SALT_LEN],
    nonce: &[u8; NONCE_LEN],
) -> Result<String> {
    let passphrase = passphrase.resolve()?;
    let sealed = seal(&passphrase, plaintext.as_bytes(), salt, nonce)?;
    Ok(armor::wrap(&sealed))
}

/// Decrypt an armored envelope back into the original string
pub fn decrypt(envelope: &str, passphrase: &PassphraseSource) -> Result<Zeroizing<String>> {
    let body = armor::unwrap(envelope).map_err(|e| e.with_context("failed to unarmor envelope"))?;
    let passphrase = passphrase.resolve()?;
    let plaintext = open(&passphrase, &body)?;

    // from_utf8 reuses the buffer, so there is only ever one copy to wipe.
    match String::from_utf8(plaintext) {
        Ok(text) => Ok(Zeroizing::new(text)),
        Err(e) => {
            drop(Zeroizing::new(e.into_bytes()));
            Err(KeystoreError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InvalidUtf8,
                "decrypted payload is not valid UTF-8",
            ))
        }
    }
}

/// Cheap structural check: valid base64 that decodes to at least
/// [`MIN_ENVELOPE_LEN`] bytes. Says nothing about whether the tag verifies.
pub fn is_valid_envelope(text: &str) -> bool {
    armor::unwrap(text).is_ok_and(|body| body.len() >= MIN_ENVELOPE_LEN)
}

fn seal(
    passphrase: &[u8],
    plaintext: &[u8],
    salt: &[u8; SALT_LEN],
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>> {
    let key = derive_key(passphrase, salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));

    let sealed_box = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| {
            KeystoreError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::CipherFailure,
                "AES-GCM refused to encrypt",
            )
        })?;

    let mut output = Vec::with_capacity(SALT_LEN + NONCE_LEN + sealed_box.len());
    output.extend_from_slice(salt);
    output.extend_from_slice(nonce);
    output.extend_from_slice(&sealed_box);

    Ok(output)
}

fn open(passphrase: &[u8], body: &[u8]) -> Result<Vec<u8>> {
    if body.len() < SALT_LEN {
        return Err(truncated("input likely truncated while reading salt"));
    }
    let (salt, rest) = body.split_at(SALT_LEN);

    if rest.len() < NONCE_LEN {
        return Err(truncated("input likely truncated while reading nonce"));
    }
    let (nonce, sealed_box) = rest.split_at(NONCE_LEN);

    let salt: &[u8; SALT_LEN] = salt.try_into().map_err(|_| {
        KeystoreError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "salt slice has unexpected length",
        )
    })?;

    let key = derive_key(passphrase, salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed_box)
        .map_err(|_| {
            KeystoreError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                "corrupt input, tampered-with data, or bad passphrase",
            )
        })
}

fn truncated(msg: &str) -> KeystoreError {
    KeystoreError::with_kind(ErrorCategory::User, ErrorKind::TruncatedInput, msg)
}
