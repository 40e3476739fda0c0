//! Text armoring for envelopes
//!
//! Envelopes are stored as standard base64 (RFC 4648 alphabet, with
//! padding), which is what the extension's settings storage has always
//! held. There is no version prefix: the record's `encrypted` flag is the
//! only marker distinguishing an envelope from a plain value.
//!
//! Values written before encryption was introduced were base64 produced by
//! the browser's `btoa`, and are decoded with the forgiving rules of `atob`
//! (see [`unwrap_legacy`]).

use crate::error::{ErrorCategory, ErrorKind, KeystoreError, Result};
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

/// Padding-indifferent engine for `atob`-style input, which may omit the
/// trailing `=` and carry non-zero trailing bits. Partial padding is
/// rejected separately in [`unwrap_legacy`].
const LEGACY: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Wrap bytes in armor, returning the armored string
pub fn wrap(body: &[u8]) -> String {
    STANDARD.encode(body)
}

/// Unwrap an armored string, returning the original bytes
pub fn unwrap(armored: &str) -> Result<Vec<u8>> {
    STANDARD.decode(armored).map_err(|e| {
        KeystoreError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::ArmoringDecode,
            format!("base64 decoding failed: {}", e),
            e,
        )
    })
}

/// Decode a legacy plain value the way `atob` would.
///
/// ASCII whitespace is stripped before decoding. Padding may be left off
/// entirely, but padded input must come out to a multiple of four.
pub fn unwrap_legacy(encoded: &str) -> Result<Vec<u8>> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if compact.contains('=') && compact.len() % 4 != 0 {
        return Err(KeystoreError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArmoringDecode,
            "legacy base64 has incomplete padding",
        ));
    }
    LEGACY.decode(compact.as_bytes()).map_err(|e| {
        KeystoreError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::ArmoringDecode,
            format!("legacy base64 decoding failed: {}", e),
            e,
        )
    })
}
