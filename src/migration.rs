//! One-time pickup of values written before secrets were encrypted
//!
//! Early releases kept the product key as plain base64 (`btoa`) under its
//! own name. Loading settings probes for such a value and moves it into the
//! secure track.

use crate::armor;
use crate::storage::SettingsStorage;
use crate::store::SecureKeyStore;
use serde_json::Value;
use tracing::{debug, error, info};
use zeroize::Zeroizing;

/// Migrate a legacy base64 value stored in plain under `name`.
///
/// Only a non-empty string that decodes as base64 into non-empty UTF-8 text
/// is eligible; the decoded text becomes the secret and the plain entry is
/// deleted. Anything else is left alone. Failures are logged and reported as
/// `false`: a broken migration must never stop settings from loading.
pub async fn auto_migrate_legacy<S: SettingsStorage>(store: &SecureKeyStore<S>, name: &str) -> bool {
    let Some(Value::String(encoded)) = store.get_regular(name).await else {
        return false;
    };
    let encoded = Zeroizing::new(encoded);

    let Some(decoded) = decode_legacy(&encoded) else {
        debug!("plain value for key {} is not legacy base64, leaving it", name);
        return false;
    };

    if let Err(e) = store.set_secure(name, Some(decoded.as_str())).await {
        error!("error migrating legacy value for key {}: {}", name, e);
        return false;
    }
    if let Err(e) = store.remove_regular(name).await {
        error!("migrated key {} but could not remove the legacy value: {}", name, e);
        return false;
    }

    info!("migrated legacy value for key {} to secure storage", name);
    true
}

fn decode_legacy(encoded: &str) -> Option<Zeroizing<String>> {
    if encoded.trim().is_empty() {
        return None;
    }
    let bytes = Zeroizing::new(armor::unwrap_legacy(encoded).ok()?);
    let text = std::str::from_utf8(&bytes).ok()?;
    if text.is_empty() {
        return None;
    }
    Some(Zeroizing::new(text.to_string()))
}
