//! Secret and plain settings on top of a shared key-value storage
//!
//! Secret-classified settings are encrypted into an envelope and written as
//! a [`StoredRecord`] under `prefix + name`; plain settings are written as-is
//! under their own name. The prefix is the only thing telling the two tracks
//! apart when the whole storage is enumerated.
//!
//! Reads never fail: a missing, malformed, or undecryptable secret all come
//! back as `None`, which callers treat as "not configured yet". Writes and
//! deletes do fail, since the caller has to know that nothing was persisted.

use crate::cipherbox;
use crate::config::StoreConfig;
use crate::error::{ErrorCategory, ErrorKind, KeystoreError, Result};
use crate::passphrase::PassphraseSource;
use crate::record::StoredRecord;
use crate::storage::SettingsStorage;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

/// Names currently stored, split by track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyListing {
    /// Secret names, with the namespace prefix stripped.
    pub secure: Vec<String>,
    pub regular: Vec<String>,
}

/// Outcome of [`SecureKeyStore::validate_storage`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: usize,
    pub invalid: usize,
    /// One line per invalid entry.
    pub errors: Vec<String>,
}

pub struct SecureKeyStore<S: SettingsStorage> {
    storage: Arc<S>,
    passphrase: PassphraseSource,
    config: StoreConfig,
}

impl<S: SettingsStorage> SecureKeyStore<S> {
    pub fn new(storage: Arc<S>, passphrase: PassphraseSource, config: StoreConfig) -> Self {
        Self {
            storage,
            passphrase,
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Encrypt `value` and store it under the secure namespace.
    ///
    /// `None` removes the secret instead. An existing record is overwritten.
    pub async fn set_secure(&self, name: &str, value: Option<&str>) -> Result<()> {
        let Some(value) = value else {
            return self.remove_secure(name).await;
        };

        let envelope = cipherbox::encrypt(value, &self.passphrase)
            .map_err(|e| e.with_context(format!("failed to encrypt secure data for key: {}", name)))?;
        let record = StoredRecord::new(envelope, Utc::now().timestamp_millis());

        let mut items = Map::new();
        items.insert(self.config.secure_key(name), record.to_value()?);
        self.storage
            .set(items)
            .await
            .map_err(|e| e.with_context(format!("failed to store secure data for key: {}", name)))?;

        debug!("stored secure value for key: {}", name);
        Ok(())
    }

    /// Decrypt the secret stored under `name`.
    ///
    /// Returns `None` when nothing is stored, the record is malformed, the
    /// envelope does not decrypt, or storage could not be read.
    pub async fn get_secure(&self, name: &str) -> Option<Zeroizing<String>> {
        match self.read_secure(name).await {
            Ok(value) => value,
            Err(e) => {
                match e.kind {
                    Some(ErrorKind::MalformedRecord) => {
                        warn!("invalid secure storage format for key: {}: {}", name, e)
                    }
                    Some(kind) if kind.is_crypto_failure() => {
                        warn!("secure value for key {} could not be decrypted", name)
                    }
                    _ => error!("error retrieving secure data for key {}: {}", name, e),
                }
                None
            }
        }
    }

    /// Remove a secret. Removing one that does not exist succeeds.
    pub async fn remove_secure(&self, name: &str) -> Result<()> {
        self.storage
            .remove(&[self.config.secure_key(name)])
            .await
            .map_err(|e| e.with_context(format!("failed to remove secure data for key: {}", name)))?;
        debug!("removed secure value for key: {}", name);
        Ok(())
    }

    /// Store a plain, unencrypted setting.
    pub async fn set_regular(&self, name: &str, value: Value) -> Result<()> {
        self.check_regular_name(name)?;

        let mut items = Map::new();
        items.insert(name.to_string(), value);
        self.storage
            .set(items)
            .await
            .map_err(|e| e.with_context(format!("failed to store data for key: {}", name)))
    }

    /// Read a plain setting. `null`, `false`, `""` and `0` count as absent.
    pub async fn get_regular(&self, name: &str) -> Option<Value> {
        match self.read_regular(name).await {
            Ok(value) => value,
            Err(e) => {
                warn!("error retrieving data for key {}: {}", name, e);
                None
            }
        }
    }

    pub async fn remove_regular(&self, name: &str) -> Result<()> {
        self.check_regular_name(name)?;
        self.storage
            .remove(&[name.to_string()])
            .await
            .map_err(|e| e.with_context(format!("failed to remove data for key: {}", name)))
    }

    /// Enumerate every stored name, partitioned by track. Both lists are sorted.
    pub async fn get_all_keys(&self) -> Result<KeyListing> {
        let all = self
            .storage
            .get_all()
            .await
            .map_err(|e| e.with_context("failed to list stored keys"))?;

        let mut listing = KeyListing::default();
        for key in all.keys() {
            match self.config.secure_name(key) {
                Some(name) => listing.secure.push(name.to_string()),
                None => listing.regular.push(key.clone()),
            }
        }
        listing.secure.sort();
        listing.regular.sort();
        Ok(listing)
    }

    /// Delete every secret in one storage call. Returns how many were removed.
    pub async fn clear_secure_data(&self) -> Result<usize> {
        let listing = self.get_all_keys().await?;
        if listing.secure.is_empty() {
            return Ok(0);
        }

        let keys: Vec<String> = listing
            .secure
            .iter()
            .map(|name| self.config.secure_key(name))
            .collect();
        self.storage
            .remove(&keys)
            .await
            .map_err(|e| e.with_context("failed to clear secure data"))?;

        info!("cleared {} secure value(s)", keys.len());
        Ok(keys.len())
    }

    /// Try to read every secret and report which ones are unusable.
    ///
    /// Purely diagnostic: bad records are left exactly as they are.
    pub async fn validate_storage(&self) -> Result<ValidationReport> {
        let listing = self
            .get_all_keys()
            .await
            .map_err(|e| e.with_context("failed to validate storage"))?;

        let mut report = ValidationReport::default();
        for name in &listing.secure {
            match self.read_secure(name).await {
                Ok(Some(_)) => report.valid += 1,
                Ok(None) => {
                    report.invalid += 1;
                    report
                        .errors
                        .push(format!("Invalid data for key: {}: record vanished during validation", name));
                }
                Err(e) => {
                    report.invalid += 1;
                    report
                        .errors
                        .push(format!("Invalid data for key: {}: {}", name, failure_reason(&e)));
                }
            }
        }

        if report.invalid > 0 {
            warn!(
                "storage validation found {} invalid of {} secure value(s)",
                report.invalid,
                listing.secure.len()
            );
        }
        Ok(report)
    }

    /// Move a plain setting into the secure track.
    ///
    /// Copies the plain value through [`SecureKeyStore::set_secure`] and then
    /// deletes the plain entry. Returns `false`, without writing anything, if
    /// there is no plain value. Non-string JSON values are stored as their
    /// JSON text. If the delete fails after the copy succeeded, both copies
    /// remain and calling this again finishes the job.
    pub async fn migrate_to_secure(&self, name: &str) -> Result<bool> {
        let Some(value) = self
            .read_regular(name)
            .await
            .map_err(|e| e.with_context(format!("failed to migrate data for key: {}", name)))?
        else {
            return Ok(false);
        };

        let text = Zeroizing::new(match value {
            Value::String(s) => s,
            other => other.to_string(),
        });

        self.set_secure(name, Some(text.as_str()))
            .await
            .map_err(|e| e.with_context(format!("failed to migrate data for key: {}", name)))?;
        self.remove_regular(name)
            .await
            .map_err(|e| e.with_context(format!("failed to migrate data for key: {}", name)))?;

        info!("migrated plain value for key {} to secure storage", name);
        Ok(true)
    }

    async fn read_secure(&self, name: &str) -> Result<Option<Zeroizing<String>>> {
        let key = self.config.secure_key(name);
        let mut found = self.storage.get(std::slice::from_ref(&key)).await?;
        let Some(raw) = found.remove(&key) else {
            return Ok(None);
        };

        let record = StoredRecord::from_value(&raw)?;
        // Skip key derivation for data that cannot be an envelope.
        if !cipherbox::is_valid_envelope(&record.data) {
            return Err(KeystoreError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::ArmoringDecode,
                "stored data is not an encrypted envelope",
            ));
        }
        let plaintext = cipherbox::decrypt(&record.data, &self.passphrase)?;
        Ok(Some(plaintext))
    }

    async fn read_regular(&self, name: &str) -> Result<Option<Value>> {
        if self.config.is_secure_key(name) {
            return Ok(None);
        }
        let mut found = self.storage.get(&[name.to_string()]).await?;
        Ok(found.remove(name).filter(is_present))
    }

    fn check_regular_name(&self, name: &str) -> Result<()> {
        if self.config.is_secure_key(name) {
            return Err(KeystoreError::with_kind(
                ErrorCategory::User,
                ErrorKind::NamespaceCollision,
                format!(
                    "regular key {:?} falls inside the secure namespace {:?}",
                    name,
                    self.config.secure_prefix()
                ),
            ));
        }
        Ok(())
    }
}

/// Falsy JSON values read the same as a missing key.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn failure_reason(err: &KeystoreError) -> String {
    match err.kind {
        Some(ErrorKind::MalformedRecord) => format!("malformed record ({})", err),
        Some(kind) if kind.is_crypto_failure() => "envelope could not be decrypted".to_string(),
        _ => format!("read failed ({})", err),
    }
}
