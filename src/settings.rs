//! The extension's own settings, as read and written by its settings page

use crate::error::Result;
use crate::migration;
use crate::storage::SettingsStorage;
use crate::store::SecureKeyStore;
use serde_json::Value;
use std::fmt;
use zeroize::Zeroizing;

/// Secure-track name of the completion API credential.
pub const PRODUCT_KEY: &str = "productKey";

/// Regular-track name of the comma-separated domain whitelist.
pub const WHITELISTED_DOMAINS: &str = "whitelistedDomains";

#[derive(Clone, Default)]
pub struct ExtensionSettings {
    pub product_key: Option<Zeroizing<String>>,
    pub whitelisted_domains: Option<String>,
}

impl ExtensionSettings {
    /// Load settings, first moving any legacy plain product key into the
    /// secure track so it shows up on the very first load after an upgrade.
    ///
    /// Never fails: anything unreadable comes back as `None`.
    pub async fn load<S: SettingsStorage>(store: &SecureKeyStore<S>) -> Self {
        migration::auto_migrate_legacy(store, PRODUCT_KEY).await;

        let product_key = store.get_secure(PRODUCT_KEY).await;
        let whitelisted_domains = store
            .get_regular(WHITELISTED_DOMAINS)
            .await
            .and_then(|v| v.as_str().map(str::to_string));

        Self {
            product_key,
            whitelisted_domains,
        }
    }

    /// Persist both settings. A `None` field deletes the stored value.
    pub async fn save<S: SettingsStorage>(&self, store: &SecureKeyStore<S>) -> Result<()> {
        store
            .set_secure(PRODUCT_KEY, self.product_key.as_deref().map(String::as_str))
            .await?;

        match &self.whitelisted_domains {
            Some(domains) => {
                store
                    .set_regular(WHITELISTED_DOMAINS, Value::String(domains.clone()))
                    .await
            }
            None => store.remove_regular(WHITELISTED_DOMAINS).await,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.product_key.as_ref().is_some_and(|k| !k.is_empty())
    }
}

impl fmt::Debug for ExtensionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionSettings")
            .field(
                "product_key",
                &self.product_key.as_ref().map(|_| "<redacted>"),
            )
            .field("whitelisted_domains", &self.whitelisted_domains)
            .finish()
    }
}
