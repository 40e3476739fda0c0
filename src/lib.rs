//! saltkeep - encrypted-at-rest credential store for synced extension settings
//!
//! Secrets are sealed with AES-256-GCM under a PBKDF2-derived key and kept
//! next to plain settings in a shared key-value storage, separated by a key
//! prefix. See [`store::SecureKeyStore`] for the entry point.

#![forbid(unsafe_code)]

pub mod armor;
pub mod cipherbox;
pub mod config;
pub mod error;
pub mod migration;
pub mod passphrase;
pub mod record;
pub mod secret_input;
pub mod settings;
pub mod storage;
pub mod store;
