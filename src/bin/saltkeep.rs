//! saltkeep CLI - inspect and edit an encrypted settings file
//!
//! Drives the same secure key store the extension uses, against a JSON file
//! standing in for synced extension storage.

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::error::Error as StdError;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use saltkeep::config::{DEFAULT_SECURE_PREFIX, StoreConfig};
use saltkeep::error::{ErrorCategory, ErrorKind, KeystoreError, Result};
use saltkeep::passphrase::PassphraseSource;
use saltkeep::secret_input::{ReaderSecretReader, SecretReader, TerminalSecretReader};
use saltkeep::settings::{ExtensionSettings, PRODUCT_KEY, WHITELISTED_DOMAINS};
use saltkeep::storage::JsonFileStorage;
use saltkeep::store::SecureKeyStore;

#[derive(Parser)]
#[command(name = "saltkeep")]
#[command(version)]
#[command(about = "Encrypted-at-rest settings store.", long_about = None)]
struct Cli {
    /// Path to the JSON settings file
    #[arg(short, long, value_name = "FILE", global = true, default_value = "settings.json")]
    store: PathBuf,

    /// Extension identity the implicit passphrase is derived from
    #[arg(long, value_name = "ID", global = true, default_value = "")]
    extension_id: String,

    /// Key prefix marking the secure namespace
    #[arg(long, value_name = "PREFIX", global = true, default_value = DEFAULT_SECURE_PREFIX)]
    prefix: String,

    /// Read an explicit passphrase from stdin instead of deriving one from the extension id
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt and store a secret
    SetSecure {
        /// Setting name
        #[arg(short, long)]
        name: String,

        /// Secret value; prompted for on the terminal when omitted
        #[arg(long)]
        value: Option<String>,
    },

    /// Print a decrypted secret
    GetSecure {
        /// Setting name
        #[arg(short, long)]
        name: String,
    },

    /// Delete a secret
    RemoveSecure {
        /// Setting name
        #[arg(short, long)]
        name: String,
    },

    /// Store a plain setting
    Set {
        /// Setting name
        #[arg(short, long)]
        name: String,

        /// Setting value
        #[arg(long)]
        value: String,

        /// Parse the value as JSON instead of storing it as a string
        #[arg(long)]
        json: bool,
    },

    /// Print a plain setting
    Get {
        /// Setting name
        #[arg(short, long)]
        name: String,
    },

    /// Delete a plain setting
    Remove {
        /// Setting name
        #[arg(short, long)]
        name: String,
    },

    /// List stored setting names by track
    Keys,

    /// Delete every secret
    ClearSecure,

    /// Check that every secret can still be decrypted
    Validate,

    /// Move a plain setting into the secure track
    Migrate {
        /// Setting name
        #[arg(short, long)]
        name: String,
    },

    /// Load the extension settings, migrating a legacy product key first
    Settings,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", render_error(&e));
            process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let config = StoreConfig::new(cli.prefix)?;
    let passphrase = get_passphrase_source(cli.passphrase_stdin, cli.extension_id)?;
    let store = SecureKeyStore::new(Arc::new(JsonFileStorage::new(cli.store)), passphrase, config);

    match cli.command {
        Commands::SetSecure { name, value } => {
            let value = match value {
                Some(value) => zeroize::Zeroizing::new(value),
                None if cli.passphrase_stdin => {
                    return Err(KeystoreError::with_kind(
                        ErrorCategory::User,
                        ErrorKind::PassphraseUnavailable,
                        "stdin carries the passphrase; pass the secret with --value",
                    ));
                }
                None => TerminalSecretReader::new(format!("Value for {} (saltkeep): ", name))
                    .read_secret_text()?,
            };
            if value.is_empty() {
                return Err(KeystoreError::new(
                    ErrorCategory::User,
                    "refusing to store an empty secret; use remove-secure instead",
                ));
            }
            store.set_secure(&name, Some(value.as_str())).await?;
            Ok(0)
        }
        Commands::GetSecure { name } => match store.get_secure(&name).await {
            Some(value) => {
                println!("{}", value.as_str());
                Ok(0)
            }
            None => {
                eprintln!("{}: not configured", name);
                Ok(1)
            }
        },
        Commands::RemoveSecure { name } => {
            store.remove_secure(&name).await?;
            Ok(0)
        }
        Commands::Set { name, value, json } => {
            let value = if json {
                serde_json::from_str(&value).map_err(|e| {
                    KeystoreError::with_source(ErrorCategory::User, "--value is not valid JSON", e)
                })?
            } else {
                Value::String(value)
            };
            store.set_regular(&name, value).await?;
            Ok(0)
        }
        Commands::Get { name } => match store.get_regular(&name).await {
            Some(Value::String(s)) => {
                println!("{}", s);
                Ok(0)
            }
            Some(other) => {
                println!("{}", other);
                Ok(0)
            }
            None => {
                eprintln!("{}: not set", name);
                Ok(1)
            }
        },
        Commands::Remove { name } => {
            store.remove_regular(&name).await?;
            Ok(0)
        }
        Commands::Keys => {
            let listing = store.get_all_keys().await?;
            for name in &listing.secure {
                println!("secure\t{}", name);
            }
            for name in &listing.regular {
                println!("regular\t{}", name);
            }
            Ok(0)
        }
        Commands::ClearSecure => {
            let removed = store.clear_secure_data().await?;
            println!("removed {} secure value(s)", removed);
            Ok(0)
        }
        Commands::Validate => {
            let report = store.validate_storage().await?;
            println!("valid: {}", report.valid);
            println!("invalid: {}", report.invalid);
            for error in &report.errors {
                println!("  {}", error);
            }
            Ok(if report.invalid == 0 { 0 } else { 1 })
        }
        Commands::Migrate { name } => {
            if store.migrate_to_secure(&name).await? {
                println!("migrated {}", name);
            } else {
                println!("nothing to migrate for {}", name);
            }
            Ok(0)
        }
        Commands::Settings => {
            let settings = ExtensionSettings::load(&store).await;
            let state = if settings.is_configured() {
                "configured"
            } else {
                "not configured"
            };
            println!("{}: {}", PRODUCT_KEY, state);
            println!(
                "{}: {}",
                WHITELISTED_DOMAINS,
                settings.whitelisted_domains.as_deref().unwrap_or("")
            );
            Ok(0)
        }
    }
}

fn get_passphrase_source(use_stdin: bool, extension_id: String) -> Result<PassphraseSource> {
    if use_stdin {
        let passphrase = ReaderSecretReader::new(Box::new(std::io::stdin())).read_secret_text()?;
        Ok(PassphraseSource::explicit(passphrase.as_str()))
    } else {
        Ok(PassphraseSource::implicit(extension_id))
    }
}

fn render_error(err: &KeystoreError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
