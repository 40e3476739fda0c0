//! Key-value settings storage the store is layered on
//!
//! [`SettingsStorage`] mirrors the browser's synced extension storage: a flat
//! mapping from string keys to JSON values, updated per key with no
//! cross-key transactions. Two implementations live here: [`MemoryStorage`]
//! for embedding and tests, and [`JsonFileStorage`] which keeps the whole
//! mapping in one JSON file.

use crate::error::{ErrorCategory, ErrorKind, KeystoreError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Asynchronous key-value substrate.
///
/// Every method fails with [`ErrorKind::StorageFailure`] when the
/// underlying storage rejects the call. Writes are atomic per key.
#[async_trait]
pub trait SettingsStorage: Send + Sync {
    /// Fetch the given keys. Absent keys are simply missing from the result.
    async fn get(&self, keys: &[String]) -> Result<Map<String, Value>>;

    /// Insert or overwrite every entry in `items`.
    async fn set(&self, items: Map<String, Value>) -> Result<()>;

    /// Delete the given keys. Deleting an absent key is not an error.
    async fn remove(&self, keys: &[String]) -> Result<()>;

    /// Fetch the entire mapping.
    async fn get_all(&self) -> Result<Map<String, Value>>;
}

/// In-process storage backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<Map<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing contents, e.g. data written by an older release.
    pub fn with_entries(entries: Map<String, Value>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

#[async_trait]
impl SettingsStorage for MemoryStorage {
    async fn get(&self, keys: &[String]) -> Result<Map<String, Value>> {
        let entries = self.entries.lock();
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn set(&self, items: Map<String, Value>) -> Result<()> {
        self.entries.lock().extend(items);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.entries.lock();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn get_all(&self) -> Result<Map<String, Value>> {
        Ok(self.entries.lock().clone())
    }
}

/// Storage persisted as a single JSON object on disk.
///
/// Every update rewrites the whole file atomically (tempfile + fsync +
/// rename), so a concurrent reader sees either the old or the new mapping.
/// The file is created with mode 0o600 on Unix systems. Writers within one
/// process are serialized; separate processes may still lose each other's
/// updates, just like two extension contexts writing synced storage.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>> {
        let path = self.path.clone();
        run_blocking(move || read_map(&path)).await
    }

    async fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Map<String, Value>) + Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        run_blocking(move || {
            let mut map = read_map(&path)?;
            apply(&mut map);
            write_map_atomic(&path, &map)
        })
        .await
    }
}

#[async_trait]
impl SettingsStorage for JsonFileStorage {
    async fn get(&self, keys: &[String]) -> Result<Map<String, Value>> {
        let mut all = self.load().await?;
        Ok(keys
            .iter()
            .filter_map(|k| all.remove(k).map(|v| (k.clone(), v)))
            .collect())
    }

    async fn set(&self, items: Map<String, Value>) -> Result<()> {
        self.update(move |map| map.extend(items)).await
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        let keys = keys.to_vec();
        self.update(move |map| {
            for key in &keys {
                map.remove(key);
            }
        })
        .await
    }

    async fn get_all(&self) -> Result<Map<String, Value>> {
        self.load().await
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|e| {
        KeystoreError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "storage task did not complete",
            e,
        )
    })?
}

fn read_map(path: &Path) -> Result<Map<String, Value>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(e) => return Err(io_failure(format!("failed to read from {}", path.display()), e)),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(KeystoreError::storage(format!(
            "{} does not contain a JSON object",
            path.display()
        ))),
        Err(e) => Err(KeystoreError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::StorageFailure,
            format!("{} is not valid JSON", path.display()),
            e,
        )),
    }
}

fn write_map_atomic(path: &Path, map: &Map<String, Value>) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| io_failure("failed to create tempfile", e))?;

    let contents = serde_json::to_vec_pretty(map).map_err(|e| {
        KeystoreError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::StorageFailure,
            "failed to serialize settings",
            e,
        )
    })?;

    temp_file
        .write_all(&contents)
        .map_err(|e| io_failure("failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file
        .flush()
        .map_err(|e| io_failure("failed to flush tempfile", e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| io_failure("failed to sync file prior to rename", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp_file
            .as_file()
            .metadata()
            .map_err(|e| io_failure("failed to get tempfile metadata", e))?
            .permissions();
        perms.set_mode(0o600);
        temp_file
            .as_file()
            .set_permissions(perms)
            .map_err(|e| io_failure("failed to set tempfile permissions", e))?;
    }

    temp_file.persist(path).map_err(|e| {
        KeystoreError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::StorageFailure,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

fn io_failure(msg: impl Into<String>, err: io::Error) -> KeystoreError {
    KeystoreError::with_kind_and_source(ErrorCategory::Internal, ErrorKind::StorageFailure, msg, err)
}
