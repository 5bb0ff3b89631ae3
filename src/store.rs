//! Credential storage.
//!
//! The client only ever reads and writes two keys. Browsers keep them in local
//! storage and phones in the platform secure store; here the backend is any
//! [`CredentialStore`].

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::{ApiError, Result};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Access and refresh token issued together on login or registration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Async key-value contract for token persistence.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Read both tokens. `None` unless both are present and non-empty.
pub async fn load_credentials(store: &dyn CredentialStore) -> Result<Option<CredentialPair>> {
    let access = store.get(ACCESS_TOKEN_KEY).await?.filter(|t| !t.is_empty());
    let refresh = store.get(REFRESH_TOKEN_KEY).await?.filter(|t| !t.is_empty());
    Ok(access.zip(refresh).map(|(access, refresh)| CredentialPair::new(access, refresh)))
}

pub async fn save_credentials(
    store: &dyn CredentialStore,
    credentials: &CredentialPair,
) -> Result<()> {
    store.set(ACCESS_TOKEN_KEY, &credentials.access_token).await?;
    store.set(REFRESH_TOKEN_KEY, &credentials.refresh_token).await
}

/// Remove both tokens. Both deletes are attempted even if the first fails.
pub async fn clear_credentials(store: &dyn CredentialStore) -> Result<()> {
    let access = store.delete(ACCESS_TOKEN_KEY).await;
    let refresh = store.delete(REFRESH_TOKEN_KEY).await;
    access.and(refresh)
}

/// In-process store. Contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: &CredentialPair) -> Self {
        let entries = HashMap::from([
            (ACCESS_TOKEN_KEY.to_string(), credentials.access_token.clone()),
            (REFRESH_TOKEN_KEY.to_string(), credentials.refresh_token.clone()),
        ]);
        Self { entries: RwLock::new(entries) }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// JSON file on disk, readable only by the owner on unix.
///
/// Every operation re-reads the file, so two processes sharing a path see each
/// other's writes. Writes within one process are serialized. A write goes to a
/// sibling temp file that is renamed over the target, so readers always see a
/// complete file.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ApiError::Store(format!("corrupt credential file {}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(store_error("read", &self.path, e)),
        }
    }

    async fn write_entries(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| store_error("create", parent, e))?;
        }
        let bytes = serde_json::to_vec_pretty(entries).map_err(|e| ApiError::Store(e.to_string()))?;

        let staging = staging_path(&self.path);
        if let Err(err) = write_private(&staging, &bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(err);
        }
        if let Err(e) = tokio::fs::rename(&staging, &self.path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(store_error("replace", &self.path, e));
        }
        Ok(())
    }

    async fn update(&self, apply: impl FnOnce(&mut HashMap<String, String>) -> bool) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await?;
        if apply(&mut entries) {
            self.write_entries(&entries).await?;
            debug!(path = %self.path.display(), "credential file updated");
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_entries().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.update(|entries| entries.remove(key).is_some()).await
    }
}

fn store_error(action: &str, path: &Path, err: std::io::Error) -> ApiError {
    ApiError::Store(format!("failed to {action} {}: {err}", path.display()))
}

/// `credentials.json` -> `credentials.json.<pid>.tmp`, next to the target so the
/// rename stays on one filesystem.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

/// Create `path` fresh with owner-only permissions and fill it.
async fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    // A leftover from a crashed write may carry wider permissions.
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => return Err(store_error("remove", path, e)),
        _ => {}
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await.map_err(|e| store_error("create", path, e))?;
    file.write_all(bytes).await.map_err(|e| store_error("write", path, e))?;
    file.sync_all().await.map_err(|e| store_error("sync", path, e))
}
