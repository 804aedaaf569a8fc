//! Cookie persistence hooks.
//!
//! The engine never owns long-term storage; it pushes refreshed cookie
//! strings through a `CookieStore` so long-lived sessions survive across
//! invocations. The file format lives entirely behind this seam.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A key-value store for account cookie strings.
///
/// The interface is intentionally simple - just get/set by account key.
/// Implementations decide where and how sessions are kept.
#[async_trait]
pub trait CookieStore: Send + Sync {
    /// Retrieve the stored cookie string for an account.
    ///
    /// Returns `Ok(None)` if nothing has been stored yet.
    async fn get(&self, account_key: &str) -> Result<Option<String>>;

    /// Store (or overwrite) the cookie string for an account.
    async fn set(&self, account_key: &str, cookie: &str) -> Result<()>;
}

/// In-memory store for tests and embedders that persist elsewhere.
#[derive(Default)]
pub struct MemoryCookieStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CookieStore for MemoryCookieStore {
    async fn get(&self, account_key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(account_key).cloned())
    }

    async fn set(&self, account_key: &str, cookie: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(account_key.to_string(), cookie.to_string());
        Ok(())
    }
}

/// On-disk session record.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    cookie: String,
    refreshed_at: DateTime<Utc>,
}

/// File-backed store keeping one JSON file per account under a cache
/// directory (`~/.cache/renewd/sessions/` by default).
pub struct JsonFileCookieStore {
    cache_dir: PathBuf,
}

impl JsonFileCookieStore {
    /// Create a store at the default cache location.
    pub fn new() -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .context("Could not find cache directory")?
            .join("renewd")
            .join("sessions");
        Self::with_path(cache_dir)
    }

    /// Create a store at a custom location.
    pub fn with_path(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create session cache dir: {cache_dir:?}"))?;
        Ok(Self { cache_dir })
    }

    fn session_file(&self, account_key: &str) -> PathBuf {
        // Account keys come from user config; keep filenames tame.
        let safe: String = account_key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.cache_dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl CookieStore for JsonFileCookieStore {
    async fn get(&self, account_key: &str) -> Result<Option<String>> {
        let path = self.session_file(account_key);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session file: {path:?}"))?;
        let session: StoredSession = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session file: {path:?}"))?;

        Ok(Some(session.cookie))
    }

    async fn set(&self, account_key: &str, cookie: &str) -> Result<()> {
        let path = self.session_file(account_key);
        let session = StoredSession {
            cookie: cookie.to_string(),
            refreshed_at: Utc::now(),
        };
        let content =
            serde_json::to_string_pretty(&session).context("Failed to serialize session")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write session file: {path:?}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn memory_store_round_trips() -> Result<()> {
        let store = MemoryCookieStore::new();
        assert_eq!(store.get("acct").await?, None);
        store.set("acct", "a=1; b=2").await?;
        assert_eq!(store.get("acct").await?.as_deref(), Some("a=1; b=2"));
        Ok(())
    }

    #[tokio::test]
    async fn file_store_round_trips() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JsonFileCookieStore::with_path(dir.path())?;
        assert_eq!(store.get("acct").await?, None);
        store.set("acct", "session=xyz").await?;
        assert_eq!(store.get("acct").await?.as_deref(), Some("session=xyz"));
        Ok(())
    }

    #[tokio::test]
    async fn file_store_sanitizes_account_keys() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JsonFileCookieStore::with_path(dir.path())?;
        store.set("user@example.com/../x", "a=1").await?;
        assert_eq!(store.get("user@example.com/../x").await?.as_deref(), Some("a=1"));
        // Nothing escaped the cache dir.
        assert!(dir.path().read_dir()?.all(|e| e.unwrap().path().is_file()));
        Ok(())
    }
}
