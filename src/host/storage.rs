//! Persistent key/value storage port
//!
//! The store is shared between host configuration and plugins, so every
//! plugin access goes through [`PluginStore`], which applies the fixed
//! `plugin_` namespace structurally. A plugin can therefore never collide
//! with an unprefixed host key, and host code reading the raw store never
//! sees a plugin key under its bare name.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::{Error, Result};

/// Namespace tag applied to every plugin storage key
pub const PLUGIN_NAMESPACE: &str = "plugin_";

/// Namespaced persistent key/value storage
///
/// The namespace is a required argument rather than a caller convention;
/// implementations compose it into the stored key.
#[async_trait]
pub trait StorageStore: Send + Sync {
    /// Read a value, `None` if absent
    ///
    /// # Errors
    ///
    /// Returns a backend error if the read fails
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    /// Write a value
    ///
    /// # Errors
    ///
    /// Returns a backend error if the write fails
    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()>;
}

/// Plugin-scoped view over a shared store
///
/// Thin handle that binds [`PLUGIN_NAMESPACE`]; cheap to clone into
/// spawned storage tasks.
#[derive(Clone)]
pub struct PluginStore {
    inner: Arc<dyn StorageStore>,
}

impl PluginStore {
    /// Wrap a shared store with the plugin namespace
    #[must_use]
    pub fn new(inner: Arc<dyn StorageStore>) -> Self {
        Self { inner }
    }

    /// Read a plugin key, `None` if absent
    ///
    /// # Errors
    ///
    /// Propagates backend errors
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(PLUGIN_NAMESPACE, key).await
    }

    /// Write a plugin key
    ///
    /// # Errors
    ///
    /// Propagates backend errors
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(PLUGIN_NAMESPACE, key, value).await
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a raw (un-namespaced) key, as host config code would
    #[must_use]
    pub fn raw_get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl StorageStore for MemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        Ok(self.raw_get(&format!("{namespace}{key}")))
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(format!("{namespace}{key}"), value.to_string());
        Ok(())
    }
}

/// SQLite-backed store
///
/// Queries run on the blocking pool so a bridge session never blocks the
/// surface's execution context on storage I/O.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let manager = SqliteConnectionManager::file(path);
        Self::from_manager(manager)
    }

    /// Open an in-memory store (for testing)
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized
    pub fn open_in_memory() -> Result<Self> {
        // A single pooled connection keeps the in-memory database alive
        // and visible to every caller.
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| Error::Storage(e.to_string()))?;
        Self::init_schema(&pool)
    }

    fn from_manager(manager: SqliteConnectionManager) -> Result<Self> {
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| Error::Storage(e.to_string()))?;
        Self::init_schema(&pool)
    }

    fn init_schema(pool: &Pool<SqliteConnectionManager>) -> Result<Self> {
        let conn = pool.get().map_err(|e| Error::Storage(e.to_string()))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        tracing::debug!("storage schema initialized");
        Ok(Self { pool: pool.clone() })
    }

    fn blocking_get(&self, full_key: &str) -> Result<Option<String>> {
        let conn = self.pool.get().map_err(|e| Error::Storage(e.to_string()))?;
        let mut stmt = conn.prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
        let value = stmt
            .query_row([full_key], |row| row.get::<_, String>(0))
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(value)
    }

    fn blocking_set(&self, full_key: &str, value: &str) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Storage(e.to_string()))?;
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [full_key, value],
        )?;
        Ok(())
    }
}

#[async_trait]
impl StorageStore for SqliteStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let store = self.clone();
        let full_key = format!("{namespace}{key}");
        tokio::task::spawn_blocking(move || store.blocking_get(&full_key))
            .await
            .map_err(|e| Error::Storage(format!("storage task failed: {e}")))?
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let store = self.clone();
        let full_key = format!("{namespace}{key}");
        let value = value.to_string();
        tokio::task::spawn_blocking(move || store.blocking_set(&full_key, &value))
            .await
            .map_err(|e| Error::Storage(format!("storage task failed: {e}")))?
    }
}
