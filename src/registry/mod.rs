//! Plugin registry - discovery, cataloging, and hook lookup
//!
//! Plugins are discovered from `manifest.json` bundles in immediate
//! subdirectories of the plugins root. A scan builds a fresh immutable
//! [`PluginCatalog`]; callers publish it by swapping an `Arc`, so readers
//! only ever observe a complete catalog. No script execution happens here.

pub mod discovery;
pub mod manifest;

pub use discovery::MANIFEST_FILE;
pub use manifest::PluginManifest;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::Result;

/// A discovered plugin: parsed manifest plus loaded entry script
#[derive(Debug, Clone)]
pub struct PluginRecord {
    /// Unique record identifier, regenerated on every scan
    pub id: Uuid,
    /// Parsed manifest
    pub manifest: PluginManifest,
    /// Directory containing the plugin bundle
    pub path: PathBuf,
    /// Entry script source, `None` if the main file could not be read
    pub script: Option<String>,
}

/// Immutable, ordered catalog of discovered plugins
///
/// Record order is the lexicographic directory order of the scan. When two
/// bundles declare the same `name`, the later-scanned bundle wins and takes
/// its own scan position; the earlier record is dropped with a warning.
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    records: Vec<PluginRecord>,
}

impl PluginCatalog {
    /// Build a catalog by scanning the plugins root
    ///
    /// Creates `root` if absent. Per-plugin failures are skipped and
    /// logged; only a root that cannot be created or read is an error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PluginRoot`] if the root cannot be set up
    pub fn scan(root: &Path) -> Result<Self> {
        let discovered = discovery::scan_root(root)?;

        let mut records: Vec<PluginRecord> = Vec::with_capacity(discovered.len());
        for record in discovered {
            if let Some(previous) = records
                .iter()
                .position(|r| r.manifest.name == record.manifest.name)
            {
                tracing::warn!(
                    plugin = %record.manifest.name,
                    kept = %record.path.display(),
                    replaced = %records[previous].path.display(),
                    "duplicate plugin name, last-loaded wins"
                );
                records.remove(previous);
            }
            records.push(record);
        }

        tracing::info!(count = records.len(), root = %root.display(), "plugin scan complete");
        Ok(Self { records })
    }

    /// Build a catalog and wrap it for sharing across bridge sessions
    ///
    /// # Errors
    ///
    /// Same as [`PluginCatalog::scan`]
    pub fn scan_shared(root: &Path) -> Result<Arc<Self>> {
        Ok(Arc::new(Self::scan(root)?))
    }

    /// Build a catalog from pre-assembled records
    ///
    /// For embedders that source plugins somewhere other than the
    /// filesystem (and for tests); record order is preserved as given.
    #[must_use]
    pub fn from_records(records: Vec<PluginRecord>) -> Self {
        Self { records }
    }

    /// Records in catalog order
    #[must_use]
    pub fn records(&self) -> &[PluginRecord] {
        &self.records
    }

    /// Plugins that declare the given hook, in catalog order
    pub fn hooks_for<'a>(&'a self, hook: &'a str) -> impl Iterator<Item = &'a PluginRecord> {
        self.records.iter().filter(move |r| r.manifest.has_hook(hook))
    }

    /// Look up a record by plugin name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PluginRecord> {
        self.records.iter().find(|r| r.manifest.name == name)
    }

    /// Number of cataloged plugins
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
