//! Plugin discovery - scan a plugins root for `manifest.json` bundles

use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::PluginRecord;
use super::manifest::PluginManifest;
use crate::{Error, Result};

/// Manifest file name inside each plugin directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Scan the plugins root for plugin bundles
///
/// Looks for `manifest.json` in immediate subdirectories of `root`,
/// creating `root` first if it does not exist. Subdirectories are visited
/// in lexicographic file-name order so the resulting record order is
/// reproducible across filesystems.
///
/// A malformed or missing manifest skips that directory; an unreadable
/// main script yields a record with no script. Neither aborts the scan.
///
/// # Errors
///
/// Returns an error only if `root` cannot be created or read.
pub fn scan_root(root: &Path) -> Result<Vec<PluginRecord>> {
    std::fs::create_dir_all(root)
        .map_err(|e| Error::PluginRoot(format!("{}: {e}", root.display())))?;

    let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)
        .map_err(|e| Error::PluginRoot(format!("{}: {e}", root.display())))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let mut records = Vec::new();
    for dir in dirs {
        if let Some(record) = load_bundle(&dir) {
            tracing::debug!(
                plugin = %record.manifest.name,
                path = %dir.display(),
                has_script = record.script.is_some(),
                "discovered plugin"
            );
            records.push(record);
        }
    }

    Ok(records)
}

/// Load a single plugin bundle, returning `None` if its manifest is
/// absent or malformed
fn load_bundle(dir: &Path) -> Option<PluginRecord> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let manifest = load_manifest(&manifest_path)?;

    // Unreadable entry script is not fatal: the plugin stays cataloged
    // but contributes nothing to injection.
    let script_path = dir.join(manifest.main.trim());
    let script = match std::fs::read_to_string(&script_path) {
        Ok(source) => Some(source),
        Err(e) => {
            tracing::warn!(
                plugin = %manifest.name,
                path = %script_path.display(),
                error = %e,
                "failed to read plugin script"
            );
            None
        }
    };

    Some(PluginRecord {
        id: Uuid::new_v4(),
        manifest,
        path: dir.to_path_buf(),
        script,
    })
}

/// Load and parse a single manifest file
fn load_manifest(path: &Path) -> Option<PluginManifest> {
    let content = std::fs::read_to_string(path).ok()?;
    let manifest = match serde_json::from_str::<PluginManifest>(&content) {
        Ok(manifest) => manifest,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse plugin manifest"
            );
            return None;
        }
    };

    if !manifest.is_valid() {
        tracing::warn!(
            path = %path.display(),
            "plugin manifest has blank name or main, skipping"
        );
        return None;
    }

    Some(manifest)
}
