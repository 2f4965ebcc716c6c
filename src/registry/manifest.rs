//! Plugin manifest format (`manifest.json`)

use serde::{Deserialize, Serialize};

/// Plugin manifest describing a plugin's identity, entry point, and
/// requested capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin name, unique within a catalog (e.g. "vim-mode")
    pub name: String,
    /// Version string (not semantically validated)
    pub version: String,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// Plugin author
    #[serde(default)]
    pub author: Option<String>,
    /// Entry script, relative to the plugin directory (e.g. "plugin.js")
    pub main: String,
    /// Hook points this plugin observes
    #[serde(default)]
    pub hooks: Vec<String>,
    /// Requested capability names
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl PluginManifest {
    /// Check declaration-level invariants that serde alone cannot express
    ///
    /// A manifest with a whitespace-only `name` or `main` is as unusable
    /// as one missing the field entirely and must never reach a catalog.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.main.trim().is_empty()
    }

    /// Whether this plugin declares interest in the given hook
    #[must_use]
    pub fn has_hook(&self, hook: &str) -> bool {
        self.hooks.iter().any(|h| h == hook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_manifest() {
        let json = r#"{
            "name": "vim-mode",
            "version": "1.0",
            "description": "vim keys",
            "author": "someone",
            "main": "plugin.js",
            "hooks": ["pageLoad"],
            "permissions": ["navigation"]
        }"#;

        let manifest: PluginManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.name, "vim-mode");
        assert_eq!(manifest.main, "plugin.js");
        assert_eq!(manifest.hooks, vec!["pageLoad"]);
        assert_eq!(manifest.permissions, vec!["navigation"]);
        assert!(manifest.is_valid());
    }

    #[test]
    fn deserialize_minimal_manifest() {
        let json = r#"{"name":"min","version":"0.1","main":"index.js"}"#;

        let manifest: PluginManifest = serde_json::from_str(json).unwrap();
        assert!(manifest.description.is_empty());
        assert!(manifest.author.is_none());
        assert!(manifest.hooks.is_empty());
        assert!(manifest.permissions.is_empty());
        assert!(manifest.is_valid());
    }

    #[test]
    fn missing_required_fields_fail_deserialize() {
        // No `main`
        assert!(
            serde_json::from_str::<PluginManifest>(r#"{"name":"x","version":"1"}"#).is_err()
        );
        // No `name`
        assert!(
            serde_json::from_str::<PluginManifest>(r#"{"version":"1","main":"a.js"}"#).is_err()
        );
    }

    #[test]
    fn blank_required_fields_are_invalid() {
        let manifest: PluginManifest =
            serde_json::from_str(r#"{"name":"  ","version":"1","main":"a.js"}"#).unwrap();
        assert!(!manifest.is_valid());

        let manifest: PluginManifest =
            serde_json::from_str(r#"{"name":"x","version":"1","main":""}"#).unwrap();
        assert!(!manifest.is_valid());
    }

    #[test]
    fn hook_lookup() {
        let manifest: PluginManifest = serde_json::from_str(
            r#"{"name":"x","version":"1","main":"a.js","hooks":["pageLoad","tabClose"]}"#,
        )
        .unwrap();
        assert!(manifest.has_hook("pageLoad"));
        assert!(!manifest.has_hook("navStart"));
    }
}
