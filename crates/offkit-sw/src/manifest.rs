//! Shell manifest: the versioned cache name and the paths it precaches.

use serde::{Deserialize, Serialize};

/// Cache name for the current shell version.
pub const DEFAULT_CACHE_NAME: &str = "offkit-shell-v1";

/// The app shell: a versioned cache name plus the paths that make it up.
///
/// The cache name doubles as the version. Publishing a new shell means
/// shipping a manifest with a new name, nothing else; no diffing, no
/// timestamps, no partial updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellManifest {
    /// Versioned cache name, e.g. `offkit-shell-v1`.
    pub cache_name: String,
    /// Rooted paths fetched and cached on install.
    pub precache: Vec<String>,
}

impl Default for ShellManifest {
    fn default() -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            precache: vec![
                "/".to_string(),
                "/dashboard".to_string(),
                "/login".to_string(),
                "/static/css/style.css".to_string(),
                "/static/js/pwa.js".to_string(),
            ],
        }
    }
}

impl ShellManifest {
    /// Create a manifest from an explicit name and path list.
    pub fn new(cache_name: impl Into<String>, precache: Vec<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            precache,
        }
    }

    /// The same shell under a new version name.
    pub fn with_version(&self, cache_name: impl Into<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            precache: self.precache.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shell() {
        let manifest = ShellManifest::default();
        assert_eq!(manifest.cache_name, "offkit-shell-v1");
        assert_eq!(manifest.precache.len(), 5);
        assert!(manifest.precache.contains(&"/".to_string()));
        assert!(manifest.precache.contains(&"/static/js/pwa.js".to_string()));
    }

    #[test]
    fn test_with_version_keeps_paths() {
        let v1 = ShellManifest::default();
        let v2 = v1.with_version("offkit-shell-v2");

        assert_eq!(v2.cache_name, "offkit-shell-v2");
        assert_eq!(v2.precache, v1.precache);
    }

    #[test]
    fn test_manifest_deserializes_from_json() {
        let manifest: ShellManifest = serde_json::from_str(
            r#"{"cache_name": "offkit-shell-v3", "precache": ["/", "/login"]}"#,
        )
        .unwrap();

        assert_eq!(manifest.cache_name, "offkit-shell-v3");
        assert_eq!(manifest.precache.len(), 2);
    }
}
