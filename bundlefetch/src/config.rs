//! Configuration for bundle resolution.
//!
//! A [`FetchConfig`] describes which bundles exist, which CDN pools serve
//! them, and where affinity is persisted. It is plain data, loadable from
//! a JSON file or assembled in code with the `with_*` builders:
//!
//! ```json
//! {
//!   "remote_enabled": true,
//!   "default_pool": ["https://cdn-a.example.com", "https://cdn-b.example.com"],
//!   "bundles": [
//!     { "name": "mainresources", "version": "1.4.2" },
//!     { "name": "shop", "cdn_pool": ["https://shop-cdn.example.com"] }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{FetchError, FetchResult};

/// One configured bundle.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleConfig {
    /// Logical bundle name.
    pub name: String,
    /// Bundle version; empty means unversioned.
    #[serde(default)]
    pub version: String,
    /// Per-bundle CDN pool override. Empty means "use the default pool".
    #[serde(default)]
    pub cdn_pool: Vec<String>,
}

impl BundleConfig {
    /// Creates an unversioned bundle entry with no pool override.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            cdn_pool: Vec::new(),
        }
    }

    /// Sets the bundle version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Adds a CDN base to this bundle's pool override.
    pub fn with_cdn(mut self, base: impl Into<String>) -> Self {
        self.cdn_pool.push(base.into());
        self
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Whether bundles are fetched from remote CDNs at all. When false
    /// every pool collapses to its local location.
    pub remote_enabled: bool,
    /// CDN bases used by bundles without a pool override.
    pub default_pool: Vec<String>,
    /// Where the file-backed affinity store lives; `None` uses the
    /// platform default location.
    pub affinity_file: Option<PathBuf>,
    /// The bundles this process works with, in registration order.
    pub bundles: Vec<BundleConfig>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            remote_enabled: true,
            default_pool: Vec::new(),
            affinity_file: None,
            bundles: Vec::new(),
        }
    }
}

impl FetchConfig {
    /// Loads configuration from a JSON file.
    pub fn load(path: &Path) -> FetchResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FetchError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            FetchError::Configuration(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Adds a CDN base to the default pool.
    pub fn with_default_cdn(mut self, base: impl Into<String>) -> Self {
        self.default_pool.push(base.into());
        self
    }

    /// Adds a bundle.
    pub fn with_bundle(mut self, bundle: BundleConfig) -> Self {
        self.bundles.push(bundle);
        self
    }

    /// Disables remote fetching; pools collapse to local locations.
    pub fn local_only(mut self) -> Self {
        self.remote_enabled = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert!(config.remote_enabled);
        assert!(config.default_pool.is_empty());
        assert!(config.bundles.is_empty());
    }

    #[test]
    fn test_builder_chain() {
        let config = FetchConfig::default()
            .with_default_cdn("https://cdn-a.example.com")
            .with_bundle(BundleConfig::new("main").with_version("1.0.0"))
            .with_bundle(BundleConfig::new("shop").with_cdn("https://shop-cdn.example.com"));
        assert_eq!(config.default_pool.len(), 1);
        assert_eq!(config.bundles.len(), 2);
        assert_eq!(config.bundles[0].version, "1.0.0");
        assert_eq!(config.bundles[1].cdn_pool.len(), 1);
    }

    #[test]
    fn test_load_from_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "remote_enabled": true,
                "default_pool": ["https://cdn-a.example.com"],
                "bundles": [
                    {{ "name": "main", "version": "2.0.0" }},
                    {{ "name": "shop" }}
                ]
            }}"#
        )
        .unwrap();

        let config = FetchConfig::load(file.path()).unwrap();
        assert_eq!(config.bundles.len(), 2);
        assert_eq!(config.bundles[0].version, "2.0.0");
        assert_eq!(config.bundles[1].version, "");
        assert!(config.bundles[1].cdn_pool.is_empty());
    }

    #[test]
    fn test_load_missing_file_is_configuration_error() {
        let result = FetchConfig::load(Path::new("/nonexistent/bundles.json"));
        assert!(matches!(result, Err(FetchError::Configuration(_))));
    }

    #[test]
    fn test_load_invalid_json_is_configuration_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let result = FetchConfig::load(file.path());
        assert!(matches!(result, Err(FetchError::Configuration(_))));
    }
}
