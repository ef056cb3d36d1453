//! Mirror affinity persistence.
//!
//! When a bundle handle is successfully opened, the winning endpoint is
//! remembered under a key derived from the bundle name so the next session
//! starts there instead of walking the pool from the top. The store is a
//! narrow get/set surface:
//!
//! - written at most once per successful resolution, last-writer-wins
//! - never written on failure — stale affinity is preferable to none,
//!   since a previous session's success is still informative
//! - a performance hint, not a correctness-critical value; no locking
//!   beyond what the individual store needs internally
//!
//! Two implementations ship: an in-process map and a JSON file store for
//! cross-session persistence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::warn;

/// Prefix for affinity keys; the full key is `prefix + bundle name`.
pub const AFFINITY_KEY_PREFIX: &str = "saved-bundle-url.";

/// Builds the affinity key for a bundle name.
pub fn affinity_key(bundle: &str) -> String {
    format!("{}{}", AFFINITY_KEY_PREFIX, bundle)
}

/// Key-value persistence surface for mirror affinity.
///
/// Implementations must be `Send + Sync`; concurrent sessions targeting
/// the same bundle name race benignly (last writer wins).
pub trait AffinityStore: Send + Sync {
    /// Returns the stored value for `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str);
}

/// In-process affinity store. Forgets everything on process exit.
#[derive(Default)]
pub struct MemoryAffinityStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryAffinityStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AffinityStore for MemoryAffinityStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.write().insert(key.to_string(), value.to_string());
    }
}

/// JSON-file-backed affinity store for cross-session persistence.
///
/// The whole map is rewritten on every `set`. Persistence is best-effort:
/// a write failure is logged and the in-memory view stays authoritative
/// for the rest of the process.
pub struct FileAffinityStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileAffinityStore {
    /// Opens the store at `path`, loading existing entries if the file
    /// exists. A missing or unreadable file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::read_entries(&path).unwrap_or_default();
        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    /// Default store location under the platform data directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("bundlefetch")
            .join("affinity.json")
    }

    /// Snapshot of all stored entries.
    pub fn entries(&self) -> HashMap<String, String> {
        self.entries.read().clone()
    }

    fn read_entries(path: &Path) -> Option<HashMap<String, String>> {
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring corrupt affinity file");
                None
            }
        }
    }

    fn persist(&self, entries: &HashMap<String, String>) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "failed to create affinity directory");
                return;
            }
        }
        match serde_json::to_string_pretty(entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    warn!(path = %self.path.display(), error = %e, "failed to persist affinity");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize affinity entries"),
        }
    }
}

impl AffinityStore for FileAffinityStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries);
    }
}
