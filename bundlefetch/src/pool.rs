//! Endpoint pool and bundle identity.
//!
//! An [`EndpointPool`] is the ordered, never-empty list of candidate URLs
//! a bundle can be fetched from. It is pure data: construction combines a
//! caller-supplied override with the built-in default pool, and index
//! access wraps modulo the pool length so any non-negative index is valid.
//!
//! URL comparison across the failover machinery runs on normalized URLs
//! (trailing slashes stripped); [`normalize_url`] is the single place that
//! rule lives.

/// Built-in CDN base locations, highest priority first.
///
/// Deployments normally ship their own pool via
/// [`FetchConfig`](crate::config::FetchConfig); this default keeps the
/// pool invariant (never empty) when they don't.
pub const DEFAULT_CDN_POOL: &[&str] = &["http://127.0.0.1:4002"];

/// Strips all trailing slashes from a URL.
///
/// Idempotent: `normalize_url(normalize_url(x)) == normalize_url(x)`.
/// Two spellings of the same endpoint that differ only in trailing
/// slashes compare equal after normalization; the retry machinery relies
/// on this to remove a tried candidate exactly once.
pub fn normalize_url(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// The logical identity of a bundle: name plus optional version.
///
/// Immutable once a session is constructed. An empty version means
/// "unversioned".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleIdentity {
    /// Logical bundle name, e.g. `"mainresources"`.
    pub name: String,
    /// Bundle version; empty for unversioned bundles.
    pub version: String,
}

impl BundleIdentity {
    /// Creates a new bundle identity.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Creates an unversioned identity.
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }

    /// Whether this identity carries a version.
    pub fn is_versioned(&self) -> bool {
        !self.version.is_empty()
    }
}

/// Ordered, non-empty list of candidate bundle URLs.
///
/// Each entry is a full bundle location (`{cdn_base}/{bundle_name}`).
/// The pool never holds zero entries: when remote fetching is disabled it
/// collapses to the single logical/local location (the bare bundle name).
#[derive(Debug, Clone)]
pub struct EndpointPool {
    urls: Vec<String>,
    local: bool,
}

impl EndpointPool {
    /// Builds a remote pool for `identity` from CDN base locations.
    ///
    /// Uses `override_bases` when non-empty, otherwise the built-in
    /// [`DEFAULT_CDN_POOL`]. Bases are normalized before the bundle name
    /// is appended.
    pub fn remote(identity: &BundleIdentity, override_bases: &[String]) -> Self {
        let urls = if override_bases.is_empty() {
            DEFAULT_CDN_POOL
                .iter()
                .map(|base| format!("{}/{}", normalize_url(base), identity.name))
                .collect()
        } else {
            override_bases
                .iter()
                .map(|base| format!("{}/{}", normalize_url(base), identity.name))
                .collect()
        };
        Self { urls, local: false }
    }

    /// Builds the single-entry local pool: the bare bundle name.
    ///
    /// Used when remote CDNs are disabled; the external source resolves
    /// the name against its local store.
    pub fn local(identity: &BundleIdentity) -> Self {
        Self {
            urls: vec![identity.name.clone()],
            local: true,
        }
    }

    /// Whether this is the single-entry local pool.
    ///
    /// Local pools never participate in mirror affinity: there is no
    /// mirror to remember, and a record left by an earlier remote run
    /// must not be consulted.
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Number of endpoints in the pool. Always at least 1.
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Always false; kept for API completeness.
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Returns the endpoint at `index`, wrapping modulo the pool length.
    pub fn endpoint_at(&self, index: usize) -> &str {
        &self.urls[index % self.urls.len()]
    }

    /// All endpoints, normalized, in pool order.
    ///
    /// This is the working candidate list a retry cycle starts from.
    pub fn candidates(&self) -> Vec<String> {
        self.urls
            .iter()
            .map(|url| normalize_url(url).to_string())
            .collect()
    }
}
