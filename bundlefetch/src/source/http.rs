//! HTTP bundle source backed by reqwest.
//!
//! A bundle served over HTTP is a directory of assets described by a JSON
//! manifest:
//!
//! ```text
//! {endpoint}/manifest.json              (unversioned)
//! {endpoint}/{version}/manifest.json    (versioned)
//! ```
//!
//! ```json
//! { "entries": ["ui/logo.png", "data/levels.json"] }
//! ```
//!
//! Opening a handle fetches and parses the manifest; loading fetches the
//! listed entries and caches them in-process. Transport failures surface
//! as connectivity errors and entries missing from the manifest (or
//! returning 404) surface as content-absence errors, so the failure
//! classifier recognizes both without special cases.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Deserialize;
use tracing::debug;

use super::{Asset, BoxFuture, BundleHandle, BundleSource, ProgressFn, ResourceKind};
use crate::error::{FetchError, FetchResult};
use crate::pool::{normalize_url, BundleIdentity};

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// JSON manifest describing a bundle's contents.
#[derive(Debug, Deserialize)]
struct BundleManifest {
    /// Asset paths contained in the bundle, in manifest order.
    entries: Vec<String>,
}

/// Real [`BundleSource`] implementation over HTTP.
pub struct HttpBundleSource {
    client: reqwest::Client,
}

impl HttpBundleSource {
    /// Creates a source with the default request timeout.
    pub fn new() -> FetchResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
    }

    /// Creates a source with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                FetchError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }
}

/// Builds the content root for a bundle: `{endpoint}` or
/// `{endpoint}/{version}`.
fn content_root(endpoint: &str, identity: &BundleIdentity) -> String {
    let base = normalize_url(endpoint);
    if identity.is_versioned() {
        format!("{}/{}", base, identity.version)
    } else {
        base.to_string()
    }
}

/// Maps a reqwest error to the failure vocabulary the classifier knows.
fn transport_error(endpoint: &str, err: &reqwest::Error) -> FetchError {
    let reason = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("connection refused or unreachable: {}", err)
    } else {
        err.to_string()
    };
    FetchError::Connectivity {
        endpoint: endpoint.to_string(),
        reason,
    }
}

impl BundleSource for HttpBundleSource {
    fn open<'a>(
        &'a self,
        endpoint: &'a str,
        identity: &'a BundleIdentity,
    ) -> BoxFuture<'a, FetchResult<Arc<dyn BundleHandle>>> {
        Box::pin(async move {
            let root = content_root(endpoint, identity);
            let manifest_url = format!("{}/manifest.json", root);
            debug!(endpoint, %manifest_url, "opening bundle handle");

            let response = self
                .client
                .get(&manifest_url)
                .send()
                .await
                .map_err(|e| FetchError::HandleOpen {
                    endpoint: endpoint.to_string(),
                    reason: transport_error(endpoint, &e).to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::HandleOpen {
                    endpoint: endpoint.to_string(),
                    reason: format!("manifest request returned HTTP {}", status),
                });
            }

            let manifest: BundleManifest =
                response.json().await.map_err(|e| FetchError::HandleOpen {
                    endpoint: endpoint.to_string(),
                    reason: format!("invalid manifest: {}", e),
                })?;

            let handle = HttpBundleHandle {
                base: normalize_url(endpoint).to_string(),
                root,
                bundle: identity.name.clone(),
                client: self.client.clone(),
                entries: manifest.entries,
                cache: DashMap::new(),
            };
            Ok(Arc::new(handle) as Arc<dyn BundleHandle>)
        })
    }
}

/// An opened HTTP bundle: manifest entries plus an in-process asset cache.
#[derive(Debug)]
pub struct HttpBundleHandle {
    /// Normalized endpoint this handle is bound to.
    base: String,
    /// Content root, version-qualified when applicable.
    root: String,
    /// Logical bundle name, for error reporting.
    bundle: String,
    client: reqwest::Client,
    entries: Vec<String>,
    cache: DashMap<String, Asset>,
}

impl HttpBundleHandle {
    /// Manifest entries under `dir`, in manifest order.
    fn entries_under(&self, dir: &str) -> Vec<String> {
        let prefix = normalize_url(dir);
        self.entries
            .iter()
            .filter(|entry| {
                prefix.is_empty()
                    || entry.as_str() == prefix
                    || entry.starts_with(&format!("{}/", prefix))
            })
            .cloned()
            .collect()
    }

    async fn fetch_one(&self, path: &str, kind: Option<ResourceKind>) -> FetchResult<Asset> {
        if let Some(asset) = self.cache.get(path) {
            return Ok(asset.clone());
        }

        if !self.entries.iter().any(|entry| entry == path) {
            return Err(FetchError::ContentAbsent {
                bundle: self.bundle.clone(),
                path: path.to_string(),
            });
        }

        let url = format!("{}/{}", self.root, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(&self.base, &e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::ContentAbsent {
                bundle: self.bundle.clone(),
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Unclassified(format!(
                "endpoint {} returned HTTP {} for '{}'",
                self.base, status, path
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(&self.base, &e))?;

        let asset = Asset {
            path: path.to_string(),
            kind: kind.unwrap_or(ResourceKind::Binary),
            bytes,
        };
        self.cache.insert(path.to_string(), asset.clone());
        Ok(asset)
    }

    async fn fetch_all(
        &self,
        paths: &[String],
        kind: Option<ResourceKind>,
        progress: Option<ProgressFn>,
    ) -> FetchResult<Vec<Asset>> {
        let total = paths.len();
        let mut assets = Vec::with_capacity(total);
        for (finished, path) in paths.iter().enumerate() {
            let asset = self.fetch_one(path, kind).await?;
            assets.push(asset);
            if let Some(ref cb) = progress {
                cb(finished + 1, total, path);
            }
        }
        Ok(assets)
    }
}

impl BundleHandle for HttpBundleHandle {
    fn base(&self) -> &str {
        &self.base
    }

    fn load<'a>(
        &'a self,
        paths: &'a [String],
        kind: Option<ResourceKind>,
        progress: Option<ProgressFn>,
    ) -> BoxFuture<'a, FetchResult<Vec<Asset>>> {
        Box::pin(async move { self.fetch_all(paths, kind, progress).await })
    }

    fn load_dir<'a>(
        &'a self,
        dir: &'a str,
        kind: Option<ResourceKind>,
        progress: Option<ProgressFn>,
    ) -> BoxFuture<'a, FetchResult<Vec<Asset>>> {
        Box::pin(async move {
            let paths = self.entries_under(dir);
            if paths.is_empty() {
                return Err(FetchError::ContentAbsent {
                    bundle: self.bundle.clone(),
                    path: dir.to_string(),
                });
            }
            self.fetch_all(&paths, kind, progress).await
        })
    }

    fn get(&self, path: &str) -> Option<Asset> {
        self.cache.get(path).map(|asset| asset.clone())
    }

    fn release(&self, path: &str) {
        self.cache.remove(path);
    }

    fn contains(&self, path: &str) -> bool {
        let target = normalize_url(path);
        self.entries.iter().any(|entry| {
            entry.as_str() == target || entry.starts_with(&format!("{}/", target))
        })
    }
}
