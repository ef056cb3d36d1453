//! External collaborator seams: bundle sources and handles.
//!
//! The failover core never talks to the network or an asset cache
//! directly. It consumes two narrow traits:
//!
//! - [`BundleSource`]: the handle-open primitive — opens a session-scoped
//!   [`BundleHandle`] bound to one endpoint
//! - [`BundleHandle`]: the load primitive plus the asset cache surface of
//!   an opened bundle
//!
//! Both use `Pin<Box<dyn Future>>` returns so they stay dyn-compatible
//! (`Arc<dyn BundleSource>`), letting tests substitute scripted mocks and
//! letting deployments plug in their own asset-manager layer. The shipped
//! HTTP implementation lives in [`http`].
//!
//! Exactly-once completion per invocation is the future contract: a
//! returned future resolves to a single `Result`.

mod http;

pub use http::{HttpBundleSource, DEFAULT_HTTP_TIMEOUT_SECS};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::FetchResult;
use crate::pool::BundleIdentity;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Progress callback: `(finished, total, item)`.
pub type ProgressFn = Arc<dyn Fn(usize, usize, &str) + Send + Sync>;

/// Opaque tag describing how a fetched asset should be interpreted.
///
/// The core passes this through to the source untouched; asset-type
/// specific behavior is out of scope here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Binary,
    /// JSON document.
    Json,
    /// Deployment-defined kind.
    Custom(&'static str),
}

/// A fetched resource: path, kind, and payload.
///
/// Payloads are [`Bytes`] so cached assets clone cheaply.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Path of the asset inside its bundle.
    pub path: String,
    /// How the asset should be interpreted.
    pub kind: ResourceKind,
    /// Raw payload.
    pub bytes: Bytes,
}

/// An opened bundle bound to one endpoint.
///
/// Handles are owned by the external source; sessions hold only an `Arc`
/// reference. `base()` must return the endpoint the handle is bound to —
/// the retry coordinator matches it (normalized) against its candidate
/// set.
pub trait BundleHandle: Send + Sync + std::fmt::Debug {
    /// The endpoint URL this handle is bound to.
    fn base(&self) -> &str;

    /// Loads the named paths from the bundle.
    ///
    /// Must resolve exactly once, with either the loaded assets in request
    /// order or the first failure encountered.
    fn load<'a>(
        &'a self,
        paths: &'a [String],
        kind: Option<ResourceKind>,
        progress: Option<ProgressFn>,
    ) -> BoxFuture<'a, FetchResult<Vec<Asset>>>;

    /// Loads every asset under `dir`.
    fn load_dir<'a>(
        &'a self,
        dir: &'a str,
        kind: Option<ResourceKind>,
        progress: Option<ProgressFn>,
    ) -> BoxFuture<'a, FetchResult<Vec<Asset>>>;

    /// Returns a previously loaded asset from the handle's cache.
    fn get(&self, path: &str) -> Option<Asset>;

    /// Releases a cached asset.
    fn release(&self, path: &str);

    /// Whether the bundle is known to contain `path` (an exact entry or
    /// a directory holding entries). Used to route requests that name no
    /// bundle; `false` when the source cannot tell.
    fn contains(&self, _path: &str) -> bool {
        false
    }
}

/// The handle-open primitive.
pub trait BundleSource: Send + Sync {
    /// Opens a bundle handle bound to `endpoint`.
    ///
    /// `endpoint` is a full bundle location from the session's
    /// [`EndpointPool`](crate::pool::EndpointPool); `identity` supplies
    /// the bundle name and version. Must resolve exactly once.
    fn open<'a>(
        &'a self,
        endpoint: &'a str,
        identity: &'a BundleIdentity,
    ) -> BoxFuture<'a, FetchResult<Arc<dyn BundleHandle>>>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted source/handle mocks shared by coordinator, session, and
    //! registry tests.

    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::error::FetchError;
    use crate::pool::normalize_url;

    /// Builds a trivial asset for scripting load outcomes.
    pub fn asset(path: &str) -> Asset {
        Asset {
            path: path.to_string(),
            kind: ResourceKind::Binary,
            bytes: Bytes::from_static(b"payload"),
        }
    }

    /// Handle whose `load`/`load_dir` pop scripted outcomes in order.
    ///
    /// Once the script is exhausted further loads succeed with an empty
    /// asset list.
    #[derive(Debug)]
    pub struct MockHandle {
        base: String,
        script: Mutex<VecDeque<FetchResult<Vec<Asset>>>>,
        /// Number of load attempts made against this handle.
        pub loads: AtomicUsize,
        cache: Mutex<HashMap<String, Asset>>,
    }

    impl MockHandle {
        pub fn new(base: &str) -> Arc<Self> {
            Self::scripted(base, Vec::new())
        }

        pub fn scripted(base: &str, outcomes: Vec<FetchResult<Vec<Asset>>>) -> Arc<Self> {
            Arc::new(Self {
                base: base.to_string(),
                script: Mutex::new(outcomes.into()),
                loads: AtomicUsize::new(0),
                cache: Mutex::new(HashMap::new()),
            })
        }

        pub fn load_count(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }

        /// Marks `path` as present in the bundle by stocking the cache.
        pub fn stock(&self, path: &str) {
            self.cache.lock().insert(path.to_string(), asset(path));
        }

        fn next_outcome(&self) -> FetchResult<Vec<Asset>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    impl BundleHandle for MockHandle {
        fn base(&self) -> &str {
            &self.base
        }

        fn load<'a>(
            &'a self,
            _paths: &'a [String],
            _kind: Option<ResourceKind>,
            _progress: Option<ProgressFn>,
        ) -> BoxFuture<'a, FetchResult<Vec<Asset>>> {
            Box::pin(async move { self.next_outcome() })
        }

        fn load_dir<'a>(
            &'a self,
            _dir: &'a str,
            _kind: Option<ResourceKind>,
            _progress: Option<ProgressFn>,
        ) -> BoxFuture<'a, FetchResult<Vec<Asset>>> {
            Box::pin(async move { self.next_outcome() })
        }

        fn get(&self, path: &str) -> Option<Asset> {
            self.cache.lock().get(path).cloned()
        }

        fn release(&self, path: &str) {
            self.cache.lock().remove(path);
        }

        fn contains(&self, path: &str) -> bool {
            self.cache.lock().contains_key(path)
        }
    }

    /// Per-endpoint open behavior for [`MockSource`].
    pub enum OpenBehavior {
        /// `open` fails with a handle-open error carrying this reason.
        Fail(&'static str),
        /// `open` succeeds with this handle.
        Succeed(Arc<MockHandle>),
    }

    /// Source whose `open` outcomes are scripted per normalized endpoint.
    #[derive(Default)]
    pub struct MockSource {
        behaviors: Mutex<HashMap<String, OpenBehavior>>,
        /// Endpoints passed to `open`, in call order.
        pub opens: Mutex<Vec<String>>,
    }

    impl MockSource {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn script(&self, endpoint: &str, behavior: OpenBehavior) {
            self.behaviors
                .lock()
                .insert(normalize_url(endpoint).to_string(), behavior);
        }

        pub fn open_count(&self) -> usize {
            self.opens.lock().len()
        }
    }

    impl BundleSource for MockSource {
        fn open<'a>(
            &'a self,
            endpoint: &'a str,
            _identity: &'a BundleIdentity,
        ) -> BoxFuture<'a, FetchResult<Arc<dyn BundleHandle>>> {
            Box::pin(async move {
                let key = normalize_url(endpoint).to_string();
                self.opens.lock().push(key.clone());
                match self.behaviors.lock().get(&key) {
                    Some(OpenBehavior::Succeed(handle)) => {
                        Ok(Arc::clone(handle) as Arc<dyn BundleHandle>)
                    }
                    Some(OpenBehavior::Fail(reason)) => Err(FetchError::HandleOpen {
                        endpoint: key,
                        reason: (*reason).to_string(),
                    }),
                    None => Err(FetchError::HandleOpen {
                        endpoint: key,
                        reason: "unscripted endpoint".to_string(),
                    }),
                }
            })
        }
    }
}
