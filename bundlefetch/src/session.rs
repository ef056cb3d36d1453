//! Bundle sessions: the binding between a bundle identity, its endpoint
//! pool, and a possibly-resolved handle.
//!
//! A session lives for the whole process (created at registry
//! initialization, never explicitly destroyed). Resolving a session walks
//! the endpoint pool in pool order, starting from the affinity-seeded
//! endpoint, until one handle-open succeeds; the winner is persisted so
//! the next process starts there. Load operations delegate to the
//! [`RetryCoordinator`] for failover across the pool.
//!
//! Open failures during resolution never consult the failure classifier:
//! opening a handle either succeeds or it doesn't — there is no "handle
//! opened but content missing" distinction at this layer.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::affinity::{affinity_key, AffinityStore};
use crate::error::{FetchError, FetchResult};
use crate::pool::{normalize_url, BundleIdentity, EndpointPool};
use crate::retry::{RetryCoordinator, RetryTarget};
use crate::source::{Asset, BoxFuture, BundleHandle, BundleSource, ProgressFn, ResourceKind};

/// The session's bound-handle slot.
///
/// Holds the one handle currently open for the session's bundle, shared
/// between the session and in-flight retry cycles (which may rebind it
/// while failing over). The handle itself is owned by the external
/// source; the slot holds only a reference.
#[derive(Default)]
pub struct HandleSlot {
    inner: RwLock<Option<Arc<dyn BundleHandle>>>,
}

impl HandleSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently bound handle, if any.
    pub fn get(&self) -> Option<Arc<dyn BundleHandle>> {
        self.inner.read().clone()
    }

    /// Binds `handle`, replacing any previous binding.
    pub fn bind(&self, handle: Arc<dyn BundleHandle>) {
        *self.inner.write() = Some(handle);
    }

    /// Drops the current binding.
    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

/// A named, process-lifetime binding between a [`BundleIdentity`], an
/// [`EndpointPool`], and a possibly-resolved bundle handle.
pub struct BundleSession {
    identity: BundleIdentity,
    pool: EndpointPool,
    source: Arc<dyn BundleSource>,
    affinity: Arc<dyn AffinityStore>,
    coordinator: RetryCoordinator,
    slot: HandleSlot,
}

impl BundleSession {
    /// Creates a session with the default retry coordinator.
    pub fn new(
        identity: BundleIdentity,
        pool: EndpointPool,
        source: Arc<dyn BundleSource>,
        affinity: Arc<dyn AffinityStore>,
    ) -> Self {
        Self {
            identity,
            pool,
            source,
            affinity,
            coordinator: RetryCoordinator::default(),
            slot: HandleSlot::new(),
        }
    }

    /// Replaces the retry coordinator (custom classifier or attempt
    /// deadline).
    pub fn with_coordinator(mut self, coordinator: RetryCoordinator) -> Self {
        self.coordinator = coordinator;
        self
    }

    /// The bundle's logical name.
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// The bundle identity this session resolves.
    pub fn identity(&self) -> &BundleIdentity {
        &self.identity
    }

    /// The session's endpoint pool.
    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    /// The currently bound handle, if the session has resolved.
    pub fn handle(&self) -> Option<Arc<dyn BundleHandle>> {
        self.slot.get()
    }

    /// The endpoint resolution starts from: persisted affinity when
    /// available, else the pool's first entry.
    ///
    /// Local pools never consult affinity; a record left by an earlier
    /// remote-enabled run would point at a dead mirror.
    fn starting_endpoint(&self) -> String {
        if self.pool.is_local() {
            return normalize_url(self.pool.endpoint_at(0)).to_string();
        }
        match self.affinity.get(&affinity_key(&self.identity.name)) {
            Some(saved) => normalize_url(&saved).to_string(),
            None => normalize_url(self.pool.endpoint_at(0)).to_string(),
        }
    }

    /// Opens a handle for this bundle, walking candidate endpoints in
    /// pool order until one open succeeds.
    ///
    /// On success the normalized winning endpoint is persisted to the
    /// affinity store and the handle is bound to the session. The store
    /// is updated if and only if a remote handle was opened in this call;
    /// it is never cleared on failure and never written by local pools.
    pub async fn resolve(&self) -> FetchResult<Arc<dyn BundleHandle>> {
        let mut candidates = self.pool.candidates();
        let mut endpoint = self.starting_endpoint();
        let mut attempted = 0usize;

        loop {
            attempted += 1;
            match self.source.open(&endpoint, &self.identity).await {
                Ok(handle) => {
                    let winner = normalize_url(handle.base());
                    if !self.pool.is_local() {
                        self.affinity.set(&affinity_key(&self.identity.name), winner);
                    }
                    self.slot.bind(Arc::clone(&handle));
                    info!(bundle = %self.identity.name, endpoint = %winner, "bundle resolved");
                    return Ok(handle);
                }
                Err(err) => {
                    warn!(
                        bundle = %self.identity.name,
                        endpoint = %endpoint,
                        error = %err,
                        "failed to open bundle, trying next CDN"
                    );
                    candidates.retain(|candidate| candidate != &endpoint);
                    if candidates.is_empty() {
                        // `attempted` can exceed the pool length by one
                        // when the affinity-seeded start lies outside it.
                        return Err(FetchError::PoolExhausted {
                            bundle: self.identity.name.clone(),
                            attempted,
                        });
                    }
                    endpoint = candidates.remove(0);
                }
            }
        }
    }

    /// Returns the bound handle, resolving the session first if needed.
    pub async fn ensure_resolved(&self) -> FetchResult<Arc<dyn BundleHandle>> {
        if let Some(handle) = self.slot.get() {
            return Ok(handle);
        }
        self.resolve().await
    }

    /// Loads the named paths from this bundle, failing over across the
    /// pool on retryable failures.
    pub async fn load(
        &self,
        paths: &[String],
        kind: Option<ResourceKind>,
        progress: Option<ProgressFn>,
    ) -> FetchResult<Vec<Asset>> {
        let handle = self.ensure_resolved().await?;
        let paths: Arc<[String]> = paths.to_vec().into();
        let load = move |h: Arc<dyn BundleHandle>| -> BoxFuture<'static, FetchResult<Vec<Asset>>> {
            let paths = Arc::clone(&paths);
            let progress = progress.clone();
            Box::pin(async move { h.load(&paths, kind, progress).await })
        };
        self.coordinator.run(self.target(), handle, load).await
    }

    /// Loads every asset under `dir`, failing over across the pool on
    /// retryable failures.
    pub async fn load_dir(
        &self,
        dir: &str,
        kind: Option<ResourceKind>,
        progress: Option<ProgressFn>,
    ) -> FetchResult<Vec<Asset>> {
        let handle = self.ensure_resolved().await?;
        let dir: Arc<str> = dir.into();
        let load = move |h: Arc<dyn BundleHandle>| -> BoxFuture<'static, FetchResult<Vec<Asset>>> {
            let dir = Arc::clone(&dir);
            let progress = progress.clone();
            Box::pin(async move { h.load_dir(&dir, kind, progress).await })
        };
        self.coordinator.run(self.target(), handle, load).await
    }

    /// Returns a previously loaded asset from the bound handle's cache.
    pub fn get(&self, path: &str) -> Option<Asset> {
        self.slot.get()?.get(path)
    }

    /// Releases a cached asset from the bound handle.
    pub fn release(&self, path: &str) {
        if let Some(handle) = self.slot.get() {
            handle.release(path);
        }
    }

    fn target(&self) -> RetryTarget<'_> {
        RetryTarget {
            identity: &self.identity,
            pool: &self.pool,
            source: self.source.as_ref(),
            slot: &self.slot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::MemoryAffinityStore;
    use crate::source::mock::{asset, MockHandle, MockSource, OpenBehavior};

    fn session_over(
        bases: &[&str],
        source: Arc<MockSource>,
        affinity: Arc<MemoryAffinityStore>,
    ) -> BundleSession {
        let identity = BundleIdentity::unversioned("main");
        let bases: Vec<String> = bases.iter().map(|b| b.to_string()).collect();
        let pool = EndpointPool::remote(&identity, &bases);
        BundleSession::new(identity, pool, source, affinity)
    }

    #[tokio::test]
    async fn test_resolve_walks_pool_order_and_persists_winner() {
        let source = MockSource::new();
        let affinity = Arc::new(MemoryAffinityStore::new());

        source.script("http://cdn-a/main", OpenBehavior::Fail("refused"));
        let healthy = MockHandle::new("http://cdn-b/main");
        source.script("http://cdn-b/main", OpenBehavior::Succeed(healthy));

        let session = session_over(&["http://cdn-a", "http://cdn-b"], source.clone(), affinity.clone());
        let handle = session.resolve().await.unwrap();

        assert_eq!(handle.base(), "http://cdn-b/main");
        assert_eq!(
            affinity.get(&affinity_key("main")).as_deref(),
            Some("http://cdn-b/main")
        );
        assert_eq!(
            *source.opens.lock(),
            vec!["http://cdn-a/main", "http://cdn-b/main"]
        );
    }

    #[tokio::test]
    async fn test_resolve_starts_from_persisted_affinity() {
        let source = MockSource::new();
        let affinity = Arc::new(MemoryAffinityStore::new());
        // A previous session succeeded on cdn-b; note the trailing slash
        // to exercise normalization of the stored value.
        affinity.set(&affinity_key("main"), "http://cdn-b/main/");

        let healthy = MockHandle::new("http://cdn-b/main");
        source.script("http://cdn-b/main", OpenBehavior::Succeed(healthy));

        let session = session_over(&["http://cdn-a", "http://cdn-b"], source.clone(), affinity);
        session.resolve().await.unwrap();

        // cdn-a was never tried.
        assert_eq!(*source.opens.lock(), vec!["http://cdn-b/main"]);
    }

    #[tokio::test]
    async fn test_resolve_exhaustion_leaves_affinity_untouched() {
        let source = MockSource::new();
        let affinity = Arc::new(MemoryAffinityStore::new());
        affinity.set(&affinity_key("main"), "http://cdn-old/main");

        source.script("http://cdn-a/main", OpenBehavior::Fail("refused"));
        source.script("http://cdn-b/main", OpenBehavior::Fail("refused"));

        let session = session_over(&["http://cdn-a", "http://cdn-b"], source.clone(), affinity.clone());
        let result = session.resolve().await;

        assert!(matches!(result, Err(FetchError::PoolExhausted { .. })));
        // Stale affinity is preferable to none.
        assert_eq!(
            affinity.get(&affinity_key("main")).as_deref(),
            Some("http://cdn-old/main")
        );
    }

    #[tokio::test]
    async fn test_local_pool_ignores_stale_remote_affinity() {
        let source = MockSource::new();
        let affinity = Arc::new(MemoryAffinityStore::new());
        // Leftover from an earlier remote-enabled run.
        affinity.set(&affinity_key("main"), "http://old-remote-cdn/main");

        let local = MockHandle::new("main");
        source.script("main", OpenBehavior::Succeed(local));

        let identity = BundleIdentity::unversioned("main");
        let session = BundleSession::new(
            identity.clone(),
            EndpointPool::local(&identity),
            source.clone(),
            affinity.clone(),
        );
        let handle = session.resolve().await.unwrap();

        assert_eq!(handle.base(), "main");
        // The dead remote endpoint was never attempted, and the record
        // was not overwritten with the bare local name.
        assert_eq!(*source.opens.lock(), vec!["main"]);
        assert_eq!(
            affinity.get(&affinity_key("main")).as_deref(),
            Some("http://old-remote-cdn/main")
        );
    }

    #[tokio::test]
    async fn test_exhaustion_counts_affinity_start_outside_pool() {
        let source = MockSource::new();
        let affinity = Arc::new(MemoryAffinityStore::new());
        // Affinity points outside the current pool; every open fails.
        affinity.set(&affinity_key("main"), "http://cdn-gone/main");

        let session = session_over(&["http://cdn-a", "http://cdn-b"], source.clone(), affinity);
        let result = session.resolve().await;

        match result {
            Err(FetchError::PoolExhausted { attempted, .. }) => assert_eq!(attempted, 3),
            other => panic!("expected PoolExhausted, got {:?}", other),
        }
        assert_eq!(source.open_count(), 3);
    }

    #[tokio::test]
    async fn test_stale_affinity_falls_back_to_pool() {
        let source = MockSource::new();
        let affinity = Arc::new(MemoryAffinityStore::new());
        // Affinity points at an endpoint no longer in the pool.
        affinity.set(&affinity_key("main"), "http://cdn-gone/main");

        source.script("http://cdn-gone/main", OpenBehavior::Fail("refused"));
        let healthy = MockHandle::new("http://cdn-a/main");
        source.script("http://cdn-a/main", OpenBehavior::Succeed(healthy));

        let session = session_over(&["http://cdn-a"], source.clone(), affinity);
        let handle = session.resolve().await.unwrap();
        assert_eq!(handle.base(), "http://cdn-a/main");
    }

    #[tokio::test]
    async fn test_ensure_resolved_reuses_bound_handle() {
        let source = MockSource::new();
        let affinity = Arc::new(MemoryAffinityStore::new());

        let healthy = MockHandle::new("http://cdn-a/main");
        source.script("http://cdn-a/main", OpenBehavior::Succeed(healthy));

        let session = session_over(&["http://cdn-a"], source.clone(), affinity);
        session.ensure_resolved().await.unwrap();
        session.ensure_resolved().await.unwrap();

        assert_eq!(source.open_count(), 1);
    }

    #[tokio::test]
    async fn test_load_resolves_then_fetches() {
        let source = MockSource::new();
        let affinity = Arc::new(MemoryAffinityStore::new());

        let healthy =
            MockHandle::scripted("http://cdn-a/main", vec![Ok(vec![asset("ui/logo.png")])]);
        source.script("http://cdn-a/main", OpenBehavior::Succeed(healthy.clone()));

        let session = session_over(&["http://cdn-a"], source, affinity);
        let assets = session
            .load(&["ui/logo.png".to_string()], None, None)
            .await
            .unwrap();

        assert_eq!(assets.len(), 1);
        assert_eq!(healthy.load_count(), 1);
    }

    #[tokio::test]
    async fn test_get_without_resolution_is_none() {
        let source = MockSource::new();
        let affinity = Arc::new(MemoryAffinityStore::new());
        let session = session_over(&["http://cdn-a"], source, affinity);
        assert!(session.get("ui/logo.png").is_none());
        // Release on an unresolved session is a no-op, not a panic.
        session.release("ui/logo.png");
    }
}
