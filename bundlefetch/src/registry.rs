//! Bundle registry and preload barrier.
//!
//! The registry holds a fixed set of named [`BundleSession`]s in
//! registration order and routes load requests to them. It is an explicit
//! value — constructed once at process start (typically from
//! [`FetchConfig`](crate::config::FetchConfig)) and passed by reference to
//! anything needing bundle resolution; there is no module-level singleton.
//!
//! `preload_all` resolves every registered session concurrently and
//! succeeds only if all of them do. The first observed failure becomes the
//! aggregate result; resolutions still in flight are not cancelled, they
//! just complete unobserved in the background.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info};

use crate::affinity::AffinityStore;
use crate::config::FetchConfig;
use crate::error::{FetchError, FetchResult};
use crate::pool::{BundleIdentity, EndpointPool};
use crate::request::LoadRequest;
use crate::session::BundleSession;
use crate::source::{Asset, BundleHandle, BundleSource, ProgressFn};

/// Named sessions plus the preload barrier over them.
#[derive(Default)]
pub struct BundleRegistry {
    sessions: Vec<Arc<BundleSession>>,
}

impl BundleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from configuration: one session per configured
    /// bundle, sharing the given source and affinity store.
    pub fn from_config(
        config: &FetchConfig,
        source: Arc<dyn BundleSource>,
        affinity: Arc<dyn AffinityStore>,
    ) -> FetchResult<Self> {
        let mut registry = Self::new();
        for bundle in &config.bundles {
            let identity = BundleIdentity::new(&bundle.name, &bundle.version);
            let pool = if config.remote_enabled {
                let bases = if bundle.cdn_pool.is_empty() {
                    &config.default_pool
                } else {
                    &bundle.cdn_pool
                };
                EndpointPool::remote(&identity, bases)
            } else {
                EndpointPool::local(&identity)
            };
            registry.register(BundleSession::new(
                identity,
                pool,
                Arc::clone(&source),
                Arc::clone(&affinity),
            ))?;
        }
        Ok(registry)
    }

    /// Registers a session. One session per bundle name.
    pub fn register(&mut self, session: BundleSession) -> FetchResult<()> {
        if self.sessions.iter().any(|s| s.name() == session.name()) {
            return Err(FetchError::Configuration(format!(
                "bundle '{}' is already registered",
                session.name()
            )));
        }
        debug!(bundle = %session.name(), "registered bundle session");
        self.sessions.push(Arc::new(session));
        Ok(())
    }

    /// Looks up a session by bundle name.
    pub fn session(&self, name: &str) -> Option<&Arc<BundleSession>> {
        self.sessions.iter().find(|s| s.name() == name)
    }

    /// All sessions, in registration order.
    pub fn sessions(&self) -> &[Arc<BundleSession>] {
        &self.sessions
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Resolves every registered session concurrently.
    ///
    /// Succeeds only if all sessions resolve, returning their handles in
    /// registration order. Fails with the first failure observed; other
    /// in-flight resolutions are left running and their outcomes are not
    /// observed by this call. An empty registry is a configuration error.
    pub async fn preload_all(&self) -> FetchResult<Vec<Arc<dyn BundleHandle>>> {
        if self.sessions.is_empty() {
            return Err(FetchError::Configuration(
                "no bundles registered".to_string(),
            ));
        }

        let mut pending = FuturesUnordered::new();
        for (index, session) in self.sessions.iter().enumerate() {
            let session = Arc::clone(session);
            pending.push(tokio::spawn(
                async move { (index, session.resolve().await) },
            ));
        }

        let mut resolved: Vec<(usize, Arc<dyn BundleHandle>)> =
            Vec::with_capacity(self.sessions.len());
        while let Some(joined) = pending.next().await {
            let (index, result) = joined
                .map_err(|e| FetchError::Unclassified(format!("preload task failed: {}", e)))?;
            match result {
                Ok(handle) => resolved.push((index, handle)),
                Err(err) => return Err(err),
            }
        }

        resolved.sort_by_key(|(index, _)| *index);
        info!(bundles = resolved.len(), "preloaded all bundles");
        Ok(resolved.into_iter().map(|(_, handle)| handle).collect())
    }

    /// Loads assets per `request`.
    ///
    /// Routed to the named session; a request naming no bundle is routed
    /// to the first resolved session whose bundle contains the requested
    /// path (or directory), falling back to the first-registered session.
    pub async fn load(
        &self,
        request: &LoadRequest,
        progress: Option<ProgressFn>,
    ) -> FetchResult<Vec<Asset>> {
        let session = self.route_request(request)?;
        match &request.dir {
            Some(dir) => session.load_dir(dir, request.kind, progress).await,
            None => session.load(&request.paths, request.kind, progress).await,
        }
    }

    /// Finds the first session (registration order) whose resolved bundle
    /// contains `path`. Unresolved sessions cannot match.
    pub fn session_for_path(&self, path: &str) -> Option<&Arc<BundleSession>> {
        self.sessions
            .iter()
            .find(|s| s.handle().map_or(false, |h| h.contains(path)))
    }

    /// Returns a previously loaded asset from the routed session's cache.
    pub fn get(&self, path: &str, bundle: Option<&str>) -> Option<Asset> {
        match bundle {
            Some(name) => self.session(name)?.get(path),
            None => self
                .session_for_path(path)
                .or_else(|| self.sessions.first())?
                .get(path),
        }
    }

    /// Releases a cached asset from the routed session.
    pub fn release(&self, path: &str, bundle: Option<&str>) {
        let session = match bundle {
            Some(name) => self.session(name),
            None => self.session_for_path(path).or_else(|| self.sessions.first()),
        };
        if let Some(session) = session {
            session.release(path);
        }
    }

    fn route_request(&self, request: &LoadRequest) -> FetchResult<&Arc<BundleSession>> {
        if request.bundle.is_some() {
            return self.route(request.bundle.as_deref());
        }
        let probe = request
            .dir
            .as_deref()
            .or_else(|| request.paths.first().map(String::as_str));
        if let Some(session) = probe.and_then(|p| self.session_for_path(p)) {
            return Ok(session);
        }
        self.route(None)
    }

    fn route(&self, bundle: Option<&str>) -> FetchResult<&Arc<BundleSession>> {
        match bundle {
            Some(name) => self.session(name).ok_or_else(|| {
                FetchError::Configuration(format!("unknown bundle '{}'", name))
            }),
            None => self.sessions.first().ok_or_else(|| {
                FetchError::Configuration("no bundles registered".to_string())
            }),
        }
    }
}
