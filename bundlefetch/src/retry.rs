//! CDN failover/retry coordinator.
//!
//! Executes one caller-supplied load operation against a sequence of
//! candidate bundle endpoints until it succeeds, a non-retryable failure
//! occurs, or every candidate has been tried.
//!
//! # Algorithm
//!
//! 1. Seed the working candidate set with every pool endpoint, normalized.
//! 2. Try the initial handle's endpoint first. It may not be the pool's
//!    first entry — it was typically resolved earlier via persisted
//!    affinity.
//! 3. On failure, remove the endpoint just tried from the candidates and
//!    consult the [`FailureClassifier`]: a non-retryable failure is
//!    surfaced as-is without touching the remaining candidates.
//! 4. Otherwise pick the next candidate, preferring a handle the session
//!    already has open when its endpoint is still untried. Failing to
//!    open a candidate is always retryable against the remainder.
//! 5. An empty candidate set is terminal: `PoolExhausted`.
//!
//! Attempts within one invocation are strictly sequential; attempt N+1
//! never starts before attempt N's outcome is known.
//!
//! # Single delivery
//!
//! [`RetryCoordinator::run`] is an `async fn` returning one `Result`, so
//! double completion is unrepresentable. The callback-facing
//! [`RetryCoordinator::run_with_callback`] takes an `FnOnce`, which the
//! type system prevents from firing twice.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::classify::FailureClassifier;
use crate::error::{FetchError, FetchResult};
use crate::pool::{normalize_url, BundleIdentity, EndpointPool};
use crate::session::HandleSlot;
use crate::source::{BoxFuture, BundleHandle, BundleSource};

/// Everything a retry cycle needs to know about the bundle it serves.
///
/// Borrowed from the owning [`BundleSession`](crate::session::BundleSession);
/// the coordinator itself holds no per-bundle state.
pub struct RetryTarget<'a> {
    /// Identity of the bundle being loaded.
    pub identity: &'a BundleIdentity,
    /// Candidate endpoint pool.
    pub pool: &'a EndpointPool,
    /// Handle-open primitive for switching endpoints.
    pub source: &'a dyn BundleSource,
    /// The session's bound-handle slot, reused when its endpoint is still
    /// an untried candidate.
    pub slot: &'a HandleSlot,
}

/// Coordinates one logical load operation across candidate endpoints.
#[derive(Debug, Clone, Default)]
pub struct RetryCoordinator {
    classifier: FailureClassifier,
    attempt_timeout: Option<Duration>,
}

impl RetryCoordinator {
    /// Creates a coordinator with the given classification policy and no
    /// per-attempt deadline.
    pub fn new(classifier: FailureClassifier) -> Self {
        Self {
            classifier,
            attempt_timeout: None,
        }
    }

    /// Sets a deadline for each individual attempt.
    ///
    /// Without one, an endpoint that accepts a connection but never
    /// completes the load suspends the operation indefinitely. A timed-out
    /// attempt counts as a connectivity failure of that endpoint, so
    /// normal failover applies.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Runs `load` against `initial` and, on retryable failures, against
    /// further candidates until success, a non-retryable failure, or
    /// exhaustion.
    ///
    /// The returned `Result` is the operation's single completion.
    pub async fn run<T, F>(
        &self,
        target: RetryTarget<'_>,
        initial: Arc<dyn BundleHandle>,
        load: F,
    ) -> FetchResult<T>
    where
        F: Fn(Arc<dyn BundleHandle>) -> BoxFuture<'static, FetchResult<T>>,
    {
        let mut candidates = target.pool.candidates();
        let mut handle = initial;
        let mut attempts = 0usize;

        loop {
            let endpoint = normalize_url(handle.base()).to_string();
            attempts += 1;
            match self.attempt(&endpoint, load(Arc::clone(&handle))).await {
                Ok(value) => {
                    debug!(%endpoint, bundle = %target.identity.name, "load succeeded");
                    return Ok(value);
                }
                Err(err) => {
                    // Normalized match, so trailing-slash variants of the
                    // same endpoint cannot leave a stale candidate behind.
                    candidates.retain(|candidate| candidate != &endpoint);

                    if !self.classifier.should_retry(&err) {
                        warn!(%endpoint, error = %err, "failure is not retryable, surfacing");
                        return Err(err);
                    }

                    warn!(
                        %endpoint,
                        error = %err,
                        remaining = candidates.len(),
                        "load failed, switching CDN"
                    );
                    handle = self.next_handle(&target, &mut candidates, attempts).await?;
                }
            }
        }
    }

    /// Callback flavor of [`run`](Self::run): `on_complete` fires exactly
    /// once with the operation's result.
    pub async fn run_with_callback<T, F, C>(
        &self,
        target: RetryTarget<'_>,
        initial: Arc<dyn BundleHandle>,
        load: F,
        on_complete: C,
    ) where
        F: Fn(Arc<dyn BundleHandle>) -> BoxFuture<'static, FetchResult<T>>,
        C: FnOnce(FetchResult<T>),
    {
        let result = self.run(target, initial, load).await;
        on_complete(result);
    }

    async fn attempt<T>(
        &self,
        endpoint: &str,
        fut: BoxFuture<'static, FetchResult<T>>,
    ) -> FetchResult<T> {
        match self.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Connectivity {
                    endpoint: endpoint.to_string(),
                    reason: format!("no response within {:?}", limit),
                }),
            },
            None => fut.await,
        }
    }

    /// Selects the next handle to try, consuming candidates as needed.
    ///
    /// `attempts` is the number of load attempts already made; it can
    /// exceed the pool length by one when the initial handle's endpoint
    /// lies outside the pool.
    async fn next_handle(
        &self,
        target: &RetryTarget<'_>,
        candidates: &mut Vec<String>,
        attempts: usize,
    ) -> FetchResult<Arc<dyn BundleHandle>> {
        loop {
            if candidates.is_empty() {
                return Err(FetchError::PoolExhausted {
                    bundle: target.identity.name.clone(),
                    attempted: attempts,
                });
            }

            // Prefer a handle the session already has open over opening a
            // new one, as long as its endpoint is still untried.
            if let Some(existing) = target.slot.get() {
                let base = normalize_url(existing.base()).to_string();
                if candidates.contains(&base) {
                    debug!(endpoint = %base, "reusing already-open handle");
                    return Ok(existing);
                }
                target.slot.clear();
            }

            let next = candidates.remove(0);
            debug!(endpoint = %next, "opening handle at next candidate");
            match target.source.open(&next, target.identity).await {
                Ok(handle) => {
                    target.slot.bind(Arc::clone(&handle));
                    return Ok(handle);
                }
                Err(err) => {
                    // Open failures never consult the classifier; they are
                    // always retryable against the remaining candidates.
                    warn!(endpoint = %next, error = %err, "failed to open candidate, continuing");
                }
            }
        }
    }
}
