//! Error types for bundle resolution and loading.
//!
//! The taxonomy distinguishes failures that justify switching to another
//! CDN endpoint from failures that are terminal for the whole operation:
//!
//! - `Connectivity` and `HandleOpen` drive failover to the next candidate
//! - `ContentAbsent` short-circuits: the mirror is healthy but legitimately
//!   lacks the resource, so switching mirrors cannot help
//! - `Unclassified` is treated as retryable by the default classifier
//! - `PoolExhausted` and `Configuration` are terminal and surfaced as-is
//!
//! The `Display` strings for `Connectivity` and `ContentAbsent` carry the
//! canonical marker phrases the [`FailureClassifier`](crate::classify::FailureClassifier)
//! recognizes, so typed errors and free-form messages from external
//! collaborators classify through the same code path.

use thiserror::Error;

/// Result type for bundle operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors that can occur while resolving or loading a bundle.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Transient network failure reaching an endpoint.
    #[error("failed to connect to {endpoint}: {reason}")]
    Connectivity { endpoint: String, reason: String },

    /// The endpoint is reachable but the bundle lacks the requested entry.
    #[error("bundle '{bundle}' doesn't contain '{path}'")]
    ContentAbsent { bundle: String, path: String },

    /// Unrecognized failure reported by an external collaborator.
    #[error("{0}")]
    Unclassified(String),

    /// A candidate endpoint could not be opened at all.
    #[error("failed to open bundle at {endpoint}: {reason}")]
    HandleOpen { endpoint: String, reason: String },

    /// Every candidate endpoint was tried and failed.
    #[error("all {attempted} CDN endpoints failed for bundle '{bundle}'")]
    PoolExhausted { bundle: String, attempted: usize },

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl FetchError {
    /// Whether this error terminates the operation instead of driving a
    /// further retry step.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FetchError::ContentAbsent { .. }
                | FetchError::PoolExhausted { .. }
                | FetchError::Configuration(_)
        )
    }
}
