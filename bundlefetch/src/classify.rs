//! Failure classification policy.
//!
//! Maps a load failure to a retry decision. The policy is a pure function
//! over the failure's rendered message, checked in priority order:
//!
//! 1. connectivity marker present → retryable
//! 2. content-absence marker present → not retryable (the mirror is
//!    healthy but legitimately lacks the resource; switching mirrors
//!    cannot help)
//! 3. otherwise → retryable (unknown failures are assumed transient)
//!
//! The marker tables are data, not behavior: deployments that learn new
//! error shapes extend the tables without touching the coordinator.

use crate::error::FetchError;

/// Message markers indicating a transient network/endpoint failure.
pub const CONNECTIVITY_MARKERS: &[&str] = &[
    "failed to connect",
    "connection refused",
    "connection reset",
    "timed out",
    "dns error",
];

/// Message markers indicating the resource is confirmed missing on a
/// reachable endpoint.
pub const CONTENT_ABSENT_MARKERS: &[&str] = &[
    "doesn't contain",
    "does not contain",
    "no such entry",
];

/// Pure retry-decision policy over failure messages.
///
/// `Default` installs the built-in marker tables; [`FailureClassifier::new`]
/// accepts custom tables for deployments with different upstream error
/// vocabularies.
#[derive(Debug, Clone)]
pub struct FailureClassifier {
    connectivity_markers: Vec<&'static str>,
    absence_markers: Vec<&'static str>,
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::new(CONNECTIVITY_MARKERS, CONTENT_ABSENT_MARKERS)
    }
}

impl FailureClassifier {
    /// Creates a classifier with custom marker tables.
    pub fn new(connectivity: &[&'static str], absence: &[&'static str]) -> Self {
        Self {
            connectivity_markers: connectivity.to_vec(),
            absence_markers: absence.to_vec(),
        }
    }

    /// Whether `err` justifies switching to another endpoint.
    ///
    /// Connectivity markers win over absence markers when both occur in
    /// the same message.
    pub fn should_retry(&self, err: &FetchError) -> bool {
        let msg = err.to_string().to_lowercase();

        if self
            .connectivity_markers
            .iter()
            .any(|marker| msg.contains(marker))
        {
            return true;
        }

        if self.absence_markers.iter().any(|marker| msg.contains(marker)) {
            return false;
        }

        // Optimistic default: unknown failures are assumed transient.
        true
    }
}
