//! bundlefetch - CDN failover for versioned resource bundles
//!
//! This library resolves and fetches named, versioned resource bundles
//! from redundant CDN mirrors, failing over to another mirror when a load
//! attempt fails for a retry-worthy reason and remembering the last mirror
//! that worked so subsequent sessions start there.
//!
//! # Architecture
//!
//! - [`pool`]: ordered endpoint pools and URL normalization
//! - [`classify`]: the pure retry-decision policy over failure messages
//! - [`retry`]: the failover coordinator for one logical load operation
//! - [`session`]: per-bundle sessions with affinity-seeded resolution
//! - [`registry`]: named sessions plus the concurrent preload barrier
//! - [`source`]: the external-collaborator seams (bundle sources and
//!   handles) and the shipped HTTP implementation
//! - [`affinity`]: mirror-affinity persistence
//! - [`request`] and [`config`]: explicit request records and plain-data
//!   configuration

pub mod affinity;
pub mod classify;
pub mod config;
pub mod error;
pub mod pool;
pub mod registry;
pub mod request;
pub mod retry;
pub mod session;
pub mod source;

pub use affinity::{affinity_key, AffinityStore, FileAffinityStore, MemoryAffinityStore};
pub use classify::FailureClassifier;
pub use config::{BundleConfig, FetchConfig};
pub use error::{FetchError, FetchResult};
pub use pool::{normalize_url, BundleIdentity, EndpointPool};
pub use registry::BundleRegistry;
pub use request::{LoadRequest, LoadRequestBuilder};
pub use retry::{RetryCoordinator, RetryTarget};
pub use session::{BundleSession, HandleSlot};
pub use source::{
    Asset, BundleHandle, BundleSource, HttpBundleSource, ProgressFn, ResourceKind,
};
