// Named-resource dependency loader
//
// Loads script and style assets by URL, optionally keyed by logical names
// that decouple dependency relationships from concrete URLs. Provides
// dependency declarations with recursive require/unrequire, readiness
// callbacks over the same name space, URL path rewriting, cache
// prefetching, and weak cancellation: unloading suppresses callback
// delivery but never interrupts in-flight I/O.
//
// The loader holds no transport of its own. It is constructed around an
// injected fetcher capability that retrieves resources and installs them
// into the host environment.

use std::sync::Arc;

// Module declarations
pub mod config;
pub mod dependency;
pub mod loader;
pub mod path;
pub mod readiness;
pub mod registry;
pub mod state;
pub mod transport;

// Re-exports
pub use config::LoaderConfig;
pub use dependency::DependencyGraph;
pub use loader::{Loader, ScriptHandle, StyleHandle};
pub use path::{PathResolver, PathRule};
pub use readiness::ReadinessCoordinator;
pub use registry::ResourceRegistry;
pub use state::{ResourceKind, ResourceState};
pub use transport::{FetchMode, FetchRecord, MemoryFetcher, ResourceFetcher};

// Re-export error types
pub use lodestone_error::{FetchError, FetchResult, LoaderError, LoaderResult};

/// Callback invoked when a load completes or a readiness condition is met.
///
/// The `Arc` identity doubles as the cancellation token: `ignore` matches
/// callbacks by pointer, so cancel with a clone of the registered value.
pub type LoadCallback = Arc<dyn Fn() + Send + Sync>;

/// Hook invoked when `ready` is registered against names not yet known to
/// the loader; receives the unknown names
pub type RequireHook = Arc<dyn Fn(&[String]) + Send + Sync>;

/// Wrap a closure as a shareable load callback
pub fn callback<F>(f: F) -> LoadCallback
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as a require hook for [`ScriptHandle::ready`]
pub fn require_hook<F>(f: F) -> RequireHook
where
    F: Fn(&[String]) + Send + Sync + 'static,
{
    Arc::new(f)
}
