// Loader facade
//
// Owns the per-kind registries, the dependency graph, the readiness
// coordinator, and the path resolvers behind a single lock, and drives the
// injected transport from spawned tasks. Public operations register intent
// and return; completion is reported through callbacks. Callbacks are
// always invoked from a snapshot taken after the lock is released, so a
// callback may re-enter the loader freely.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use tokio::sync::watch;

use lodestone_error::{FetchResult, LoaderError, LoaderResult};

use crate::config::LoaderConfig;
use crate::dependency::DependencyGraph;
use crate::path::{PathResolver, PathRule};
use crate::readiness::ReadinessCoordinator;
use crate::registry::ResourceRegistry;
use crate::state::{ResourceKind, ResourceState};
use crate::transport::ResourceFetcher;
use crate::{LoadCallback, RequireHook};

/// Mutable loader state behind the shared lock
struct LoaderState {
    disposed: bool,
    prefetch_on_declare: bool,
    script: ResourceRegistry,
    style: ResourceRegistry,
    script_paths: PathResolver,
    style_paths: PathResolver,
    graph: DependencyGraph,
    readiness: ReadinessCoordinator,
}

impl LoaderState {
    fn registry_mut(&mut self, kind: ResourceKind) -> &mut ResourceRegistry {
        match kind {
            ResourceKind::Script => &mut self.script,
            ResourceKind::Style => &mut self.style,
        }
    }

    fn registry(&self, kind: ResourceKind) -> &ResourceRegistry {
        match kind {
            ResourceKind::Script => &self.script,
            ResourceKind::Style => &self.style,
        }
    }

    fn paths(&self, kind: ResourceKind) -> &PathResolver {
        match kind {
            ResourceKind::Script => &self.script_paths,
            ResourceKind::Style => &self.style_paths,
        }
    }

    fn paths_mut(&mut self, kind: ResourceKind) -> &mut PathResolver {
        match kind {
            ResourceKind::Script => &mut self.script_paths,
            ResourceKind::Style => &mut self.style_paths,
        }
    }
}

/// Shared context between the facade, its handles, and spawned fetch tasks
struct LoaderShared {
    fetcher: Arc<dyn ResourceFetcher>,
    state: Mutex<LoaderState>,
    /// Count of live fetch tasks, observed by `settle`
    in_flight: watch::Sender<usize>,
}

impl LoaderShared {
    fn begin_task(&self) {
        self.in_flight.send_modify(|count| *count += 1);
    }

    fn task_done(&self) {
        self.in_flight.send_modify(|count| *count -= 1);
    }

    /// Dispatch serialized fetches for already-planned (url, epoch) pairs
    fn spawn_fetches(shared: &Arc<Self>, kind: ResourceKind, fetches: Vec<(String, u64)>) {
        shared.begin_task();
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            for (url, epoch) in fetches {
                let result = shared.fetcher.fetch(&url, kind).await;
                shared.finish(kind, &url, epoch, result);
            }
            shared.task_done();
        });
    }

    /// Dispatch cache-priming requests
    fn spawn_primes(shared: &Arc<Self>, kind: ResourceKind, urls: Vec<String>) {
        shared.begin_task();
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            for url in urls {
                if let Err(err) = shared.fetcher.prime(&url, kind).await {
                    warn!("{} prefetch for {} failed: {}", kind, url, err);
                }
            }
            shared.task_done();
        });
    }

    /// Apply a fetch completion: update the registry, then fire whichever
    /// load groups and readiness waiters it satisfied
    fn finish(&self, kind: ResourceKind, url: &str, epoch: u64, result: FetchResult<()>) {
        let (load_callbacks, ready_callbacks) = {
            let mut state = self.state.lock().unwrap();
            if state.disposed {
                return;
            }
            let success = match result {
                Ok(()) => true,
                Err(err) => {
                    warn!("{} fetch for {} failed: {}", kind, url, err);
                    false
                }
            };
            let completion = state.registry_mut(kind).complete(url, epoch, success);
            let ready = if completion.accepted && kind == ResourceKind::Script {
                let LoaderState { script, readiness, .. } = &mut *state;
                readiness.collect_satisfied(|name| script.is_name_loaded(name))
            } else {
                Vec::new()
            };
            (completion.callbacks, ready)
        };
        for callback in load_callbacks {
            callback();
        }
        for callback in ready_callbacks {
            callback();
        }
    }

    fn load(
        shared: &Arc<Self>,
        kind: ResourceKind,
        urls: &[&str],
        name: Option<&str>,
        callback: Option<LoadCallback>,
    ) {
        let plan = {
            let mut state = shared.state.lock().unwrap();
            if state.disposed {
                warn!("{} load ignored: loader disposed", kind);
                return;
            }
            let resolved: Vec<String> = urls.iter().map(|url| state.paths(kind).resolve(url)).collect();
            state.registry_mut(kind).begin_load(resolved, name, callback)
        };
        if let Some(callback) = plan.fire_now {
            callback();
        }
        if !plan.fetches.is_empty() {
            Self::spawn_fetches(shared, kind, plan.fetches);
        }
    }

    fn unload(&self, kind: ResourceKind, name: &str) {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return;
        }
        state.registry_mut(kind).unload_name(name);
        if kind == ResourceKind::Script {
            state.readiness.clear_done(name);
        }
    }

    /// Always-fresh unnamed load: no deduplication, no entry tracking
    fn get(shared: &Arc<Self>, kind: ResourceKind, url: &str, callback: Option<LoadCallback>) {
        let resolved = {
            let state = shared.state.lock().unwrap();
            if state.disposed {
                return;
            }
            state.paths(kind).resolve(url)
        };
        shared.begin_task();
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            match shared.fetcher.fetch(&resolved, kind).await {
                Ok(()) => {
                    let disposed = shared.state.lock().unwrap().disposed;
                    if !disposed {
                        if let Some(callback) = callback {
                            callback();
                        }
                    }
                }
                Err(err) => warn!("{} get for {} failed: {}", kind, resolved, err),
            }
            shared.task_done();
        });
    }

    fn prefetch(shared: &Arc<Self>, kind: ResourceKind, urls: &[&str]) {
        let resolved: Vec<String> = {
            let state = shared.state.lock().unwrap();
            if state.disposed {
                return;
            }
            urls.iter().map(|url| state.paths(kind).resolve(url)).collect()
        };
        if !resolved.is_empty() {
            Self::spawn_primes(shared, kind, resolved);
        }
    }

    fn set_path(&self, kind: ResourceKind, rule: PathRule) {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return;
        }
        state.paths_mut(kind).set_rule(rule);
    }

    fn declare(
        shared: &Arc<Self>,
        deps: HashMap<String, Vec<String>>,
        urls: HashMap<String, Vec<String>>,
    ) -> LoaderResult<()> {
        let primes = {
            let mut state = shared.state.lock().unwrap();
            if state.disposed {
                return Err(LoaderError::Disposed);
            }
            let primes: Vec<String> = if state.prefetch_on_declare {
                urls.values()
                    .flatten()
                    .map(|url| state.script_paths.resolve(url))
                    .collect()
            } else {
                Vec::new()
            };
            state.graph.declare(deps, urls);
            primes
        };
        if !primes.is_empty() {
            Self::spawn_primes(shared, ResourceKind::Script, primes);
        }
        Ok(())
    }

    fn require(shared: &Arc<Self>, names: &[&str], callback: Option<LoadCallback>) -> LoaderResult<()> {
        let requested: Vec<String> = names.iter().map(|name| name.to_string()).collect();
        let (fire_now, fetches) = {
            let mut state = shared.state.lock().unwrap();
            if state.disposed {
                return Err(LoaderError::Disposed);
            }
            let order = state.graph.expansion(&requested)?;

            // Validate the whole expansion before dispatching anything
            let mut to_load: Vec<(String, Vec<String>)> = Vec::new();
            for name in &order {
                if state.readiness.is_done(name) || state.script.is_name_loaded(name) {
                    continue;
                }
                match state.graph.urls_for(name) {
                    Some(urls) if !urls.is_empty() => {
                        let resolved: Vec<String> =
                            urls.iter().map(|url| state.script_paths.resolve(url)).collect();
                        to_load.push((name.clone(), resolved));
                    }
                    _ => return Err(LoaderError::UnresolvedDependency(name.clone())),
                }
            }

            let mut fetches = Vec::new();
            for (name, urls) in to_load {
                let plan = state.script.begin_load(urls, Some(&name), None);
                fetches.extend(plan.fetches);
            }

            let fire_now = match callback {
                Some(callback) => {
                    let all_ready = order
                        .iter()
                        .all(|name| state.readiness.is_done(name) || state.script.is_name_loaded(name));
                    if all_ready {
                        Some(callback)
                    } else {
                        state.readiness.add_waiter(order, callback);
                        None
                    }
                }
                None => None,
            };
            (fire_now, fetches)
        };
        if let Some(callback) = fire_now {
            callback();
        }
        if !fetches.is_empty() {
            Self::spawn_fetches(shared, ResourceKind::Script, fetches);
        }
        Ok(())
    }

    fn unrequire(&self, names: &[&str]) -> LoaderResult<()> {
        let requested: Vec<String> = names.iter().map(|name| name.to_string()).collect();
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return Err(LoaderError::Disposed);
        }
        let order = state.graph.unload_expansion(&requested)?;
        for name in &order {
            state.script.unload_name(name);
            state.readiness.clear_done(name);
        }
        Ok(())
    }

    fn ready(&self, names: &[&str], callback: Option<LoadCallback>, require: Option<RequireHook>) {
        let requested: Vec<String> = names.iter().map(|name| name.to_string()).collect();
        let (fire_now, unknown_hook) = {
            let mut state = self.state.lock().unwrap();
            if state.disposed {
                return;
            }
            let LoaderState { script, graph, readiness, .. } = &mut *state;
            let unknown: Vec<String> = requested
                .iter()
                .filter(|name| {
                    !readiness.is_done(name) && !script.name_known(name) && !graph.declares(name)
                })
                .cloned()
                .collect();
            let all_ready = requested
                .iter()
                .all(|name| readiness.is_done(name) || script.is_name_loaded(name));
            let fire_now = match callback {
                Some(callback) if all_ready => Some(callback),
                Some(callback) => {
                    readiness.add_waiter(requested.clone(), callback);
                    None
                }
                None => None,
            };
            let unknown_hook = match (require, unknown.is_empty()) {
                (Some(hook), false) => Some((hook, unknown)),
                _ => None,
            };
            (fire_now, unknown_hook)
        };
        if let Some(callback) = fire_now {
            callback();
        }
        if let Some((hook, unknown)) = unknown_hook {
            hook(&unknown);
        }
    }

    fn done(&self, name: &str) {
        let fired = {
            let mut state = self.state.lock().unwrap();
            if state.disposed {
                return;
            }
            state.readiness.mark_done(name);
            let LoaderState { script, readiness, .. } = &mut *state;
            readiness.collect_satisfied(|name| script.is_name_loaded(name))
        };
        for callback in fired {
            callback();
        }
    }

    fn ignore(&self, names: &[&str], callback: &LoadCallback) -> bool {
        let requested: Vec<String> = names.iter().map(|name| name.to_string()).collect();
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return false;
        }
        // A single name may also refer to a pending load callback
        if let [name] = names {
            if state.script.cancel_callback(name, callback) {
                return true;
            }
        }
        state.readiness.remove_waiter(&requested, callback)
    }

    fn name_loaded(&self, kind: ResourceKind, name: &str) -> bool {
        self.state.lock().unwrap().registry(kind).is_name_loaded(name)
    }

    fn url_state(&self, kind: ResourceKind, url: &str) -> Option<ResourceState> {
        self.state.lock().unwrap().registry(kind).url_state(url)
    }
}

/// The named-resource dependency loader
///
/// Construct one per isolated loading context; clones share the same
/// underlying state. All state lives on the instance, so disposing it
/// tears the whole context down. Fetches are dispatched as tasks on the
/// ambient tokio runtime, so operations that load or prefetch must be
/// called from within one.
#[derive(Clone)]
pub struct Loader {
    shared: Arc<LoaderShared>,
}

impl Loader {
    /// Create a loader with default configuration
    pub fn new(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self::with_config(LoaderConfig::default(), fetcher)
    }

    /// Create a loader with the given configuration
    pub fn with_config(config: LoaderConfig, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        let mut script_paths = PathResolver::new();
        if let Some(rule) = config.script_path {
            script_paths.set_rule(rule);
        }
        let mut style_paths = PathResolver::new();
        if let Some(rule) = config.style_path {
            style_paths.set_rule(rule);
        }
        let (in_flight, _) = watch::channel(0usize);
        Self {
            shared: Arc::new(LoaderShared {
                fetcher,
                state: Mutex::new(LoaderState {
                    disposed: false,
                    prefetch_on_declare: config.prefetch_on_declare,
                    script: ResourceRegistry::new(ResourceKind::Script),
                    style: ResourceRegistry::new(ResourceKind::Style),
                    script_paths,
                    style_paths,
                    graph: DependencyGraph::new(),
                    readiness: ReadinessCoordinator::new(),
                }),
                in_flight,
            }),
        }
    }

    /// Handle for script operations
    pub fn script(&self) -> ScriptHandle {
        ScriptHandle { shared: Arc::clone(&self.shared) }
    }

    /// Handle for style operations
    pub fn style(&self) -> StyleHandle {
        StyleHandle { shared: Arc::clone(&self.shared) }
    }

    /// Tear the loading context down: drop every entry, declaration,
    /// waiter, and pending callback.
    ///
    /// In-flight fetches are not interrupted; their completions are
    /// discarded on arrival.
    pub fn dispose(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.script.clear();
        state.style.clear();
        state.graph.clear();
        state.readiness.clear();
        debug!("loader disposed");
    }

    /// Wait until no fetch tasks are in flight
    pub async fn settle(&self) {
        let mut watcher = self.shared.in_flight.subscribe();
        let _ = watcher.wait_for(|count| *count == 0).await;
    }
}

/// Script operations on a loader
#[derive(Clone)]
pub struct ScriptHandle {
    shared: Arc<LoaderShared>,
}

impl ScriptHandle {
    /// Load one or more script URLs without a name; deduplicated by URL
    pub fn load(&self, urls: &[&str], callback: Option<LoadCallback>) {
        LoaderShared::load(&self.shared, ResourceKind::Script, urls, None, callback);
    }

    /// Load one or more script URLs under a logical name.
    ///
    /// If the name currently maps to a different URL set, that set is
    /// unloaded first, dropping its pending callbacks. The callback fires
    /// once every URL is loaded, and fires even when nothing needed
    /// fetching.
    pub fn load_as(&self, name: &str, urls: &[&str], callback: Option<LoadCallback>) {
        LoaderShared::load(&self.shared, ResourceKind::Script, urls, Some(name), callback);
    }

    /// Unload the scripts identified by `name`, dropping pending callbacks
    pub fn unload(&self, name: &str) {
        self.shared.unload(ResourceKind::Script, name);
    }

    /// Unconditionally fetch and install a script, bypassing deduplication
    /// and name tracking
    pub fn get(&self, url: &str, callback: Option<LoadCallback>) {
        LoaderShared::get(&self.shared, ResourceKind::Script, url, callback);
    }

    /// Wait for names to become ready (loaded or marked done).
    ///
    /// `require` is invoked once, at registration, with any names that are
    /// not yet known to the loader, so the caller can load them.
    pub fn ready(&self, names: &[&str], callback: Option<LoadCallback>, require: Option<RequireHook>) {
        self.shared.ready(names, callback, require);
    }

    /// Mark `name` ready without loading anything
    pub fn done(&self, name: &str) {
        self.shared.done(name);
    }

    /// Cancel a pending callback registered by `load_as` or `ready`.
    ///
    /// The name set must match the registration exactly; the callback is
    /// matched by identity. Returns whether a callback was cancelled.
    pub fn ignore(&self, names: &[&str], callback: &LoadCallback) -> bool {
        self.shared.ignore(names, callback)
    }

    /// Recursively load names and their declared dependencies,
    /// dependencies first
    pub fn require(&self, names: &[&str], callback: Option<LoadCallback>) -> LoaderResult<()> {
        LoaderShared::require(&self.shared, names, callback)
    }

    /// Recursively unload names and their declared dependencies,
    /// dependents first
    pub fn unrequire(&self, names: &[&str]) -> LoaderResult<()> {
        self.shared.unrequire(names)
    }

    /// Record dependency and URL declarations for named scripts
    pub fn declare(
        &self,
        deps: HashMap<String, Vec<String>>,
        urls: HashMap<String, Vec<String>>,
    ) -> LoaderResult<()> {
        LoaderShared::declare(&self.shared, deps, urls)
    }

    /// Set the path rule applied to script URLs before dispatch
    pub fn path(&self, rule: PathRule) {
        self.shared.set_path(ResourceKind::Script, rule);
    }

    /// Request scripts to warm the transport cache without installing them
    pub fn prefetch(&self, urls: &[&str]) {
        LoaderShared::prefetch(&self.shared, ResourceKind::Script, urls);
    }

    /// Check whether every URL of `name` is loaded
    pub fn loaded(&self, name: &str) -> bool {
        self.shared.name_loaded(ResourceKind::Script, name)
    }

    /// Lifecycle state of a resolved script URL, if tracked
    pub fn url_state(&self, url: &str) -> Option<ResourceState> {
        self.shared.url_state(ResourceKind::Script, url)
    }
}

/// Style operations on a loader
#[derive(Clone)]
pub struct StyleHandle {
    shared: Arc<LoaderShared>,
}

impl StyleHandle {
    /// Load one or more style URLs without a name; deduplicated by URL
    pub fn load(&self, urls: &[&str], callback: Option<LoadCallback>) {
        LoaderShared::load(&self.shared, ResourceKind::Style, urls, None, callback);
    }

    /// Load one or more style URLs under a logical name
    pub fn load_as(&self, name: &str, urls: &[&str], callback: Option<LoadCallback>) {
        LoaderShared::load(&self.shared, ResourceKind::Style, urls, Some(name), callback);
    }

    /// Unload the styles identified by `name`
    pub fn unload(&self, name: &str) {
        self.shared.unload(ResourceKind::Style, name);
    }

    /// Unconditionally fetch and install a style, bypassing deduplication
    /// and name tracking
    pub fn get(&self, url: &str) {
        LoaderShared::get(&self.shared, ResourceKind::Style, url, None);
    }

    /// Set the path rule applied to style URLs before dispatch
    pub fn path(&self, rule: PathRule) {
        self.shared.set_path(ResourceKind::Style, rule);
    }

    /// Request styles to warm the transport cache without installing them
    pub fn prefetch(&self, urls: &[&str]) {
        LoaderShared::prefetch(&self.shared, ResourceKind::Style, urls);
    }

    /// Check whether every URL of `name` is loaded
    pub fn loaded(&self, name: &str) -> bool {
        self.shared.name_loaded(ResourceKind::Style, name)
    }

    /// Lifecycle state of a resolved style URL, if tracked
    pub fn url_state(&self, url: &str) -> Option<ResourceState> {
        self.shared.url_state(ResourceKind::Style, url)
    }
}
