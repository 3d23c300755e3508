// Resource registry
//
// Tracks, for one resource kind, which URLs are loaded, loading, or
// unloaded, and which logical names map to which URL sets. Load calls are
// grouped so a callback spanning several URLs fires once, after the last
// of them completes. Every entry carries an epoch counter: unloading bumps
// the epoch, and a completion event delivered with a stale epoch is
// discarded. That yields the contract's weak cancellation without ever
// touching in-flight I/O.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::state::{ResourceKind, ResourceState};
use crate::LoadCallback;

/// A tracked URL and its lifecycle state
#[derive(Debug)]
struct ResourceEntry {
    state: ResourceState,
    epoch: u64,
    /// Load groups joined on this URL's completion
    groups: Vec<u64>,
}

impl ResourceEntry {
    fn new() -> Self {
        Self {
            state: ResourceState::Unloaded,
            epoch: 0,
            groups: Vec::new(),
        }
    }
}

/// One load call's join state across its URLs
struct LoadGroup {
    /// URLs still pending before the callback may fire
    remaining: usize,
    /// Name given to the load call, when any
    name: Option<String>,
    callback: LoadCallback,
}

/// Outcome of planning a load call
pub struct LoadPlan {
    /// (url, epoch) pairs the caller must dispatch, in order
    pub fetches: Vec<(String, u64)>,
    /// Callback to fire immediately because everything was already loaded
    pub fire_now: Option<LoadCallback>,
}

/// Outcome of applying a completion event
pub struct Completion {
    /// Callbacks of load groups that finished with this completion
    pub callbacks: Vec<LoadCallback>,
    /// Whether the event was accepted (fresh epoch, successful fetch)
    pub accepted: bool,
}

/// Per-kind resource registry
pub struct ResourceRegistry {
    kind: ResourceKind,

    /// URL to entry
    entries: HashMap<String, ResourceEntry>,

    /// Name to its active URL set, in load order
    names: HashMap<String, Vec<String>>,

    /// Open load groups by identifier
    groups: HashMap<u64, LoadGroup>,

    next_group: u64,
}

impl ResourceRegistry {
    /// Create an empty registry for the given kind
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
            names: HashMap::new(),
            groups: HashMap::new(),
            next_group: 0,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Begin a load call over already-resolved URLs.
    ///
    /// When a name is given and it currently maps to a different URL set,
    /// that set is unloaded first (name reassignment). URLs already loaded
    /// are not re-fetched; URLs already loading are joined. The returned
    /// plan lists the fetches the caller must dispatch, in call order, and
    /// carries the callback back when nothing at all is pending.
    pub fn begin_load(
        &mut self,
        urls: Vec<String>,
        name: Option<&str>,
        callback: Option<LoadCallback>,
    ) -> LoadPlan {
        if let Some(name) = name {
            let reassigned = self
                .names
                .get(name)
                .map(|previous| previous != &urls)
                .unwrap_or(false);
            if reassigned {
                debug!("{} name {} reassigned, unloading previous URL set", self.kind, name);
                self.unload_name(name);
            }
            self.names.insert(name.to_string(), urls.clone());
        }

        let mut fetches = Vec::new();
        let mut pending = Vec::new();
        for url in &urls {
            let entry = self.entries.entry(url.clone()).or_insert_with(ResourceEntry::new);
            match entry.state {
                ResourceState::Loaded => {}
                ResourceState::Loading => pending.push(url.clone()),
                ResourceState::Unloaded => {
                    entry.state = ResourceState::Loading;
                    fetches.push((url.clone(), entry.epoch));
                    pending.push(url.clone());
                }
            }
        }

        if pending.is_empty() {
            return LoadPlan { fetches, fire_now: callback };
        }

        if let Some(callback) = callback {
            let id = self.next_group;
            self.next_group += 1;
            self.groups.insert(
                id,
                LoadGroup {
                    remaining: pending.len(),
                    name: name.map(|n| n.to_string()),
                    callback,
                },
            );
            for url in &pending {
                if let Some(entry) = self.entries.get_mut(url) {
                    entry.groups.push(id);
                }
            }
        }

        LoadPlan { fetches, fire_now: None }
    }

    /// Reset every entry associated with `name` back to unloaded, dropping
    /// the pending callbacks of its load groups.
    ///
    /// Returns whether the name had an active URL set. In-flight fetches
    /// are not cancelled; their completions arrive with a stale epoch and
    /// are discarded.
    pub fn unload_name(&mut self, name: &str) -> bool {
        let urls = match self.names.remove(name) {
            Some(urls) => urls,
            None => return false,
        };
        debug!("{} name {} unloaded ({} urls)", self.kind, name, urls.len());
        for url in urls {
            self.reset_entry(&url);
        }
        true
    }

    /// Apply a completion event for `(url, epoch)`.
    ///
    /// Stale epochs and unknown URLs are discarded. A failed fetch resets
    /// the entry so a later load re-dispatches, and drops the pending
    /// callbacks of every group joined on the URL.
    pub fn complete(&mut self, url: &str, epoch: u64, success: bool) -> Completion {
        let mut callbacks = Vec::new();
        let entry = match self.entries.get_mut(url) {
            Some(entry) => entry,
            None => return Completion { callbacks, accepted: false },
        };
        if entry.epoch != epoch {
            debug!("discarding stale completion for {} (epoch {}, current {})", url, epoch, entry.epoch);
            return Completion { callbacks, accepted: false };
        }

        if !success {
            warn!("{} fetch for {} failed, resetting entry", self.kind, url);
            entry.state = ResourceState::Unloaded;
            entry.epoch += 1;
            let ids: Vec<u64> = entry.groups.drain(..).collect();
            for id in ids {
                self.groups.remove(&id);
            }
            return Completion { callbacks, accepted: false };
        }

        if !entry.state.can_become(ResourceState::Loaded) {
            return Completion { callbacks, accepted: false };
        }
        entry.state = ResourceState::Loaded;
        let ids: Vec<u64> = entry.groups.drain(..).collect();
        for id in ids {
            let finished = match self.groups.get_mut(&id) {
                Some(group) => {
                    group.remaining -= 1;
                    group.remaining == 0
                }
                // Cancelled by an unload while this URL was in flight
                None => false,
            };
            if finished {
                if let Some(group) = self.groups.remove(&id) {
                    callbacks.push(group.callback);
                }
            }
        }
        Completion { callbacks, accepted: true }
    }

    /// Cancel the pending callback of a load group registered under `name`.
    ///
    /// Matches on both the name and the callback identity. Returns whether
    /// a group was cancelled. The underlying fetches continue.
    pub fn cancel_callback(&mut self, name: &str, callback: &LoadCallback) -> bool {
        let id = self
            .groups
            .iter()
            .find(|(_, group)| {
                group.name.as_deref() == Some(name) && Arc::ptr_eq(&group.callback, callback)
            })
            .map(|(id, _)| *id);
        match id {
            Some(id) => {
                self.groups.remove(&id);
                true
            }
            None => false,
        }
    }

    /// True when `name` has an active URL set and every URL in it is loaded
    pub fn is_name_loaded(&self, name: &str) -> bool {
        match self.names.get(name) {
            Some(urls) if !urls.is_empty() => urls.iter().all(|url| {
                self.entries
                    .get(url)
                    .map(|entry| entry.state.is_loaded())
                    .unwrap_or(false)
            }),
            _ => false,
        }
    }

    /// True when `name` has ever been associated with a URL set
    pub fn name_known(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// The lifecycle state of a tracked URL
    pub fn url_state(&self, url: &str) -> Option<ResourceState> {
        self.entries.get(url).map(|entry| entry.state)
    }

    /// The active URL set of `name`, if any
    pub fn urls_of(&self, name: &str) -> Option<&[String]> {
        self.names.get(name).map(|urls| urls.as_slice())
    }

    /// Drop every entry, name association, and open load group
    pub fn clear(&mut self) {
        self.entries.clear();
        self.names.clear();
        self.groups.clear();
    }

    fn reset_entry(&mut self, url: &str) {
        if let Some(entry) = self.entries.get_mut(url) {
            entry.epoch += 1;
            entry.state = ResourceState::Unloaded;
            let ids: Vec<u64> = entry.groups.drain(..).collect();
            for id in ids {
                self.groups.remove(&id);
            }
        }
    }
}
