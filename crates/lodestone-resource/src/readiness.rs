// Readiness coordination
//
// Tracks callbacks waiting for sets of names to become ready, and the
// "done" marks that make a name ready without any resource ever loading.
// Waiters fire exactly once and are then removed. Satisfied callbacks are
// returned to the caller rather than invoked here, so they can run outside
// any lock (a callback may re-enter the loader).

use std::collections::HashSet;
use std::sync::Arc;

use crate::LoadCallback;

/// A pending readiness registration
struct Waiter {
    /// The exact name set awaited, as registered
    names: Vec<String>,
    callback: LoadCallback,
}

/// Coordinates callbacks waiting on names becoming ready
#[derive(Default)]
pub struct ReadinessCoordinator {
    /// Pending waiters, in registration order
    waiters: Vec<Waiter>,

    /// Names marked ready independent of any resource load
    done: HashSet<String>,
}

impl ReadinessCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `name` carries a done mark
    pub fn is_done(&self, name: &str) -> bool {
        self.done.contains(name)
    }

    /// Mark `name` ready unconditionally
    pub fn mark_done(&mut self, name: impl Into<String>) {
        self.done.insert(name.into());
    }

    /// Remove the done mark for `name`, if present
    pub fn clear_done(&mut self, name: &str) {
        self.done.remove(name);
    }

    /// Register a waiter for the given name set
    pub fn add_waiter(&mut self, names: Vec<String>, callback: LoadCallback) {
        self.waiters.push(Waiter { names, callback });
    }

    /// Remove the pending waiter matching both the given name set (as an
    /// exact set, regardless of order) and the callback identity.
    ///
    /// Returns whether a waiter was removed. Other waiters on the same
    /// names with a different callback remain pending.
    pub fn remove_waiter(&mut self, names: &[String], callback: &LoadCallback) -> bool {
        let target = normalized(names);
        let position = self.waiters.iter().position(|waiter| {
            normalized(&waiter.names) == target && Arc::ptr_eq(&waiter.callback, callback)
        });
        match position {
            Some(index) => {
                self.waiters.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove and return the callbacks of every waiter whose names are all
    /// ready, where a name is ready when it carries a done mark or when
    /// `loaded` reports it loaded.
    ///
    /// Returned callbacks are in registration order; unsatisfied waiters
    /// are untouched.
    pub fn collect_satisfied<F>(&mut self, loaded: F) -> Vec<LoadCallback>
    where
        F: Fn(&str) -> bool,
    {
        let done = &self.done;
        let mut fired = Vec::new();
        self.waiters.retain(|waiter| {
            let ready = waiter
                .names
                .iter()
                .all(|name| done.contains(name) || loaded(name));
            if ready {
                fired.push(waiter.callback.clone());
            }
            !ready
        });
        fired
    }

    /// Number of pending waiters
    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// Drop every waiter and done mark
    pub fn clear(&mut self) {
        self.waiters.clear();
        self.done.clear();
    }
}

fn normalized(names: &[String]) -> Vec<&str> {
    let mut set: Vec<&str> = names.iter().map(|name| name.as_str()).collect();
    set.sort_unstable();
    set.dedup();
    set
}
