#![allow(dead_code)]

// Shared helpers for the loader integration tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use lodestone_resource::{
    callback, FetchRecord, FetchResult, LoadCallback, MemoryFetcher, ResourceFetcher, ResourceKind,
};

/// A callback that counts its invocations
pub fn counting_callback() -> (LoadCallback, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let probe = count.clone();
    (callback(move || {
        probe.fetch_add(1, Ordering::SeqCst);
    }), count)
}

/// A callback that appends a marker to a shared sequence
pub fn sequencing_callback(sequence: &Arc<Mutex<Vec<&'static str>>>, marker: &'static str) -> LoadCallback {
    let sequence = Arc::clone(sequence);
    callback(move || {
        sequence.lock().unwrap().push(marker);
    })
}

/// Recording fetcher whose URLs can be held at a gate until released
///
/// Fetches of a gated URL wait until the gate is notified; releasing the
/// gate before the fetch arrives stores a permit, so there is no ordering
/// hazard between the test and the fetch task.
pub struct GateFetcher {
    inner: MemoryFetcher,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl GateFetcher {
    pub fn new() -> Self {
        Self {
            inner: MemoryFetcher::new(),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Hold fetches of `url` until the returned gate is notified
    pub fn gate(&self, url: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(url.to_string(), gate.clone());
        gate
    }

    pub fn records(&self) -> Vec<FetchRecord> {
        self.inner.records()
    }

    pub fn installed_urls(&self) -> Vec<String> {
        self.inner.installed_urls()
    }
}

#[async_trait]
impl ResourceFetcher for GateFetcher {
    async fn fetch(&self, url: &str, kind: ResourceKind) -> FetchResult<()> {
        let gate = self.gates.lock().unwrap().get(url).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.inner.fetch(url, kind).await
    }

    async fn prime(&self, url: &str, kind: ResourceKind) -> FetchResult<()> {
        self.inner.prime(url, kind).await
    }
}

/// Build string maps for declare calls
pub fn string_map(entries: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(name, list)| {
            (name.to_string(), list.iter().map(|s| s.to_string()).collect())
        })
        .collect()
}
