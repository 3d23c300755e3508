// Transport capabilities
//
// The loader never talks to the network or the document itself. It is
// handed a fetcher that retrieves a resource and installs it into the host
// environment, reporting completion through its return value. Prefetching
// goes through the same capability but must not install anything.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use lodestone_error::{FetchError, FetchResult};

use crate::state::ResourceKind;

/// Capability for retrieving and installing resources
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Retrieve the resource at `url` and install it into the host document
    async fn fetch(&self, url: &str, kind: ResourceKind) -> FetchResult<()>;

    /// Request the resource at `url` to warm caches, without installing it
    async fn prime(&self, url: &str, kind: ResourceKind) -> FetchResult<()>;
}

/// What a fetcher was asked to do with a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Retrieve and install
    Install,
    /// Retrieve into caches only
    Prime,
}

/// A single request observed by [`MemoryFetcher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRecord {
    pub url: String,
    pub kind: ResourceKind,
    pub mode: FetchMode,
}

/// In-memory fetcher that records every request
///
/// Useful for tests and for embedding the loader without a real transport.
/// Individual URLs can be scripted to fail.
#[derive(Default)]
pub struct MemoryFetcher {
    records: Mutex<Vec<FetchRecord>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent fetches of `url` fail
    pub fn fail_url(&self, url: impl Into<String>) {
        self.failing.lock().unwrap().insert(url.into());
    }

    /// Make subsequent fetches of `url` succeed again
    pub fn unfail_url(&self, url: &str) {
        self.failing.lock().unwrap().remove(url);
    }

    /// Every request observed so far, in order
    pub fn records(&self) -> Vec<FetchRecord> {
        self.records.lock().unwrap().clone()
    }

    /// URLs of install requests observed so far, in order
    pub fn installed_urls(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.mode == FetchMode::Install)
            .map(|r| r.url.clone())
            .collect()
    }

    fn record(&self, url: &str, kind: ResourceKind, mode: FetchMode) {
        self.records.lock().unwrap().push(FetchRecord {
            url: url.to_string(),
            kind,
            mode,
        });
    }
}

#[async_trait]
impl ResourceFetcher for MemoryFetcher {
    async fn fetch(&self, url: &str, kind: ResourceKind) -> FetchResult<()> {
        self.record(url, kind, FetchMode::Install);
        if self.failing.lock().unwrap().contains(url) {
            return Err(FetchError::failed(url, "scripted failure"));
        }
        Ok(())
    }

    async fn prime(&self, url: &str, kind: ResourceKind) -> FetchResult<()> {
        self.record(url, kind, FetchMode::Prime);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_fetcher_records_in_order() {
        let fetcher = MemoryFetcher::new();
        fetcher.fetch("/a.js", ResourceKind::Script).await.unwrap();
        fetcher.prime("/b.css", ResourceKind::Style).await.unwrap();

        let records = fetcher.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].url, "/a.js");
        assert_eq!(records[0].mode, FetchMode::Install);
        assert_eq!(records[1].mode, FetchMode::Prime);
        assert_eq!(fetcher.installed_urls(), vec!["/a.js".to_string()]);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let fetcher = MemoryFetcher::new();
        fetcher.fail_url("/bad.js");
        assert!(fetcher.fetch("/bad.js", ResourceKind::Script).await.is_err());

        fetcher.unfail_url("/bad.js");
        assert!(fetcher.fetch("/bad.js", ResourceKind::Script).await.is_ok());
    }
}
