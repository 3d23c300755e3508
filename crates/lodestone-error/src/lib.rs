// Lodestone error handling
// Central location for the loader's error types, traits, and result aliases

use std::fmt;

use thiserror::Error;

// Re-export common error handling tools for convenience
pub use anyhow;
pub use thiserror;

mod traits;

pub use traits::Retryable;

/// Error domains representing the components of the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorDomain {
    /// Registration-time loader operations (require, declare, ready)
    Loader,
    /// The injected transport capability
    Fetch,
}

impl fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorDomain::Loader => write!(f, "loader"),
            ErrorDomain::Fetch => write!(f, "fetch"),
        }
    }
}

/// Errors surfaced by registration-time loader operations
///
/// Completion-time failures never appear here; they are reported through the
/// transport's own error channel and absorbed into entry state.
#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    /// The dependency declarations contain a cycle reachable from the
    /// requested name
    #[error("requiring {0} would recurse through a circular dependency")]
    CircularDependency(String),

    /// A required name has no URL declaration and is not already loaded
    #[error("required name {0} has no declared URLs and is not loaded")]
    UnresolvedDependency(String),

    /// The loader has been disposed; no further operations are accepted
    #[error("loader has been disposed")]
    Disposed,
}

/// Result type for loader operations
pub type LoaderResult<T> = Result<T, LoaderError>;

/// Errors produced by transport (fetch) capabilities
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The transport failed to retrieve or install the resource
    #[error("failed to fetch {url}: {reason}")]
    Failed { url: String, reason: String },

    /// The transport does not support the requested resource kind
    #[error("transport does not support {kind} resources")]
    Unsupported { kind: String },
}

impl FetchError {
    /// Build a `Failed` error from a URL and any displayable reason
    pub fn failed(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        FetchError::Failed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// The component this error belongs to
    pub fn domain(&self) -> ErrorDomain {
        ErrorDomain::Fetch
    }
}

impl LoaderError {
    /// The component this error belongs to
    pub fn domain(&self) -> ErrorDomain {
        ErrorDomain::Loader
    }
}

/// Result type for transport operations
pub type FetchResult<T> = Result<T, FetchError>;

impl Retryable for LoaderError {
    fn is_retryable(&self) -> bool {
        // Registration-time failures are caller mistakes; retrying the same
        // call cannot succeed until the declarations change
        false
    }
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Failed { .. } => true,
            FetchError::Unsupported { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoaderError::CircularDependency("main".to_string());
        assert_eq!(
            err.to_string(),
            "requiring main would recurse through a circular dependency"
        );

        let err = FetchError::failed("/app.js", "connection reset");
        assert_eq!(err.to_string(), "failed to fetch /app.js: connection reset");
        assert_eq!(err.domain().to_string(), "fetch");
        assert_eq!(LoaderError::Disposed.domain().to_string(), "loader");
    }

    #[test]
    fn test_retry_classification() {
        assert!(FetchError::failed("/app.js", "timeout").is_retryable());
        assert!(!FetchError::Unsupported { kind: "style".to_string() }.is_retryable());
        assert!(!LoaderError::UnresolvedDependency("base".to_string()).is_retryable());
        assert!(!LoaderError::Disposed.is_retryable());
    }
}
