// Error handling traits
// Core traits for the error handling system

/// Trait for error types that support retries
pub trait Retryable {
    /// Check if the error is retryable
    fn is_retryable(&self) -> bool;

    /// Get the recommended retry delay (if any)
    fn retry_after(&self) -> Option<std::time::Duration> {
        None
    }
}
