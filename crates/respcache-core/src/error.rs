//! Error types for cache operations

use thiserror::Error;

/// Main error type for all cache operations
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Invalid or incomplete configuration; the only error that reaches
    /// callers of the manager
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Backend exists but is not ready to serve operations
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Transient I/O failure (filesystem backend)
    #[error("i/o error: {0}")]
    Io(String),

    /// Serialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Malformed on-disk or on-wire entry
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Backend connection failed
    #[error("connection error: {0}")]
    Connection(String),

    /// Backend operation failed
    #[error("backend error: {0}")]
    Backend(String),

    /// Compression failed
    #[error("compression error: {0}")]
    Compression(String),

    /// Decompression failed
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Operation timed out
    #[error("operation timed out")]
    Timeout,
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(err.to_string())
    }
}
