//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Only a handful of operations can fail: serializing a value on `set`,
/// and validating the configuration on construction. Storage failures are
/// logged by the persistence layer and never reach callers of the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Value could not be serialized
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Durable storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

// == Storage Error Enum ==
/// Failures raised by a [`Storage`](crate::persistence::Storage) backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Write would exceed the backend's quota
    #[error("Quota exceeded: needed {needed} bytes, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    /// Backend is disabled or unreachable
    #[error("Storage unavailable")]
    Unavailable,

    /// A stored key could not be decoded
    #[error("Invalid storage key: {0}")]
    Encoding(String),
}

// == Codec Error Enum ==
/// Failures raised while compressing or decompressing a payload.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression stream error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_message() {
        let err = StorageError::QuotaExceeded {
            needed: 10,
            available: 4,
        };
        assert_eq!(
            err.to_string(),
            "Quota exceeded: needed 10 bytes, 4 available"
        );
    }

    #[test]
    fn test_storage_error_converts_into_cache_error() {
        let err: CacheError = StorageError::Unavailable.into();
        assert!(matches!(err, CacheError::Storage(StorageError::Unavailable)));
    }
}
