//! Error types for scryfall_cache

use thiserror::Error;

/// Unified error type for cache operations
///
/// Cloneable so that a single failed fetch can be handed to every caller
/// waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// Scryfall has no card matching the lookup key
    #[error("Card not found on Scryfall: {0}")]
    CardNotFound(String),
    /// Transient remote failure (network, timeout, rate limit, server error)
    #[error("Scryfall unavailable: {0}")]
    UpstreamUnavailable(String),
    /// Local persistence failed (disk full, permission denied, locked database)
    #[error("Cache storage unavailable: {0}")]
    StoreUnavailable(String),
    /// Stored record could not be parsed
    #[error("Corrupt cache record for {id}: {message}")]
    CorruptRecord { id: String, message: String },
    /// Card has no image URL for the requested format
    #[error("No {format} image available for card {id}")]
    ImageNotAvailable { id: String, format: String },
    /// Image format name not known to Scryfall
    #[error("Unknown image format: {0}")]
    UnknownImageFormat(String),
    /// Invalid cache configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::StoreUnavailable(format!("database error: {}", err))
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::StoreUnavailable(format!("I/O error: {}", err))
    }
}

/// Result alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_become_store_unavailable() {
        let err: CacheError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        match err {
            CacheError::StoreUnavailable(msg) => assert!(msg.contains("denied")),
            other => panic!("Expected StoreUnavailable, got: {other:?}"),
        }
    }

    #[test]
    fn display_includes_context() {
        let err = CacheError::ImageNotAvailable {
            id: "abc".to_string(),
            format: "png".to_string(),
        };
        assert_eq!(err.to_string(), "No png image available for card abc");
    }
}
