use thiserror::Error;

/// Errors raised by cache backends.
///
/// These never cross the [`crate::CachedCatalog`] boundary.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer within the caller's deadline.
    #[error("cache call exceeded {0:?}")]
    Timeout(std::time::Duration),

    /// A cached value could not be encoded or decoded.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
