use thiserror::Error;

/// Errors surfaced by the caching middleware.
///
/// Only [`CacheError::Config`] ever reaches a caller as a hard failure;
/// store and codec errors are handled internally (a broken cache must never
/// break the response).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("codec error: {0}")]
    Codec(String),
}
