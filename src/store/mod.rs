//! Expiring key/value stores for the cache layer.
//!
//! The layer persists encoded response entries through a [`CacheStore`].
//! This module ships with [`memory::InMemoryStore`], a process-local store
//! backed by [`dashmap`] with per-entry TTLs and a background sweep.
//!
//! Stores hold opaque bytes; encoding and decoding of response entries is
//! the codec's job, so a store never has to understand what it keeps.

pub mod memory;

use bytes::Bytes;
use std::time::Duration;

use crate::error::CacheError;

/// A thread-safe mapping from cache key to payload with per-entry TTL.
///
/// Implementations must support concurrent `get`/`set` from any number of
/// callers without external locking, and must never return an expired value
/// regardless of whether background reclamation has run.
pub trait CacheStore: Send + Sync + Clone + 'static {
    /// Fetches the payload stored under `key`.
    ///
    /// Returns `Ok(None)` when no entry exists or the entry's TTL has
    /// elapsed.
    fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Inserts or overwrites the entry under `key` with the given TTL,
    /// measured from the call time.
    ///
    /// Any non-negative TTL is accepted; a zero TTL yields an entry that is
    /// already expired. Callers treat zero freshness as "do not cache" and
    /// skip the call.
    fn set(&self, key: String, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    /// Removes the entry under `key`, if present.
    fn invalidate(&self, key: &str) -> Result<(), CacheError>;
}
