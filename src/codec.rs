use bytes::Bytes;
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::capture::CacheEntry;
use crate::error::CacheError;

/// Trait representing a serialization strategy for cached entries.
pub trait CacheCodec: Send + Sync + Clone + 'static {
    fn encode(&self, entry: &CacheEntry) -> Result<Bytes, CacheError>;
    fn decode(&self, bytes: &[u8]) -> Result<CacheEntry, CacheError>;
}

/// Default [`CacheCodec`] implementation backed by `bincode`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    status: u16,
    headers: Vec<(String, Vec<u8>)>,
    body: Vec<u8>,
}

impl CacheCodec for BincodeCodec {
    fn encode(&self, entry: &CacheEntry) -> Result<Bytes, CacheError> {
        let stored = StoredEntry {
            status: entry.status.as_u16(),
            headers: entry.headers.clone(),
            body: entry.body.to_vec(),
        };

        bincode::serialize(&stored)
            .map(Bytes::from)
            .map_err(|err| CacheError::Codec(err.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<CacheEntry, CacheError> {
        let stored: StoredEntry =
            bincode::deserialize(bytes).map_err(|err| CacheError::Codec(err.to_string()))?;
        let status = StatusCode::from_u16(stored.status)
            .map_err(|err| CacheError::Codec(err.to_string()))?;
        Ok(CacheEntry::new(
            status,
            stored.headers,
            Bytes::from(stored.body),
        ))
    }
}
