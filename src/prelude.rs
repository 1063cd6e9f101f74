//! Re-exports for consumers who prefer a single import.
//!
//! ```no_run
//! use tower_ram_cache::prelude::*;
//!
//! # fn run() -> Result<(), tower_ram_cache::CacheError> {
//! let layer = CacheLayer::new(CacheConfig::new().with_max_expiry(60))?;
//! # drop(layer);
//! # Ok(())
//! # }
//! ```

pub use crate::capture::{CacheEntry, CaptureBody};
pub use crate::codec::{BincodeCodec, CacheCodec};
pub use crate::config::CacheConfig;
pub use crate::error::CacheError;
pub use crate::layer::{CacheBody, CacheLayer, CacheService, CACHE_STATUS};
pub use crate::policy::CachePolicy;
pub use crate::store::memory::InMemoryStore;
pub use crate::store::CacheStore;
