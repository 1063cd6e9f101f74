//! Tower RAM Cache
//! ===============
//!
//! `tower-ram-cache` is an in-memory HTTP response caching middleware for
//! Tower-based services. It replays previously captured responses for
//! requests it has already answered, honoring standard HTTP caching
//! semantics (`Cache-Control`, `Expires`) with a hard upper bound on every
//! entry's lifetime.
//!
//! The crate exposes a single [`CacheLayer`] configured through
//! [`CacheConfig`]:
//!
//! ```no_run
//! use tower::{Service, ServiceBuilder, ServiceExt};
//! use tower_ram_cache::prelude::*;
//!
//! # async fn run() -> Result<(), tower_ram_cache::layer::BoxError> {
//! let config = CacheConfig::new()
//!     .with_max_expiry(300)
//!     .with_blacklisted_headers(["x-bypass-cache"]);
//!
//! let mut svc = ServiceBuilder::new()
//!     .layer(CacheLayer::new(config)?)
//!     .service(tower::service_fn(|_req| async {
//!         Ok::<_, std::convert::Infallible>(http::Response::new(http_body_util::Full::from("ok")))
//!     }));
//!
//! let response = svc
//!     .ready()
//!     .await?
//!     .call(http::Request::new(()))
//!     .await?;
//! # drop(response);
//! # Ok(())
//! # }
//! ```
//!
//! Responses are cached only when the upstream declares them cacheable; a
//! broken cache never breaks a response — failures demote to a plain
//! forward, optionally visible through the `Cache-Status` header.

pub mod capture;
pub mod codec;
pub mod config;
pub mod error;
pub mod layer;
pub mod policy;
pub mod prelude;
pub mod store;

pub use capture::{CacheEntry, CaptureBody};
pub use config::CacheConfig;
pub use error::CacheError;
pub use layer::{CacheBody, CacheLayer, CacheService, CACHE_STATUS};
pub use policy::CachePolicy;
pub use store::memory::InMemoryStore;
pub use store::CacheStore;
