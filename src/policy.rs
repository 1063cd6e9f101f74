//! Cacheability decisions per HTTP caching semantics.
//!
//! Given the inbound request's metadata and the outbound response's status
//! and headers, [`CachePolicy`] decides whether the response may be stored
//! and for how long. Every evaluation failure is treated as "not cacheable":
//! the cache never stores on uncertainty.

use cache_control::{Cachability, CacheControl};
use http::{header, HeaderMap, Method, StatusCode};
use std::time::{Duration, SystemTime};

/// Statuses a shared cache may store by default.
fn status_cacheable(status: StatusCode) -> bool {
    matches!(
        status.as_u16(),
        200 | 203 | 204 | 300 | 301 | 404 | 405 | 410 | 414 | 501
    )
}

/// Runtime cacheability policy shared by every request flow.
///
/// The policy is immutable and cheap to clone; `max_expiry` caps every
/// entry's lifetime regardless of how long upstream declares the response
/// fresh, bounding worst-case staleness and memory growth.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    max_expiry: Duration,
}

impl CachePolicy {
    pub fn new(max_expiry: Duration) -> Self {
        Self { max_expiry }
    }

    pub fn max_expiry(&self) -> Duration {
        self.max_expiry
    }

    /// Decides whether the response may be stored, returning its effective
    /// TTL: `min(freshness lifetime, max_expiry)`.
    ///
    /// Returns `None` when any disqualifying directive is present, when no
    /// freshness lifetime is computable, or when the lifetime is zero.
    pub fn effective_ttl(
        &self,
        method: &Method,
        request_headers: &HeaderMap,
        status: StatusCode,
        response_headers: &HeaderMap,
    ) -> Option<Duration> {
        if !matches!(method, &Method::GET | &Method::HEAD) {
            return None;
        }
        if !status_cacheable(status) {
            return None;
        }
        // Shared-cache rule: responses to credentialed requests stay private.
        if request_headers.contains_key(header::AUTHORIZATION) {
            return None;
        }

        match parse_cache_control(request_headers) {
            Ok(Some(directives)) if directives.no_store => return None,
            Ok(_) => {}
            Err(()) => return None,
        }

        let freshness = match parse_cache_control(response_headers) {
            Err(()) => return None,
            Ok(Some(directives)) => {
                if directives.no_store {
                    return None;
                }
                match directives.cachability {
                    Some(Cachability::Private)
                    | Some(Cachability::NoCache)
                    | Some(Cachability::OnlyIfCached) => return None,
                    _ => {}
                }
                directives
                    .s_max_age
                    .or(directives.max_age)
                    .or_else(|| expires_lifetime(response_headers))
            }
            Ok(None) => expires_lifetime(response_headers),
        }?;

        if freshness.is_zero() {
            return None;
        }

        Some(freshness.min(self.max_expiry))
    }
}

/// Parses the joined `Cache-Control` values of a header map.
///
/// `Ok(None)` when the header is absent; `Err(())` when any value is not
/// valid UTF-8 or the directives do not parse.
fn parse_cache_control(headers: &HeaderMap) -> Result<Option<CacheControl>, ()> {
    let mut joined = String::new();
    for value in headers.get_all(header::CACHE_CONTROL) {
        let value = value.to_str().map_err(|_| ())?;
        if !joined.is_empty() {
            joined.push_str(", ");
        }
        joined.push_str(value);
    }

    if joined.is_empty() {
        return Ok(None);
    }

    CacheControl::from_value(&joined).map(Some).ok_or(())
}

/// Freshness lifetime from the `Expires` header, if it lies in the future.
fn expires_lifetime(headers: &HeaderMap) -> Option<Duration> {
    let expires = headers.get(header::EXPIRES)?.to_str().ok()?;
    let expires = httpdate::parse_http_date(expires).ok()?;
    expires.duration_since(SystemTime::now()).ok()
}
