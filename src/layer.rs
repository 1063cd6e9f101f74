use std::error::Error as StdError;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{header, HeaderMap, HeaderName, HeaderValue, Request, Response};
use http_body::{Body, Frame, SizeHint};
use http_body_util::Full;
use tower::{Layer, Service, ServiceExt};

use crate::capture::{CacheEntry, CaptureBody};
use crate::codec::{BincodeCodec, CacheCodec};
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::policy::CachePolicy;
use crate::store::memory::InMemoryStore;
use crate::store::CacheStore;

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Header reporting the cache's disposition for a response.
pub const CACHE_STATUS: HeaderName = HeaderName::from_static("cache-status");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheStatus {
    Hit,
    Miss,
    Error,
}

impl CacheStatus {
    fn as_value(self) -> HeaderValue {
        HeaderValue::from_static(match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
            CacheStatus::Error => "error",
        })
    }
}

/// Response-caching layer for Tower services.
///
/// The layer wraps an inner service and replays stored responses for
/// requests it has seen before, per the configured [`CacheConfig`] and HTTP
/// caching semantics. Construction validates the configuration and fails
/// with [`CacheError::Config`] rather than producing a handler that cannot
/// behave correctly.
///
/// Cloning a `CacheLayer` is cheap and shares the underlying store, so every
/// service built from one layer serves from the same cache.
#[derive(Clone)]
pub struct CacheLayer<S = InMemoryStore, C = BincodeCodec> {
    store: S,
    codec: C,
    config: Arc<CacheConfig>,
    policy: CachePolicy,
}

impl CacheLayer {
    /// Creates a layer backed by a fresh [`InMemoryStore`] sweeping at the
    /// config's refresh interval.
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        config.validate()?;
        let store = InMemoryStore::with_sweep_interval(config.refresh_time());
        Self::with_store(config, store)
    }
}

impl<S> CacheLayer<S, BincodeCodec>
where
    S: CacheStore,
{
    /// Creates a layer over an existing store.
    pub fn with_store(config: CacheConfig, store: S) -> Result<Self, CacheError> {
        Self::with_store_and_codec(config, store, BincodeCodec)
    }
}

impl<S, C> CacheLayer<S, C>
where
    S: CacheStore,
    C: CacheCodec,
{
    /// Creates a layer with an explicit store and entry codec.
    pub fn with_store_and_codec(
        config: CacheConfig,
        store: S,
        codec: C,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        let policy = CachePolicy::new(config.max_expiry());
        Ok(Self {
            store,
            codec,
            policy,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl<Inner, S, C> Layer<Inner> for CacheLayer<S, C>
where
    S: CacheStore,
    C: CacheCodec,
{
    type Service = CacheService<Inner, S, C>;

    fn layer(&self, inner: Inner) -> Self::Service {
        CacheService {
            inner,
            store: self.store.clone(),
            codec: self.codec.clone(),
            config: self.config.clone(),
            policy: self.policy.clone(),
        }
    }
}

/// The service produced by [`CacheLayer`].
#[derive(Clone)]
pub struct CacheService<Inner, S = InMemoryStore, C = BincodeCodec> {
    inner: Inner,
    store: S,
    codec: C,
    config: Arc<CacheConfig>,
    policy: CachePolicy,
}

impl<Inner, S, C, ReqBody, ResBody> Service<Request<ReqBody>> for CacheService<Inner, S, C>
where
    Inner: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    Inner::Error: Into<BoxError> + Send,
    ReqBody: Send + 'static,
    ResBody: Body<Data = Bytes> + Send + 'static,
    S: CacheStore,
    C: CacheCodec,
{
    type Response = Response<CacheBody<ResBody>>;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let inner = self.inner.clone();
        let store = self.store.clone();
        let codec = self.codec.clone();
        let config = self.config.clone();
        let policy = self.policy.clone();

        Box::pin(handle(req, inner, store, codec, config, policy))
    }
}

async fn handle<Inner, S, C, ReqBody, ResBody>(
    req: Request<ReqBody>,
    inner: Inner,
    store: S,
    codec: C,
    config: Arc<CacheConfig>,
    policy: CachePolicy,
) -> Result<Response<CacheBody<ResBody>>, BoxError>
where
    Inner: Service<Request<ReqBody>, Response = Response<ResBody>> + Send + 'static,
    Inner::Future: Send + 'static,
    Inner::Error: Into<BoxError> + Send,
    ReqBody: Send + 'static,
    ResBody: Body<Data = Bytes> + Send + 'static,
    S: CacheStore,
    C: CacheCodec,
{
    if let Some(name) = blacklisted_header(&config, req.headers()) {
        tracing::debug!(header = name, "request bypasses cache");
        let response = inner.oneshot(req).await.map_err(Into::into)?;
        return Ok(response.map(|body| CacheBody::upstream(CaptureBody::passthrough(body))));
    }

    let key = cache_key(&config, &req);
    let method = req.method().clone();
    let request_headers = req.headers().clone();

    let mut cache_status = CacheStatus::Miss;
    match store.get(&key) {
        Ok(Some(raw)) => match codec.decode(&raw) {
            Ok(entry) => {
                tracing::debug!(key = %key, "cache hit");
                return Ok(replay(entry, &config));
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "stored entry failed to decode");
                cache_status = CacheStatus::Error;
            }
        },
        Ok(None) => {
            tracing::debug!(key = %key, "cache miss");
        }
        Err(err) => {
            tracing::warn!(key = %key, error = %err, "cache lookup failed");
            cache_status = CacheStatus::Error;
        }
    }

    let mut response = inner.oneshot(req).await.map_err(Into::into)?;
    if config.add_status_header() {
        response
            .headers_mut()
            .insert(CACHE_STATUS, cache_status.as_value());
    }

    let (parts, body) = response.into_parts();
    let ttl = policy.effective_ttl(&method, &request_headers, parts.status, &parts.headers);

    let wrapped = match ttl {
        Some(ttl) => {
            let headers = CacheEntry::headers_from_map(&parts.headers);
            CaptureBody::capturing(body, parts.status, headers, move |entry| {
                write_back(&store, &codec, key, entry, ttl)
            })
        }
        None => CaptureBody::passthrough(body),
    };

    Ok(Response::from_parts(parts, CacheBody::upstream(wrapped)))
}

/// Encodes and stores a captured entry once its body has fully streamed.
///
/// Failures are logged and swallowed: by the time the capture completes the
/// response has already been delivered, so the client must never be
/// affected.
fn write_back<S, C>(store: &S, codec: &C, key: String, entry: CacheEntry, ttl: Duration)
where
    S: CacheStore,
    C: CacheCodec,
{
    let encoded = match codec.encode(&entry) {
        Ok(encoded) => encoded,
        Err(err) => {
            tracing::error!(key = %key, error = %err, "failed to encode cache entry");
            return;
        }
    };

    if let Err(err) = store.set(key.clone(), encoded, ttl) {
        tracing::error!(key = %key, error = %err, "failed to store cache entry");
    } else {
        tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "stored cache entry");
    }
}

/// Builds the replayed response for a cache hit.
///
/// Stored headers are appended, not inserted, so multi-valued headers
/// survive verbatim; the status annotation and forced `Cache-Control`
/// overrides are inserted afterwards and replace any stored value.
fn replay<B>(entry: CacheEntry, config: &CacheConfig) -> Response<CacheBody<B>> {
    let CacheEntry {
        status,
        headers,
        body,
    } = entry;

    let mut response = Response::new(CacheBody::replay(body));
    *response.status_mut() = status;

    let response_headers = response.headers_mut();
    for (name, value) in &headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(value),
        ) {
            response_headers.append(name, value);
        }
    }

    if config.add_status_header() {
        response_headers.insert(CACHE_STATUS, CacheStatus::Hit.as_value());
    }
    if config.force_no_cache_header() {
        response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    }

    response
}

/// First configured blacklisted header present with a non-empty value.
fn blacklisted_header<'a>(config: &'a CacheConfig, headers: &HeaderMap) -> Option<&'a str> {
    config
        .blacklisted_headers()
        .iter()
        .map(String::as_str)
        .find(|name| headers.get(*name).is_some_and(|value| !value.is_empty()))
}

/// Derives the cache key from method, host, path, and optionally the raw
/// query string.
fn cache_key<B>(config: &CacheConfig, req: &Request<B>) -> String {
    let method = req.method().as_str();
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| req.uri().host())
        .unwrap_or("");
    let path = req.uri().path();

    let mut key = String::with_capacity(method.len() + host.len() + path.len() + 1);
    key.push_str(method);
    key.push_str(host);
    key.push_str(path);

    if config.cache_query_params() {
        if let Some(query) = req.uri().query() {
            key.push('?');
            key.push_str(query);
        }
    }

    key
}

/// Response body returned by [`CacheService`]: either the upstream body
/// flowing through the capture shim, or a stored body being replayed.
pub struct CacheBody<B> {
    kind: Kind<B>,
}

enum Kind<B> {
    Upstream(CaptureBody<B>),
    Replay(Full<Bytes>),
}

impl<B> CacheBody<B> {
    fn upstream(body: CaptureBody<B>) -> Self {
        Self {
            kind: Kind::Upstream(body),
        }
    }

    fn replay(body: Bytes) -> Self {
        Self {
            kind: Kind::Replay(Full::from(body)),
        }
    }
}

impl<B> Body for CacheBody<B>
where
    B: Body<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.get_mut().kind {
            Kind::Upstream(body) => Pin::new(body).poll_frame(cx),
            Kind::Replay(body) => Pin::new(body)
                .poll_frame(cx)
                .map(|frame| frame.map(|result| result.map_err(|never| match never {}))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.kind {
            Kind::Upstream(body) => body.is_end_stream(),
            Kind::Replay(body) => body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.kind {
            Kind::Upstream(body) => body.size_hint(),
            Kind::Replay(body) => body.size_hint(),
        }
    }
}
