use std::convert::Infallible;
use std::hint::black_box;
use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, Criterion};
use http::{header, HeaderValue, Request, Response};
use http_body_util::{BodyExt, Full};
use tokio::runtime::Runtime;
use tower::{service_fn, Layer, Service, ServiceExt};
use tower_ram_cache::prelude::*;

fn tokio_runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| Runtime::new().expect("failed to build Tokio runtime"))
}

fn request(path: &str) -> Request<()> {
    Request::builder().uri(path).body(()).expect("valid request")
}

fn bench_store_get(c: &mut Criterion) {
    let rt = tokio_runtime();
    let store = rt.block_on(async { InMemoryStore::new() });

    let payload = Bytes::from(vec![b'x'; 4096]);
    store
        .set("bench-key".into(), payload, Duration::from_secs(300))
        .expect("set succeeds");

    c.bench_function("store_get", |b| {
        b.iter(|| {
            let value = store.get(black_box("bench-key")).expect("get succeeds");
            black_box(value);
        })
    });
}

fn bench_layer_hit_path(c: &mut Criterion) {
    let rt = tokio_runtime();
    let layer = rt.block_on(async {
        CacheLayer::new(CacheConfig::new().with_max_expiry(300)).expect("layer builds")
    });

    let service = layer.layer(service_fn(|_req: Request<()>| async {
        let response = Response::builder()
            .header(
                header::CACHE_CONTROL,
                HeaderValue::from_static("max-age=300"),
            )
            .body(Full::from(Bytes::from_static(b"{\"ok\":true}")))
            .expect("response builds");
        Ok::<_, Infallible>(response)
    }));

    // Warm the cache so iterations measure replay, not upstream work.
    rt.block_on(async {
        let mut service = service.clone();
        let response = service
            .ready()
            .await
            .expect("service ready")
            .call(request("/bench"))
            .await
            .expect("call succeeds");
        response.into_body().collect().await.expect("body collected");
    });

    c.bench_function("layer_hit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut service = service.clone();
                let response = service
                    .ready()
                    .await
                    .expect("service ready")
                    .call(request("/bench"))
                    .await
                    .expect("call succeeds");
                let body = response
                    .into_body()
                    .collect()
                    .await
                    .expect("body collected")
                    .to_bytes();
                black_box(body);
            })
        })
    });
}

criterion_group!(benches, bench_store_get, bench_layer_hit_path);
criterion_main!(benches);
