use bytes::Bytes;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use super::CacheStore;
use crate::error::CacheError;

/// Default interval between sweeps of expired entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// An in-memory [`CacheStore`] backed by [`DashMap`].
///
/// The store is cheap to clone and shares a single underlying map. Entries
/// are logically absent the moment their TTL elapses; a background sweep
/// reclaims their memory on a fixed interval, but `get` never relies on the
/// sweep having run.
#[derive(Clone)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

struct Shared {
    entries: DashMap<String, StoreRecord>,
}

#[derive(Clone)]
struct StoreRecord {
    value: Bytes,
    expires_at: SystemTime,
}

impl StoreRecord {
    fn expired(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }
}

impl InMemoryStore {
    /// Creates a store sweeping at [`DEFAULT_SWEEP_INTERVAL`].
    pub fn new() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }

    /// Creates a store with a custom sweep interval.
    ///
    /// The sweep task is spawned onto the ambient tokio runtime when one
    /// exists and exits once the last handle to the store drops. Without a
    /// runtime the store still behaves correctly through lazy expiry; only
    /// memory reclamation of never-touched keys is skipped.
    pub fn with_sweep_interval(interval: Duration) -> Self {
        let shared = Arc::new(Shared {
            entries: DashMap::new(),
        });

        let interval = if interval.is_zero() {
            DEFAULT_SWEEP_INTERVAL
        } else {
            interval
        };
        spawn_sweeper(Arc::downgrade(&shared), interval);

        Self { shared }
    }

    /// Number of entries currently held, including expired entries the
    /// sweep has not yet reclaimed.
    pub fn len(&self) -> usize {
        self.shared.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.entries.is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let record = match self.shared.entries.get(key) {
            Some(guard) => guard.value().clone(),
            None => return Ok(None),
        };

        if record.expired(SystemTime::now()) {
            // Re-check under the shard lock so a concurrent overwrite with a
            // fresh record is not lost.
            self.shared
                .entries
                .remove_if(key, |_, record| record.expired(SystemTime::now()));
            return Ok(None);
        }

        Ok(Some(record.value))
    }

    fn set(&self, key: String, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let record = StoreRecord {
            value,
            expires_at: SystemTime::now() + ttl,
        };
        self.shared.entries.insert(key, record);
        Ok(())
    }

    fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.shared.entries.remove(key);
        Ok(())
    }
}

fn spawn_sweeper(shared: Weak<Shared>, interval: Duration) {
    let handle = match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle,
        Err(_) => return,
    };

    handle.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let shared = match shared.upgrade() {
                Some(shared) => shared,
                None => break,
            };
            let now = SystemTime::now();
            let before = shared.entries.len();
            shared.entries.retain(|_, record| !record.expired(now));
            let swept = before.saturating_sub(shared.entries.len());
            if swept > 0 {
                tracing::trace!(swept, "reclaimed expired cache entries");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const KEY: &str = "GETlocalhost:8080/test/path";

    #[tokio::test]
    async fn set_then_get_returns_identical_bytes() {
        let store = InMemoryStore::new();
        assert!(store.get(KEY).expect("get succeeds").is_none());

        let payload = Bytes::from_static(b"some random cache content that should be exact");
        store
            .set(KEY.into(), payload.clone(), Duration::from_secs(3))
            .expect("set succeeds");

        let got = store.get(KEY).expect("get succeeds").expect("entry present");
        assert_eq!(got, payload);
    }

    #[tokio::test]
    async fn get_after_ttl_elapsed_misses() {
        let store = InMemoryStore::new();
        store
            .set(
                KEY.into(),
                Bytes::from_static(b"short-lived"),
                Duration::from_millis(30),
            )
            .expect("set succeeds");

        assert!(store.get(KEY).expect("get succeeds").is_some());

        sleep(Duration::from_millis(50)).await;
        assert!(
            store.get(KEY).expect("get succeeds").is_none(),
            "expired entry must be absent"
        );
    }

    #[tokio::test]
    async fn zero_ttl_entry_is_born_expired() {
        let store = InMemoryStore::new();
        store
            .set(KEY.into(), Bytes::from_static(b"gone"), Duration::ZERO)
            .expect("set succeeds");
        assert!(store.get(KEY).expect("get succeeds").is_none());
    }

    #[tokio::test]
    async fn overwrite_replaces_value_and_ttl() {
        let store = InMemoryStore::new();
        store
            .set(KEY.into(), Bytes::from_static(b"old"), Duration::from_millis(20))
            .expect("set succeeds");
        store
            .set(KEY.into(), Bytes::from_static(b"new"), Duration::from_secs(5))
            .expect("set succeeds");

        sleep(Duration::from_millis(40)).await;
        let got = store.get(KEY).expect("get succeeds").expect("entry present");
        assert_eq!(got, Bytes::from_static(b"new"));
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let store = InMemoryStore::new();
        store
            .set(KEY.into(), Bytes::from_static(b"bye"), Duration::from_secs(5))
            .expect("set succeeds");
        store.invalidate(KEY).expect("invalidate succeeds");
        assert!(store.get(KEY).expect("get succeeds").is_none());
    }

    #[tokio::test]
    async fn sweep_reclaims_expired_entries() {
        let store = InMemoryStore::with_sweep_interval(Duration::from_millis(20));
        store
            .set(
                KEY.into(),
                Bytes::from_static(b"sweep me"),
                Duration::from_millis(10),
            )
            .expect("set succeeds");

        sleep(Duration::from_millis(80)).await;
        assert_eq!(store.len(), 0, "sweeper should have purged the entry");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_get_and_set_never_tear() {
        let store = InMemoryStore::new();
        let payload = Bytes::from_static(b"some random cache content that should be exact");
        let deadline = std::time::Instant::now() + Duration::from_millis(300);

        let reader = tokio::spawn({
            let store = store.clone();
            let payload = payload.clone();
            async move {
                while std::time::Instant::now() < deadline {
                    if let Some(got) = store.get(KEY).expect("get succeeds") {
                        assert_eq!(got, payload, "read a torn or foreign value");
                    }
                    tokio::task::yield_now().await;
                }
            }
        });

        let writer = tokio::spawn({
            let store = store.clone();
            let payload = payload.clone();
            async move {
                while std::time::Instant::now() < deadline {
                    store
                        .set(KEY.into(), payload.clone(), Duration::from_secs(30))
                        .expect("set succeeds");
                    tokio::task::yield_now().await;
                }
            }
        });

        reader.await.expect("reader task joins");
        writer.await.expect("writer task joins");
    }
}
