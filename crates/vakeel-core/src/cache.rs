//! Concurrent key-value cache with per-entry time-to-live.
//!
//! Entries are written with an explicit TTL and removed by a background
//! sweeper once their deadline has passed. Removal fires the registered
//! eviction callbacks, which is what drives up-to-down edge detection in
//! the state engine.
//!
//! ## Eviction callbacks
//!
//! Callbacks registered with [`Cache::on_evict`] compose: registering `f1`
//! and then `f2` makes an eviction run `f2` followed by `f1`. Callbacks run
//! on the sweeper task while it holds the write lock, so they must not
//! block; enqueueing work for another task is the expected shape. A
//! panicking callback is contained and does not corrupt the cache or stop
//! the sweeper.
//!
//! ## Reads
//!
//! `get` is a snapshot read. An entry whose deadline has passed but which
//! the sweeper has not visited yet is still returned; expiry is observable
//! only through eviction.

use std::collections::HashMap;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::clock::{Clock, TokioClock};

/// Construction options for [`Cache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How often the sweeper scans for expired entries.
    pub sweep_interval: Duration,

    /// Capacity hint for the underlying map.
    pub initial_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            initial_capacity: 0,
        }
    }
}

type EvictFn<K, V> = Box<dyn Fn(&K, &V) + Send + Sync>;

struct Item<V> {
    value: V,
    deadline: Instant,
}

struct Inner<K, V> {
    items: RwLock<HashMap<K, Item<V>>>,
    on_evict: std::sync::RwLock<Option<EvictFn<K, V>>>,
    clock: Arc<dyn Clock>,
    sweep_interval: Duration,
}

/// Concurrent TTL cache.
///
/// Cheap to clone; clones share the same underlying store.
pub struct Cache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache driven by the tokio clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(TokioClock))
    }

    /// Creates a cache with an injected time source.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                items: RwLock::new(HashMap::with_capacity(config.initial_capacity)),
                on_evict: std::sync::RwLock::new(None),
                clock,
                sweep_interval: config.sweep_interval,
            }),
        }
    }

    /// Inserts or overwrites an entry and arms its deadline at `now + ttl`.
    pub async fn add(&self, key: K, value: V, ttl: Duration) {
        let deadline = self.inner.clock.now() + ttl;
        let mut items = self.inner.items.write().await;
        items.insert(key, Item { value, deadline });
    }

    /// Snapshot read of the value stored under `key`.
    pub async fn get(&self, key: &K) -> Option<V> {
        let items = self.inner.items.read().await;
        items.get(key).map(|item| item.value.clone())
    }

    /// Number of live entries, expired-but-unswept included.
    pub async fn len(&self) -> usize {
        self.inner.items.read().await.len()
    }

    /// Returns true when the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Registers an eviction callback.
    ///
    /// The new callback is composed in front of any previously registered
    /// one, so the most recent registration runs first.
    pub fn on_evict<F>(&self, callback: F)
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        let mut slot = match self.inner.on_evict.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(match slot.take() {
            Some(previous) => Box::new(move |key: &K, value: &V| {
                callback(key, value);
                previous(key, value);
            }),
            None => Box::new(callback),
        });
    }

    /// Spawns the background sweeper.
    ///
    /// The task ticks at the configured sweep interval and stops when the
    /// shutdown channel fires or its sender is dropped.
    pub fn spawn_sweeper(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.inner.sweep_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => cache.sweep_expired().await,
                    _ = shutdown.changed() => break,
                }
            }
            debug!("cache sweeper stopped");
        })
    }

    /// Runs one sweep pass: evicts every entry whose deadline has passed.
    ///
    /// The write lock is held for the whole pass; concurrent `add`/`get`
    /// callers queue behind it. Eviction callbacks run here, per entry,
    /// inside a panic boundary.
    pub async fn sweep_expired(&self) {
        let now = self.inner.clock.now();
        let mut items = self.inner.items.write().await;

        let mut expired = Vec::new();
        items.retain(|key, item| {
            if item.deadline < now {
                expired.push((key.clone(), item.value.clone()));
                false
            } else {
                true
            }
        });

        if expired.is_empty() {
            return;
        }

        let callback = match self.inner.on_evict.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(callback) = callback.as_ref() {
            for (key, value) in &expired {
                if catch_unwind(AssertUnwindSafe(|| callback(key, value))).is_err() {
                    warn!("eviction callback panicked");
                }
            }
        }
    }
}
