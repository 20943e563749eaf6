//! A concurrent, TTL-evicting cache with a background sweeper.
//!
//! A single lock guards a key→entry map, a periodic sweep pass runs removal
//! hooks outside that lock, and a one-shot "started" signal marks the
//! sweeper task ready. The map is always paired with one [`LruOrdering`],
//! used for O(1) `stats()` and to keep bi-containment between the map and
//! an eviction-ordering structure.

use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "ahash")]
use hashbrown::HashMap;
#[cfg(not(feature = "ahash"))]
use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{oneshot, watch, Notify};
use tracing::trace;

use crate::entry::{CacheEntry, CacheEntryBuilder, RemovalReason};
use crate::error::CacheError;
use crate::key::CacheKey;
use crate::ordering::{HeapOrdering, LruOrdering};

/// Default interval between sweeper passes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(500);

/// Point-in-time statistics about a cache's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Number of entries currently stored, expired or not.
    pub count: usize,
    /// Age of the oldest entry by timestamp, if any entries are stored.
    pub oldest_age: Option<Duration>,
    /// A best-effort estimate of memory held by stored entries.
    pub size_bytes: usize,
}

struct State<K, V, O> {
    map: HashMap<K, CacheEntry<K, V>>,
    ordering: O,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweeperState {
    Idle,
    Running,
    Stopped,
}

struct Sweeper {
    state: SweeperState,
    started_tx: watch::Sender<bool>,
    started_rx: watch::Receiver<bool>,
    cancel: Arc<Notify>,
    canceled_rx: Option<oneshot::Receiver<()>>,
}

impl Sweeper {
    fn new() -> Self {
        let (started_tx, started_rx) = watch::channel(false);
        Self {
            state: SweeperState::Idle,
            started_tx,
            started_rx,
            cancel: Arc::new(Notify::new()),
            canceled_rx: None,
        }
    }
}

struct Inner<K, V, O> {
    state: RwLock<State<K, V, O>>,
    sweep_interval: Duration,
    sweeper: Mutex<Sweeper>,
}

/// An in-memory, TTL-evicting cache keyed by `K`, holding values of type
/// `V`, backed by a pluggable [`LruOrdering`] `O` (defaults to
/// [`HeapOrdering`]).
///
/// Cheaply [`Clone`]: clones share the same underlying map, ordering, and
/// sweeper handle through an `Arc`.
pub struct Cache<K, V, O = HeapOrdering<K>> {
    inner: Arc<Inner<K, V, O>>,
}

impl<K: CacheKey, V, O: LruOrdering<K>> Clone for Cache<K, V, O> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: CacheKey, V, O: LruOrdering<K> + Default> Default for Cache<K, V, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: CacheKey, V, O: LruOrdering<K> + Default> Cache<K, V, O> {
    /// Creates a cache with the default sweep interval.
    pub fn new() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }

    /// Creates a cache that sweeps at `sweep_interval` once [`Cache::start`]
    /// is called.
    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State {
                    map: HashMap::new(),
                    ordering: O::default(),
                }),
                sweep_interval,
                sweeper: Mutex::new(Sweeper::new()),
            }),
        }
    }
}

impl<K: CacheKey, V, O: LruOrdering<K>> Cache<K, V, O> {
    /// Inserts a fully-built entry, replacing any prior entry for its key.
    ///
    /// The ordering position for the key is refreshed via `fix` rather than
    /// `push`, so a replace never leaves two ordering entries for the same
    /// key.
    pub fn insert(&self, entry: CacheEntry<K, V>) {
        let mut state = self.inner.state.write();
        let key = entry.key().clone();
        let timestamp = entry.timestamp();
        state.ordering.fix(key.clone(), timestamp);
        state.map.insert(key, entry);
    }

    /// Inserts `value` under `key` with no ttl and no hooks.
    pub fn set(&self, key: K, value: V) {
        self.insert(CacheEntry::builder(key, value).build());
    }

    /// Inserts `value` under `key`, letting `configure` customize the
    /// entry's builder (`ttl`, `timestamp`, `on_remove`) before it's stored.
    pub fn set_with<F>(&self, key: K, value: V, configure: F)
    where
        F: FnOnce(CacheEntryBuilder<K, V>) -> CacheEntryBuilder<K, V>,
    {
        let builder = configure(CacheEntry::builder(key, value));
        self.insert(builder.build());
    }

    /// Returns a clone of the value stored under `key`, if present.
    ///
    /// Read-only: does not refresh the entry's timestamp, and does not
    /// itself check expiry, an entry past its ttl stays visible here until
    /// a sweep removes it, matching `get`'s read-only, sweep-is-the-only-
    /// evictor contract.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.inner.state.read().map.get(key).map(|e| e.value().clone())
    }

    /// Whether `key` is currently present, expired or not.
    pub fn has(&self, key: &K) -> bool {
        self.inner.state.read().map.contains_key(key)
    }

    /// Removes `key`, invoking its `on_remove(Removed)` hook, if any, once
    /// the entry is no longer visible in the map. Returns whether the key
    /// was present.
    pub fn remove(&self, key: &K) -> bool {
        let removed = {
            let mut state = self.inner.state.write();
            let entry = state.map.remove(key);
            if entry.is_some() {
                state.ordering.remove(key);
            }
            entry
        };
        match removed {
            Some(entry) => {
                trace!("cache entry removed");
                let (_, _, on_remove) = entry.into_parts();
                if let Some(cb) = on_remove {
                    cb(RemovalReason::Removed);
                }
                true
            }
            None => false,
        }
    }

    /// Computes point-in-time statistics.
    pub fn stats(&self) -> Stats {
        let state = self.inner.state.write();
        let now = Instant::now();
        Stats {
            count: state.map.len(),
            oldest_age: state
                .ordering
                .peek()
                .map(|oldest| now.saturating_duration_since(oldest.timestamp)),
            size_bytes: state.map.len() * std::mem::size_of::<CacheEntry<K, V>>(),
        }
    }

    /// Removes every currently-expired entry, invoking each removed entry's
    /// `on_remove(ExpiredTtl)` hook only after every expired entry of this
    /// sweep has already been removed from the map.
    pub fn sweep(&self) {
        let now = Instant::now();
        let removed = {
            let mut state = self.inner.state.write();
            let expired: Vec<K> = state
                .map
                .iter()
                .filter(|(_, entry)| entry.is_expired_at(now))
                .map(|(key, _)| key.clone())
                .collect();
            let mut removed = Vec::with_capacity(expired.len());
            for key in expired {
                if let Some(entry) = state.map.remove(&key) {
                    state.ordering.remove(&key);
                    removed.push(entry);
                }
            }
            removed
        };
        trace!(removed = removed.len(), "cache sweep completed");
        for entry in removed {
            let (_, _, on_remove) = entry.into_parts();
            if let Some(cb) = on_remove {
                cb(RemovalReason::ExpiredTtl);
            }
        }
    }
}

impl<K: CacheKey, V, O> Cache<K, V, O>
where
    V: Send + Sync + 'static,
    O: LruOrdering<K> + Send + Sync + 'static,
{
    /// Starts the periodic sweeper task. Readiness is observable through
    /// [`Cache::notify_started`], which resolves once the sweeper's ticker
    /// is set up; the task then sweeps every `sweep_interval` until
    /// [`Cache::stop`] is called.
    ///
    /// A sweeper cannot be restarted once stopped; repeat `start` calls
    /// (whether before or after a `stop`) return
    /// [`CacheError::AlreadyStarted`].
    pub fn start(&self) -> Result<(), CacheError> {
        let mut sweeper = self.inner.sweeper.lock();
        if sweeper.state != SweeperState::Idle {
            return Err(CacheError::AlreadyStarted);
        }
        sweeper.state = SweeperState::Running;
        let (canceled_tx, canceled_rx) = oneshot::channel();
        sweeper.canceled_rx = Some(canceled_rx);
        let cancel = sweeper.cancel.clone();
        let started_tx = sweeper.started_tx.clone();
        drop(sweeper);

        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.inner.sweep_interval);
            ticker.tick().await; // interval's first tick fires immediately
            let _ = started_tx.send(true);
            loop {
                tokio::select! {
                    _ = cancel.notified() => {
                        let _ = canceled_tx.send(());
                        break;
                    }
                    _ = ticker.tick() => {
                        cache.sweep();
                    }
                }
            }
        });
        Ok(())
    }

    /// Signals the sweeper to stop and blocks until it acknowledges
    /// cancellation. A no-op if the sweeper isn't currently running.
    pub async fn stop(&self) {
        let (cancel, canceled_rx) = {
            let mut sweeper = self.inner.sweeper.lock();
            if sweeper.state != SweeperState::Running {
                return;
            }
            sweeper.state = SweeperState::Stopped;
            (sweeper.cancel.clone(), sweeper.canceled_rx.take())
        };
        cancel.notify_one();
        if let Some(rx) = canceled_rx {
            let _ = rx.await;
        }
    }

    /// Waits until a sweeper started via [`Cache::start`] has set up its
    /// ticker and is ready to sweep. Resolves immediately if the sweeper
    /// had already reached that point.
    pub async fn notify_started(&self) {
        let mut rx = self.inner.sweeper.lock().started_rx.clone();
        let _ = rx.wait_for(|started| *started).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Clone, PartialEq, Eq, Hash)]
    struct K(u32);
    impl CacheKey for K {}

    #[test]
    fn basic_set_get_remove() {
        let c: Cache<K, &str> = Cache::new();
        c.set(K(1), "foo");
        assert_eq!(c.get(&K(1)), Some("foo"));
        c.set(K(1), "bar");
        assert_eq!(c.get(&K(1)), Some("bar"));
        assert!(c.remove(&K(1)));
        assert_eq!(c.get(&K(1)), None);
        assert!(!c.remove(&K(1)));
    }

    #[test]
    fn sweep_removes_expired_and_runs_hooks_after_removal() {
        let c: Cache<K, &str> = Cache::new();
        let did_sweep = Arc::new(AtomicBool::new(false));
        let did_sweep_clone = did_sweep.clone();
        c.set_with(K(1), "foo", |b| {
            b.timestamp(Instant::now() - Duration::from_secs(120))
                .ttl(Duration::from_secs(60))
                .on_remove(move |reason| {
                    assert_eq!(reason, RemovalReason::ExpiredTtl);
                    did_sweep_clone.store(true, Ordering::SeqCst);
                })
        });
        c.set_with(K(2), "bar", |b| b.ttl(Duration::from_secs(60)));

        c.sweep();

        assert_eq!(c.get(&K(1)), None);
        assert!(did_sweep.load(Ordering::SeqCst));
        assert_eq!(c.get(&K(2)), Some("bar"));
    }

    #[test]
    fn zero_ttl_entries_survive_sweep() {
        let c: Cache<K, &str> = Cache::new();
        c.set_with(K(1), "foo", |b| {
            b.timestamp(Instant::now() - Duration::from_secs(3600))
        });
        c.sweep();
        assert_eq!(c.get(&K(1)), Some("foo"));
    }

    #[test]
    fn stats_reports_count_and_oldest_age() {
        let c: Cache<K, &str> = Cache::new();
        let stats = c.stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.oldest_age, None);

        c.set_with(K(1), "foo", |b| {
            b.timestamp(Instant::now() - Duration::from_secs(10))
        });
        c.set(K(2), "bar");

        let stats = c.stats();
        assert_eq!(stats.count, 2);
        assert!(stats.oldest_age.unwrap() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn start_is_guarded_against_double_start() {
        let c: Cache<K, &str> = Cache::with_sweep_interval(Duration::from_millis(20));
        c.start().unwrap();
        c.notify_started().await;
        assert!(matches!(c.start(), Err(CacheError::AlreadyStarted)));
        c.stop().await;
    }

    #[tokio::test]
    async fn start_sweeps_until_stopped() {
        let c: Cache<K, &str> = Cache::with_sweep_interval(Duration::from_millis(10));
        c.set_with(K(1), "foo", |b| {
            b.timestamp(Instant::now() - Duration::from_secs(3600))
                .ttl(Duration::from_millis(1))
        });
        c.start().unwrap();
        c.notify_started().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(c.get(&K(1)), None);
        c.stop().await;
    }
}
