use std::time::{Duration, Instant};

/// Why an entry's `on_remove` hook was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// The entry's `ttl` elapsed and the sweeper removed it.
    ExpiredTtl,
    /// The entry was removed via an explicit `Cache::remove` call.
    Removed,
}

type OnRemove = Box<dyn FnOnce(RemovalReason) + Send>;

/// A single cached record: key, value, timestamp, ttl, and an optional
/// lifecycle hook.
///
/// `timestamp` is set once at construction (or refresh) and is never mutated
/// in place; a refresh builds a brand new `CacheEntry` and replaces the old
/// one, which is what keeps bi-containment between the map and the
/// [`crate::ordering::LruOrdering`] trivial to maintain.
pub struct CacheEntry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) timestamp: Instant,
    pub(crate) ttl: Duration,
    pub(crate) on_remove: Option<OnRemove>,
}

impl<K, V> CacheEntry<K, V> {
    /// Starts building an entry for `key`/`value`, timestamped "now".
    pub fn builder(key: K, value: V) -> CacheEntryBuilder<K, V> {
        CacheEntryBuilder {
            key,
            value,
            timestamp: None,
            ttl: Duration::ZERO,
            on_remove: None,
        }
    }

    /// The entry's key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The entry's value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// The time this entry was created or last refreshed.
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// The entry's ttl. A zero duration means "no expiry".
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether this entry is expired at time `now`.
    ///
    /// Per spec: an entry with `ttl == 0` is never expired, and expiration is
    /// purely a function of `timestamp`, never of access recency.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        !self.ttl.is_zero() && now.saturating_duration_since(self.timestamp) > self.ttl
    }

    pub(crate) fn into_parts(self) -> (K, V, Option<OnRemove>) {
        (self.key, self.value, self.on_remove)
    }
}

/// Builds a [`CacheEntry`] with optional `timestamp`, `ttl`, and `on_remove`.
pub struct CacheEntryBuilder<K, V> {
    key: K,
    value: V,
    timestamp: Option<Instant>,
    ttl: Duration,
    on_remove: Option<OnRemove>,
}

impl<K, V> CacheEntryBuilder<K, V> {
    /// Overrides the creation timestamp (defaults to `Instant::now()`).
    pub fn timestamp(mut self, timestamp: Instant) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the entry's ttl. Zero (the default) means "no expiry".
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets a hook invoked exactly once, outside of any lock, when the entry
    /// is removed (either by the sweeper or by an explicit `remove`).
    pub fn on_remove<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RemovalReason) + Send + 'static,
    {
        self.on_remove = Some(Box::new(f));
        self
    }

    /// Builds the entry.
    pub fn build(self) -> CacheEntry<K, V> {
        CacheEntry {
            key: self.key,
            value: self.value,
            timestamp: self.timestamp.unwrap_or_else(Instant::now),
            ttl: self.ttl,
            on_remove: self.on_remove,
        }
    }
}
