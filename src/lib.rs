//! A concurrent, TTL-evicting cache with pluggable eviction orderings,
//! single-flight memoization, and a nested-savepoint transaction wrapper.
//!
//! - [`Cache`], a `key -> value` map with per-entry ttl, a background
//!   sweeper, and removal hooks.
//! - [`HeapOrdering`] / [`QueueOrdering`], interchangeable
//!   [`LruOrdering`] implementations `Cache` uses to track eviction order.
//! - [`Memoized`], single-flight memoization of a single-argument function.
//! - [`Transaction`], `SAVEPOINT`-based nested transactions over a small
//!   [`transaction::Driver`] trait.
//!
//! Cache keys and memoize arguments must implement [`CacheKey`] /
//! [`MemoizeArgs`] respectively, marker traits deliberately not
//! blanket-implemented for primitives, so a bare `u64` or `String` key is a
//! compile error rather than something to validate at runtime.

mod cache;
mod entry;
mod error;
mod key;
mod memoize;
mod ordering;
mod transaction;

pub use cache::{Cache, Stats, DEFAULT_SWEEP_INTERVAL};
pub use entry::{CacheEntry, CacheEntryBuilder, RemovalReason};
pub use error::{CacheError, TransactionError};
pub use key::{CacheKey, MemoizeArgs};
pub use memoize::Memoized;
pub use ordering::{HeapOrdering, LruOrdering, OrderedKey, QueueOrdering};
pub use transaction::{Driver, Transaction};

#[cfg(feature = "sqlx-driver")]
pub use transaction::{SqlxDriver, SqlxDriverError};
