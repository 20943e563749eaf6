use std::hash::Hash;

/// Marker trait for types usable as [`crate::Cache`] keys.
///
/// Deliberately **not** blanket-implemented for primitives, `String`, or
/// other "bare" scalar types. The intended usage is a distinct newtype per
/// cache:
///
/// ```
/// use corekit::CacheKey;
///
/// #[derive(Clone, PartialEq, Eq, Hash)]
/// struct UserId(u64);
/// impl CacheKey for UserId {}
/// ```
///
/// This is the compile-time form of the "key must be a record/composite
/// type" discipline: a plain `u64` or `&str` simply doesn't implement
/// `CacheKey`, so mixing up two caches' keys is a type error instead of a
/// runtime panic.
pub trait CacheKey: Hash + Eq + Clone + Send + Sync + 'static {}

/// Marker trait for arguments usable with [`crate::Memoized`].
///
/// Mirrors [`CacheKey`]'s discipline for the single argument a memoized
/// function is called with.
pub trait MemoizeArgs: Hash + Eq + Clone + Send + Sync + 'static {}
