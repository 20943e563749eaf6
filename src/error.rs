use thiserror::Error;

/// Errors returned by [`crate::Cache`] operations.
///
/// `KeyNil`, `KeyNotComparable`, and `KeyNotRecord` are kept as documented,
/// unreachable variants: the [`crate::CacheKey`] trait bound makes all three
/// failure modes a compile error rather than a runtime one (see
/// `DESIGN.md`), but the sentinels stay part of this crate's public error
/// vocabulary for a future dynamically-typed entry point.
#[derive(Debug, Error)]
pub enum CacheError {
    /// `set` was called with a key that is not a valid hash-map key.
    #[error("cache key is not comparable")]
    KeyNotComparable,
    /// `set` was called with a primitive/string key instead of a newtype.
    #[error("cache key must be a distinct composite type, not a primitive")]
    KeyNotRecord,
    /// `set` was called with a nil/absent key.
    #[error("cache key must not be nil")]
    KeyNil,
    /// `start` was called while the sweeper was already running or stopped.
    #[error("cache sweeper has already been started")]
    AlreadyStarted,
}

/// Errors returned by [`crate::Transaction`] operations.
///
/// Generic over the underlying [`crate::transaction::Driver`]'s error type so
/// that driver failures propagate verbatim rather than being downcast or
/// stringified.
#[derive(Debug, Error)]
pub enum TransactionError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// `begin` was called while an unresolved child transaction exists.
    #[error("inner transaction already exists")]
    ErrInnerTxExists,
    /// An operation was attempted on an already-resolved transaction.
    #[error("transaction is already resolved")]
    TxDone,
    /// The underlying driver failed to execute a savepoint statement.
    #[error("driver error: {0}")]
    Driver(#[source] E),
}
