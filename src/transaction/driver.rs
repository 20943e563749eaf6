use async_trait::async_trait;

/// Abstracts the underlying SQL transport a [`super::Transaction`] layers
/// savepoint semantics on top of.
///
/// `execute` runs a single statement with no result set, exactly what
/// `SAVEPOINT`/`ROLLBACK TO SAVEPOINT`/`RELEASE SAVEPOINT` need. `commit`
/// and `rollback` are the driver's native, non-savepoint operations, used
/// only by the root node.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// The error type surfaced by this driver's operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Executes a statement that returns no rows.
    async fn execute(&self, sql: &str) -> Result<(), Self::Error>;

    /// Commits the underlying transaction natively.
    async fn commit(&self) -> Result<(), Self::Error>;

    /// Rolls back the underlying transaction natively.
    async fn rollback(&self) -> Result<(), Self::Error>;
}
