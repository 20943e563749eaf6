//! A nested-savepoint transaction wrapper over a driver-level transaction.
//!
//! A [`Transaction`] is a node in a linked chain: `begin` creates at most
//! one unresolved child per node, executing `SAVEPOINT PT<depth>` on the
//! shared [`Driver`]; `commit`/`rollback` resolve a node (and, for
//! `rollback`, every descendant) and emit the matching `RELEASE SAVEPOINT`
//! or `ROLLBACK TO SAVEPOINT` statement, falling back to the driver's
//! native commit/rollback at the root.

mod driver;
#[cfg(feature = "sqlx-driver")]
mod sqlx_driver;

pub use driver::Driver;
#[cfg(feature = "sqlx-driver")]
pub use sqlx_driver::{SqlxDriver, SqlxDriverError};

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::trace;

use crate::error::TransactionError;

struct NodeState<D: Driver> {
    savepoint_depth: u32,
    resolved: bool,
    child: Option<Arc<Node<D>>>,
}

struct Node<D: Driver> {
    driver: Arc<D>,
    state: Mutex<NodeState<D>>,
}

/// A single node in a nested-savepoint transaction chain.
///
/// Cloning a `Transaction` is not provided: a node's only other handle is
/// the one its parent holds internally in order to cascade resolution, and
/// that handle carries no back-reference to its parent, so the chain can
/// never form a cycle.
pub struct Transaction<D: Driver> {
    node: Arc<Node<D>>,
}

impl<D: Driver> Transaction<D> {
    /// Wraps an already-open driver-level transaction as the root node
    /// (`savepoint_depth == 0`).
    pub fn new(driver: D) -> Self {
        Self {
            node: Arc::new(Node {
                driver: Arc::new(driver),
                state: Mutex::new(NodeState {
                    savepoint_depth: 0,
                    resolved: false,
                    child: None,
                }),
            }),
        }
    }

    /// This node's savepoint depth; `0` for the root.
    pub async fn savepoint_depth(&self) -> u32 {
        self.node.state.lock().await.savepoint_depth
    }

    /// Whether this node has been committed or rolled back.
    pub async fn is_resolved(&self) -> bool {
        self.node.state.lock().await.resolved
    }

    /// Opens a nested savepoint below this node.
    ///
    /// Errs with [`TransactionError::ErrInnerTxExists`] if this node
    /// already has an unresolved child, or with
    /// [`TransactionError::TxDone`] if this (non-root) node is itself
    /// already resolved.
    pub async fn begin(&self) -> Result<Transaction<D>, TransactionError<D::Error>> {
        let mut state = self.node.state.lock().await;

        if let Some(child) = state.child.as_ref() {
            if !child.state.lock().await.resolved {
                return Err(TransactionError::ErrInnerTxExists);
            }
        }
        if state.resolved && state.savepoint_depth > 0 {
            return Err(TransactionError::TxDone);
        }

        let depth = state.savepoint_depth + 1;
        self.node
            .driver
            .execute(&format!("SAVEPOINT PT{depth}"))
            .await
            .map_err(TransactionError::Driver)?;

        let child_node = Arc::new(Node {
            driver: self.node.driver.clone(),
            state: Mutex::new(NodeState {
                savepoint_depth: depth,
                resolved: false,
                child: None,
            }),
        });
        state.child = Some(child_node.clone());
        trace!(depth, "began nested transaction");
        Ok(Transaction { node: child_node })
    }

    /// Rolls back this node: marks it and every descendant resolved, then
    /// emits `ROLLBACK TO SAVEPOINT PT<depth>` (or the driver's native
    /// rollback at the root).
    pub async fn rollback(&self) -> Result<(), TransactionError<D::Error>> {
        let (child, depth) = {
            let mut state = self.node.state.lock().await;
            if state.resolved {
                return Err(TransactionError::TxDone);
            }
            state.resolved = true;
            (state.child.take(), state.savepoint_depth)
        };

        if let Some(child) = child {
            Self::resolve_chain(child).await;
        }

        trace!(depth, "rolling back transaction");
        if depth > 0 {
            self.node
                .driver
                .execute(&format!("ROLLBACK TO SAVEPOINT PT{depth}"))
                .await
                .map_err(TransactionError::Driver)
        } else {
            self.node.driver.rollback().await.map_err(TransactionError::Driver)
        }
    }

    /// Commits this node: recursively commits an unresolved child first,
    /// marks this node resolved, then emits `RELEASE SAVEPOINT PT<depth>`
    /// (or the driver's native commit at the root).
    pub async fn commit(&self) -> Result<(), TransactionError<D::Error>> {
        // Held for the whole operation, including the recursive descent into
        // an unresolved child, so two concurrent `commit`s on this node can't
        // both race into the child before either resolves `self`. Children
        // are always locked after their parent, so this can't deadlock
        // against another commit/rollback walking the same chain.
        let mut state = self.node.state.lock().await;
        if state.resolved {
            return Err(TransactionError::TxDone);
        }

        if let Some(child) = state.child.clone() {
            let child_resolved = child.state.lock().await.resolved;
            if !child_resolved {
                let child_tx = Transaction { node: child };
                Box::pin(child_tx.commit()).await?;
            }
        }

        state.resolved = true;
        let depth = state.savepoint_depth;

        trace!(depth, "committing transaction");
        if depth > 0 {
            self.node
                .driver
                .execute(&format!("RELEASE SAVEPOINT PT{depth}"))
                .await
                .map_err(TransactionError::Driver)
        } else {
            self.node.driver.commit().await.map_err(TransactionError::Driver)
        }
    }

    /// Runs an application statement against this node's underlying driver,
    /// within whatever savepoint scope this node represents.
    ///
    /// Not part of the begin/commit/rollback state machine itself — the
    /// savepoint machinery only ever emits `SAVEPOINT`/`ROLLBACK TO
    /// SAVEPOINT`/`RELEASE SAVEPOINT` through [`Driver::execute`] directly —
    /// but callers need some way to run their own business statements
    /// "inside" a given node, and since every node in the chain shares the
    /// same underlying driver connection, any node can do it.
    pub async fn execute(&self, sql: &str) -> Result<(), TransactionError<D::Error>> {
        if self.node.state.lock().await.resolved {
            return Err(TransactionError::TxDone);
        }
        self.node.driver.execute(sql).await.map_err(TransactionError::Driver)
    }

    /// Walks a child chain marking every unresolved node resolved, stopping
    /// at the first already-resolved node (its descendants, if any, were
    /// necessarily resolved when it was).
    async fn resolve_chain(start: Arc<Node<D>>) {
        let mut current = start;
        loop {
            let next = {
                let mut state = current.state.lock().await;
                if state.resolved {
                    return;
                }
                state.resolved = true;
                state.child.take()
            };
            match next {
                Some(next) => current = next,
                None => return,
            }
        }
    }
}
