//! Atomic scope contract.

use async_trait::async_trait;
use herald_core::MediatorResult;

/// An all-or-nothing unit of work, for example a database transaction.
///
/// Exactly one of `commit` or `rollback` is called.
#[async_trait]
pub trait AtomicScope: Send {
    /// Makes the work done inside the scope permanent.
    ///
    /// # Errors
    ///
    /// Returns an error if the work could not be committed.
    async fn commit(self: Box<Self>) -> MediatorResult<()>;

    /// Undoes the work done inside the scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback itself failed.
    async fn rollback(self: Box<Self>) -> MediatorResult<()>;
}

/// Opens [`AtomicScope`]s.
#[async_trait]
pub trait AtomicScopeFactory: Send + Sync {
    /// Opens a new scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the scope could not be opened.
    async fn begin(&self) -> MediatorResult<Box<dyn AtomicScope>>;
}
