//! Query abstractions.

use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use herald_core::MediatorResult;

use crate::context::Context;

/// Answers queries with criteria `Q` and result `R`.
///
/// Handlers are keyed on the `(Q, R)` pair, so one criteria type can serve
/// several result types.
#[async_trait]
pub trait QueryHandler<Q, R>: Send + Sync
where
    Q: Send + Sync + 'static,
    R: Send + 'static,
{
    /// Runs the query.
    ///
    /// # Errors
    ///
    /// Returns `MediatorError` for unexpected failures and cancellation.
    async fn query(&self, criteria: &Q, ctx: &Context<'_>) -> MediatorResult<R>;
}

/// Answers parameter-less queries returning `R`.
#[async_trait]
pub trait ListQueryHandler<R>: Send + Sync
where
    R: Send + 'static,
{
    /// Loads the result.
    ///
    /// # Errors
    ///
    /// Returns `MediatorError` for unexpected failures and cancellation.
    async fn load(&self, ctx: &Context<'_>) -> MediatorResult<R>;
}

/// Request type seen by pipeline behaviors for a parameter-less query
/// returning `R`. Behaviors wrap `load_list` by implementing
/// `PipelineBehavior<LoadList<R>, R>`.
pub struct LoadList<R> {
    _result: PhantomData<fn() -> R>,
}

impl<R> LoadList<R> {
    /// Creates the request marker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _result: PhantomData,
        }
    }
}

impl<R> Default for LoadList<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for LoadList<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for LoadList<R> {}

impl<R> fmt::Debug for LoadList<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoadList<{}>", std::any::type_name::<R>())
    }
}
