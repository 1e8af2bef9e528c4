//! Pipeline behavior abstractions.

use std::fmt;

use async_trait::async_trait;
use herald_core::MediatorResult;

use crate::BoxFuture;
use crate::context::Context;

/// Middleware wrapping the handling of `Req` requests that produce `Res`.
///
/// A behavior may run logic before and after calling [`Next::run`], skip
/// the call entirely and answer on its own, or inspect and translate the
/// error it returns.
#[async_trait]
pub trait PipelineBehavior<Req, Res>: Send + Sync
where
    Req: Send + Sync + 'static,
    Res: Send + 'static,
{
    /// Handles `request`, usually by delegating to `next`.
    ///
    /// # Errors
    ///
    /// Whatever the behavior or the rest of the chain returns.
    async fn handle(
        &self,
        request: &Req,
        next: Next<'_, Res>,
        ctx: &Context<'_>,
    ) -> MediatorResult<Res>;
}

type Continuation<'a, Res> = Box<dyn FnOnce() -> BoxFuture<'a, MediatorResult<Res>> + Send + 'a>;

/// The remainder of a behavior chain: the next behavior, or the handler.
pub struct Next<'a, Res> {
    continuation: Continuation<'a, Res>,
}

impl<'a, Res> Next<'a, Res> {
    pub(crate) fn new<F>(continuation: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'a, MediatorResult<Res>> + Send + 'a,
    {
        Self {
            continuation: Box::new(continuation),
        }
    }

    /// Invokes the rest of the chain.
    ///
    /// # Errors
    ///
    /// Propagates the error of the next behavior or of the handler.
    pub async fn run(self) -> MediatorResult<Res> {
        (self.continuation)().await
    }
}

impl<Res> fmt::Debug for Next<'_, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}
