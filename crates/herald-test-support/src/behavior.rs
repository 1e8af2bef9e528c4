//! Test pipeline behaviors.

use async_trait::async_trait;
use herald_core::MediatorResult;
use herald_mediator::{Context, Next, PipelineBehavior};

use crate::journal::CallJournal;

/// Records `"<name>-before"` and `"<name>-after"` around the rest of the
/// chain. Implements the behavior contract for every request type.
#[derive(Debug, Clone)]
pub struct OrderingBehavior {
    name: String,
    journal: CallJournal,
}

impl OrderingBehavior {
    /// Creates a behavior writing into `journal`.
    #[must_use]
    pub fn new(name: impl Into<String>, journal: &CallJournal) -> Self {
        Self {
            name: name.into(),
            journal: journal.clone(),
        }
    }
}

#[async_trait]
impl<Req, Res> PipelineBehavior<Req, Res> for OrderingBehavior
where
    Req: Send + Sync + 'static,
    Res: Send + 'static,
{
    async fn handle(
        &self,
        _request: &Req,
        next: Next<'_, Res>,
        _ctx: &Context<'_>,
    ) -> MediatorResult<Res> {
        self.journal.record(format!("{}-before", self.name));
        let response = next.run().await;
        self.journal.record(format!("{}-after", self.name));
        response
    }
}

/// Answers with a fixed response without running the rest of the chain.
#[derive(Debug, Clone)]
pub struct ShortCircuitBehavior<Res> {
    response: Res,
}

impl<Res> ShortCircuitBehavior<Res> {
    /// Creates a behavior that always answers `response`.
    #[must_use]
    pub fn new(response: Res) -> Self {
        Self { response }
    }
}

#[async_trait]
impl<Req, Res> PipelineBehavior<Req, Res> for ShortCircuitBehavior<Res>
where
    Req: Send + Sync + 'static,
    Res: Clone + Send + Sync + 'static,
{
    async fn handle(
        &self,
        _request: &Req,
        _next: Next<'_, Res>,
        _ctx: &Context<'_>,
    ) -> MediatorResult<Res> {
        Ok(self.response.clone())
    }
}
