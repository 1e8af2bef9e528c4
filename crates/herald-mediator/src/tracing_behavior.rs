//! Request logging behavior.

use std::any::type_name;
use std::time::Instant;

use async_trait::async_trait;
use herald_core::MediatorResult;
use tracing::Instrument;

use crate::behavior::{Next, PipelineBehavior};
use crate::context::Context;

/// Wraps each request in a `tracing` span and logs how it ended.
///
/// Results pass through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBehavior;

#[async_trait]
impl<Req, Res> PipelineBehavior<Req, Res> for TracingBehavior
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
        let span = tracing::info_span!(
            "mediator.request",
            request = type_name::<Req>(),
            response = type_name::<Res>(),
        );
        let started = Instant::now();
        let result = next.run().instrument(span.clone()).await;
        let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

        match &result {
            Ok(_) => tracing::info!(parent: &span, elapsed_us, "request handled"),
            Err(err) => tracing::warn!(parent: &span, elapsed_us, error = %err, "request failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use herald_core::{HandlerRegistry, MediatorError};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::mediator::Mediator;
    use crate::query::QueryHandler;
    use crate::registration::RegisterHandlers;

    struct Echo;

    #[async_trait]
    impl QueryHandler<String, String> for Echo {
        async fn query(&self, criteria: &String, _ctx: &Context<'_>) -> MediatorResult<String> {
            if criteria.is_empty() {
                return Err(MediatorError::handler("empty criteria"));
            }
            Ok(criteria.clone())
        }
    }

    fn mediator() -> Mediator {
        let mut registry = HandlerRegistry::new();
        registry.query_handler::<String, String, _>(Echo);
        let behavior: Arc<dyn PipelineBehavior<String, String>> = Arc::new(TracingBehavior);
        Mediator::builder()
            .resolver(Arc::new(registry))
            .behavior(behavior)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_passes_response_through() {
        let mediator = mediator();

        let echoed: String = mediator
            .query(&"ping".to_owned(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(mediator.has_pipeline());
        assert_eq!(echoed, "ping");
    }

    #[tokio::test]
    async fn test_passes_error_through() {
        let mediator = mediator();

        let result: MediatorResult<String> = mediator
            .query(&String::new(), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(MediatorError::Handler(_))));
    }
}
