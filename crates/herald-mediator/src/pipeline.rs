//! Behavior pipeline.
//!
//! Behaviors are keyed on the `(request, response)` type pair. For each pair
//! the pipeline combines the explicitly registered behaviors with those
//! produced by its factories (explicit first), caches the combined list for
//! its own lifetime, and nests them around the handler call with the first
//! behavior outermost. An empty list calls the handler directly.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use herald_core::{Instance, MediatorResult, downcast_instance, instance};

use crate::BoxFuture;
use crate::behavior::{Next, PipelineBehavior};
use crate::context::Context;

/// Produces behavior instances for a behavior contract.
///
/// Called with the `TypeId` and type name of
/// `dyn PipelineBehavior<Req, Res>`; each returned instance must hold an
/// `Arc<dyn PipelineBehavior<Req, Res>>` (the [`HandlerResolver`] instance
/// format), so `HandlerResolver::resolve_all` can be used directly.
///
/// [`HandlerResolver`]: herald_core::HandlerResolver
pub type BehaviorFactory = Arc<dyn Fn(TypeId, &'static str) -> Vec<Instance> + Send + Sync>;

type PairKey = (TypeId, TypeId);
type Chain<Req, Res> = Vec<Arc<dyn PipelineBehavior<Req, Res>>>;
type Terminal<'a, Res> = Box<dyn FnOnce() -> BoxFuture<'a, MediatorResult<Res>> + Send + 'a>;

fn pair_key<Req: 'static, Res: 'static>() -> PairKey {
    (TypeId::of::<Req>(), TypeId::of::<Res>())
}

/// An ordered set of pipeline behaviors with a per-type-pair cache.
#[derive(Default)]
pub struct BehaviorPipeline {
    explicit: HashMap<PairKey, Vec<Instance>>,
    factories: Vec<BehaviorFactory>,
    cache: RwLock<HashMap<PairKey, Arc<dyn Any + Send + Sync>>>,
}

impl BehaviorPipeline {
    /// Creates a pipeline without behaviors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an explicit behavior for the `(Req, Res)` pair.
    #[must_use]
    pub fn with_behavior<Req, Res>(mut self, behavior: Arc<dyn PipelineBehavior<Req, Res>>) -> Self
    where
        Req: Send + Sync + 'static,
        Res: Send + 'static,
    {
        self.explicit
            .entry(pair_key::<Req, Res>())
            .or_default()
            .push(instance(behavior));
        self
    }

    /// Adds a factory consulted for every type pair.
    #[must_use]
    pub fn with_factory(mut self, factory: BehaviorFactory) -> Self {
        self.factories.push(factory);
        self
    }

    /// Returns `true` when no behavior can ever apply.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.explicit.is_empty() && self.factories.is_empty()
    }

    /// Number of behaviors wrapping `(Req, Res)` requests.
    #[must_use]
    pub fn behavior_count<Req, Res>(&self) -> usize
    where
        Req: Send + Sync + 'static,
        Res: Send + 'static,
    {
        self.behaviors_for::<Req, Res>().len()
    }

    /// Runs `terminal` wrapped in the behaviors for `(Req, Res)`.
    ///
    /// # Errors
    ///
    /// Whatever the outermost behavior, or the handler when there is none,
    /// returns.
    pub async fn execute<Req, Res, F, Fut>(
        &self,
        request: &Req,
        terminal: F,
        ctx: &Context<'_>,
    ) -> MediatorResult<Res>
    where
        Req: Send + Sync + 'static,
        Res: Send + 'static,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = MediatorResult<Res>> + Send,
    {
        if self.is_empty() {
            return terminal().await;
        }
        let chain = self.behaviors_for::<Req, Res>();
        if chain.is_empty() {
            return terminal().await;
        }
        tracing::trace!(
            request = type_name::<Req>(),
            behaviors = chain.len(),
            "running behavior chain"
        );
        invoke(&chain, request, boxed(terminal), ctx).await
    }

    fn behaviors_for<Req, Res>(&self) -> Arc<Chain<Req, Res>>
    where
        Req: Send + Sync + 'static,
        Res: Send + 'static,
    {
        let key = pair_key::<Req, Res>();
        let cached = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(chain) = cached.and_then(|any| any.downcast::<Chain<Req, Res>>().ok()) {
            return chain;
        }

        let computed = Arc::new(self.compute::<Req, Res>());
        // Concurrent first calls may both compute; the first insert wins.
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let entry = cache
            .entry(key)
            .or_insert_with(|| Arc::clone(&computed) as Arc<dyn Any + Send + Sync>);
        Arc::clone(entry)
            .downcast::<Chain<Req, Res>>()
            .unwrap_or(computed)
    }

    fn compute<Req, Res>(&self) -> Chain<Req, Res>
    where
        Req: Send + Sync + 'static,
        Res: Send + 'static,
    {
        let contract = TypeId::of::<dyn PipelineBehavior<Req, Res>>();
        let contract_name = type_name::<dyn PipelineBehavior<Req, Res>>();
        let explicit = self
            .explicit
            .get(&pair_key::<Req, Res>())
            .into_iter()
            .flatten()
            .cloned();
        let produced = self
            .factories
            .iter()
            .flat_map(|factory| factory(contract, contract_name));

        let chain: Chain<Req, Res> = explicit
            .chain(produced)
            .filter_map(|candidate| downcast_instance::<dyn PipelineBehavior<Req, Res>>(&candidate))
            .collect();
        tracing::debug!(
            request = type_name::<Req>(),
            response = type_name::<Res>(),
            behaviors = chain.len(),
            "resolved behavior chain"
        );
        chain
    }
}

fn boxed<'t, Res, F, Fut>(terminal: F) -> Terminal<'t, Res>
where
    F: FnOnce() -> Fut + Send + 't,
    Fut: Future<Output = MediatorResult<Res>> + Send + 't,
{
    Box::new(move || Box::pin(terminal()) as BoxFuture<'t, MediatorResult<Res>>)
}

fn invoke<'a, Req, Res>(
    behaviors: &'a [Arc<dyn PipelineBehavior<Req, Res>>],
    request: &'a Req,
    terminal: Terminal<'a, Res>,
    ctx: &'a Context<'a>,
) -> BoxFuture<'a, MediatorResult<Res>>
where
    Req: Send + Sync + 'static,
    Res: Send + 'static,
{
    match behaviors.split_first() {
        None => terminal(),
        Some((outer, rest)) => {
            let next = Next::new(move || invoke(rest, request, terminal, ctx));
            outer.handle(request, next, ctx)
        }
    }
}

impl fmt::Debug for BehaviorPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorPipeline")
            .field("explicit_pairs", &self.explicit.len())
            .field("factories", &self.factories.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use herald_core::{HandlerRegistry, MediatorError};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::mediator::Mediator;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Wrap {
        name: &'static str,
        log: Log,
    }

    #[async_trait]
    impl PipelineBehavior<u32, String> for Wrap {
        async fn handle(
            &self,
            _request: &u32,
            next: Next<'_, String>,
            _ctx: &Context<'_>,
        ) -> MediatorResult<String> {
            self.log.lock().unwrap().push(format!("{}-before", self.name));
            let response = next.run().await;
            self.log.lock().unwrap().push(format!("{}-after", self.name));
            response
        }
    }

    struct Refuse;

    #[async_trait]
    impl PipelineBehavior<u32, String> for Refuse {
        async fn handle(
            &self,
            request: &u32,
            _next: Next<'_, String>,
            _ctx: &Context<'_>,
        ) -> MediatorResult<String> {
            Ok(format!("refused {request}"))
        }
    }

    /// Wraps the response in its name, so the response shows the nesting.
    struct Tag(&'static str);

    #[async_trait]
    impl PipelineBehavior<u32, String> for Tag {
        async fn handle(
            &self,
            _request: &u32,
            next: Next<'_, String>,
            _ctx: &Context<'_>,
        ) -> MediatorResult<String> {
            let inner = next.run().await?;
            Ok(format!("{}({inner})", self.0))
        }
    }

    fn wrap(name: &'static str, log: &Log) -> Arc<dyn PipelineBehavior<u32, String>> {
        Arc::new(Wrap {
            name,
            log: Arc::clone(log),
        })
    }

    async fn run(pipeline: &BehaviorPipeline, log: &Log) -> MediatorResult<String> {
        let mediator = Mediator::new(Arc::new(HandlerRegistry::new()));
        let token = CancellationToken::new();
        let events = crate::queue::DeferredEventQueue::new();
        let ctx = Context::new(&mediator, &events, &token);
        let handler_log = Arc::clone(log);
        pipeline
            .execute(
                &7_u32,
                move || async move {
                    handler_log.lock().unwrap().push("handler".to_owned());
                    Ok("seven".to_owned())
                },
                &ctx,
            )
            .await
    }

    #[tokio::test]
    async fn test_first_registered_behavior_is_outermost() {
        // Arrange
        let log: Log = Arc::default();
        let pipeline = BehaviorPipeline::new()
            .with_behavior(wrap("first", &log))
            .with_behavior(wrap("second", &log))
            .with_behavior(wrap("third", &log));

        // Act
        let response = run(&pipeline, &log).await.unwrap();

        // Assert
        assert_eq!(response, "seven");
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first-before",
                "second-before",
                "third-before",
                "handler",
                "third-after",
                "second-after",
                "first-after",
            ]
        );
    }

    #[tokio::test]
    async fn test_behavior_can_short_circuit() {
        let log: Log = Arc::default();
        let refuse: Arc<dyn PipelineBehavior<u32, String>> = Arc::new(Refuse);
        let pipeline = BehaviorPipeline::new()
            .with_behavior(wrap("outer", &log))
            .with_behavior(refuse);

        let response = run(&pipeline, &log).await.unwrap();

        assert_eq!(response, "refused 7");
        assert_eq!(*log.lock().unwrap(), vec!["outer-before", "outer-after"]);
    }

    #[tokio::test]
    async fn test_empty_pipeline_calls_handler_directly() {
        let log: Log = Arc::default();
        let pipeline = BehaviorPipeline::new();

        let response = run(&pipeline, &log).await.unwrap();

        assert!(pipeline.is_empty());
        assert_eq!(response, "seven");
        assert_eq!(*log.lock().unwrap(), vec!["handler"]);
    }

    #[tokio::test]
    async fn test_factory_behaviors_follow_explicit_ones() {
        // Arrange
        let log: Log = Arc::default();
        let factory_log = Arc::clone(&log);
        let calls = Arc::new(Mutex::new(0_usize));
        let factory_calls = Arc::clone(&calls);
        let factory: BehaviorFactory = Arc::new(move |contract: TypeId, _name: &'static str| {
            *factory_calls.lock().unwrap() += 1;
            if contract == TypeId::of::<dyn PipelineBehavior<u32, String>>() {
                vec![instance(wrap("produced", &factory_log))]
            } else {
                Vec::new()
            }
        });
        let pipeline = BehaviorPipeline::new()
            .with_behavior(wrap("explicit", &log))
            .with_factory(factory);

        // Act
        run(&pipeline, &log).await.unwrap();
        run(&pipeline, &log).await.unwrap();

        // Assert
        assert_eq!(log.lock().unwrap()[..2], ["explicit-before", "produced-before"]);
        // The combined list is computed once per type pair.
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(pipeline.behavior_count::<u32, String>(), 2);
    }

    #[tokio::test]
    async fn test_behaviors_are_isolated_by_response_type() {
        let log: Log = Arc::default();
        let pipeline = BehaviorPipeline::new().with_behavior(wrap("string-only", &log));

        assert_eq!(pipeline.behavior_count::<u32, String>(), 1);
        assert_eq!(pipeline.behavior_count::<u32, u64>(), 0);
    }

    #[tokio::test]
    async fn test_handler_error_passes_through_behaviors() {
        let log: Log = Arc::default();
        let pipeline = BehaviorPipeline::new().with_behavior(wrap("outer", &log));
        let mediator = Mediator::new(Arc::new(HandlerRegistry::new()));
        let token = CancellationToken::new();
        let events = crate::queue::DeferredEventQueue::new();
        let ctx = Context::new(&mediator, &events, &token);

        let result: MediatorResult<String> = pipeline
            .execute(
                &1_u32,
                || async { Err(MediatorError::handler("broken")) },
                &ctx,
            )
            .await;

        assert!(matches!(result, Err(MediatorError::Handler(_))));
        assert_eq!(*log.lock().unwrap(), vec!["outer-before", "outer-after"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_lookups_share_one_chain() {
        // Arrange
        const CALLERS: usize = 16;
        let calls = Arc::new(Mutex::new(0_usize));
        let factory_calls = Arc::clone(&calls);
        let factory: BehaviorFactory = Arc::new(move |contract: TypeId, _name: &'static str| {
            *factory_calls.lock().unwrap() += 1;
            std::thread::sleep(std::time::Duration::from_millis(5));
            if contract == TypeId::of::<dyn PipelineBehavior<u32, String>>() {
                let produced: Arc<dyn PipelineBehavior<u32, String>> = Arc::new(Tag("produced"));
                vec![instance(produced)]
            } else {
                Vec::new()
            }
        });
        let explicit: Arc<dyn PipelineBehavior<u32, String>> = Arc::new(Tag("explicit"));
        let pipeline = Arc::new(
            BehaviorPipeline::new()
                .with_behavior(explicit)
                .with_factory(factory),
        );
        let start = Arc::new(tokio::sync::Barrier::new(CALLERS));

        // Act
        let tasks: Vec<_> = (0..CALLERS)
            .map(|_| {
                let pipeline = Arc::clone(&pipeline);
                let start = Arc::clone(&start);
                tokio::spawn(async move {
                    let mediator = Mediator::new(Arc::new(HandlerRegistry::new()));
                    let token = CancellationToken::new();
                    let events = crate::queue::DeferredEventQueue::new();
                    let ctx = Context::new(&mediator, &events, &token);
                    start.wait().await;
                    pipeline
                        .execute(&7_u32, || async { Ok("seven".to_owned()) }, &ctx)
                        .await
                })
            })
            .collect();
        let mut responses = Vec::with_capacity(CALLERS);
        for task in tasks {
            responses.push(task.await.unwrap().unwrap());
        }
        let count_after_race = pipeline.behavior_count::<u32, String>();
        let calls_after_race = *calls.lock().unwrap();
        let repeat = run(&pipeline, &Arc::default()).await.unwrap();

        // Assert
        assert!(
            responses
                .iter()
                .all(|response| response == "explicit(produced(seven))")
        );
        assert_eq!(repeat, "explicit(produced(seven))");
        assert_eq!(count_after_race, 2);
        assert_eq!(pipeline.behavior_count::<u32, String>(), 2);
        assert!((1..=CALLERS).contains(&calls_after_race));
        // Once cached, the chain is never recomputed.
        assert_eq!(*calls.lock().unwrap(), calls_after_race);
    }
}
