//! The mediator façade.

use std::any::{TypeId, type_name};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use herald_core::{
    CommandOutcome, HandlerResolver, MediatorError, MediatorResult, resolve_one,
};
use tokio_util::sync::CancellationToken;

use crate::behavior::PipelineBehavior;
use crate::command::{Command, CommandHandler, DynCommand};
use crate::context::Context;
use crate::event::{DomainEvent, DynDomainEvent};
use crate::pipeline::{BehaviorFactory, BehaviorPipeline};
use crate::query::{ListQueryHandler, LoadList, QueryHandler};
use crate::queue::DeferredEventQueue;

fn ensure_not_cancelled(cancellation: &CancellationToken) -> MediatorResult<()> {
    if cancellation.is_cancelled() {
        return Err(MediatorError::Cancelled);
    }
    Ok(())
}

/// Routes commands, queries and deferred domain events to the handlers a
/// [`HandlerResolver`] provides.
///
/// A mediator may be shared between concurrent callers. Its deferred-event
/// queue is internally synchronized, and the behavior cache tolerates racing
/// first lookups.
pub struct Mediator {
    resolver: Arc<dyn HandlerResolver>,
    pipeline: Option<BehaviorPipeline>,
    events: DeferredEventQueue,
}

impl Mediator {
    /// Creates a mediator without pipeline behaviors.
    #[must_use]
    pub fn new(resolver: Arc<dyn HandlerResolver>) -> Self {
        Self {
            resolver,
            pipeline: None,
            events: DeferredEventQueue::new(),
        }
    }

    /// Starts configuring a mediator.
    #[must_use]
    pub fn builder() -> MediatorBuilder {
        MediatorBuilder::default()
    }

    /// The resolver handlers are taken from.
    #[must_use]
    pub fn resolver(&self) -> &dyn HandlerResolver {
        self.resolver.as_ref()
    }

    /// Returns `true` when requests run through a behavior pipeline.
    #[must_use]
    pub fn has_pipeline(&self) -> bool {
        self.pipeline.is_some()
    }

    fn context<'a>(&'a self, cancellation: &'a CancellationToken) -> Context<'a> {
        Context::new(self, &self.events, cancellation)
    }

    /// Sends `command` to the handler registered for `C`.
    ///
    /// # Errors
    ///
    /// Returns `MediatorError::Cancelled` if `cancellation` already fired,
    /// `MediatorError::HandlerNotRegistered` if no handler exists for `C`,
    /// and otherwise whatever the behaviors or the handler return.
    pub async fn send<C: Command>(
        &self,
        command: C,
        cancellation: &CancellationToken,
    ) -> MediatorResult<CommandOutcome> {
        ensure_not_cancelled(cancellation)?;
        self.send_in(command, &self.context(cancellation)).await
    }

    /// Sends `command` within `ctx`: the handler defers onto the queue of
    /// `ctx`, not onto this mediator's own queue.
    pub(crate) async fn send_in<C: Command>(
        &self,
        command: C,
        ctx: &Context<'_>,
    ) -> MediatorResult<CommandOutcome> {
        ctx.ensure_not_cancelled()?;
        let handler = resolve_one::<dyn CommandHandler<C>>(self.resolver())?;
        tracing::debug!(
            command = command.command_name(),
            pending = ctx.pending_events(),
            "sending command"
        );

        let command = &command;
        self.dispatch(command, || handler.handle(command, ctx), ctx)
            .await
    }

    /// Sends a boxed command, dispatched on its concrete runtime type.
    ///
    /// # Errors
    ///
    /// See [`Mediator::send`].
    pub async fn send_dyn(
        &self,
        command: Box<dyn DynCommand>,
        cancellation: &CancellationToken,
    ) -> MediatorResult<CommandOutcome> {
        ensure_not_cancelled(cancellation)?;
        command.dispatch(self, cancellation).await
    }

    /// Runs the query handler registered for `(Q, R)`.
    ///
    /// # Errors
    ///
    /// Returns `MediatorError::Cancelled` if `cancellation` already fired,
    /// `MediatorError::HandlerNotRegistered` if no handler exists for the
    /// pair, and otherwise whatever the behaviors or the handler return.
    pub async fn query<Q, R>(&self, criteria: &Q, cancellation: &CancellationToken) -> MediatorResult<R>
    where
        Q: Send + Sync + 'static,
        R: Send + 'static,
    {
        ensure_not_cancelled(cancellation)?;
        let handler = resolve_one::<dyn QueryHandler<Q, R>>(self.resolver())?;
        tracing::debug!(
            criteria = type_name::<Q>(),
            result = type_name::<R>(),
            "running query"
        );

        let ctx = self.context(cancellation);
        self.dispatch(criteria, || handler.query(criteria, &ctx), &ctx)
            .await
    }

    /// Runs the parameter-less query handler registered for `R`.
    ///
    /// Behaviors see the request as [`LoadList<R>`].
    ///
    /// # Errors
    ///
    /// Returns `MediatorError::Cancelled` if `cancellation` already fired,
    /// `MediatorError::HandlerNotRegistered` if no handler exists for `R`,
    /// and otherwise whatever the behaviors or the handler return.
    pub async fn load_list<R>(&self, cancellation: &CancellationToken) -> MediatorResult<R>
    where
        R: Send + 'static,
    {
        ensure_not_cancelled(cancellation)?;
        let handler = resolve_one::<dyn ListQueryHandler<R>>(self.resolver())?;
        tracing::debug!(result = type_name::<R>(), "loading list");

        let ctx = self.context(cancellation);
        let request = LoadList::<R>::new();
        self.dispatch(&request, || handler.load(&ctx), &ctx).await
    }

    /// Defers `event` on this mediator's queue.
    pub fn defer_event<E: DomainEvent>(&self, event: E) {
        self.events.push(event);
    }

    /// Defers `event` for the handlers of `E` and then those of the marker
    /// type `M`.
    pub fn defer_event_as<E, M>(&self, event: E, upcast: fn(Arc<E>) -> Arc<M>)
    where
        E: DomainEvent,
        M: ?Sized + Send + Sync + 'static,
    {
        self.events.push_as(event, upcast);
    }

    /// Defers a boxed event, routed by its concrete type.
    pub fn defer_boxed(&self, event: Box<dyn DynDomainEvent>) {
        event.defer_into(&self.events);
    }

    /// Number of events waiting on this mediator's queue.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Handles every deferred event, including events deferred by event
    /// handlers while the drain runs, and returns how many were handled.
    ///
    /// Events run in FIFO order. Events deferred during a pass run after all
    /// events of that pass. Handlers of one event run one after another in
    /// registration order.
    ///
    /// # Errors
    ///
    /// Returns `MediatorError::Cancelled` if `cancellation` fires before or
    /// between handler invocations, and the first event handler error
    /// otherwise.
    pub async fn execute_deferred_events(
        &self,
        cancellation: &CancellationToken,
    ) -> MediatorResult<usize> {
        ensure_not_cancelled(cancellation)?;
        self.context(cancellation).execute_deferred_events().await
    }

    async fn dispatch<Req, Res, F, Fut>(
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
        match &self.pipeline {
            None => terminal().await,
            Some(pipeline) => pipeline.execute(request, terminal, ctx).await,
        }
    }
}

impl fmt::Debug for Mediator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mediator")
            .field("pipeline", &self.pipeline)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// Configures a [`Mediator`].
#[derive(Default)]
pub struct MediatorBuilder {
    resolver: Option<Arc<dyn HandlerResolver>>,
    pipeline: BehaviorPipeline,
    behaviors_from_resolver: bool,
}

impl MediatorBuilder {
    /// Sets the resolver handlers are taken from.
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn HandlerResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Appends an explicit behavior for `(Req, Res)` requests.
    #[must_use]
    pub fn behavior<Req, Res>(mut self, behavior: Arc<dyn PipelineBehavior<Req, Res>>) -> Self
    where
        Req: Send + Sync + 'static,
        Res: Send + 'static,
    {
        self.pipeline = self.pipeline.with_behavior(behavior);
        self
    }

    /// Adds a behavior factory.
    #[must_use]
    pub fn behavior_factory(mut self, factory: BehaviorFactory) -> Self {
        self.pipeline = self.pipeline.with_factory(factory);
        self
    }

    /// Uses a prepared pipeline, replacing behaviors added so far.
    #[must_use]
    pub fn pipeline(mut self, pipeline: BehaviorPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Also takes behaviors from the resolver, after the explicit ones.
    #[must_use]
    pub fn resolve_behaviors_from_registry(mut self) -> Self {
        self.behaviors_from_resolver = true;
        self
    }

    /// Builds the mediator. A pipeline that can never hold a behavior is
    /// dropped, so requests go straight to their handlers.
    ///
    /// # Errors
    ///
    /// Returns `MediatorError::HandlerNotRegistered` when no resolver was
    /// configured.
    pub fn build(self) -> MediatorResult<Mediator> {
        let resolver = self
            .resolver
            .ok_or(MediatorError::HandlerNotRegistered {
                contract: type_name::<dyn HandlerResolver>(),
            })?;

        let mut pipeline = self.pipeline;
        if self.behaviors_from_resolver {
            let source = Arc::clone(&resolver);
            pipeline = pipeline.with_factory(Arc::new(move |contract: TypeId, name: &'static str| {
                source.resolve_all(contract, name)
            }));
        }
        let pipeline = (!pipeline.is_empty()).then_some(pipeline);
        tracing::debug!(pipeline = pipeline.is_some(), "mediator built");

        Ok(Mediator {
            resolver,
            pipeline,
            events: DeferredEventQueue::new(),
        })
    }
}

impl fmt::Debug for MediatorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediatorBuilder")
            .field("has_resolver", &self.resolver.is_some())
            .field("pipeline", &self.pipeline)
            .field("behaviors_from_resolver", &self.behaviors_from_resolver)
            .finish()
    }
}
