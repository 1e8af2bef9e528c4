//! Herald Mediator — in-process dispatch of commands, queries and domain
//! events.
//!
//! A [`Mediator`] routes each request to the handler registered for its type
//! through an optional chain of [`PipelineBehavior`]s, and owns a queue of
//! deferred domain events that run only when explicitly drained.

use std::future::Future;
use std::pin::Pin;

pub mod behavior;
pub mod command;
pub mod context;
pub mod event;
pub mod mediator;
pub mod pipeline;
pub mod query;
pub mod queue;
pub mod registration;
pub mod tracing_behavior;

pub use behavior::{Next, PipelineBehavior};
pub use command::{Command, CommandHandler, DynCommand};
pub use context::Context;
pub use event::{DomainEvent, DynDomainEvent, EventHandler};
pub use mediator::{Mediator, MediatorBuilder};
pub use pipeline::{BehaviorFactory, BehaviorPipeline};
pub use query::{ListQueryHandler, LoadList, QueryHandler};
pub use queue::DeferredEventQueue;
pub use registration::RegisterHandlers;
pub use tracing_behavior::TracingBehavior;

pub use herald_core::{
    CommandOutcome, HandlerRegistry, HandlerResolver, MediatorError, MediatorResult,
    ValidationContext, ValidationError,
};
pub use tokio_util::sync::CancellationToken;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
