//! Typed registration helpers for [`HandlerRegistry`].

use std::sync::Arc;

use herald_core::HandlerRegistry;

use crate::behavior::PipelineBehavior;
use crate::command::{Command, CommandHandler};
use crate::event::EventHandler;
use crate::query::{ListQueryHandler, QueryHandler};

/// Registers handlers under the contract types the mediator resolves.
pub trait RegisterHandlers {
    /// Registers the handler for commands of type `C`.
    fn command_handler<C, H>(&mut self, handler: H) -> &mut Self
    where
        C: Command,
        H: CommandHandler<C> + 'static;

    /// Registers the handler for `(Q, R)` queries.
    fn query_handler<Q, R, H>(&mut self, handler: H) -> &mut Self
    where
        Q: Send + Sync + 'static,
        R: Send + 'static,
        H: QueryHandler<Q, R> + 'static;

    /// Registers the handler for parameter-less queries returning `R`.
    fn list_handler<R, H>(&mut self, handler: H) -> &mut Self
    where
        R: Send + 'static,
        H: ListQueryHandler<R> + 'static;

    /// Adds a handler for events of type `E`. Handlers run in the order
    /// they were added.
    fn event_handler<E, H>(&mut self, handler: H) -> &mut Self
    where
        E: ?Sized + Send + Sync + 'static,
        H: EventHandler<E> + 'static;

    /// Adds a pipeline behavior for `(Req, Res)` requests, picked up by
    /// mediators built with `resolve_behaviors_from_registry`.
    fn behavior<Req, Res, B>(&mut self, behavior: B) -> &mut Self
    where
        Req: Send + Sync + 'static,
        Res: Send + 'static,
        B: PipelineBehavior<Req, Res> + 'static;
}

impl RegisterHandlers for HandlerRegistry {
    fn command_handler<C, H>(&mut self, handler: H) -> &mut Self
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        let handler: Arc<dyn CommandHandler<C>> = Arc::new(handler);
        self.register(handler)
    }

    fn query_handler<Q, R, H>(&mut self, handler: H) -> &mut Self
    where
        Q: Send + Sync + 'static,
        R: Send + 'static,
        H: QueryHandler<Q, R> + 'static,
    {
        let handler: Arc<dyn QueryHandler<Q, R>> = Arc::new(handler);
        self.register(handler)
    }

    fn list_handler<R, H>(&mut self, handler: H) -> &mut Self
    where
        R: Send + 'static,
        H: ListQueryHandler<R> + 'static,
    {
        let handler: Arc<dyn ListQueryHandler<R>> = Arc::new(handler);
        self.register(handler)
    }

    fn event_handler<E, H>(&mut self, handler: H) -> &mut Self
    where
        E: ?Sized + Send + Sync + 'static,
        H: EventHandler<E> + 'static,
    {
        let handler: Arc<dyn EventHandler<E>> = Arc::new(handler);
        self.register(handler)
    }

    fn behavior<Req, Res, B>(&mut self, behavior: B) -> &mut Self
    where
        Req: Send + Sync + 'static,
        Res: Send + 'static,
        B: PipelineBehavior<Req, Res> + 'static,
    {
        let behavior: Arc<dyn PipelineBehavior<Req, Res>> = Arc::new(behavior);
        self.register(behavior)
    }
}
