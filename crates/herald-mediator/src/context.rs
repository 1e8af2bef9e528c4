//! Per-call dispatch context handed to handlers and behaviors.

use std::fmt;
use std::sync::Arc;

use herald_core::{CommandOutcome, MediatorError, MediatorResult};
use tokio_util::sync::CancellationToken;

use crate::command::Command;
use crate::event::{DomainEvent, DynDomainEvent};
use crate::mediator::Mediator;
use crate::queue::DeferredEventQueue;

/// What a handler can reach while it runs: the mediator, the deferred-event
/// queue in effect for the current call, and the caller's cancellation
/// signal.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    mediator: &'a Mediator,
    events: &'a DeferredEventQueue,
    cancellation: &'a CancellationToken,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        mediator: &'a Mediator,
        events: &'a DeferredEventQueue,
        cancellation: &'a CancellationToken,
    ) -> Self {
        Self {
            mediator,
            events,
            cancellation,
        }
    }

    /// The mediator dispatching the current call.
    #[must_use]
    pub fn mediator(&self) -> &'a Mediator {
        self.mediator
    }

    /// The caller's cancellation signal.
    #[must_use]
    pub fn cancellation(&self) -> &'a CancellationToken {
        self.cancellation
    }

    /// Returns `true` once the caller cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fails with `MediatorError::Cancelled` once the caller cancelled.
    ///
    /// # Errors
    ///
    /// Returns `MediatorError::Cancelled` if the signal has fired.
    pub fn ensure_not_cancelled(&self) -> MediatorResult<()> {
        if self.is_cancelled() {
            return Err(MediatorError::Cancelled);
        }
        Ok(())
    }

    /// The deferred-event queue in effect for this context.
    #[must_use]
    pub fn events(&self) -> &'a DeferredEventQueue {
        self.events
    }

    /// Returns a context whose deferred events go to `events` instead.
    #[must_use]
    pub fn with_events<'b>(&self, events: &'b DeferredEventQueue) -> Context<'b>
    where
        'a: 'b,
    {
        Context {
            mediator: self.mediator,
            events,
            cancellation: self.cancellation,
        }
    }

    /// Defers `event`; it is handled by the handlers of `E` when the queue
    /// of this context is drained.
    pub fn defer_event<E: DomainEvent>(&self, event: E) {
        self.events.push(event);
    }

    /// Defers `event` so that it reaches the handlers of `E` and then the
    /// handlers of the marker type `M`.
    ///
    /// ```ignore
    /// ctx.defer_event_as(OrderPlaced { id }, |e| e as Arc<dyn AuditEvent>);
    /// ```
    pub fn defer_event_as<E, M>(&self, event: E, upcast: fn(Arc<E>) -> Arc<M>)
    where
        E: DomainEvent,
        M: ?Sized + Send + Sync + 'static,
    {
        self.events.push_as(event, upcast);
    }

    /// Defers a boxed event, routed by its concrete type.
    pub fn defer_boxed(&self, event: Box<dyn DynDomainEvent>) {
        event.defer_into(self.events);
    }

    /// Number of events waiting in this context's queue.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Drains this context's queue; see [`Mediator::execute_deferred_events`].
    ///
    /// # Errors
    ///
    /// Returns `MediatorError::Cancelled` on cancellation, or the first
    /// event handler error.
    pub async fn execute_deferred_events(&self) -> MediatorResult<usize> {
        self.events.drain(self).await
    }

    /// Sends a nested command with this context's cancellation signal.
    ///
    /// Events the nested handler defers go to this context's queue, so
    /// they fire or are discarded together with the caller's own events.
    ///
    /// # Errors
    ///
    /// See [`Mediator::send`].
    pub async fn send<C: Command>(&self, command: C) -> MediatorResult<CommandOutcome> {
        self.mediator.send_in(command, self).await
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("pending_events", &self.events.len())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
