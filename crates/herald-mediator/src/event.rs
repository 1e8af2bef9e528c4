//! Domain event abstractions.

use async_trait::async_trait;
use herald_core::MediatorResult;

use crate::context::Context;
use crate::queue::DeferredEventQueue;

/// Marker for values that record a fact that has occurred.
///
/// Events are deferred onto a queue and handled later by zero or more
/// [`EventHandler`]s registered for the event's type.
pub trait DomainEvent: Send + Sync + 'static {
    /// The type name for this event (for logging).
    fn event_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Handles events of type `E`.
///
/// `E` may be a concrete event or a marker trait object such as
/// `dyn AuditEvent`; see [`Context::defer_event_as`].
#[async_trait]
pub trait EventHandler<E>: Send + Sync
where
    E: ?Sized + Send + Sync + 'static,
{
    /// Handles one event.
    ///
    /// # Errors
    ///
    /// Any error stops the current drain and propagates to whoever executed
    /// the deferred events.
    async fn handle(&self, event: &E, ctx: &Context<'_>) -> MediatorResult<()>;
}

/// Object-safe view of a [`DomainEvent`].
///
/// Deferring a `Box<dyn DynDomainEvent>` routes the event by its concrete
/// runtime type.
pub trait DynDomainEvent: Send + Sync {
    /// Appends this event to `queue` as its concrete type.
    fn defer_into(self: Box<Self>, queue: &DeferredEventQueue);
}

impl<E: DomainEvent> DynDomainEvent for E {
    fn defer_into(self: Box<Self>, queue: &DeferredEventQueue) {
        queue.push(*self);
    }
}
