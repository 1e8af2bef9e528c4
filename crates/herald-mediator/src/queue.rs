//! Deferred event queue.
//!
//! Events are recorded with [`DeferredEventQueue::push`] and handled only
//! when the queue is drained. A drain works in waves: it takes everything
//! currently queued, dispatches it in FIFO order, then takes whatever was
//! deferred meanwhile (typically by event handlers), until the queue is
//! observed empty.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use herald_core::{MediatorError, MediatorResult, resolve_all};

use crate::context::Context;
use crate::event::{DomainEvent, EventHandler};

/// A queued event with its routing logic.
#[async_trait]
trait QueuedEvent: Send + Sync {
    fn event_name(&self) -> &'static str;

    /// Runs the event's handlers in registration order, skipping the first
    /// `*completed` of them and counting every handler that finishes.
    async fn dispatch(&self, ctx: &Context<'_>, completed: &mut usize) -> MediatorResult<()>;
}

/// Routed to the handlers of its concrete type.
struct Typed<E>(E);

/// Routed to the handlers of `E`, then to those of the marker type `M`.
struct Upcast<E, M: ?Sized> {
    event: Arc<E>,
    marker: Arc<M>,
}

async fn run_handlers<E>(
    event: &E,
    ctx: &Context<'_>,
    completed: &mut usize,
    offset: usize,
) -> MediatorResult<usize>
where
    E: ?Sized + Send + Sync + 'static,
{
    let handlers = resolve_all::<dyn EventHandler<E>>(ctx.mediator().resolver());
    for (index, handler) in handlers.iter().enumerate() {
        if offset + index < *completed {
            continue;
        }
        ctx.ensure_not_cancelled()?;
        handler.handle(event, ctx).await?;
        *completed += 1;
    }
    Ok(handlers.len())
}

#[async_trait]
impl<E: DomainEvent> QueuedEvent for Typed<E> {
    fn event_name(&self) -> &'static str {
        self.0.event_name()
    }

    async fn dispatch(&self, ctx: &Context<'_>, completed: &mut usize) -> MediatorResult<()> {
        run_handlers(&self.0, ctx, completed, 0).await?;
        Ok(())
    }
}

#[async_trait]
impl<E, M> QueuedEvent for Upcast<E, M>
where
    E: DomainEvent,
    M: ?Sized + Send + Sync + 'static,
{
    fn event_name(&self) -> &'static str {
        self.event.event_name()
    }

    async fn dispatch(&self, ctx: &Context<'_>, completed: &mut usize) -> MediatorResult<()> {
        let concrete = run_handlers(self.event.as_ref(), ctx, completed, 0).await?;
        run_handlers(self.marker.as_ref(), ctx, completed, concrete).await?;
        Ok(())
    }
}

struct Entry {
    event: Box<dyn QueuedEvent>,
    /// Handlers already run for this entry by an interrupted drain.
    completed: usize,
}

impl Entry {
    fn new(event: Box<dyn QueuedEvent>) -> Self {
        Self {
            event,
            completed: 0,
        }
    }
}

/// A FIFO of deferred domain events, safe to share between threads.
#[derive(Default)]
pub struct DeferredEventQueue {
    entries: Mutex<VecDeque<Entry>>,
}

impl DeferredEventQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `event`, routed to the handlers of `E`.
    pub fn push<E: DomainEvent>(&self, event: E) {
        tracing::trace!(event = event.event_name(), "deferring event");
        self.enqueue(Box::new(Typed(event)));
    }

    /// Appends `event`, routed to the handlers of `E` and then to the
    /// handlers of `M`.
    pub fn push_as<E, M>(&self, event: E, upcast: fn(Arc<E>) -> Arc<M>)
    where
        E: DomainEvent,
        M: ?Sized + Send + Sync + 'static,
    {
        tracing::trace!(
            event = event.event_name(),
            marker = std::any::type_name::<M>(),
            "deferring event"
        );
        let event = Arc::new(event);
        let marker = upcast(Arc::clone(&event));
        self.enqueue(Box::new(Upcast { event, marker }));
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Discards every queued event and returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let dropped = entries.len();
        entries.clear();
        dropped
    }

    /// Moves every queued event to the back of `target`, keeping their order
    /// and handler progress, and returns how many were moved.
    pub fn transfer_into(&self, target: &DeferredEventQueue) -> usize {
        let moved = self.take_all();
        let count = moved.len();
        target.lock().extend(moved);
        count
    }

    /// Drains the queue wave by wave and returns the number of events
    /// dispatched.
    ///
    /// On a handler error the rest of the current wave is discarded, so no
    /// event taken by this drain can run again later. On cancellation the
    /// interrupted event and the untouched rest of the wave go back to the
    /// head of the queue, and the interrupted event remembers how many of
    /// its handlers already ran.
    pub(crate) async fn drain(&self, ctx: &Context<'_>) -> MediatorResult<usize> {
        ctx.ensure_not_cancelled()?;
        let mut dispatched = 0;
        let mut wave_number = 0_u32;
        loop {
            let mut wave = self.take_all();
            if wave.is_empty() {
                break;
            }
            wave_number += 1;
            tracing::trace!(wave = wave_number, events = wave.len(), "draining wave");

            while let Some(mut entry) = wave.pop_front() {
                let event = entry.event.event_name();
                tracing::trace!(event, "dispatching deferred event");
                match entry.event.dispatch(ctx, &mut entry.completed).await {
                    Ok(()) => dispatched += 1,
                    Err(MediatorError::Cancelled) => {
                        wave.push_front(entry);
                        tracing::warn!(
                            event,
                            restored = wave.len(),
                            "deferred event drain cancelled"
                        );
                        self.restore(wave);
                        return Err(MediatorError::Cancelled);
                    }
                    Err(err) => {
                        tracing::warn!(
                            event,
                            discarded = wave.len(),
                            error = %err,
                            "deferred event handler failed"
                        );
                        return Err(err);
                    }
                }
            }
        }
        Ok(dispatched)
    }

    fn enqueue(&self, event: Box<dyn QueuedEvent>) {
        self.lock().push_back(Entry::new(event));
    }

    fn take_all(&self) -> VecDeque<Entry> {
        std::mem::take(&mut *self.lock())
    }

    fn restore(&self, pending: VecDeque<Entry>) {
        let mut entries = self.lock();
        for entry in pending.into_iter().rev() {
            entries.push_front(entry);
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Entry>> {
        // Entries are only moved in and out whole; a poisoned guard is intact.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for DeferredEventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredEventQueue")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use herald_core::HandlerRegistry;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::mediator::Mediator;
    use crate::registration::RegisterHandlers;

    #[derive(Debug, Clone)]
    struct Tick(&'static str);

    impl DomainEvent for Tick {}

    /// Records each tick and cancels `token` after the tick named `cancel_after`.
    struct Recorder {
        label: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
        cancel_after: Option<(&'static str, CancellationToken)>,
    }

    #[async_trait]
    impl EventHandler<Tick> for Recorder {
        async fn handle(&self, event: &Tick, _ctx: &Context<'_>) -> MediatorResult<()> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.label, event.0));
            if let Some((name, token)) = &self.cancel_after {
                if *name == event.0 && self.label == "first" {
                    token.cancel();
                }
            }
            Ok(())
        }
    }

    fn mediator_with(handlers: Vec<Recorder>) -> Mediator {
        let mut registry = HandlerRegistry::new();
        for handler in handlers {
            registry.event_handler::<Tick, _>(handler);
        }
        Mediator::new(Arc::new(registry))
    }

    #[test]
    fn test_push_and_clear() {
        let queue = DeferredEventQueue::new();

        queue.push(Tick("a"));
        queue.push(Tick("b"));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_transfer_into_appends_in_order() {
        let source = DeferredEventQueue::new();
        let target = DeferredEventQueue::new();
        target.push(Tick("kept"));
        source.push(Tick("a"));
        source.push(Tick("b"));

        let moved = source.transfer_into(&target);

        assert_eq!(moved, 2);
        assert!(source.is_empty());
        assert_eq!(target.len(), 3);
    }

    #[tokio::test]
    async fn test_cancellation_between_handlers_resumes_without_repeats() {
        // Arrange
        let seen = Arc::new(Mutex::new(Vec::new()));
        let token = CancellationToken::new();
        let mediator = mediator_with(vec![
            Recorder {
                label: "first",
                seen: Arc::clone(&seen),
                cancel_after: Some(("a", token.clone())),
            },
            Recorder {
                label: "second",
                seen: Arc::clone(&seen),
                cancel_after: None,
            },
        ]);
        mediator.defer_event(Tick("a"));
        mediator.defer_event(Tick("b"));

        // Act
        let interrupted = mediator.execute_deferred_events(&token).await;
        let restored = mediator.pending_events();
        let resumed = mediator
            .execute_deferred_events(&CancellationToken::new())
            .await;

        // Assert
        assert!(matches!(interrupted, Err(MediatorError::Cancelled)));
        assert_eq!(restored, 2);
        assert_eq!(resumed.unwrap(), 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:a", "second:a", "first:b", "second:b"]
        );
    }

    #[tokio::test]
    async fn test_drain_of_empty_queue_dispatches_nothing() {
        let mediator = mediator_with(Vec::new());

        let dispatched = mediator
            .execute_deferred_events(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(dispatched, 0);
    }
}
