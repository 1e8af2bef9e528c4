//! Test event handlers.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use herald_core::{MediatorError, MediatorResult};
use herald_mediator::{Context, EventHandler};

use crate::journal::CallJournal;

/// Keeps a clone of every event it receives. Clones share the same
/// storage, so a test can keep one clone and register another.
#[derive(Debug)]
pub struct RecordingEventHandler<E> {
    received: Arc<Mutex<Vec<E>>>,
}

impl<E> RecordingEventHandler<E> {
    /// Creates a handler with empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of events received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

impl<E: Clone> RecordingEventHandler<E> {
    /// Returns a snapshot of all received events.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn received(&self) -> Vec<E> {
        self.received.lock().unwrap().clone()
    }
}

impl<E> Default for RecordingEventHandler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for RecordingEventHandler<E> {
    fn clone(&self) -> Self {
        Self {
            received: Arc::clone(&self.received),
        }
    }
}

#[async_trait]
impl<E> EventHandler<E> for RecordingEventHandler<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn handle(&self, event: &E, _ctx: &Context<'_>) -> MediatorResult<()> {
        self.received.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Writes a fixed label into a [`CallJournal`] for every event.
#[derive(Debug, Clone)]
pub struct JournalEventHandler {
    label: String,
    journal: CallJournal,
}

impl JournalEventHandler {
    /// Creates a handler writing `label` into `journal`.
    #[must_use]
    pub fn new(label: impl Into<String>, journal: &CallJournal) -> Self {
        Self {
            label: label.into(),
            journal: journal.clone(),
        }
    }
}

#[async_trait]
impl<E> EventHandler<E> for JournalEventHandler
where
    E: ?Sized + Send + Sync + 'static,
{
    async fn handle(&self, _event: &E, _ctx: &Context<'_>) -> MediatorResult<()> {
        self.journal.record(self.label.clone());
        Ok(())
    }
}

/// Fails every event with a handler error carrying `message`.
#[derive(Debug, Clone)]
pub struct FailingEventHandler {
    message: &'static str,
}

impl FailingEventHandler {
    /// Creates a handler failing with `message`.
    #[must_use]
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

#[async_trait]
impl<E> EventHandler<E> for FailingEventHandler
where
    E: ?Sized + Send + Sync + 'static,
{
    async fn handle(&self, _event: &E, _ctx: &Context<'_>) -> MediatorResult<()> {
        Err(MediatorError::handler(self.message))
    }
}
