//! Shared test doubles for the Herald mediator.

mod behavior;
mod event_handler;
mod journal;
mod scope;

pub use behavior::{OrderingBehavior, ShortCircuitBehavior};
pub use event_handler::{FailingEventHandler, JournalEventHandler, RecordingEventHandler};
pub use journal::CallJournal;
pub use scope::RecordingAtomicScopeFactory;
