//! Recording atomic scope.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use herald_core::{MediatorError, MediatorResult};
use herald_workflow::{AtomicScope, AtomicScopeFactory};

use crate::journal::CallJournal;

/// Opens scopes that write `"begin"`, `"commit"` and `"rollback"` into a
/// [`CallJournal`]. Can be told to fail commits.
#[derive(Debug, Clone, Default)]
pub struct RecordingAtomicScopeFactory {
    journal: CallJournal,
    fail_commit: Arc<AtomicBool>,
}

impl RecordingAtomicScopeFactory {
    /// Creates a factory writing into `journal`.
    #[must_use]
    pub fn new(journal: &CallJournal) -> Self {
        Self {
            journal: journal.clone(),
            fail_commit: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes every later commit fail with a handler error.
    pub fn fail_commits(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }
}

struct RecordingScope {
    journal: CallJournal,
    fail_commit: bool,
}

#[async_trait]
impl AtomicScope for RecordingScope {
    async fn commit(self: Box<Self>) -> MediatorResult<()> {
        if self.fail_commit {
            self.journal.record("commit-failed");
            return Err(MediatorError::handler("commit failed"));
        }
        self.journal.record("commit");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MediatorResult<()> {
        self.journal.record("rollback");
        Ok(())
    }
}

#[async_trait]
impl AtomicScopeFactory for RecordingAtomicScopeFactory {
    async fn begin(&self) -> MediatorResult<Box<dyn AtomicScope>> {
        self.journal.record("begin");
        Ok(Box::new(RecordingScope {
            journal: self.journal.clone(),
            fail_commit: self.fail_commit.load(Ordering::SeqCst),
        }))
    }
}
