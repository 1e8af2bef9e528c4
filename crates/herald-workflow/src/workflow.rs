//! The command handler template.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use herald_core::{CommandOutcome, MediatorError, MediatorResult, ValidationContext};
use herald_mediator::{Command, CommandHandler, Context, DeferredEventQueue};

use crate::scope::AtomicScopeFactory;

/// Where an invocation of a [`WorkflowHandler`] stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    /// Validation logic is filling the validation context.
    Validating,
    /// Business logic is running.
    Executing,
    /// Execution succeeded; deferred events are firing.
    Succeeding,
    /// Validation or execution produced a failed outcome, or an error.
    Failed,
}

impl WorkflowStage {
    /// Lowercase name used in log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Executing => "executing",
            Self::Succeeding => "succeeding",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller-supplied parts of a command handler.
///
/// Events deferred through the [`Context`] passed to `validate` or
/// `execute` fire only when the outcome is successful.
#[async_trait]
pub trait CommandWorkflow<C: Command>: Send + Sync {
    /// Records validation errors for `command`. Any recorded error ends the
    /// invocation with a failed outcome before `execute` runs.
    ///
    /// The default accepts every command.
    ///
    /// # Errors
    ///
    /// Returns an error for unexpected failures; it propagates to the caller.
    async fn validate(
        &self,
        _command: &C,
        _errors: &mut ValidationContext,
        _ctx: &Context<'_>,
    ) -> MediatorResult<()> {
        Ok(())
    }

    /// Runs the business logic and produces the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error for unexpected failures; it propagates to the caller.
    /// Business-rule failures belong in the outcome.
    async fn execute(&self, command: &C, ctx: &Context<'_>) -> MediatorResult<CommandOutcome>;

    /// Whether `execute` runs inside an atomic scope. Off by default.
    fn uses_atomic_scope(&self) -> bool {
        false
    }
}

/// Runs a [`CommandWorkflow`] as a [`CommandHandler`].
///
/// Each invocation collects its deferred events in a queue of its own. The
/// queue is drained once the outcome is successful, after the atomic scope
/// committed, and dropped otherwise, so events of a failed invocation never
/// reach a later drain. Commands sent through the invocation's [`Context`]
/// defer onto the same queue, so their events share the outcome.
///
/// Only that queue is drained. Events already deferred on the mediator
/// before the `send` stay there; callers fire them with
/// [`Mediator::execute_deferred_events`]. Events a cancelled drain could not
/// fire are moved to the caller's queue as well.
///
/// [`Context`]: herald_mediator::Context
/// [`Mediator::execute_deferred_events`]: herald_mediator::Mediator::execute_deferred_events
pub struct WorkflowHandler<W> {
    workflow: W,
    scopes: Option<Arc<dyn AtomicScopeFactory>>,
}

impl<W> WorkflowHandler<W> {
    /// Wraps `workflow`, without an atomic scope factory.
    #[must_use]
    pub fn new(workflow: W) -> Self {
        Self {
            workflow,
            scopes: None,
        }
    }

    /// Sets the factory used by workflows that opt into an atomic scope.
    #[must_use]
    pub fn with_atomic_scope(mut self, scopes: Arc<dyn AtomicScopeFactory>) -> Self {
        self.scopes = Some(scopes);
        self
    }

    /// The wrapped workflow.
    #[must_use]
    pub fn workflow(&self) -> &W {
        &self.workflow
    }

    async fn execute_atomically<C>(
        &self,
        command: &C,
        ctx: &Context<'_>,
    ) -> MediatorResult<CommandOutcome>
    where
        C: Command,
        W: CommandWorkflow<C>,
    {
        let scopes = self
            .scopes
            .as_ref()
            .ok_or(MediatorError::HandlerNotRegistered {
                contract: type_name::<dyn AtomicScopeFactory>(),
            })?;
        let scope = scopes.begin().await?;

        let outcome = match self.workflow.execute(command, ctx).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if let Err(rollback) = scope.rollback().await {
                    tracing::warn!(error = %rollback, "rollback after failed execution failed");
                }
                return Err(err);
            }
        };

        if !outcome.is_success() {
            scope.rollback().await?;
            return Ok(outcome);
        }
        if ctx.is_cancelled() {
            scope.rollback().await?;
            return Err(MediatorError::Cancelled);
        }
        scope.commit().await?;
        Ok(outcome)
    }
}

impl<W> fmt::Debug for WorkflowHandler<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowHandler")
            .field("workflow", &type_name::<W>())
            .field("atomic_scope", &self.scopes.is_some())
            .finish()
    }
}

#[async_trait]
impl<C, W> CommandHandler<C> for WorkflowHandler<W>
where
    C: Command,
    W: CommandWorkflow<C> + 'static,
{
    async fn handle(&self, command: &C, ctx: &Context<'_>) -> MediatorResult<CommandOutcome> {
        let name = command.command_name();
        let events = DeferredEventQueue::new();
        let local = ctx.with_events(&events);

        tracing::debug!(command = name, stage = %WorkflowStage::Validating, "validating command");
        local.ensure_not_cancelled()?;
        let mut validation = ValidationContext::new();
        self.workflow.validate(command, &mut validation, &local).await?;
        if !validation.is_valid() {
            tracing::debug!(
                command = name,
                stage = %WorkflowStage::Failed,
                errors = validation.len(),
                discarded = events.len(),
                "command rejected by validation"
            );
            return Ok(CommandOutcome::from_validation(validation));
        }

        tracing::debug!(command = name, stage = %WorkflowStage::Executing, "executing command");
        local.ensure_not_cancelled()?;
        let outcome = if self.workflow.uses_atomic_scope() {
            self.execute_atomically(command, &local).await?
        } else {
            self.workflow.execute(command, &local).await?
        };
        if !outcome.is_success() {
            tracing::debug!(
                command = name,
                stage = %WorkflowStage::Failed,
                errors = outcome.errors().len(),
                discarded = events.len(),
                "command failed a business rule"
            );
            return Ok(outcome);
        }

        tracing::debug!(
            command = name,
            stage = %WorkflowStage::Succeeding,
            events = events.len(),
            "firing deferred events"
        );
        match local.execute_deferred_events().await {
            Ok(_) => Ok(outcome),
            Err(MediatorError::Cancelled) => {
                // Unfired events wait for the caller's next drain.
                let moved = events.transfer_into(ctx.events());
                tracing::warn!(command = name, moved, "event firing cancelled");
                Err(MediatorError::Cancelled)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display_uses_lowercase_names() {
        let rendered: Vec<String> = [
            WorkflowStage::Validating,
            WorkflowStage::Executing,
            WorkflowStage::Succeeding,
            WorkflowStage::Failed,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        assert_eq!(
            rendered,
            vec!["validating", "executing", "succeeding", "failed"]
        );
    }
}
