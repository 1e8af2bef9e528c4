//! Command abstractions.

use async_trait::async_trait;
use herald_core::{CommandOutcome, MediatorResult};
use tokio_util::sync::CancellationToken;

use crate::BoxFuture;
use crate::context::Context;
use crate::mediator::Mediator;

/// Marker for values that express an intent to change state.
///
/// A command is routed to exactly one [`CommandHandler`], chosen by the
/// command's concrete type.
pub trait Command: Send + Sync + 'static {
    /// The type name for this command (for logging).
    fn command_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Handles one command type.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    /// Handles `command`.
    ///
    /// Validation and business-rule failures are reported through the
    /// returned outcome, not as errors.
    ///
    /// # Errors
    ///
    /// Returns `MediatorError` for unexpected failures and cancellation.
    async fn handle(&self, command: &C, ctx: &Context<'_>) -> MediatorResult<CommandOutcome>;
}

/// Object-safe view of a [`Command`].
///
/// Lets callers hold commands behind `Box<dyn DynCommand>` and still have
/// them dispatched to the handler of their concrete type.
pub trait DynCommand: Send + Sync {
    /// Sends this command through `mediator` as its concrete type.
    fn dispatch<'a>(
        self: Box<Self>,
        mediator: &'a Mediator,
        cancellation: &'a CancellationToken,
    ) -> BoxFuture<'a, MediatorResult<CommandOutcome>>;
}

impl<C: Command> DynCommand for C {
    fn dispatch<'a>(
        self: Box<Self>,
        mediator: &'a Mediator,
        cancellation: &'a CancellationToken,
    ) -> BoxFuture<'a, MediatorResult<CommandOutcome>> {
        Box::pin(async move { mediator.send(*self, cancellation).await })
    }
}
