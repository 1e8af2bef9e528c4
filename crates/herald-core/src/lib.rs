//! Herald Core — value types shared by every part of the mediator.
//!
//! This crate defines the validation model, the command outcome, the error
//! taxonomy, and the handler-resolver contract the dispatcher consumes. It
//! contains no async code and no dispatch logic.

pub mod error;
pub mod outcome;
pub mod registry;
pub mod resolver;
pub mod validation;

pub use error::{BoxError, MediatorError, MediatorResult};
pub use outcome::CommandOutcome;
pub use registry::HandlerRegistry;
pub use resolver::{HandlerResolver, Instance, downcast_instance, instance, resolve_all, resolve_one};
pub use validation::{ValidationContext, ValidationError};
