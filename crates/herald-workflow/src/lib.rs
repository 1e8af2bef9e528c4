//! Herald Workflow — a template for command handlers.
//!
//! A [`CommandWorkflow`] supplies validation and business logic;
//! [`WorkflowHandler`] runs it as validate, execute, then fire the events
//! deferred during execution, and only fires them for a successful outcome.
//! Execution can be wrapped in an [`AtomicScope`] such as a database
//! transaction.

pub mod scope;
pub mod workflow;

pub use scope::{AtomicScope, AtomicScopeFactory};
pub use workflow::{CommandWorkflow, WorkflowHandler, WorkflowStage};
