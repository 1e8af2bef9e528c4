//! Herald Demo — an order desk wired through the mediator.
//!
//! Orders are placed through a command workflow that checks stock inside an
//! atomic scope, announces `OrderPlaced` to a mailer and an audit trail, and
//! can be read back with a by-id query or a list query.

pub mod application;
pub mod config;
pub mod domain;

use std::sync::Arc;

use herald_mediator::{
    CommandOutcome, HandlerRegistry, LoadList, Mediator, MediatorResult, PipelineBehavior,
    RegisterHandlers, TracingBehavior,
};
use herald_workflow::WorkflowHandler;

use crate::application::{
    AuditTrail, ConfirmationMailer, FindOrderHandler, ListOrdersHandler, LoggingScopeFactory,
    PlaceOrderWorkflow,
};
use crate::domain::{AuditEvent, FindOrder, OrderBook, OrderPlaced, OrderSummary, PlaceOrder};

fn traced<Req, Res>() -> Arc<dyn PipelineBehavior<Req, Res>>
where
    Req: Send + Sync + 'static,
    Res: Send + 'static,
{
    Arc::new(TracingBehavior)
}

/// Registers every order desk handler and builds a mediator that traces
/// each request.
///
/// # Errors
///
/// Returns a configuration error if the mediator cannot be built.
pub fn build_mediator(book: &Arc<OrderBook>, audit: &AuditTrail) -> MediatorResult<Mediator> {
    let mut registry = HandlerRegistry::new();
    registry
        .command_handler::<PlaceOrder, _>(
            WorkflowHandler::new(PlaceOrderWorkflow::new(Arc::clone(book)))
                .with_atomic_scope(Arc::new(LoggingScopeFactory)),
        )
        .query_handler::<FindOrder, Option<OrderSummary>, _>(FindOrderHandler::new(Arc::clone(
            book,
        )))
        .list_handler::<Vec<OrderSummary>, _>(ListOrdersHandler::new(Arc::clone(book)))
        .event_handler::<OrderPlaced, _>(ConfirmationMailer)
        .event_handler::<dyn AuditEvent, _>(audit.clone());

    Mediator::builder()
        .resolver(Arc::new(registry))
        .behavior(traced::<PlaceOrder, CommandOutcome>())
        .behavior(traced::<FindOrder, Option<OrderSummary>>())
        .behavior(traced::<LoadList<Vec<OrderSummary>>, Vec<OrderSummary>>())
        .build()
}
