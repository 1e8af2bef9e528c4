//! Order desk handlers.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use herald_core::{CommandOutcome, MediatorResult, ValidationContext};
use herald_mediator::{Context, EventHandler, ListQueryHandler, QueryHandler};
use herald_workflow::{AtomicScope, AtomicScopeFactory, CommandWorkflow};
use serde_json::json;
use uuid::Uuid;

use crate::domain::{
    AuditEvent, FindOrder, MAX_QUANTITY, OrderBook, OrderPlaced, OrderSummary, PlaceOrder,
    Reservation,
};

/// Validates and records orders, announcing each with `OrderPlaced`.
#[derive(Debug)]
pub struct PlaceOrderWorkflow {
    book: Arc<OrderBook>,
}

impl PlaceOrderWorkflow {
    /// Creates the workflow over `book`.
    #[must_use]
    pub fn new(book: Arc<OrderBook>) -> Self {
        Self { book }
    }
}

#[async_trait]
impl CommandWorkflow<PlaceOrder> for PlaceOrderWorkflow {
    async fn validate(
        &self,
        command: &PlaceOrder,
        errors: &mut ValidationContext,
        _ctx: &Context<'_>,
    ) -> MediatorResult<()> {
        if command.item.trim().is_empty() {
            errors.add_member_error("item", "must not be empty");
        }
        if command.quantity == 0 || command.quantity > MAX_QUANTITY {
            errors.add_member_error(
                "quantity",
                format!("must be between 1 and {MAX_QUANTITY}"),
            );
        }
        Ok(())
    }

    async fn execute(&self, command: &PlaceOrder, ctx: &Context<'_>) -> MediatorResult<CommandOutcome> {
        let summary = OrderSummary {
            order_id: command.order_id,
            item: command.item.clone(),
            quantity: command.quantity,
        };
        match self.book.reserve(summary) {
            Reservation::Accepted { remaining } => {
                tracing::info!(order_id = %command.order_id, remaining, "order recorded");
                ctx.defer_event_as::<_, dyn AuditEvent>(
                    OrderPlaced {
                        order_id: command.order_id,
                        item: command.item.clone(),
                        quantity: command.quantity,
                    },
                    |event| event as Arc<dyn AuditEvent>,
                );
                Ok(CommandOutcome::ok_with(command.order_id))
            }
            Reservation::Insufficient { available } => Ok(CommandOutcome::failed_member(
                "quantity",
                format!("only {available} left in stock"),
            )),
        }
    }

    fn uses_atomic_scope(&self) -> bool {
        true
    }
}

/// Opens scopes that only log their lifecycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingScopeFactory;

struct LoggingScope {
    id: Uuid,
}

#[async_trait]
impl AtomicScope for LoggingScope {
    async fn commit(self: Box<Self>) -> MediatorResult<()> {
        tracing::debug!(scope = %self.id, "scope committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MediatorResult<()> {
        tracing::debug!(scope = %self.id, "scope rolled back");
        Ok(())
    }
}

#[async_trait]
impl AtomicScopeFactory for LoggingScopeFactory {
    async fn begin(&self) -> MediatorResult<Box<dyn AtomicScope>> {
        let id = Uuid::now_v7();
        tracing::debug!(scope = %id, "scope opened");
        Ok(Box::new(LoggingScope { id }))
    }
}

/// Answers [`FindOrder`].
#[derive(Debug)]
pub struct FindOrderHandler {
    book: Arc<OrderBook>,
}

impl FindOrderHandler {
    /// Creates the handler over `book`.
    #[must_use]
    pub fn new(book: Arc<OrderBook>) -> Self {
        Self { book }
    }
}

#[async_trait]
impl QueryHandler<FindOrder, Option<OrderSummary>> for FindOrderHandler {
    async fn query(
        &self,
        criteria: &FindOrder,
        _ctx: &Context<'_>,
    ) -> MediatorResult<Option<OrderSummary>> {
        Ok(self.book.find(criteria.0))
    }
}

/// Lists every order.
#[derive(Debug)]
pub struct ListOrdersHandler {
    book: Arc<OrderBook>,
}

impl ListOrdersHandler {
    /// Creates the handler over `book`.
    #[must_use]
    pub fn new(book: Arc<OrderBook>) -> Self {
        Self { book }
    }
}

#[async_trait]
impl ListQueryHandler<Vec<OrderSummary>> for ListOrdersHandler {
    async fn load(&self, _ctx: &Context<'_>) -> MediatorResult<Vec<OrderSummary>> {
        Ok(self.book.orders())
    }
}

/// Logs an order confirmation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmationMailer;

#[async_trait]
impl EventHandler<OrderPlaced> for ConfirmationMailer {
    async fn handle(&self, event: &OrderPlaced, _ctx: &Context<'_>) -> MediatorResult<()> {
        tracing::info!(
            order_id = %event.order_id,
            item = %event.item,
            quantity = event.quantity,
            "order confirmation sent"
        );
        Ok(())
    }
}

/// Keeps a JSON record of every audited event. Clones share the trail.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    records: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl AuditTrail {
    /// Creates an empty trail.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded entries, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl EventHandler<dyn AuditEvent> for AuditTrail {
    async fn handle(&self, event: &dyn AuditEvent, _ctx: &Context<'_>) -> MediatorResult<()> {
        let record = json!({
            "type": event.audit_type(),
            "payload": event.audit_payload(),
        });
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use herald_mediator::{CancellationToken, Mediator};

    use super::*;
    use crate::build_mediator;

    fn desk(stock: u32) -> (Mediator, Arc<OrderBook>, AuditTrail) {
        let book = Arc::new(OrderBook::new(stock));
        let audit = AuditTrail::new();
        let mediator = build_mediator(&book, &audit).unwrap();
        (mediator, book, audit)
    }

    fn order(item: &str, quantity: u32) -> PlaceOrder {
        PlaceOrder {
            order_id: Uuid::new_v4(),
            item: item.to_owned(),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_place_order_records_and_audits() {
        // Arrange
        let (mediator, book, audit) = desk(10);
        let command = order("lantern", 4);
        let order_id = command.order_id;
        let token = CancellationToken::new();

        // Act
        let mut outcome = mediator.send(command, &token).await.unwrap();
        let found: Option<OrderSummary> = mediator.query(&FindOrder(order_id), &token).await.unwrap();

        // Assert
        assert!(outcome.is_success());
        assert_eq!(outcome.take_payload::<Uuid>(), Some(order_id));
        assert_eq!(found.map(|o| o.quantity), Some(4));
        assert_eq!(book.stock(), 6);
        let records = audit.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["type"], "orders.placed");
        assert_eq!(records[0]["payload"]["item"], "lantern");
    }

    #[tokio::test]
    async fn test_invalid_order_is_rejected_without_audit() {
        let (mediator, book, audit) = desk(10);

        let outcome = mediator
            .send(order(" ", 0), &CancellationToken::new())
            .await
            .unwrap();

        let members: Vec<Option<&str>> = outcome
            .errors()
            .iter()
            .map(|e| e.member.as_deref())
            .collect();
        assert_eq!(members, vec![Some("item"), Some("quantity")]);
        assert!(book.orders().is_empty());
        assert!(audit.records().is_empty());
    }

    #[tokio::test]
    async fn test_short_stock_fails_without_audit() {
        // Arrange
        let (mediator, _book, audit) = desk(3);
        let token = CancellationToken::new();

        // Act
        let first = mediator.send(order("rope", 3), &token).await.unwrap();
        let second = mediator.send(order("rope", 1), &token).await.unwrap();
        let listed: Vec<OrderSummary> = mediator.load_list(&token).await.unwrap();

        // Assert
        assert!(first.is_success());
        assert!(!second.is_success());
        assert_eq!(second.errors()[0].message, "only 0 left in stock");
        assert_eq!(listed.len(), 1);
        assert_eq!(audit.records().len(), 1);
        assert_eq!(mediator.pending_events(), 0);
    }
}
