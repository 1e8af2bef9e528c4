//! Order desk domain: commands, queries, events and the order book.

use std::sync::{PoisonError, RwLock};

use herald_mediator::{Command, DomainEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest quantity a single order may request.
pub const MAX_QUANTITY: u32 = 20;

/// Places an order for `quantity` units of `item`.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    /// The order identifier, chosen by the caller.
    pub order_id: Uuid,
    /// The item being ordered.
    pub item: String,
    /// Number of units.
    pub quantity: u32,
}

impl Command for PlaceOrder {
    fn command_name(&self) -> &'static str {
        "orders.place"
    }
}

/// Looks up one order by identifier.
#[derive(Debug, Clone, Copy)]
pub struct FindOrder(pub Uuid);

/// A placed order as returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    /// The order identifier.
    pub order_id: Uuid,
    /// The item ordered.
    pub item: String,
    /// Number of units.
    pub quantity: u32,
}

/// Emitted when an order has been placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlaced {
    /// The order identifier.
    pub order_id: Uuid,
    /// The item ordered.
    pub item: String,
    /// Number of units.
    pub quantity: u32,
}

impl DomainEvent for OrderPlaced {
    fn event_name(&self) -> &'static str {
        "orders.placed"
    }
}

/// Events kept in the audit trail.
pub trait AuditEvent: Send + Sync {
    /// Stable event type name.
    fn audit_type(&self) -> &'static str;

    /// JSON payload recorded in the trail.
    fn audit_payload(&self) -> serde_json::Value;
}

impl AuditEvent for OrderPlaced {
    fn audit_type(&self) -> &'static str {
        "orders.placed"
    }

    fn audit_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Result of reserving stock for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// The order was recorded; `remaining` units are left.
    Accepted {
        /// Units left after the reservation.
        remaining: u32,
    },
    /// Not enough stock; nothing was recorded.
    Insufficient {
        /// Units that were available.
        available: u32,
    },
}

#[derive(Debug)]
struct BookState {
    stock: u32,
    orders: Vec<OrderSummary>,
}

/// In-memory order book with a single stock counter.
#[derive(Debug)]
pub struct OrderBook {
    state: RwLock<BookState>,
}

impl OrderBook {
    /// Creates an empty book holding `stock` units.
    #[must_use]
    pub fn new(stock: u32) -> Self {
        Self {
            state: RwLock::new(BookState {
                stock,
                orders: Vec::new(),
            }),
        }
    }

    /// Records `order` if enough stock is left.
    pub fn reserve(&self, order: OrderSummary) -> Reservation {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if order.quantity > state.stock {
            return Reservation::Insufficient {
                available: state.stock,
            };
        }
        state.stock -= order.quantity;
        state.orders.push(order);
        Reservation::Accepted {
            remaining: state.stock,
        }
    }

    /// Removes the order with `order_id` and returns its units to stock.
    pub fn release(&self, order_id: Uuid) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let Some(index) = state.orders.iter().position(|o| o.order_id == order_id) else {
            return false;
        };
        let order = state.orders.remove(index);
        state.stock += order.quantity;
        true
    }

    /// Finds an order by identifier.
    #[must_use]
    pub fn find(&self, order_id: Uuid) -> Option<OrderSummary> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.orders.iter().find(|o| o.order_id == order_id).cloned()
    }

    /// All orders, oldest first.
    #[must_use]
    pub fn orders(&self) -> Vec<OrderSummary> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .orders
            .clone()
    }

    /// Units left in stock.
    #[must_use]
    pub fn stock(&self) -> u32 {
        self.state.read().unwrap_or_else(PoisonError::into_inner).stock
    }
}
