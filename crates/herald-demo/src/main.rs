//! Herald order desk demo entry point.

use std::error::Error;
use std::sync::Arc;

use herald_demo::application::AuditTrail;
use herald_demo::build_mediator;
use herald_demo::config::DemoConfig;
use herald_demo::domain::{OrderBook, OrderSummary, PlaceOrder};
use herald_mediator::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const ITEMS: [&str; 3] = ["lantern", "rope", "torch"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Read configuration from environment.
    let config = DemoConfig::from_env()?;
    tracing::info!(orders = config.orders, stock = config.stock, "starting order desk demo");

    let book = Arc::new(OrderBook::new(config.stock));
    let audit = AuditTrail::new();
    let mediator = build_mediator(&book, &audit)?;
    let token = CancellationToken::new();

    for (n, item) in (0..config.orders).zip(ITEMS.iter().cycle()) {
        let command = PlaceOrder {
            order_id: Uuid::now_v7(),
            item: (*item).to_owned(),
            quantity: n % 4 + 1,
        };
        let order_id = command.order_id;
        let outcome = mediator.send(command, &token).await?;
        if outcome.is_success() {
            tracing::info!(%order_id, "order placed");
        } else {
            let errors: Vec<String> = outcome.errors().iter().map(ToString::to_string).collect();
            tracing::warn!(%order_id, ?errors, "order refused");
        }
    }

    let orders: Vec<OrderSummary> = mediator.load_list(&token).await?;
    tracing::info!(
        placed = orders.len(),
        audited = audit.records().len(),
        remaining_stock = book.stock(),
        "demo finished"
    );
    println!("{}", serde_json::to_string_pretty(&orders)?);

    Ok(())
}
