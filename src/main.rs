use futures_util::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_lifecycle::collaborators::memory::{
    InMemoryFulfillment, InMemoryInventory, InMemoryPaymentGateway, RecordingNotificationSink,
    StaticRiskScorer,
};
use order_lifecycle::collaborators::Collaborators;
use order_lifecycle::domain::customer::{Address, CustomerProfile, CustomerTier, PaymentMethod, UserId};
use order_lifecycle::domain::order::{LineItem, OrderId, ProductId};
use order_lifecycle::metrics::{self, Metrics};
use order_lifecycle::pricing::Coupon;
use order_lifecycle::{EngineConfig, OrchestratorBuilder, OrderRequest};

fn demo_address(recipient: &str) -> Address {
    Address {
        recipient: recipient.to_string(),
        street: "221B Baker Street".to_string(),
        city: "London".to_string(),
        postal_code: "NW1 6XE".to_string(),
        country: "GB".to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_lifecycle=debug")),
        )
        .init();

    tracing::info!("🚀 Starting Order Lifecycle Orchestration Demo");

    // === 1. Configuration ===
    let config = EngineConfig::load()?;

    // === 2. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // Start metrics HTTP server in background thread
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(async {
            if let Err(e) = metrics::start_metrics_server(metrics_registry, metrics_port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        }),
        Err(e) => tracing::error!("Failed to start metrics runtime: {}", e),
    });

    // === 3. In-memory collaborators ===
    let payments = Arc::new(InMemoryPaymentGateway::new());
    let inventory = Arc::new(
        InMemoryInventory::new()
            .with_stock("KEYBOARD", 25)
            .with_stock("MOUSE", 40)
            .with_stock("MONITOR", 5),
    );
    let fulfillment = Arc::new(InMemoryFulfillment::new());
    let notifications = Arc::new(RecordingNotificationSink::new());

    let orchestrator = OrchestratorBuilder::new(Collaborators {
        payments: payments.clone(),
        inventory: inventory.clone(),
        fulfillment: fulfillment.clone(),
        notifications: notifications.clone(),
        risk: Arc::new(StaticRiskScorer::default()),
    })
    .with_config(config)
    .with_metrics(metrics.clone())
    .build()?;

    // === 4. Concurrent happy-path orders ===
    tracing::info!("📝 Processing a batch of orders concurrently");

    let gold = CustomerProfile::new(UserId::new(), CustomerTier::Gold).with_completed_orders(7);
    let newcomer = CustomerProfile::new(UserId::new(), CustomerTier::Bronze);

    let requests = vec![
        OrderRequest::new(
            gold.clone(),
            vec![
                LineItem::new(ProductId::new("KEYBOARD"), Decimal::from(100), 2, "peripherals")?,
                LineItem::new(ProductId::new("MOUSE"), Decimal::from(50), 1, "peripherals")?,
            ],
            PaymentMethod::CreditCard,
        )
        .ship_to(demo_address("Gold Customer"))
        .with_coupon(Coupon::fixed("SAVE30", Decimal::from(30), Decimal::from(200))),
        OrderRequest::new(
            newcomer.clone(),
            vec![LineItem::new_virtual(
                ProductId::new("EBOOK-RUST"),
                Decimal::from(40),
                1,
                "books",
            )?],
            PaymentMethod::DigitalWallet,
        ),
        OrderRequest::new(
            newcomer.clone(),
            vec![LineItem::new(ProductId::new("MONITOR"), Decimal::from(320), 1, "displays")?],
            PaymentMethod::DebitCard,
        )
        .ship_to(demo_address("New Customer")),
    ];

    for request in &requests {
        let quote = orchestrator.preview_price(request);
        tracing::info!(base = %quote.base_amount, total = %quote.final_amount, "🔎 Price preview");
    }

    let results = join_all(requests.into_iter().map(|request| {
        let orchestrator = orchestrator.clone();
        async move { orchestrator.process_order(request).await }
    }))
    .await;

    let mut completed = Vec::new();
    for result in results {
        match result {
            Ok(order_id) => completed.push(order_id),
            Err(e) => tracing::warn!(error = %e, "Order did not complete"),
        }
    }

    // === 5. Delivery confirmation and return ===
    if let Some(&first) = completed.first() {
        orchestrator.confirm_delivery(first).await?;
        orchestrator.return_order(first, "arrived damaged").await?;
        tracing::info!(order_id = %first, snapshots = orchestrator.history(first).await.len(), "↩️ Returned order");
    }

    // === 6. Compensation after a carrier outage ===
    tracing::info!("🔥 Simulating a carrier outage");
    fulfillment.fail_shipments(true);
    let outage = OrderRequest::new(
        gold,
        vec![LineItem::new(ProductId::new("MOUSE"), Decimal::from(50), 3, "peripherals")?],
        PaymentMethod::CreditCard,
    )
    .ship_to(demo_address("Gold Customer"));
    match orchestrator.process_order(outage).await {
        Ok(order_id) => tracing::warn!(order_id = %order_id, "Expected the outage to fail the order"),
        Err(e) => tracing::info!(error = %e, recoverable = e.is_recoverable(), "Compensated as expected"),
    }
    fulfillment.fail_shipments(false);

    // === 7. Cancellation of an unpaid order ===
    payments.decline_charges(true);
    let declined = OrderRequest::new(
        newcomer,
        vec![LineItem::new(ProductId::new("KEYBOARD"), Decimal::from(100), 1, "peripherals")?],
        PaymentMethod::BankAccount,
    )
    .ship_to(demo_address("New Customer"));
    let declined_id = OrderId::new();
    let declined = declined.with_order_id(declined_id);
    if let Err(e) = orchestrator.process_order(declined).await {
        tracing::info!(error = %e, "Payment declined");
    }
    orchestrator.cancel_order(declined_id, "payment declined").await?;
    payments.decline_charges(false);

    // === 8. Summary ===
    orchestrator.flush_notifications().await;
    let stats = orchestrator.interventions().stats();
    tracing::info!(
        charges = payments.charges().len(),
        refunds = payments.refunds().len(),
        shipments = fulfillment.shipments().len(),
        notifications = notifications.sent().len(),
        keyboards_left = inventory.available("KEYBOARD"),
        interventions_open = stats.open,
        "📈 Demo summary"
    );

    // Keep the app alive briefly so the metrics endpoint can be scraped
    tokio::time::sleep(Duration::from_secs(5)).await;

    tracing::info!("🎉 Demo complete!");

    Ok(())
}
