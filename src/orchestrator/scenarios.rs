use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

use super::{InterventionKind, Orchestrator, OrchestratorBuilder, OrderRequest};
use crate::collaborators::memory::{
    InMemoryFulfillment, InMemoryInventory, InMemoryPaymentGateway, RecordingNotificationSink,
    StaticRiskScorer,
};
use crate::collaborators::{CollaboratorError, Collaborators, InventoryStore, NotificationKind};
use crate::config::EngineConfig;
use crate::domain::customer::{Address, CustomerProfile, CustomerTier, PaymentMethod, RiskTier, UserId};
use crate::domain::order::{
    InventoryHold, LineItem, OrderError, OrderId, OrderState, ProductId, TransitionTrigger,
};
use crate::pricing::Coupon;
use crate::utils::{CircuitBreakerConfig, CircuitState, RetryConfig};

// ============================================================================
// End-to-end lifecycle scenarios against the in-memory collaborators
// ============================================================================

struct Harness {
    orchestrator: Orchestrator,
    payments: Arc<InMemoryPaymentGateway>,
    inventory: Arc<InMemoryInventory>,
    fulfillment: Arc<InMemoryFulfillment>,
    notifications: Arc<RecordingNotificationSink>,
    risk: Arc<StaticRiskScorer>,
}

fn test_config() -> EngineConfig {
    EngineConfig {
        refund_retry: RetryConfig::immediate(3),
        release_retry: RetryConfig::immediate(3),
        notification_retry: RetryConfig::immediate(2),
        ..EngineConfig::default()
    }
}

/// Wraps the in-memory store to fake what it cannot script on its own
struct ScriptedInventory {
    stock: Arc<InMemoryInventory>,
    /// Report every availability check as satisfied, as a stale cache would
    optimistic_checks: bool,
    crash_on_deduct: bool,
}

#[async_trait]
impl InventoryStore for ScriptedInventory {
    async fn check_available(&self, product_id: &ProductId, quantity: u32) -> Result<bool, CollaboratorError> {
        if self.optimistic_checks {
            return Ok(true);
        }
        self.stock.check_available(product_id, quantity).await
    }

    async fn reserve(&self, items: &[LineItem]) -> Result<bool, CollaboratorError> {
        self.stock.reserve(items).await
    }

    async fn release(&self, items: &[LineItem]) -> Result<(), CollaboratorError> {
        self.stock.release(items).await
    }

    async fn deduct(&self, items: &[LineItem]) -> Result<(), CollaboratorError> {
        if self.crash_on_deduct {
            panic!("stock ledger client crashed");
        }
        self.stock.deduct(items).await
    }
}

fn harness_with(config: EngineConfig) -> Harness {
    build_harness(config, |stock| stock as Arc<dyn InventoryStore>)
}

fn scripted_harness(optimistic_checks: bool, crash_on_deduct: bool) -> Harness {
    build_harness(test_config(), move |stock| {
        Arc::new(ScriptedInventory {
            stock,
            optimistic_checks,
            crash_on_deduct,
        }) as Arc<dyn InventoryStore>
    })
}

fn build_harness(
    config: EngineConfig,
    store: impl FnOnce(Arc<InMemoryInventory>) -> Arc<dyn InventoryStore>,
) -> Harness {
    let payments = Arc::new(InMemoryPaymentGateway::new());
    let inventory = Arc::new(
        InMemoryInventory::new()
            .with_stock("P1", 10)
            .with_stock("P2", 10),
    );
    let fulfillment = Arc::new(InMemoryFulfillment::new());
    let notifications = Arc::new(RecordingNotificationSink::new());
    let risk = Arc::new(StaticRiskScorer::default());

    let orchestrator = OrchestratorBuilder::new(Collaborators {
        payments: payments.clone(),
        inventory: store(inventory.clone()),
        fulfillment: fulfillment.clone(),
        notifications: notifications.clone(),
        risk: risk.clone(),
    })
    .with_config(config)
    .build()
    .unwrap();

    Harness {
        orchestrator,
        payments,
        inventory,
        fulfillment,
        notifications,
        risk,
    }
}

fn harness() -> Harness {
    harness_with(test_config())
}

fn address() -> Address {
    Address {
        recipient: "Grace Hopper".to_string(),
        street: "42 Harbour Rd".to_string(),
        city: "Arlington".to_string(),
        postal_code: "22201".to_string(),
        country: "US".to_string(),
    }
}

fn gold_customer() -> CustomerProfile {
    CustomerProfile::new(UserId::new(), CustomerTier::Gold).with_completed_orders(3)
}

fn physical(id: &str, price: i64, qty: u32) -> LineItem {
    LineItem::new(ProductId::new(id), Decimal::from(price), qty, "hardware").unwrap()
}

/// ¥100×2 + ¥50×1 shipped to a returning Gold customer with a ¥30-off coupon
fn physical_request() -> OrderRequest {
    OrderRequest::new(
        gold_customer(),
        vec![physical("P1", 100, 2), physical("P2", 50, 1)],
        PaymentMethod::CreditCard,
    )
    .ship_to(address())
    .with_coupon(Coupon::fixed("SAVE30", Decimal::from(30), Decimal::from(200)))
}

fn virtual_request() -> OrderRequest {
    let key = LineItem::new_virtual(ProductId::new("GAME-KEY"), Decimal::from(60), 1, "digital").unwrap();
    OrderRequest::new(gold_customer(), vec![key], PaymentMethod::DigitalWallet)
}

#[tokio::test]
async fn test_physical_order_is_priced_charged_and_shipped() {
    let h = harness();

    let order_id = h.orchestrator.process_order(physical_request()).await.unwrap();
    let order = h.orchestrator.order(order_id).await.unwrap();

    assert_eq!(order.state(), OrderState::Shipped);
    assert_eq!(order.final_amount(), Decimal::new(20750, 2));
    assert_eq!(order.adjustments().len(), 2);
    assert_eq!(order.inventory(), InventoryHold::Deducted);
    assert!(order.fulfillment_ref().is_some());

    let charges = h.payments.charges();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].amount, Decimal::new(20750, 2));

    assert_eq!(h.inventory.available("P1"), 8);
    assert_eq!(h.inventory.reserved("P1"), 0);
    assert_eq!(h.fulfillment.shipments().len(), 1);

    let path: Vec<OrderState> = order.transitions().iter().map(|t| t.to).collect();
    assert_eq!(path, vec![OrderState::Paid, OrderState::Fulfilling, OrderState::Shipped]);
    assert_eq!(h.orchestrator.history(order_id).await.len(), 4);

    h.orchestrator.flush_notifications().await;
    let kinds: Vec<NotificationKind> = h.notifications.sent().iter().map(|n| n.kind).collect();
    assert!(kinds.contains(&NotificationKind::OrderPaid));
    assert!(kinds.contains(&NotificationKind::OrderShipped));
}

#[tokio::test]
async fn test_virtual_only_order_skips_fulfillment() {
    let h = harness();

    let order_id = h.orchestrator.process_order(virtual_request()).await.unwrap();
    let order = h.orchestrator.order(order_id).await.unwrap();

    assert_eq!(order.state(), OrderState::Delivered);
    assert_eq!(order.inventory(), InventoryHold::None);
    assert!(h.fulfillment.shipments().is_empty());
    assert_eq!(order.transitions().last().unwrap().trigger, TransitionTrigger::DigitalDelivery);

    h.orchestrator.flush_notifications().await;
    assert!(h
        .notifications
        .sent()
        .iter()
        .any(|n| n.kind == NotificationKind::OrderDelivered));
}

#[tokio::test]
async fn test_validation_failure_has_no_side_effects() {
    let h = harness();
    let order_id = OrderId::new();
    let request = OrderRequest::new(gold_customer(), vec![physical("P1", 10, 20)], PaymentMethod::CreditCard)
        .ship_to(address())
        .with_order_id(order_id);

    let err = h.orchestrator.process_order(request).await.unwrap_err();

    assert!(matches!(err, OrderError::ValidationFailed { ref stage, .. } if stage == "inventory"));
    assert!(h.orchestrator.order(order_id).await.is_none());
    assert!(h.orchestrator.history(order_id).await.is_empty());
    assert!(h.payments.charges().is_empty());
}

#[tokio::test]
async fn test_high_risk_user_rejected_unless_on_quick_path() {
    let h = harness();

    let gold = physical_request();
    h.risk.set_tier(gold.customer.user_id, RiskTier::High);
    let err = h.orchestrator.process_order(gold).await.unwrap_err();
    assert!(matches!(err, OrderError::ValidationFailed { ref stage, .. } if stage == "risk"));

    let mut platinum = physical_request();
    platinum.customer.tier = CustomerTier::Platinum;
    h.risk.set_tier(platinum.customer.user_id, RiskTier::High);
    assert!(h.orchestrator.process_order(platinum).await.is_ok());
}

#[tokio::test]
async fn test_declined_payment_leaves_order_created_for_retry() {
    let h = harness();
    let order_id = OrderId::new();
    let request = physical_request().with_order_id(order_id);

    h.payments.decline_charges(true);
    let err = h.orchestrator.process_order(request.clone()).await.unwrap_err();
    assert!(matches!(err, OrderError::PaymentFailed { .. }));

    let order = h.orchestrator.order(order_id).await.unwrap();
    assert_eq!(order.state(), OrderState::Created);
    assert!(order.payment_ref().is_none());
    assert_eq!(h.inventory.reserved("P1"), 0);

    h.payments.decline_charges(false);
    assert_eq!(h.orchestrator.process_order(request.clone()).await.unwrap(), order_id);
    assert_eq!(h.payments.charges().len(), 2);

    let err = h.orchestrator.process_order(request).await.unwrap_err();
    assert_eq!(
        err,
        OrderError::AlreadyProcessed {
            order_id,
            state: OrderState::Shipped
        }
    );
}

#[tokio::test]
async fn test_deduction_failure_refunds_and_cancels() {
    let h = harness();
    h.inventory.fail_deductions(true);
    let order_id = OrderId::new();

    let err = h
        .orchestrator
        .process_order(physical_request().with_order_id(order_id))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::FulfillmentFailed { .. }));

    let order = h.orchestrator.order(order_id).await.unwrap();
    assert_eq!(order.state(), OrderState::Cancelled);
    assert_eq!(order.inventory(), InventoryHold::None);
    assert!(matches!(
        order.transitions().last().unwrap().trigger,
        TransitionTrigger::Compensation { .. }
    ));

    let refunds = h.payments.refunds();
    assert_eq!(refunds.len(), 1);
    assert_eq!(Some(&refunds[0].transaction_id), order.payment_ref());
    assert_eq!(refunds[0].amount, order.final_amount());

    assert_eq!(h.inventory.reserved("P1"), 0);
    assert_eq!(h.inventory.available("P1"), 10);
}

#[tokio::test]
async fn test_repeated_product_lines_are_checked_together() {
    let h = harness();
    let order_id = OrderId::new();
    let request = OrderRequest::new(
        gold_customer(),
        vec![physical("P1", 10, 6), physical("P1", 10, 6)],
        PaymentMethod::CreditCard,
    )
    .ship_to(address())
    .with_order_id(order_id);

    let err = h.orchestrator.process_order(request).await.unwrap_err();

    assert!(matches!(err, OrderError::ValidationFailed { ref stage, .. } if stage == "inventory"));
    assert!(h.payments.charges().is_empty());
    assert_eq!(h.inventory.available("P1"), 10);
}

#[tokio::test]
async fn test_repeated_product_lines_within_stock_ship() {
    let h = harness();
    let request = OrderRequest::new(
        gold_customer(),
        vec![physical("P1", 10, 4), physical("P1", 10, 6)],
        PaymentMethod::CreditCard,
    )
    .ship_to(address());

    let order_id = h.orchestrator.process_order(request).await.unwrap();

    assert_eq!(h.orchestrator.order(order_id).await.unwrap().state(), OrderState::Shipped);
    assert_eq!(h.inventory.available("P1"), 0);
    assert_eq!(h.inventory.reserved("P1"), 0);
}

#[tokio::test]
async fn test_reservation_error_refunds_and_cancels() {
    let h = harness();
    h.inventory.fail_reservations(true);
    let order_id = OrderId::new();

    let err = h
        .orchestrator
        .process_order(physical_request().with_order_id(order_id))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::FulfillmentFailed { ref reason, .. } if reason.contains("reservation failed")));

    let order = h.orchestrator.order(order_id).await.unwrap();
    let last = order.transitions().last().unwrap();
    assert_eq!((last.from, last.to), (OrderState::Paid, OrderState::Cancelled));
    assert_eq!(order.inventory(), InventoryHold::None);
    assert_eq!(h.payments.refunds().len(), 1);
    assert_eq!(h.inventory.reserved("P1"), 0);
    assert_eq!(h.inventory.available("P1"), 10);
}

#[tokio::test]
async fn test_stock_gone_at_reservation_refunds_and_cancels() {
    let h = scripted_harness(true, false);
    let order_id = OrderId::new();
    let request = OrderRequest::new(gold_customer(), vec![physical("P1", 10, 12)], PaymentMethod::CreditCard)
        .ship_to(address())
        .with_order_id(order_id);

    let err = h.orchestrator.process_order(request).await.unwrap_err();
    assert!(matches!(err, OrderError::FulfillmentFailed { ref reason, .. } if reason.contains("no longer available")));

    let order = h.orchestrator.order(order_id).await.unwrap();
    assert_eq!(order.state(), OrderState::Cancelled);
    assert_eq!(h.payments.charges().len(), 1);
    assert_eq!(h.payments.refunds().len(), 1);
    assert_eq!(h.inventory.reserved("P1"), 0);
    assert_eq!(h.inventory.available("P1"), 10);
}

#[tokio::test]
async fn test_crash_after_payment_still_refunds() {
    let h = scripted_harness(false, true);
    let order_id = OrderId::new();

    let err = h
        .orchestrator
        .process_order(physical_request().with_order_id(order_id))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::FulfillmentFailed { .. }));

    let order = h.orchestrator.order(order_id).await.unwrap();
    assert_eq!(order.state(), OrderState::Cancelled);
    assert_eq!(h.payments.refunds().len(), 1);
    assert_eq!(h.payments.refunds()[0].amount, order.final_amount());

    let queued = h.orchestrator.interventions().for_order(order_id);
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].kind, InterventionKind::InventoryRelease);
}

#[tokio::test]
async fn test_preview_of_extreme_price_does_not_panic() {
    let h = harness();
    let huge = LineItem::new(ProductId::new("P1"), Decimal::MAX, 1, "hardware").unwrap();
    let request = OrderRequest::new(gold_customer(), vec![huge.clone(), huge], PaymentMethod::CreditCard)
        .ship_to(address());

    let quote = h.orchestrator.preview_price(&request);
    assert_eq!(quote.base_amount, Decimal::MAX);

    let err = h.orchestrator.process_order(request).await.unwrap_err();
    assert!(matches!(err, OrderError::ValidationFailed { ref stage, .. } if stage == "structural"));
}

#[tokio::test]
async fn test_shipment_failure_restocks_and_cancels_from_fulfilling() {
    let h = harness();
    h.fulfillment.fail_shipments(true);
    let order_id = OrderId::new();

    let err = h
        .orchestrator
        .process_order(physical_request().with_order_id(order_id))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::FulfillmentFailed { .. }));

    let order = h.orchestrator.order(order_id).await.unwrap();
    let last = order.transitions().last().unwrap();
    assert_eq!((last.from, last.to), (OrderState::Fulfilling, OrderState::Cancelled));
    assert_eq!(h.inventory.available("P1"), 10);
    assert_eq!(h.inventory.available("P2"), 10);
    assert_eq!(h.payments.refunds().len(), 1);
}

#[tokio::test]
async fn test_refund_exhaustion_escalates_and_order_stays_paid() {
    let h = harness();
    h.inventory.fail_deductions(true);
    h.payments.fail_next_refunds(10);
    let order_id = OrderId::new();

    let err = h
        .orchestrator
        .process_order(physical_request().with_order_id(order_id))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::ManualInterventionRequired { .. }));
    assert!(!err.is_recoverable());

    let order = h.orchestrator.order(order_id).await.unwrap();
    assert_eq!(order.state(), OrderState::Paid);
    assert_eq!(order.inventory(), InventoryHold::None);
    assert_eq!(h.inventory.reserved("P1"), 0);
    assert_eq!(h.payments.refund_attempts(), 3);

    let queued = h.orchestrator.interventions().for_order(order_id);
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].kind, InterventionKind::Refund);
    assert_eq!(queued[0].attempts, 3);
}

#[tokio::test]
async fn test_cancel_retried_after_refund_failure_refunds_once() {
    let h = harness();
    h.inventory.fail_deductions(true);
    h.payments.reject_refunds(true);
    let order_id = OrderId::new();

    // Escalated compensation leaves a Paid order behind
    let _ = h
        .orchestrator
        .process_order(physical_request().with_order_id(order_id))
        .await;

    let err = h
        .orchestrator
        .cancel_order(order_id, "customer request")
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::RefundFailed { .. }));
    let unchanged = h.orchestrator.order(order_id).await.unwrap();
    assert_eq!(unchanged.state(), OrderState::Paid);

    h.payments.reject_refunds(false);
    h.orchestrator.cancel_order(order_id, "customer request").await.unwrap();
    h.orchestrator.cancel_order(order_id, "customer request").await.unwrap();

    let order = h.orchestrator.order(order_id).await.unwrap();
    assert_eq!(order.state(), OrderState::Cancelled);
    assert_eq!(h.payments.refunds().len(), 1);
}

#[tokio::test]
async fn test_cancel_unpaid_order_twice() {
    let h = harness();
    h.payments.decline_charges(true);
    let order_id = OrderId::new();
    let _ = h
        .orchestrator
        .process_order(physical_request().with_order_id(order_id))
        .await;

    h.orchestrator.cancel_order(order_id, "changed mind").await.unwrap();
    let first = h.orchestrator.order(order_id).await.unwrap();
    h.orchestrator.cancel_order(order_id, "changed mind").await.unwrap();
    let second = h.orchestrator.order(order_id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.state(), OrderState::Cancelled);
    assert_eq!(h.payments.refund_attempts(), 0);
}

#[tokio::test]
async fn test_cancel_shipped_order_is_refused() {
    let h = harness();
    let order_id = h.orchestrator.process_order(physical_request()).await.unwrap();
    let before = h.orchestrator.order(order_id).await.unwrap();

    let err = h.orchestrator.cancel_order(order_id, "too late").await.unwrap_err();

    assert_eq!(
        err,
        OrderError::NotCancellable {
            order_id,
            state: OrderState::Shipped
        }
    );
    assert_eq!(h.orchestrator.order(order_id).await.unwrap(), before);
    assert_eq!(h.payments.refund_attempts(), 0);
}

#[tokio::test]
async fn test_cancel_unknown_order() {
    let h = harness();
    let missing = OrderId::new();
    assert_eq!(
        h.orchestrator.cancel_order(missing, "??").await,
        Err(OrderError::OrderNotFound(missing))
    );
}

#[tokio::test]
async fn test_delivery_then_return_refunds_and_restocks() {
    let h = harness();
    let order_id = h.orchestrator.process_order(physical_request()).await.unwrap();

    h.orchestrator.confirm_delivery(order_id).await.unwrap();
    assert_eq!(
        h.orchestrator.order(order_id).await.unwrap().state(),
        OrderState::Delivered
    );
    assert!(matches!(
        h.orchestrator.confirm_delivery(order_id).await,
        Err(OrderError::IllegalTransition(_))
    ));

    h.orchestrator.return_order(order_id, "wrong size").await.unwrap();
    let order = h.orchestrator.order(order_id).await.unwrap();
    assert_eq!(order.state(), OrderState::Returned);
    assert!(order.state().is_terminal());
    assert_eq!(h.payments.refunds().len(), 1);
    assert_eq!(h.inventory.available("P1"), 10);

    h.orchestrator.flush_notifications().await;
    assert!(h
        .notifications
        .sent()
        .iter()
        .any(|n| n.kind == NotificationKind::OrderReturned));
}

#[tokio::test]
async fn test_return_with_failed_refund_leaves_order_shipped() {
    let h = harness();
    let order_id = h.orchestrator.process_order(physical_request()).await.unwrap();
    h.payments.reject_refunds(true);

    let err = h.orchestrator.return_order(order_id, "broken").await.unwrap_err();

    assert!(matches!(err, OrderError::RefundFailed { .. }));
    assert_eq!(
        h.orchestrator.order(order_id).await.unwrap().state(),
        OrderState::Shipped
    );
}

#[tokio::test]
async fn test_return_of_created_order_is_illegal() {
    let h = harness();
    h.payments.decline_charges(true);
    let order_id = OrderId::new();
    let _ = h
        .orchestrator
        .process_order(physical_request().with_order_id(order_id))
        .await;

    assert!(matches!(
        h.orchestrator.return_order(order_id, "never paid").await,
        Err(OrderError::IllegalTransition(_))
    ));
}

#[tokio::test]
async fn test_cancel_waits_for_in_flight_processing() {
    let h = harness();
    h.inventory.set_deduct_latency(Duration::from_millis(50));
    let order_id = OrderId::new();

    let processing = {
        let orchestrator = h.orchestrator.clone();
        let request = physical_request().with_order_id(order_id);
        tokio::spawn(async move { orchestrator.process_order(request).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let cancel = h.orchestrator.cancel_order(order_id, "hurry").await;

    assert_eq!(processing.await.unwrap(), Ok(order_id));
    assert_eq!(
        cancel,
        Err(OrderError::NotCancellable {
            order_id,
            state: OrderState::Shipped
        })
    );
    assert_eq!(h.payments.refund_attempts(), 0);
}

#[tokio::test]
async fn test_caller_timeout_does_not_interrupt_lifecycle() {
    let h = harness();
    h.inventory.set_deduct_latency(Duration::from_millis(50));
    let order_id = OrderId::new();

    let timed_out = tokio::time::timeout(
        Duration::from_millis(5),
        h.orchestrator
            .process_order(physical_request().with_order_id(order_id)),
    )
    .await;
    assert!(timed_out.is_err());

    // Blocks on the order's slot until the detached run finishes
    let order = h.orchestrator.order(order_id).await.unwrap();
    assert_eq!(order.state(), OrderState::Shipped);
    assert_eq!(h.inventory.reserved("P1"), 0);
}

#[tokio::test]
async fn test_notification_failure_does_not_affect_result() {
    let h = harness();
    h.notifications.fail_next(100);

    let order_id = h.orchestrator.process_order(physical_request()).await.unwrap();
    h.orchestrator.flush_notifications().await;

    assert_eq!(
        h.orchestrator.order(order_id).await.unwrap().state(),
        OrderState::Shipped
    );
    assert!(h.notifications.sent().is_empty());

    let parked = h.orchestrator.interventions().for_order(order_id);
    assert_eq!(parked.len(), 2);
    assert!(parked.iter().all(|e| e.kind == InterventionKind::Notification));
}

#[tokio::test]
async fn test_undo_and_rollback_through_orchestrator() {
    let h = harness();
    let order_id = h.orchestrator.process_order(physical_request()).await.unwrap();
    assert_eq!(h.orchestrator.history(order_id).await.len(), 4);

    let restored = h.orchestrator.undo(order_id).await.unwrap();
    assert_eq!(restored.state, OrderState::Fulfilling);
    let order = h.orchestrator.order(order_id).await.unwrap();
    assert_eq!(order.state(), OrderState::Fulfilling);
    assert!(order.fulfillment_ref().is_none());
    assert!(order.transitions().last().unwrap().trigger.is_administrative());

    let err = h.orchestrator.rollback(order_id, 10).await.unwrap_err();
    assert!(matches!(err, OrderError::VersionOutOfRange { requested: 10, .. }));

    let first = h.orchestrator.rollback(order_id, 2).await.unwrap();
    assert_eq!(first.version, 1);
    assert_eq!(h.orchestrator.history(order_id).await.len(), 1);
    assert!(matches!(
        h.orchestrator.undo(order_id).await,
        Err(OrderError::NothingToUndo { .. })
    ));
}

#[tokio::test]
async fn test_preview_price_has_no_side_effects() {
    let h = harness();
    let order_id = OrderId::new();

    let quote = h
        .orchestrator
        .preview_price(&physical_request().with_order_id(order_id));

    assert_eq!(quote.base_amount, Decimal::from(250));
    assert_eq!(quote.final_amount, Decimal::new(20750, 2));
    assert!(h.orchestrator.order(order_id).await.is_none());
    assert!(h.payments.charges().is_empty());
}

#[tokio::test]
async fn test_payment_circuit_opens_after_repeated_outages() {
    let h = harness_with(EngineConfig {
        payment_breaker: CircuitBreakerConfig {
            failure_threshold: 2,
            open_timeout: Duration::from_secs(60),
            success_threshold: 1,
        },
        ..test_config()
    });
    h.payments.fail_next_charges(10);

    for _ in 0..2 {
        let err = h.orchestrator.process_order(virtual_request()).await.unwrap_err();
        assert!(matches!(err, OrderError::PaymentFailed { .. }));
    }
    assert_eq!(h.orchestrator.payment_circuit_state(), CircuitState::Open);

    match h.orchestrator.process_order(virtual_request()).await {
        Err(OrderError::PaymentFailed { reason, .. }) => assert!(reason.contains("is open")),
        other => panic!("expected open circuit, got {:?}", other),
    }
}
