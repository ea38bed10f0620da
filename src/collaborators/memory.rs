use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use super::{
    ChargeReceipt, CollaboratorError, FulfillmentProvider, InventoryStore, NotificationKind,
    NotificationSink, PaymentGateway, RiskScorer,
};
use crate::domain::customer::{Address, PaymentMethod, RiskTier, UserId};
use crate::domain::order::{LineItem, Money, OrderId, ProductId, TrackingRef, TransactionId};

// ============================================================================
// In-Memory Collaborators
// ============================================================================
//
// Scriptable stand-ins for the demo binary and the test suite. Each one
// records the calls it received and can be told to fail.
//
// ============================================================================

async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

// ----------------------------------------------------------------------------
// Payments
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRecord {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub transaction_id: Option<TransactionId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefundRecord {
    pub transaction_id: TransactionId,
    pub amount: Money,
}

#[derive(Default)]
struct PaymentState {
    charges: Vec<ChargeRecord>,
    refunds: Vec<RefundRecord>,
    refund_attempts: u32,
    decline_charges: bool,
    charge_outages: u32,
    refund_outages: u32,
    refunds_rejected: bool,
    next_tx: u64,
}

#[derive(Default)]
pub struct InMemoryPaymentGateway {
    state: Mutex<PaymentState>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every following charge with a decline
    pub fn decline_charges(&self, decline: bool) {
        self.state.lock().decline_charges = decline;
    }

    /// Fail the next `n` charges with a transient outage
    pub fn fail_next_charges(&self, n: u32) {
        self.state.lock().charge_outages = n;
    }

    /// Fail the next `n` refund attempts with a transient outage
    pub fn fail_next_refunds(&self, n: u32) {
        self.state.lock().refund_outages = n;
    }

    pub fn reject_refunds(&self, reject: bool) {
        self.state.lock().refunds_rejected = reject;
    }

    pub fn charges(&self) -> Vec<ChargeRecord> {
        self.state.lock().charges.clone()
    }

    /// Refunds that went through
    pub fn refunds(&self) -> Vec<RefundRecord> {
        self.state.lock().refunds.clone()
    }

    /// Every refund call, including failed ones
    pub fn refund_attempts(&self) -> u32 {
        self.state.lock().refund_attempts
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<ChargeReceipt, CollaboratorError> {
        let mut state = self.state.lock();

        if state.charge_outages > 0 {
            state.charge_outages -= 1;
            return Err(CollaboratorError::unavailable("payments", "gateway returned 503"));
        }

        let receipt = if state.decline_charges {
            ChargeReceipt::declined("insufficient funds")
        } else {
            state.next_tx += 1;
            ChargeReceipt::approved(TransactionId(format!("tx-{:06}", state.next_tx)))
        };

        state.charges.push(ChargeRecord {
            order_id,
            user_id,
            amount,
            method,
            transaction_id: receipt.transaction_id.clone(),
        });

        Ok(receipt)
    }

    async fn refund(&self, transaction_id: &TransactionId, amount: Money) -> Result<(), CollaboratorError> {
        let mut state = self.state.lock();
        state.refund_attempts += 1;

        if state.refunds_rejected {
            return Err(CollaboratorError::rejected("payments", "refund window closed"));
        }
        if state.refund_outages > 0 {
            state.refund_outages -= 1;
            return Err(CollaboratorError::unavailable("payments", "refund endpoint returned 503"));
        }

        state.refunds.push(RefundRecord {
            transaction_id: transaction_id.clone(),
            amount,
        });
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Inventory
// ----------------------------------------------------------------------------

#[derive(Default)]
struct InventoryState {
    available: HashMap<ProductId, u32>,
    reserved: HashMap<ProductId, u32>,
    fail_reservations: bool,
    fail_deductions: bool,
    deduct_latency: Duration,
    release_calls: u32,
}

#[derive(Default)]
pub struct InMemoryInventory {
    state: Mutex<InventoryState>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stock(self, product_id: impl Into<String>, quantity: u32) -> Self {
        self.state
            .lock()
            .available
            .insert(ProductId::new(product_id), quantity);
        self
    }

    pub fn fail_reservations(&self, fail: bool) {
        self.state.lock().fail_reservations = fail;
    }

    pub fn fail_deductions(&self, fail: bool) {
        self.state.lock().fail_deductions = fail;
    }

    pub fn set_deduct_latency(&self, latency: Duration) {
        self.state.lock().deduct_latency = latency;
    }

    pub fn available(&self, product_id: &str) -> u32 {
        self.state
            .lock()
            .available
            .get(&ProductId::new(product_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn reserved(&self, product_id: &str) -> u32 {
        self.state
            .lock()
            .reserved
            .get(&ProductId::new(product_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn release_calls(&self) -> u32 {
        self.state.lock().release_calls
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventory {
    async fn check_available(&self, product_id: &ProductId, quantity: u32) -> Result<bool, CollaboratorError> {
        let state = self.state.lock();
        Ok(state.available.get(product_id).copied().unwrap_or(0) >= quantity)
    }

    async fn reserve(&self, items: &[LineItem]) -> Result<bool, CollaboratorError> {
        let mut state = self.state.lock();
        if state.fail_reservations {
            return Err(CollaboratorError::unavailable("inventory", "reservation service down"));
        }

        let demand = LineItem::demand(items);
        let enough = demand.iter().all(|(product_id, quantity)| {
            state.available.get(product_id).copied().unwrap_or(0) >= *quantity
        });
        if !enough {
            return Ok(false);
        }

        for (product_id, quantity) in demand {
            if let Some(available) = state.available.get_mut(&product_id) {
                *available = available.saturating_sub(quantity);
            }
            let reserved = state.reserved.entry(product_id).or_insert(0);
            *reserved = reserved.saturating_add(quantity);
        }
        Ok(true)
    }

    async fn release(&self, items: &[LineItem]) -> Result<(), CollaboratorError> {
        let mut state = self.state.lock();
        state.release_calls += 1;

        for (product_id, quantity) in LineItem::demand(items) {
            let reserved = state.reserved.entry(product_id.clone()).or_insert(0);
            *reserved = reserved.saturating_sub(quantity);
            let available = state.available.entry(product_id).or_insert(0);
            *available = available.saturating_add(quantity);
        }
        Ok(())
    }

    async fn deduct(&self, items: &[LineItem]) -> Result<(), CollaboratorError> {
        let latency = self.state.lock().deduct_latency;
        simulate_latency(latency).await;

        let mut state = self.state.lock();
        if state.fail_deductions {
            return Err(CollaboratorError::unavailable("inventory", "stock ledger write failed"));
        }

        let demand = LineItem::demand(items);
        for (product_id, quantity) in &demand {
            let reserved = state.reserved.get(product_id).copied().unwrap_or(0);
            if reserved < *quantity {
                return Err(CollaboratorError::rejected(
                    "inventory",
                    format!("no reservation for {}", product_id),
                ));
            }
        }
        for (product_id, quantity) in demand {
            if let Some(reserved) = state.reserved.get_mut(&product_id) {
                *reserved = reserved.saturating_sub(quantity);
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Fulfillment
// ----------------------------------------------------------------------------

#[derive(Default)]
struct FulfillmentState {
    shipments: Vec<(OrderId, TrackingRef)>,
    cancelled: Vec<TrackingRef>,
    fail_shipments: bool,
}

#[derive(Default)]
pub struct InMemoryFulfillment {
    state: Mutex<FulfillmentState>,
}

impl InMemoryFulfillment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_shipments(&self, fail: bool) {
        self.state.lock().fail_shipments = fail;
    }

    pub fn shipments(&self) -> Vec<(OrderId, TrackingRef)> {
        self.state.lock().shipments.clone()
    }

    pub fn cancelled(&self) -> Vec<TrackingRef> {
        self.state.lock().cancelled.clone()
    }
}

#[async_trait]
impl FulfillmentProvider for InMemoryFulfillment {
    async fn create_shipment(
        &self,
        order_id: OrderId,
        _destination: &Address,
        _items: &[LineItem],
    ) -> Result<TrackingRef, CollaboratorError> {
        let mut state = self.state.lock();
        if state.fail_shipments {
            return Err(CollaboratorError::unavailable("fulfillment", "carrier API unreachable"));
        }

        let tracking = TrackingRef(format!("TRK-{:04}", state.shipments.len() + 1));
        state.shipments.push((order_id, tracking.clone()));
        Ok(tracking)
    }

    async fn cancel_shipment(&self, tracking_ref: &TrackingRef) -> Result<(), CollaboratorError> {
        self.state.lock().cancelled.push(tracking_ref.clone());
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Notifications
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
}

#[derive(Default)]
struct NotificationState {
    sent: Vec<SentNotification>,
    outages: u32,
    attempts: u32,
}

#[derive(Default)]
pub struct RecordingNotificationSink {
    state: Mutex<NotificationState>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: u32) {
        self.state.lock().outages = n;
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.state.lock().sent.clone()
    }

    pub fn attempts(&self) -> u32 {
        self.state.lock().attempts
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify(
        &self,
        user_id: UserId,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<(), CollaboratorError> {
        let mut state = self.state.lock();
        state.attempts += 1;
        if state.outages > 0 {
            state.outages -= 1;
            return Err(CollaboratorError::unavailable("notifications", "SMTP relay refused"));
        }
        state.sent.push(SentNotification {
            user_id,
            kind,
            payload,
        });
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Risk
// ----------------------------------------------------------------------------

pub struct StaticRiskScorer {
    default_tier: RiskTier,
    overrides: Mutex<HashMap<UserId, RiskTier>>,
}

impl StaticRiskScorer {
    pub fn new(default_tier: RiskTier) -> Self {
        Self {
            default_tier,
            overrides: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_tier(&self, user_id: UserId, tier: RiskTier) {
        self.overrides.lock().insert(user_id, tier);
    }
}

impl Default for StaticRiskScorer {
    fn default() -> Self {
        Self::new(RiskTier::Low)
    }
}

#[async_trait]
impl RiskScorer for StaticRiskScorer {
    async fn score_user(&self, user_id: UserId) -> Result<RiskTier, CollaboratorError> {
        Ok(self
            .overrides
            .lock()
            .get(&user_id)
            .copied()
            .unwrap_or(self.default_tier))
    }
}
