use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use super::interventions::{InterventionKind, InterventionQueue};
use super::notifier::Notifier;
use super::registry::OrderRegistry;
use super::request::OrderRequest;
use crate::collaborators::{CollaboratorError, Collaborators, NotificationKind};
use crate::domain::customer::CustomerTier;
use crate::domain::order::{
    InventoryHold, LineItem, Order, OrderError, OrderId, OrderState, OrderStateMachine,
    TrackingRef, TransitionError, TransitionRecord, TransitionTrigger,
};
use crate::history::{HistoryLedger, Snapshot};
use crate::metrics::Metrics;
use crate::pricing::{PriceChain, PriceQuote, PricingContext};
use crate::utils::{
    retry_on_transient, CircuitBreaker, CircuitBreakerError, CircuitState, RetryConfig, RetryResult,
};
use crate::validation::ValidationPipeline;

// ============================================================================
// Orchestrator
// ============================================================================
//
// Drives one order at a time through:
//   validate -> price -> charge -> Paid -> reserve/deduct -> Fulfilling
//   -> create shipment -> Shipped (or Paid -> Delivered for virtual goods)
//
// Every public operation holds the order's slot for its whole duration and
// runs on a spawned task, so a caller that stops waiting cannot leave an
// order half-processed. Collaborator failures after payment are
// compensated: stock is released, the charge is refunded and the order is
// cancelled. A refund that cannot be completed is escalated to the
// intervention queue instead.
//
// ============================================================================

pub(crate) struct Inner {
    pub(crate) collaborators: Collaborators,
    pub(crate) state_machine: OrderStateMachine,
    pub(crate) pipeline: ValidationPipeline,
    pub(crate) tier_pipelines: HashMap<CustomerTier, ValidationPipeline>,
    pub(crate) pricing: PriceChain,
    pub(crate) ledger: HistoryLedger,
    pub(crate) registry: OrderRegistry,
    pub(crate) payment_breaker: CircuitBreaker,
    pub(crate) notifier: Notifier,
    pub(crate) interventions: Arc<InterventionQueue>,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) refund_retry: RetryConfig,
    pub(crate) release_retry: RetryConfig,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

/// Run `work` on its own task so dropping the caller's future can't cut it short
async fn detached<T, F>(work: F) -> Result<T, OrderError>
where
    F: Future<Output = Result<T, OrderError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| OrderError::Aborted(format!("lifecycle task failed: {}", e)))?
}

impl Orchestrator {
    pub(crate) fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub async fn process_order(&self, request: OrderRequest) -> Result<OrderId, OrderError> {
        let inner = self.inner.clone();
        detached(async move {
            let started = Instant::now();
            let result = inner.process(request).await;
            let outcome = match &result {
                Ok(_) => "completed",
                Err(e) => e.kind(),
            };
            inner
                .metrics
                .record_order_outcome(outcome, started.elapsed().as_secs_f64());
            result
        })
        .await
    }

    pub async fn cancel_order(&self, order_id: OrderId, reason: impl Into<String>) -> Result<(), OrderError> {
        let inner = self.inner.clone();
        let reason = reason.into();
        detached(async move { inner.cancel(order_id, reason).await }).await
    }

    /// Carrier reported the parcel delivered: `Shipped -> Delivered`
    pub async fn confirm_delivery(&self, order_id: OrderId) -> Result<(), OrderError> {
        let inner = self.inner.clone();
        detached(async move { inner.confirm_delivery(order_id).await }).await
    }

    pub async fn return_order(&self, order_id: OrderId, reason: impl Into<String>) -> Result<(), OrderError> {
        let inner = self.inner.clone();
        let reason = reason.into();
        detached(async move { inner.return_order(order_id, reason).await }).await
    }

    /// Price a request without registering or charging anything
    pub fn preview_price(&self, request: &OrderRequest) -> PriceQuote {
        let order = request.to_order(request.order_id.unwrap_or_default());
        let ctx = PricingContext::new(request.customer.clone(), request.coupon.clone(), Utc::now());
        self.inner.pricing.apply(&order, &ctx)
    }

    /// Copy of the order as of the end of its last operation
    pub async fn order(&self, order_id: OrderId) -> Option<Order> {
        let guard = self.inner.registry.lock_existing(order_id).await?;
        guard.clone()
    }

    pub async fn history(&self, order_id: OrderId) -> Vec<Snapshot> {
        let _guard = self.inner.registry.lock_existing(order_id).await;
        self.inner.ledger.history(order_id)
    }

    /// Administrative: restore the snapshot before the latest one
    pub async fn undo(&self, order_id: OrderId) -> Result<Snapshot, OrderError> {
        let mut guard = self
            .inner
            .registry
            .lock_existing(order_id)
            .await
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let Some(order) = &mut *guard else {
            return Err(OrderError::OrderNotFound(order_id));
        };
        Ok(self.inner.ledger.undo(order)?)
    }

    /// Administrative: restore the snapshot `versions_back` behind the latest
    /// and drop everything after it
    pub async fn rollback(&self, order_id: OrderId, versions_back: usize) -> Result<Snapshot, OrderError> {
        let mut guard = self
            .inner
            .registry
            .lock_existing(order_id)
            .await
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let Some(order) = &mut *guard else {
            return Err(OrderError::OrderNotFound(order_id));
        };
        Ok(self.inner.ledger.rollback_to_version(order, versions_back)?)
    }

    pub fn interventions(&self) -> &InterventionQueue {
        &self.inner.interventions
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn payment_circuit_state(&self) -> CircuitState {
        self.inner.payment_breaker.state()
    }

    pub fn validation_stages(&self, tier: CustomerTier) -> Vec<&'static str> {
        self.inner.pipeline_for(tier).stage_names()
    }

    /// Wait until every notification dispatched so far has been delivered or parked
    pub async fn flush_notifications(&self) {
        self.inner.notifier.flush().await;
    }
}

impl Inner {
    fn pipeline_for(&self, tier: CustomerTier) -> &ValidationPipeline {
        self.tier_pipelines.get(&tier).unwrap_or(&self.pipeline)
    }

    fn transition(
        &self,
        order: &mut Order,
        target: OrderState,
        trigger: TransitionTrigger,
    ) -> Result<TransitionRecord, TransitionError> {
        let record = self.state_machine.attempt_transition(order, target, trigger)?;
        self.metrics
            .record_transition(record.from.as_str(), record.to.as_str());
        Ok(record)
    }

    fn notify(&self, order: &Order, kind: NotificationKind, details: serde_json::Value) {
        let mut payload = json!({
            "order_id": order.id().to_string(),
            "state": order.state().as_str(),
            "amount": order.final_amount().to_string(),
        });
        if let (Some(map), serde_json::Value::Object(details)) = (payload.as_object_mut(), details) {
            map.extend(details);
        }
        self.notifier.dispatch(order.id(), order.user_id(), kind, payload);
    }

    // ------------------------------------------------------------------------
    // process_order
    // ------------------------------------------------------------------------

    async fn process(self: &Arc<Self>, request: OrderRequest) -> Result<OrderId, OrderError> {
        let order_id = request.order_id.unwrap_or_default();
        let tier = request.customer.tier;
        let mut guard = self.registry.lock_or_create(order_id).await;
        let is_retry = guard.is_some();

        if let Some(existing) = &*guard {
            if existing.state() != OrderState::Created {
                tracing::warn!(order_id = %order_id, state = %existing.state(), "Order already processed");
                return Err(OrderError::AlreadyProcessed {
                    order_id,
                    state: existing.state(),
                });
            }
            tracing::info!(order_id = %order_id, "🔁 Retrying payment for existing order");
            self.validate(existing, tier).await?;
        }

        if !is_retry {
            let order = match self.admit(order_id, &request).await {
                Ok(order) => order,
                Err(e) => {
                    self.registry.discard_vacant(order_id, &guard);
                    return Err(e);
                }
            };
            self.ledger.record(&order, "order created");
            *guard = Some(order);
        }

        let Some(order) = &mut *guard else {
            return Err(OrderError::Aborted(format!("order {} missing after admission", order_id)));
        };

        self.charge(order).await?;
        self.notify(order, NotificationKind::OrderPaid, json!({}));

        // Money has been taken from here on; an aborted step must still compensate
        let worker = Arc::clone(self);
        let mut working = order.clone();
        let run = tokio::spawn(async move {
            let result = if working.is_virtual_only() {
                worker.deliver_digital(&mut working)
            } else {
                worker.fulfil(&mut working).await
            };
            (working, result)
        });
        match run.await {
            Ok((working, result)) => {
                *order = working;
                result?;
            }
            Err(e) => return Err(self.recover_aborted(order, e.to_string()).await),
        }

        tracing::info!(
            order_id = %order_id,
            state = %order.state(),
            amount = %order.final_amount(),
            "✅ Order lifecycle completed"
        );
        Ok(order_id)
    }

    /// Build, validate and price a new order. Nothing is registered here.
    async fn admit(&self, order_id: OrderId, request: &OrderRequest) -> Result<Order, OrderError> {
        let mut order = request.to_order(order_id);
        self.validate(&order, request.customer.tier).await?;

        let ctx = PricingContext::new(request.customer.clone(), request.coupon.clone(), Utc::now());
        let quote = self.pricing.apply(&order, &ctx);
        for adjustment in &quote.adjustments {
            self.metrics.record_price_adjustment(&adjustment.stage);
        }

        tracing::info!(
            order_id = %order_id,
            base = %quote.base_amount,
            total = %quote.final_amount,
            adjustments = quote.adjustments.len(),
            "💰 Order priced"
        );
        order.set_pricing(quote.final_amount, quote.adjustments);
        Ok(order)
    }

    async fn validate(&self, order: &Order, tier: CustomerTier) -> Result<(), OrderError> {
        let result = self.pipeline_for(tier).run(order).await;
        if result.success {
            return Ok(());
        }
        self.metrics.record_validation_rejection(&result.stage_name);
        Err(OrderError::ValidationFailed {
            stage: result.stage_name,
            message: result.message,
        })
    }

    async fn charge(&self, order: &mut Order) -> Result<(), OrderError> {
        let order_id = order.id();
        let amount = order.final_amount();

        let result = self
            .payment_breaker
            .call(
                self.collaborators
                    .payments
                    .charge(order_id, order.user_id(), amount, order.payment_method),
            )
            .await;
        self.metrics
            .update_payment_circuit_state(self.payment_breaker.state());

        let reason = match result {
            Ok(receipt) if receipt.success => match receipt.transaction_id {
                Some(transaction_id) => {
                    tracing::info!(order_id = %order_id, amount = %amount, tx = %transaction_id, "💳 Payment captured");
                    order.payment_ref = Some(transaction_id);
                    self.transition(order, OrderState::Paid, TransitionTrigger::PaymentCaptured)?;
                    self.ledger.record(order, "payment captured");
                    return Ok(());
                }
                None => "gateway approved the charge without a transaction id".to_string(),
            },
            Ok(receipt) => format!("declined: {}", receipt.message),
            Err(CircuitBreakerError::CircuitOpen(name)) => format!("circuit '{}' is open", name),
            Err(CircuitBreakerError::OperationFailed(e)) => e.to_string(),
        };

        tracing::warn!(order_id = %order_id, amount = %amount, reason = %reason, "Payment failed, order stays Created");
        Err(OrderError::PaymentFailed { order_id, reason })
    }

    fn deliver_digital(&self, order: &mut Order) -> Result<(), OrderError> {
        self.notify(order, NotificationKind::OrderDelivered, json!({ "delivery": "digital" }));
        self.transition(order, OrderState::Delivered, TransitionTrigger::DigitalDelivery)?;
        self.ledger.record(order, "digital delivery");
        Ok(())
    }

    async fn fulfil(&self, order: &mut Order) -> Result<(), OrderError> {
        let items = order.physical_items();

        if let Err(cause) = self.secure_stock(order, &items).await {
            return Err(self.compensate(order, &items, cause).await);
        }

        if let Err(e) = self.transition(order, OrderState::Fulfilling, TransitionTrigger::FulfillmentStarted) {
            return Err(self.compensate(order, &items, e.to_string()).await);
        }
        self.ledger.record(order, "fulfillment started");

        let Some(destination) = order.shipping_address.clone() else {
            return Err(self
                .compensate(order, &items, "no shipping address".to_string())
                .await);
        };

        let tracking = match self
            .collaborators
            .fulfillment
            .create_shipment(order.id(), &destination, &items)
            .await
        {
            Ok(tracking) => tracking,
            Err(e) => {
                return Err(self
                    .compensate(order, &items, format!("shipment creation failed: {}", e))
                    .await);
            }
        };

        order.fulfillment_ref = Some(tracking.clone());
        if let Err(e) = self.transition(order, OrderState::Shipped, TransitionTrigger::ShipmentCreated) {
            self.cancel_shipment(order, &tracking).await;
            return Err(self.compensate(order, &items, e.to_string()).await);
        }
        self.ledger.record(order, "shipped");

        tracing::info!(order_id = %order.id(), tracking = %tracking, "📦 Shipment created");
        self.notify(
            order,
            NotificationKind::OrderShipped,
            json!({ "tracking_ref": tracking.to_string() }),
        );
        Ok(())
    }

    /// Reserve then deduct. The error is the compensation cause.
    async fn secure_stock(&self, order: &mut Order, items: &[LineItem]) -> Result<(), String> {
        match self.collaborators.inventory.reserve(items).await {
            Ok(true) => {
                order.inventory = InventoryHold::Reserved;
                order.touch();
            }
            Ok(false) => return Err("stock no longer available at reservation".to_string()),
            Err(e) => return Err(format!("reservation failed: {}", e)),
        }

        match self.collaborators.inventory.deduct(items).await {
            Ok(()) => {
                order.inventory = InventoryHold::Deducted;
                order.touch();
                Ok(())
            }
            Err(e) => Err(format!("deduction failed: {}", e)),
        }
    }

    // ------------------------------------------------------------------------
    // Compensation
    // ------------------------------------------------------------------------

    async fn compensate(&self, order: &mut Order, items: &[LineItem], cause: String) -> OrderError {
        let order_id = order.id();
        tracing::warn!(
            order_id = %order_id,
            state = %order.state(),
            inventory = ?order.inventory(),
            cause = %cause,
            "⚠️ Compensating failed fulfillment"
        );

        if order.inventory().is_held() {
            self.release_stock(order, items).await;
        }

        match self.refund(order).await {
            RetryResult::Success { .. } => {
                let trigger = TransitionTrigger::Compensation { cause: cause.clone() };
                if let Err(e) = self.transition(order, OrderState::Cancelled, trigger) {
                    self.metrics.record_compensation("failed");
                    return e.into();
                }
                self.ledger.record(order, format!("compensated: {}", cause));
                self.metrics.record_compensation("refunded");
                self.notify(order, NotificationKind::OrderCancelled, json!({ "reason": cause.clone() }));
                OrderError::FulfillmentFailed { order_id, reason: cause }
            }
            RetryResult::Exhausted { error, attempts } | RetryResult::Permanent { error, attempts } => {
                self.metrics.record_compensation("escalated");
                self.escalate_refund(order, &cause, &error, attempts);
                OrderError::ManualInterventionRequired {
                    order_id,
                    reason: format!("refund after '{}' failed: {}", cause, error),
                }
            }
        }
    }

    /// The post-payment task died. The stock it touched is unknown, so the
    /// hold is handed to an operator while the charge is compensated as usual.
    async fn recover_aborted(&self, order: &mut Order, panic: String) -> OrderError {
        tracing::error!(order_id = %order.id(), error = %panic, "💥 Post-payment task aborted");
        let items = order.physical_items();
        if !items.is_empty() {
            self.metrics
                .record_intervention(InterventionKind::InventoryRelease.as_str());
            self.interventions.push(
                order.id(),
                InterventionKind::InventoryRelease,
                json!({ "items": items, "hold": "unknown" }),
                format!("fulfillment aborted: {}", panic),
                0,
            );
        }
        self.compensate(order, &items, format!("fulfillment aborted: {}", panic))
            .await
    }

    fn escalate_refund(&self, order: &Order, cause: &str, error: &CollaboratorError, attempts: u32) {
        self.metrics.record_intervention(InterventionKind::Refund.as_str());
        self.interventions.push(
            order.id(),
            InterventionKind::Refund,
            json!({
                "transaction_id": order.payment_ref().map(|tx| tx.to_string()),
                "amount": order.final_amount().to_string(),
                "cause": cause,
            }),
            error.to_string(),
            attempts,
        );
    }

    /// Refund the captured charge, if any, under the refund retry policy
    async fn refund(&self, order: &Order) -> RetryResult<(), CollaboratorError> {
        let Some(transaction_id) = order.payment_ref().cloned() else {
            return RetryResult::Success { value: (), attempts: 0 };
        };
        let amount = order.final_amount();
        let payments = self.collaborators.payments.clone();
        let metrics = self.metrics.clone();

        let outcome = retry_on_transient(&self.refund_retry, "refund", move |attempt| {
            metrics.record_retry_attempt("refund", attempt);
            let payments = payments.clone();
            let transaction_id = transaction_id.clone();
            async move { payments.refund(&transaction_id, amount).await }
        })
        .await;

        if let RetryResult::Success { attempts, .. } = &outcome {
            tracing::info!(order_id = %order.id(), amount = %amount, attempts, "💸 Refund issued");
        }
        outcome
    }

    /// Refund ahead of a customer-initiated transition. Failure leaves the
    /// order untouched.
    async fn refund_first(&self, order: &Order) -> Result<(), OrderError> {
        match self.refund(order).await {
            RetryResult::Success { .. } => Ok(()),
            RetryResult::Exhausted { error, attempts } | RetryResult::Permanent { error, attempts } => {
                tracing::error!(order_id = %order.id(), error = %error, attempts, "Refund failed, order left unchanged");
                Err(OrderError::RefundFailed {
                    order_id: order.id(),
                    reason: format!("{} after {} attempts", error, attempts),
                })
            }
        }
    }

    async fn release_stock(&self, order: &mut Order, items: &[LineItem]) {
        if items.is_empty() {
            order.inventory = InventoryHold::None;
            return;
        }

        let inventory = self.collaborators.inventory.clone();
        let metrics = self.metrics.clone();
        let lines = items.to_vec();

        let outcome = retry_on_transient(&self.release_retry, "inventory_release", move |attempt| {
            metrics.record_retry_attempt("inventory_release", attempt);
            let inventory = inventory.clone();
            let lines = lines.clone();
            async move { inventory.release(&lines).await }
        })
        .await;

        match outcome {
            RetryResult::Success { .. } => {
                tracing::info!(order_id = %order.id(), lines = items.len(), "Stock released");
                order.inventory = InventoryHold::None;
                order.touch();
            }
            RetryResult::Exhausted { error, attempts } | RetryResult::Permanent { error, attempts } => {
                self.metrics
                    .record_intervention(InterventionKind::InventoryRelease.as_str());
                self.interventions.push(
                    order.id(),
                    InterventionKind::InventoryRelease,
                    json!({ "items": items, "hold": format!("{:?}", order.inventory()) }),
                    error.to_string(),
                    attempts,
                );
            }
        }
    }

    async fn cancel_shipment(&self, order: &mut Order, tracking: &TrackingRef) {
        match self.collaborators.fulfillment.cancel_shipment(tracking).await {
            Ok(()) => {
                order.fulfillment_ref = None;
                order.touch();
            }
            Err(e) => {
                self.metrics
                    .record_intervention(InterventionKind::ShipmentCancellation.as_str());
                self.interventions.push(
                    order.id(),
                    InterventionKind::ShipmentCancellation,
                    json!({ "tracking_ref": tracking.to_string() }),
                    e.to_string(),
                    1,
                );
            }
        }
    }

    // ------------------------------------------------------------------------
    // Post-processing operations
    // ------------------------------------------------------------------------

    async fn cancel(&self, order_id: OrderId, reason: String) -> Result<(), OrderError> {
        let mut guard = self
            .registry
            .lock_existing(order_id)
            .await
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let Some(order) = &mut *guard else {
            return Err(OrderError::OrderNotFound(order_id));
        };

        if order.state() == OrderState::Cancelled {
            tracing::info!(order_id = %order_id, "Order already cancelled, nothing to do");
            return Ok(());
        }
        if !OrderStateMachine::can_transition(order, OrderState::Cancelled) {
            tracing::warn!(order_id = %order_id, state = %order.state(), "Cancellation refused");
            return Err(OrderError::NotCancellable {
                order_id,
                state: order.state(),
            });
        }

        self.refund_first(order).await?;

        self.transition(
            order,
            OrderState::Cancelled,
            TransitionTrigger::CustomerCancelled { reason: reason.clone() },
        )?;
        if order.inventory().is_held() {
            let items = order.physical_items();
            self.release_stock(order, &items).await;
        }
        self.ledger.record(order, format!("cancelled: {}", reason));

        tracing::info!(order_id = %order_id, reason = %reason, "🛑 Order cancelled");
        self.notify(order, NotificationKind::OrderCancelled, json!({ "reason": reason }));
        Ok(())
    }

    async fn confirm_delivery(&self, order_id: OrderId) -> Result<(), OrderError> {
        let mut guard = self
            .registry
            .lock_existing(order_id)
            .await
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let Some(order) = &mut *guard else {
            return Err(OrderError::OrderNotFound(order_id));
        };

        self.transition(order, OrderState::Delivered, TransitionTrigger::DeliveryConfirmed)?;
        self.ledger.record(order, "delivery confirmed");
        self.notify(order, NotificationKind::OrderDelivered, json!({ "delivery": "carrier" }));
        Ok(())
    }

    async fn return_order(&self, order_id: OrderId, reason: String) -> Result<(), OrderError> {
        let mut guard = self
            .registry
            .lock_existing(order_id)
            .await
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let Some(order) = &mut *guard else {
            return Err(OrderError::OrderNotFound(order_id));
        };

        if !OrderStateMachine::can_transition(order, OrderState::Returned) {
            tracing::error!(order_id = %order_id, state = %order.state(), "Return refused");
            return Err(TransitionError {
                order_id,
                from: order.state(),
                to: OrderState::Returned,
            }
            .into());
        }

        self.refund_first(order).await?;

        self.transition(
            order,
            OrderState::Returned,
            TransitionTrigger::ReturnAccepted { reason: reason.clone() },
        )?;
        if order.inventory().is_held() {
            let items = order.physical_items();
            self.release_stock(order, &items).await;
        }
        self.ledger.record(order, format!("returned: {}", reason));

        tracing::info!(order_id = %order_id, reason = %reason, "↩️ Order returned");
        self.notify(order, NotificationKind::OrderReturned, json!({ "reason": reason }));
        Ok(())
    }
}
