use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::order::{
    InventoryHold, Money, Order, OrderId, OrderState, PriceAdjustment, TrackingRef, TransactionId,
};

/// Immutable capture of an order's mutable fields.
///
/// Identity, line items and the transition log are not captured: the first
/// two never change and the log is append-only, restores add to it instead
/// of rewinding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub order_id: OrderId,
    /// Per-order, strictly increasing
    pub version: u64,
    pub description: String,
    pub taken_at: DateTime<Utc>,

    pub state: OrderState,
    pub final_amount: Money,
    pub adjustments: Vec<PriceAdjustment>,
    pub payment_ref: Option<TransactionId>,
    pub fulfillment_ref: Option<TrackingRef>,
    pub inventory: InventoryHold,
}

impl Snapshot {
    pub(crate) fn capture(order: &Order, version: u64, description: impl Into<String>) -> Self {
        Self {
            order_id: order.id(),
            version,
            description: description.into(),
            taken_at: Utc::now(),
            state: order.state(),
            final_amount: order.final_amount(),
            adjustments: order.adjustments().to_vec(),
            payment_ref: order.payment_ref().cloned(),
            fulfillment_ref: order.fulfillment_ref().cloned(),
            inventory: order.inventory(),
        }
    }

    /// True when the order's mutable fields equal this snapshot
    pub fn matches(&self, order: &Order) -> bool {
        self.order_id == order.id()
            && self.state == order.state()
            && self.final_amount == order.final_amount()
            && self.adjustments.as_slice() == order.adjustments()
            && self.payment_ref.as_ref() == order.payment_ref()
            && self.fulfillment_ref.as_ref() == order.fulfillment_ref()
            && self.inventory == order.inventory()
    }
}
