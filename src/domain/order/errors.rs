use super::value_objects::{Money, OrderId, OrderState, ProductId};

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LineItemError {
    #[error("Line item {0} must have a quantity of at least 1")]
    ZeroQuantity(ProductId),

    #[error("Line item {product_id} has negative unit price {unit_price}")]
    NegativePrice { product_id: ProductId, unit_price: Money },

    #[error("Line item {product_id} total overflows: {unit_price} x {quantity}")]
    AmountOverflow {
        product_id: ProductId,
        unit_price: Money,
        quantity: u32,
    },
}

/// Rejected by the state machine. The order was left unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Illegal transition for order {order_id}: {from} -> {to}")]
pub struct TransitionError {
    pub order_id: OrderId,
    pub from: OrderState,
    pub to: OrderState,
}

/// Outcome taxonomy for every engine operation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Validation failed at stage '{stage}': {message}")]
    ValidationFailed { stage: String, message: String },

    #[error("Payment failed for order {order_id}: {reason}")]
    PaymentFailed { order_id: OrderId, reason: String },

    #[error("Fulfillment failed for order {order_id} (compensated): {reason}")]
    FulfillmentFailed { order_id: OrderId, reason: String },

    #[error(transparent)]
    IllegalTransition(#[from] TransitionError),

    #[error("Order {order_id} cannot be cancelled in state {state}")]
    NotCancellable { order_id: OrderId, state: OrderState },

    #[error("Nothing to undo for order {order_id}")]
    NothingToUndo { order_id: OrderId },

    #[error("Order {order_id} has {available} snapshots, cannot go back {requested}")]
    VersionOutOfRange {
        order_id: OrderId,
        requested: usize,
        available: usize,
    },

    #[error("Manual intervention required for order {order_id}: {reason}")]
    ManualInterventionRequired { order_id: OrderId, reason: String },

    #[error("Refund failed for order {order_id}, order left unchanged: {reason}")]
    RefundFailed { order_id: OrderId, reason: String },

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Order {order_id} was already processed (state {state})")]
    AlreadyProcessed { order_id: OrderId, state: OrderState },

    #[error("Order operation aborted: {0}")]
    Aborted(String),
}

impl OrderError {
    /// Whether the caller can act on the error without operator involvement
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            OrderError::IllegalTransition(_)
                | OrderError::ManualInterventionRequired { .. }
                | OrderError::Aborted(_)
        )
    }

    /// Stable label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::ValidationFailed { .. } => "validation_failed",
            OrderError::PaymentFailed { .. } => "payment_failed",
            OrderError::FulfillmentFailed { .. } => "fulfillment_failed",
            OrderError::IllegalTransition(_) => "illegal_transition",
            OrderError::NotCancellable { .. } => "not_cancellable",
            OrderError::NothingToUndo { .. } => "nothing_to_undo",
            OrderError::VersionOutOfRange { .. } => "version_out_of_range",
            OrderError::ManualInterventionRequired { .. } => "manual_intervention_required",
            OrderError::RefundFailed { .. } => "refund_failed",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::AlreadyProcessed { .. } => "already_processed",
            OrderError::Aborted(_) => "aborted",
        }
    }
}
