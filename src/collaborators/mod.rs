use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::customer::{Address, PaymentMethod, RiskTier, UserId};
use crate::domain::order::{LineItem, Money, OrderId, ProductId, TrackingRef, TransactionId};
use crate::utils::IsTransient;

pub mod memory;

// ============================================================================
// External Collaborators
// ============================================================================
//
// The engine consumes these contracts and never implements them for real
// backends. Every call is a suspension point and may fail; transient errors
// are eligible for retry, `Rejected` is final.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {message}")]
    Unavailable { service: &'static str, message: String },

    #[error("{service} timed out")]
    Timeout { service: &'static str },

    #[error("{service} rejected the request: {message}")]
    Rejected { service: &'static str, message: String },
}

impl CollaboratorError {
    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            message: message.into(),
        }
    }

    pub fn rejected(service: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            service,
            message: message.into(),
        }
    }
}

impl IsTransient for CollaboratorError {
    fn is_transient(&self) -> bool {
        !matches!(self, CollaboratorError::Rejected { .. })
    }
}

/// Answer to a charge request. `success == false` is a decline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeReceipt {
    pub success: bool,
    pub transaction_id: Option<TransactionId>,
    pub message: String,
}

impl ChargeReceipt {
    pub fn approved(transaction_id: TransactionId) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id),
            message: "approved".to_string(),
        }
    }

    pub fn declined(message: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_id: None,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<ChargeReceipt, CollaboratorError>;

    async fn refund(&self, transaction_id: &TransactionId, amount: Money) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn check_available(&self, product_id: &ProductId, quantity: u32) -> Result<bool, CollaboratorError>;

    /// All-or-nothing hold on the given lines
    async fn reserve(&self, items: &[LineItem]) -> Result<bool, CollaboratorError>;

    /// Return held or deducted stock
    async fn release(&self, items: &[LineItem]) -> Result<(), CollaboratorError>;

    /// Convert a reservation into a permanent stock decrement
    async fn deduct(&self, items: &[LineItem]) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait FulfillmentProvider: Send + Sync {
    async fn create_shipment(
        &self,
        order_id: OrderId,
        destination: &Address,
        items: &[LineItem],
    ) -> Result<TrackingRef, CollaboratorError>;

    async fn cancel_shipment(&self, tracking_ref: &TrackingRef) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    OrderPaid,
    OrderShipped,
    OrderDelivered,
    OrderCancelled,
    OrderReturned,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OrderPaid => "order_paid",
            NotificationKind::OrderShipped => "order_shipped",
            NotificationKind::OrderDelivered => "order_delivered",
            NotificationKind::OrderCancelled => "order_cancelled",
            NotificationKind::OrderReturned => "order_returned",
        }
    }
}

/// Best-effort delivery; the engine never waits on it for lifecycle decisions
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        user_id: UserId,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait RiskScorer: Send + Sync {
    async fn score_user(&self, user_id: UserId) -> Result<RiskTier, CollaboratorError>;
}

/// The full set of backends one engine instance talks to
#[derive(Clone)]
pub struct Collaborators {
    pub payments: Arc<dyn PaymentGateway>,
    pub inventory: Arc<dyn InventoryStore>,
    pub fulfillment: Arc<dyn FulfillmentProvider>,
    pub notifications: Arc<dyn NotificationSink>,
    pub risk: Arc<dyn RiskScorer>,
}
