use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::OrderState;

// ============================================================================
// Order Transition Records - append-only lifecycle log
// ============================================================================

/// Why an order moved between states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TransitionTrigger {
    PaymentCaptured,
    FulfillmentStarted,
    ShipmentCreated,
    DigitalDelivery,
    DeliveryConfirmed,
    CustomerCancelled { reason: String },
    Compensation { cause: String },
    ReturnAccepted { reason: String },
    /// Ledger restore; bypasses transition validation
    AdministrativeRestore { description: String },
}

impl TransitionTrigger {
    pub fn kind(&self) -> &'static str {
        match self {
            TransitionTrigger::PaymentCaptured => "PaymentCaptured",
            TransitionTrigger::FulfillmentStarted => "FulfillmentStarted",
            TransitionTrigger::ShipmentCreated => "ShipmentCreated",
            TransitionTrigger::DigitalDelivery => "DigitalDelivery",
            TransitionTrigger::DeliveryConfirmed => "DeliveryConfirmed",
            TransitionTrigger::CustomerCancelled { .. } => "CustomerCancelled",
            TransitionTrigger::Compensation { .. } => "Compensation",
            TransitionTrigger::ReturnAccepted { .. } => "ReturnAccepted",
            TransitionTrigger::AdministrativeRestore { .. } => "AdministrativeRestore",
        }
    }

    pub fn is_administrative(&self) -> bool {
        matches!(self, TransitionTrigger::AdministrativeRestore { .. })
    }
}

impl std::fmt::Display for TransitionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionTrigger::CustomerCancelled { reason }
            | TransitionTrigger::ReturnAccepted { reason } => {
                write!(f, "{}: {}", self.kind(), reason)
            }
            TransitionTrigger::Compensation { cause } => write!(f, "{}: {}", self.kind(), cause),
            TransitionTrigger::AdministrativeRestore { description } => {
                write!(f, "{}: {}", self.kind(), description)
            }
            _ => f.write_str(self.kind()),
        }
    }
}

/// One committed state change. Never modified after creation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TransitionRecord {
    pub from: OrderState,
    pub to: OrderState,
    pub at: DateTime<Utc>,
    pub trigger: TransitionTrigger,
}

impl TransitionRecord {
    pub fn new(from: OrderState, to: OrderState, trigger: TransitionTrigger) -> Self {
        Self {
            from,
            to,
            at: Utc::now(),
            trigger,
        }
    }
}
