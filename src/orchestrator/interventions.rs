use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::order::OrderId;

// ============================================================================
// Intervention Queue
// ============================================================================
//
// Dead-letter queue for work the engine gave up on after all retry attempts:
// - Compensating refunds
// - Inventory releases
// - Shipment cancellations
// - Notification deliveries
//
// Entries stay until an operator resolves them.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterventionKind {
    Refund,
    InventoryRelease,
    ShipmentCancellation,
    Notification,
}

impl InterventionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionKind::Refund => "refund",
            InterventionKind::InventoryRelease => "inventory_release",
            InterventionKind::ShipmentCancellation => "shipment_cancellation",
            InterventionKind::Notification => "notification",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionEntry {
    pub id: Uuid,
    pub order_id: OrderId,
    pub kind: InterventionKind,
    pub payload: serde_json::Value,
    pub error_message: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl InterventionEntry {
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterventionStats {
    pub total: usize,
    pub open: usize,
    pub by_kind: HashMap<InterventionKind, usize>,
}

#[derive(Default)]
pub struct InterventionQueue {
    entries: Mutex<Vec<InterventionEntry>>,
}

impl InterventionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &self,
        order_id: OrderId,
        kind: InterventionKind,
        payload: serde_json::Value,
        error_message: impl Into<String>,
        attempts: u32,
    ) -> Uuid {
        let entry = InterventionEntry {
            id: Uuid::new_v4(),
            order_id,
            kind,
            payload,
            error_message: error_message.into(),
            attempts,
            failed_at: Utc::now(),
            resolved_at: None,
        };

        tracing::error!(
            intervention_id = %entry.id,
            order_id = %order_id,
            kind = kind.as_str(),
            error = %entry.error_message,
            attempts,
            "💀 Escalating to manual intervention"
        );

        let id = entry.id;
        self.entries.lock().push(entry);
        id
    }

    /// Oldest first, at most `limit` entries
    pub fn list(&self, limit: usize) -> Vec<InterventionEntry> {
        self.entries.lock().iter().take(limit).cloned().collect()
    }

    pub fn open(&self) -> Vec<InterventionEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.is_open())
            .cloned()
            .collect()
    }

    pub fn for_order(&self, order_id: OrderId) -> Vec<InterventionEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> InterventionStats {
        let entries = self.entries.lock();
        let mut stats = InterventionStats {
            total: entries.len(),
            ..Default::default()
        };
        for entry in entries.iter() {
            if entry.is_open() {
                stats.open += 1;
            }
            *stats.by_kind.entry(entry.kind).or_insert(0) += 1;
        }
        stats
    }

    /// Mark an entry handled. False when the id is unknown or already resolved.
    pub fn resolve(&self, id: Uuid) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|e| e.id == id && e.is_open()) {
            Some(entry) => {
                entry.resolved_at = Some(Utc::now());
                tracing::info!(intervention_id = %id, order_id = %entry.order_id, "Intervention resolved");
                true
            }
            None => false,
        }
    }
}
