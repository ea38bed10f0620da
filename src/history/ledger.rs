use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use super::snapshot::Snapshot;
use crate::domain::order::{Order, OrderError, OrderId, TransitionRecord, TransitionTrigger};

// ============================================================================
// History Ledger
// ============================================================================
//
// Append-only per-order snapshot log. `undo` pops one snapshot and restores
// the one below it; `rollback_to_version` discards everything after the
// target. Restores are administrative: they bypass the state machine, stamp
// `updated_at` and append an AdministrativeRestore record when the state
// changes.
//
// ============================================================================

pub const DEFAULT_HISTORY_CAP: usize = 50;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HistoryError {
    #[error("Nothing to undo for order {order_id}")]
    NothingToUndo { order_id: OrderId },

    #[error("Order {order_id} has {available} earlier snapshots, cannot go back {requested}")]
    VersionOutOfRange {
        order_id: OrderId,
        requested: usize,
        available: usize,
    },
}

impl From<HistoryError> for OrderError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::NothingToUndo { order_id } => OrderError::NothingToUndo { order_id },
            HistoryError::VersionOutOfRange {
                order_id,
                requested,
                available,
            } => OrderError::VersionOutOfRange {
                order_id,
                requested,
                available,
            },
        }
    }
}

#[derive(Default)]
struct Timeline {
    snapshots: VecDeque<Snapshot>,
    next_version: u64,
}

pub struct HistoryLedger {
    cap: usize,
    timelines: Mutex<HashMap<OrderId, Timeline>>,
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

impl HistoryLedger {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            timelines: Mutex::new(HashMap::new()),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn record(&self, order: &Order, description: impl Into<String>) -> Snapshot {
        let mut timelines = self.timelines.lock();
        let timeline = timelines.entry(order.id()).or_default();

        timeline.next_version += 1;
        let snapshot = Snapshot::capture(order, timeline.next_version, description);
        timeline.snapshots.push_back(snapshot.clone());

        while timeline.snapshots.len() > self.cap {
            if let Some(evicted) = timeline.snapshots.pop_front() {
                tracing::debug!(order_id = %order.id(), version = evicted.version, "Evicted oldest snapshot");
            }
        }

        tracing::debug!(
            order_id = %order.id(),
            version = snapshot.version,
            state = %snapshot.state,
            description = %snapshot.description,
            "Snapshot recorded"
        );
        snapshot
    }

    /// Drop the latest snapshot and restore the one before it
    pub fn undo(&self, order: &mut Order) -> Result<Snapshot, HistoryError> {
        let target = {
            let mut timelines = self.timelines.lock();
            let timeline = timelines
                .get_mut(&order.id())
                .filter(|t| t.snapshots.len() >= 2)
                .ok_or(HistoryError::NothingToUndo { order_id: order.id() })?;

            timeline.snapshots.pop_back();
            timeline
                .snapshots
                .back()
                .cloned()
                .ok_or(HistoryError::NothingToUndo { order_id: order.id() })?
        };

        restore(order, &target, "undo");
        Ok(target)
    }

    /// Restore the snapshot `versions_back` behind the latest and discard
    /// everything recorded after it
    pub fn rollback_to_version(&self, order: &mut Order, versions_back: usize) -> Result<Snapshot, HistoryError> {
        let target = {
            let mut timelines = self.timelines.lock();
            let len = timelines.get(&order.id()).map_or(0, |t| t.snapshots.len());
            if versions_back >= len {
                return Err(HistoryError::VersionOutOfRange {
                    order_id: order.id(),
                    requested: versions_back,
                    available: len.saturating_sub(1),
                });
            }

            let timeline = timelines
                .get_mut(&order.id())
                .ok_or(HistoryError::NothingToUndo { order_id: order.id() })?;
            timeline.snapshots.truncate(len - versions_back);
            timeline
                .snapshots
                .back()
                .cloned()
                .ok_or(HistoryError::NothingToUndo { order_id: order.id() })?
        };

        restore(order, &target, "rollback");
        Ok(target)
    }

    /// Oldest first
    pub fn history(&self, order_id: OrderId) -> Vec<Snapshot> {
        self.timelines
            .lock()
            .get(&order_id)
            .map(|t| t.snapshots.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn latest(&self, order_id: OrderId) -> Option<Snapshot> {
        self.timelines
            .lock()
            .get(&order_id)
            .and_then(|t| t.snapshots.back().cloned())
    }

    pub fn clear(&self, order_id: OrderId) {
        self.timelines.lock().remove(&order_id);
    }

    pub fn len(&self, order_id: OrderId) -> usize {
        self.timelines
            .lock()
            .get(&order_id)
            .map_or(0, |t| t.snapshots.len())
    }

    pub fn is_empty(&self, order_id: OrderId) -> bool {
        self.len(order_id) == 0
    }
}

fn restore(order: &mut Order, snapshot: &Snapshot, operation: &str) {
    let from = order.state();
    let now = Utc::now();

    order.state = snapshot.state;
    order.final_amount = snapshot.final_amount;
    order.adjustments = snapshot.adjustments.clone();
    order.payment_ref = snapshot.payment_ref.clone();
    order.fulfillment_ref = snapshot.fulfillment_ref.clone();
    order.inventory = snapshot.inventory;
    order.updated_at = now;

    if from != snapshot.state {
        order.transitions.push(TransitionRecord {
            from,
            to: snapshot.state,
            at: now,
            trigger: TransitionTrigger::AdministrativeRestore {
                description: format!("{} to v{}: {}", operation, snapshot.version, snapshot.description),
            },
        });
    }

    tracing::warn!(
        target: "order_lifecycle::admin",
        order_id = %order.id(),
        operation,
        version = snapshot.version,
        from = %from,
        to = %snapshot.state,
        "Administrative restore bypassed the state machine"
    );
}

// ============================================================================
// Unit Tests
// ============================================================================
