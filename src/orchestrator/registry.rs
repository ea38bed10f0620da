use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::order::{Order, OrderId};

pub type OrderSlot = Arc<Mutex<Option<Order>>>;
pub type SlotGuard = OwnedMutexGuard<Option<Order>>;

/// Live orders, one async mutex per order id.
///
/// An empty slot belongs to an order that is being admitted or was rejected.
#[derive(Default)]
pub struct OrderRegistry {
    slots: DashMap<OrderId, OrderSlot>,
}

impl OrderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the slot for `order_id`, creating it if needed
    pub async fn lock_or_create(&self, order_id: OrderId) -> SlotGuard {
        let slot = self.slots.entry(order_id).or_default().clone();
        slot.lock_owned().await
    }

    /// Lock the slot of a registered order; None for ids never seen or
    /// never admitted. A vacant slot found here is dropped on the way out.
    pub async fn lock_existing(&self, order_id: OrderId) -> Option<SlotGuard> {
        let slot = self.slots.get(&order_id).map(|s| s.value().clone())?;
        let guard = slot.lock_owned().await;
        if guard.is_none() {
            self.discard_vacant(order_id, &guard);
            return None;
        }
        Some(guard)
    }

    /// Drop the slot of a rejected order. The caller must hold the slot's
    /// guard; the slot is kept if another task is already waiting on it.
    pub fn discard_vacant(&self, order_id: OrderId, guard: &SlotGuard) {
        if guard.is_some() {
            return;
        }
        // One reference in the map, one in the caller's guard
        self.slots
            .remove_if(&order_id, |_, slot| Arc::strong_count(slot) <= 2);
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.slots.contains_key(&order_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
