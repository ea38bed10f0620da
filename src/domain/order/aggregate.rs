use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::events::TransitionRecord;
use super::value_objects::{
    InventoryHold, LineItem, Money, OrderId, OrderState, PriceAdjustment, TrackingRef,
    TransactionId,
};
use crate::domain::customer::{Address, PaymentMethod, UserId};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// Identity and line items are fixed at construction. The lifecycle state is
// only written by OrderStateMachine (and by ledger restores), which is why
// `state` and `transitions` are crate-private.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    id: OrderId,
    user_id: UserId,
    items: Vec<LineItem>,

    // Lifecycle
    pub(crate) state: OrderState,
    pub(crate) transitions: Vec<TransitionRecord>,

    // Pricing
    pub(crate) final_amount: Money,
    pub(crate) adjustments: Vec<PriceAdjustment>,

    // External references
    pub(crate) payment_ref: Option<TransactionId>,
    pub(crate) fulfillment_ref: Option<TrackingRef>,
    pub(crate) inventory: InventoryHold,

    pub shipping_address: Option<Address>,
    pub payment_method: PaymentMethod,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        id: OrderId,
        user_id: UserId,
        items: Vec<LineItem>,
        shipping_address: Option<Address>,
        payment_method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        let final_amount = Self::sum_items(&items);
        Self {
            id,
            user_id,
            items,
            state: OrderState::Created,
            transitions: Vec::new(),
            final_amount,
            adjustments: Vec::new(),
            payment_ref: None,
            fulfillment_ref: None,
            inventory: InventoryHold::None,
            shipping_address,
            payment_method,
            created_at: now,
            updated_at: now,
        }
    }

    fn sum_items(items: &[LineItem]) -> Money {
        items
            .iter()
            .fold(Decimal::ZERO, |total, item| total.saturating_add(item.line_total()))
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Σ(unit_price × quantity) before any adjustment, saturating at `Decimal::MAX`
    pub fn base_amount(&self) -> Money {
        Self::sum_items(&self.items)
    }

    /// Same as [`Order::base_amount`] but None on overflow
    pub fn checked_base_amount(&self) -> Option<Money> {
        self.items.iter().try_fold(Decimal::ZERO, |total, item| {
            total.checked_add(item.checked_line_total()?)
        })
    }

    pub fn final_amount(&self) -> Money {
        self.final_amount
    }

    pub fn adjustments(&self) -> &[PriceAdjustment] {
        &self.adjustments
    }

    pub fn payment_ref(&self) -> Option<&TransactionId> {
        self.payment_ref.as_ref()
    }

    pub fn fulfillment_ref(&self) -> Option<&TrackingRef> {
        self.fulfillment_ref.as_ref()
    }

    pub fn inventory(&self) -> InventoryHold {
        self.inventory
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity())).sum()
    }

    /// True when no line needs a physical shipment
    pub fn is_virtual_only(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(LineItem::is_virtual)
    }

    pub fn physical_items(&self) -> Vec<LineItem> {
        self.items
            .iter()
            .filter(|i| !i.is_virtual())
            .cloned()
            .collect()
    }

    pub(crate) fn set_pricing(&mut self, final_amount: Money, adjustments: Vec<PriceAdjustment>) {
        self.final_amount = final_amount;
        self.adjustments = adjustments;
        self.touch();
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::ProductId;

    fn item(id: &str, price: i64, qty: u32) -> LineItem {
        LineItem::new(ProductId::new(id), Decimal::from(price), qty, "general").unwrap()
    }

    #[test]
    fn test_new_order_starts_created_with_base_total() {
        let order = Order::new(
            OrderId::new(),
            UserId::new(),
            vec![item("P1", 100, 2), item("P2", 50, 1)],
            None,
            PaymentMethod::CreditCard,
        );

        assert_eq!(order.state(), OrderState::Created);
        assert_eq!(order.base_amount(), Decimal::from(250));
        assert_eq!(order.final_amount(), Decimal::from(250));
        assert!(order.transitions().is_empty());
        assert_eq!(order.inventory(), InventoryHold::None);
        assert_eq!(order.total_quantity(), 3);
    }

    #[test]
    fn test_base_amount_saturates_instead_of_panicking() {
        let huge = LineItem::new(ProductId::new("P1"), Decimal::MAX, 1, "general").unwrap();
        let order = Order::new(
            OrderId::new(),
            UserId::new(),
            vec![huge.clone(), huge],
            None,
            PaymentMethod::CreditCard,
        );

        assert_eq!(order.base_amount(), Decimal::MAX);
        assert_eq!(order.checked_base_amount(), None);
    }

    #[test]
    fn test_virtual_only_detection() {
        let ebook =
            LineItem::new_virtual(ProductId::new("EBOOK"), Decimal::from(12), 1, "digital").unwrap();
        let virtual_order = Order::new(
            OrderId::new(),
            UserId::new(),
            vec![ebook.clone()],
            None,
            PaymentMethod::DigitalWallet,
        );
        assert!(virtual_order.is_virtual_only());
        assert!(virtual_order.physical_items().is_empty());

        let mixed = Order::new(
            OrderId::new(),
            UserId::new(),
            vec![ebook, item("P1", 10, 1)],
            None,
            PaymentMethod::DigitalWallet,
        );
        assert!(!mixed.is_virtual_only());
        assert_eq!(mixed.physical_items().len(), 1);
    }

    #[test]
    fn test_empty_order_is_not_virtual_only() {
        let order = Order::new(OrderId::new(), UserId::new(), vec![], None, PaymentMethod::CreditCard);
        assert!(!order.is_virtual_only());
    }
}
