use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::LineItemError;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Monetary amount in the order currency
pub type Money = Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    pub fn new() -> Self {
        // Time-ordered ids keep ledger dumps readable
        Self(Uuid::now_v7())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payment gateway transaction reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Carrier shipment reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackingRef(pub String);

impl std::fmt::Display for TrackingRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single product line. Fields are private so a constructed item always
/// satisfies `quantity >= 1` and `unit_price >= 0`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LineItem {
    product_id: ProductId,
    unit_price: Money,
    quantity: u32,
    category: String,
    is_virtual: bool,
}

impl LineItem {
    pub fn new(
        product_id: ProductId,
        unit_price: Money,
        quantity: u32,
        category: impl Into<String>,
    ) -> Result<Self, LineItemError> {
        if quantity == 0 {
            return Err(LineItemError::ZeroQuantity(product_id));
        }
        if unit_price < Decimal::ZERO {
            return Err(LineItemError::NegativePrice {
                product_id,
                unit_price,
            });
        }
        if unit_price.checked_mul(Decimal::from(quantity)).is_none() {
            return Err(LineItemError::AmountOverflow {
                product_id,
                unit_price,
                quantity,
            });
        }

        Ok(Self {
            product_id,
            unit_price,
            quantity,
            category: category.into(),
            is_virtual: false,
        })
    }

    /// Same as [`LineItem::new`] but for goods that need no shipment
    pub fn new_virtual(
        product_id: ProductId,
        unit_price: Money,
        quantity: u32,
        category: impl Into<String>,
    ) -> Result<Self, LineItemError> {
        let mut item = Self::new(product_id, unit_price, quantity, category)?;
        item.is_virtual = true;
        Ok(item)
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// None when unit price times quantity does not fit a `Decimal`
    pub fn checked_line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }

    /// Saturates at `Decimal::MAX`; see [`LineItem::checked_line_total`]
    pub fn line_total(&self) -> Money {
        self.unit_price.saturating_mul(Decimal::from(self.quantity))
    }

    /// Total requested quantity per product, in first-seen order.
    /// Several lines may name the same product.
    pub fn demand(items: &[LineItem]) -> Vec<(ProductId, u32)> {
        let mut demand: Vec<(ProductId, u32)> = Vec::new();
        for item in items {
            match demand.iter_mut().find(|(id, _)| id == item.product_id()) {
                Some((_, quantity)) => *quantity = quantity.saturating_add(item.quantity()),
                None => demand.push((item.product_id().clone(), item.quantity())),
            }
        }
        demand
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderState {
    Created,
    Paid,
    Fulfilling,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderState {
    pub const ALL: [OrderState; 7] = [
        OrderState::Created,
        OrderState::Paid,
        OrderState::Fulfilling,
        OrderState::Shipped,
        OrderState::Delivered,
        OrderState::Cancelled,
        OrderState::Returned,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Cancelled | OrderState::Returned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Created => "created",
            OrderState::Paid => "paid",
            OrderState::Fulfilling => "fulfilling",
            OrderState::Shipped => "shipped",
            OrderState::Delivered => "delivered",
            OrderState::Cancelled => "cancelled",
            OrderState::Returned => "returned",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the engine currently holds at the inventory store for an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryHold {
    None,
    Reserved,
    Deducted,
}

impl InventoryHold {
    pub fn is_held(&self) -> bool {
        !matches!(self, InventoryHold::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentKind {
    Discount,
    Coupon,
    Surcharge,
}

/// One applied price-chain step, kept for audit and display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAdjustment {
    pub stage: String,
    pub kind: AdjustmentKind,
    /// Magnitude actually applied, always non-negative
    pub amount: Money,
    /// Percentage rate when the stage is rate based
    pub rate: Option<Decimal>,
    pub reason: String,
}

impl PriceAdjustment {
    /// Signed effect on the running amount
    pub fn delta(&self) -> Money {
        match self.kind {
            AdjustmentKind::Surcharge => self.amount,
            AdjustmentKind::Discount | AdjustmentKind::Coupon => -self.amount,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
