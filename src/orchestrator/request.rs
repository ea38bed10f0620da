use serde::{Deserialize, Serialize};

use crate::domain::customer::{Address, CustomerProfile, PaymentMethod};
use crate::domain::order::{LineItem, Order, OrderId};
use crate::pricing::Coupon;

/// Everything needed to place one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Supply the id of an order whose payment failed to retry it
    pub order_id: Option<OrderId>,
    pub customer: CustomerProfile,
    pub items: Vec<LineItem>,
    pub shipping_address: Option<Address>,
    pub payment_method: PaymentMethod,
    pub coupon: Option<Coupon>,
}

impl OrderRequest {
    pub fn new(customer: CustomerProfile, items: Vec<LineItem>, payment_method: PaymentMethod) -> Self {
        Self {
            order_id: None,
            customer,
            items,
            shipping_address: None,
            payment_method,
            coupon: None,
        }
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn ship_to(mut self, address: Address) -> Self {
        self.shipping_address = Some(address);
        self
    }

    pub fn with_coupon(mut self, coupon: Coupon) -> Self {
        self.coupon = Some(coupon);
        self
    }

    pub(crate) fn to_order(&self, order_id: OrderId) -> Order {
        Order::new(
            order_id,
            self.customer.user_id,
            self.items.clone(),
            self.shipping_address.clone(),
            self.payment_method,
        )
    }
}
