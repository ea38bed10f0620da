use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::pipeline::{PipelineResult, ValidationStage};
use crate::collaborators::{InventoryStore, RiskScorer};
use crate::domain::customer::RiskTier;
use crate::domain::order::{LineItem, Money, Order};

// ============================================================================
// Validation Stages
// ============================================================================

/// Shape of the order itself, no collaborators involved
pub struct StructuralCheck;

#[async_trait]
impl ValidationStage for StructuralCheck {
    fn name(&self) -> &'static str {
        "structural"
    }

    async fn check(&self, order: &Order) -> PipelineResult {
        if order.items().is_empty() {
            return PipelineResult::fail(self.name(), "order has no items");
        }
        if order.user_id().is_nil() {
            return PipelineResult::fail(self.name(), "order has no user");
        }
        if !order.is_virtual_only() && order.shipping_address.is_none() {
            return PipelineResult::fail(self.name(), "physical items require a shipping address");
        }
        // LineItem constructors already enforce this; deserialized orders bypass them
        if let Some(bad) = order
            .items()
            .iter()
            .find(|i| i.quantity() == 0 || i.unit_price() < Decimal::ZERO)
        {
            return PipelineResult::fail(
                self.name(),
                format!("invalid line for product {}", bad.product_id()),
            );
        }
        if order.checked_base_amount().is_none() {
            return PipelineResult::fail(self.name(), "order total is out of range");
        }
        PipelineResult::pass(self.name())
    }
}

/// Stock check per physical product, summed across lines
pub struct InventoryAvailability {
    inventory: Arc<dyn InventoryStore>,
}

impl InventoryAvailability {
    pub fn new(inventory: Arc<dyn InventoryStore>) -> Self {
        Self { inventory }
    }
}

#[async_trait]
impl ValidationStage for InventoryAvailability {
    fn name(&self) -> &'static str {
        "inventory"
    }

    async fn check(&self, order: &Order) -> PipelineResult {
        for (product_id, quantity) in LineItem::demand(&order.physical_items()) {
            match self.inventory.check_available(&product_id, quantity).await {
                Ok(true) => {}
                Ok(false) => {
                    return PipelineResult::fail(
                        self.name(),
                        format!("insufficient stock for {} (wanted {})", product_id, quantity),
                    );
                }
                Err(e) => {
                    return PipelineResult::fail(self.name(), format!("stock check failed: {}", e));
                }
            }
        }
        PipelineResult::pass(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskRules {
    pub max_quantity_per_line: u32,
    /// Medium-risk users are rejected above this base amount
    pub medium_risk_ceiling: Money,
    /// Nobody can place an order above this base amount
    pub max_order_amount: Money,
}

impl Default for RiskRules {
    fn default() -> Self {
        Self {
            max_quantity_per_line: 100,
            medium_risk_ceiling: Decimal::from(2_000),
            max_order_amount: Decimal::from(50_000),
        }
    }
}

pub struct RiskScreening {
    risk: Arc<dyn RiskScorer>,
    rules: RiskRules,
}

impl RiskScreening {
    pub fn new(risk: Arc<dyn RiskScorer>, rules: RiskRules) -> Self {
        Self { risk, rules }
    }
}

#[async_trait]
impl ValidationStage for RiskScreening {
    fn name(&self) -> &'static str {
        "risk"
    }

    async fn check(&self, order: &Order) -> PipelineResult {
        if let Some(bulk) = order
            .items()
            .iter()
            .find(|i| i.quantity() > self.rules.max_quantity_per_line)
        {
            return PipelineResult::fail(
                self.name(),
                format!(
                    "quantity {} of {} exceeds limit {}",
                    bulk.quantity(),
                    bulk.product_id(),
                    self.rules.max_quantity_per_line
                ),
            );
        }

        let amount = order.base_amount();
        if amount > self.rules.max_order_amount {
            return PipelineResult::fail(
                self.name(),
                format!("order amount {} exceeds limit {}", amount, self.rules.max_order_amount),
            );
        }

        let tier = match self.risk.score_user(order.user_id()).await {
            Ok(tier) => tier,
            Err(e) => return PipelineResult::fail(self.name(), format!("risk scoring failed: {}", e)),
        };
        tracing::debug!(order_id = %order.id(), user_id = %order.user_id(), tier = ?tier, "User risk scored");

        match tier {
            RiskTier::High => PipelineResult::fail(self.name(), "high-risk user"),
            RiskTier::Medium if amount > self.rules.medium_risk_ceiling => PipelineResult::fail(
                self.name(),
                format!(
                    "medium-risk user above ceiling {}",
                    self.rules.medium_risk_ceiling
                ),
            ),
            _ => PipelineResult::pass(self.name()),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
