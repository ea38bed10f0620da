use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::stages::{
    Coupon, CouponDiscount, FirstOrderIncentive, FullReduction, MembershipDiscount, ReductionTier,
};
use crate::domain::customer::{CustomerProfile, CustomerTier};
use crate::domain::order::{Money, Order, PriceAdjustment};

// ============================================================================
// Price Chain
// ============================================================================
//
// An explicit, ordered list of stages. Order matters because every stage
// sees the amount left by the previous one. The chain performs no I/O and
// takes the evaluation time from the context, so it is deterministic and
// safe to call for previews.
//
// ============================================================================

/// Per-order inputs to pricing
#[derive(Debug, Clone)]
pub struct PricingContext {
    pub customer: CustomerProfile,
    pub coupon: Option<Coupon>,
    /// Time used for expiry checks
    pub now: DateTime<Utc>,
}

impl PricingContext {
    pub fn new(customer: CustomerProfile, coupon: Option<Coupon>, now: DateTime<Utc>) -> Self {
        Self { customer, coupon, now }
    }
}

pub trait PriceStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, running: Money, order: &Order, ctx: &PricingContext) -> (Money, Option<PriceAdjustment>);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub base_amount: Money,
    pub final_amount: Money,
    pub adjustments: Vec<PriceAdjustment>,
}

impl PriceQuote {
    pub fn total_discount(&self) -> Money {
        self.base_amount - self.final_amount
    }
}

/// Promotion settings the standard chain is built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingPolicy {
    pub membership_rates: HashMap<CustomerTier, Decimal>,
    pub full_reduction_tiers: Vec<ReductionTier>,
    pub first_order_incentive: Option<Money>,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        let membership_rates = HashMap::from([
            (CustomerTier::Bronze, Decimal::ZERO),
            (CustomerTier::Silver, Decimal::new(2, 2)),
            (CustomerTier::Gold, Decimal::new(5, 2)),
            (CustomerTier::Platinum, Decimal::new(8, 2)),
        ]);

        Self {
            membership_rates,
            full_reduction_tiers: vec![
                ReductionTier {
                    threshold: Decimal::from(300),
                    reduction: Decimal::from(30),
                },
                ReductionTier {
                    threshold: Decimal::from(500),
                    reduction: Decimal::from(60),
                },
                ReductionTier {
                    threshold: Decimal::from(1000),
                    reduction: Decimal::from(150),
                },
            ],
            first_order_incentive: Some(Decimal::from(10)),
        }
    }
}

#[derive(Clone)]
pub struct PriceChain {
    stages: Vec<Arc<dyn PriceStage>>,
}

impl PriceChain {
    pub fn new(stages: Vec<Arc<dyn PriceStage>>) -> Self {
        Self { stages }
    }

    /// membership -> coupon -> full reduction -> first order
    pub fn standard(policy: &PricingPolicy) -> Self {
        let mut stages: Vec<Arc<dyn PriceStage>> = vec![
            Arc::new(MembershipDiscount::new(policy.membership_rates.clone())),
            Arc::new(CouponDiscount),
            Arc::new(FullReduction::new(policy.full_reduction_tiers.clone())),
        ];
        if let Some(amount) = policy.first_order_incentive {
            stages.push(Arc::new(FirstOrderIncentive::new(amount)));
        }
        Self { stages }
    }

    pub fn with_stage(mut self, stage: Arc<dyn PriceStage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn apply(&self, order: &Order, ctx: &PricingContext) -> PriceQuote {
        let base_amount = order.base_amount();
        let mut running = base_amount;
        let mut adjustments = Vec::new();

        for stage in &self.stages {
            let (next, adjustment) = stage.apply(running, order, ctx);
            running = next.max(Decimal::ZERO);
            if let Some(adjustment) = adjustment {
                tracing::debug!(
                    order_id = %order.id(),
                    stage = stage.name(),
                    amount = %adjustment.amount,
                    running = %running,
                    "Price adjustment applied"
                );
                adjustments.push(adjustment);
            }
        }

        PriceQuote {
            base_amount,
            final_amount: running.max(Decimal::ZERO),
            adjustments,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
