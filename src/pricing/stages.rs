use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::chain::{PriceStage, PricingContext};
use crate::domain::customer::CustomerTier;
use crate::domain::order::{AdjustmentKind, Money, Order, PriceAdjustment};

// ============================================================================
// Price Stages
// ============================================================================
//
// Each stage takes the running amount and returns the new running amount
// plus the adjustment it applied, if any. Discount magnitudes are capped at
// the running amount, so no stage can push the total below zero.
//
// ============================================================================

/// Cents, half away from zero
fn money(amount: Decimal) -> Money {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn discount(
    stage: &str,
    kind: AdjustmentKind,
    running: Money,
    requested: Money,
    rate: Option<Decimal>,
    reason: String,
) -> (Money, Option<PriceAdjustment>) {
    let applied = money(requested).min(running).max(Decimal::ZERO);
    if applied.is_zero() {
        return (running, None);
    }
    (
        running - applied,
        Some(PriceAdjustment {
            stage: stage.to_string(),
            kind,
            amount: applied,
            rate,
            reason,
        }),
    )
}

/// Percentage off the running amount, rate chosen by customer tier
pub struct MembershipDiscount {
    rates: HashMap<CustomerTier, Decimal>,
}

impl MembershipDiscount {
    pub fn new(rates: HashMap<CustomerTier, Decimal>) -> Self {
        Self { rates }
    }
}

impl PriceStage for MembershipDiscount {
    fn name(&self) -> &'static str {
        "membership"
    }

    fn apply(&self, running: Money, _order: &Order, ctx: &PricingContext) -> (Money, Option<PriceAdjustment>) {
        let Some(rate) = self.rates.get(&ctx.customer.tier).copied() else {
            return (running, None);
        };
        if rate <= Decimal::ZERO {
            return (running, None);
        }
        discount(
            self.name(),
            AdjustmentKind::Discount,
            running,
            running.saturating_mul(rate),
            Some(rate),
            format!(
                "{:?} member discount {}%",
                ctx.customer.tier,
                (rate * Decimal::ONE_HUNDRED).normalize()
            ),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CouponValue {
    Fixed(Money),
    Percentage { rate: Decimal, max_cap: Option<Money> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub value: CouponValue,
    /// Running amount must reach this for the coupon to apply
    pub min_amount: Money,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Coupon {
    pub fn fixed(code: impl Into<String>, amount: Money, min_amount: Money) -> Self {
        Self {
            code: code.into(),
            value: CouponValue::Fixed(amount),
            min_amount,
            expires_at: None,
        }
    }

    pub fn percentage(code: impl Into<String>, rate: Decimal, max_cap: Option<Money>, min_amount: Money) -> Self {
        Self {
            code: code.into(),
            value: CouponValue::Percentage { rate, max_cap },
            min_amount,
            expires_at: None,
        }
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Applies the coupon carried in the pricing context. An ineligible coupon
/// contributes nothing; it is not an error.
pub struct CouponDiscount;

impl PriceStage for CouponDiscount {
    fn name(&self) -> &'static str {
        "coupon"
    }

    fn apply(&self, running: Money, _order: &Order, ctx: &PricingContext) -> (Money, Option<PriceAdjustment>) {
        let Some(coupon) = ctx.coupon.as_ref() else {
            return (running, None);
        };
        if coupon.is_expired(ctx.now) {
            tracing::debug!(code = %coupon.code, "Coupon expired, skipping");
            return (running, None);
        }
        if running < coupon.min_amount {
            tracing::debug!(
                code = %coupon.code,
                running = %running,
                min_amount = %coupon.min_amount,
                "Coupon threshold not met, skipping"
            );
            return (running, None);
        }

        let (requested, rate) = match &coupon.value {
            CouponValue::Fixed(amount) => (*amount, None),
            CouponValue::Percentage { rate, max_cap } => {
                let raw = running.saturating_mul(*rate);
                (max_cap.map_or(raw, |cap| raw.min(cap)), Some(*rate))
            }
        };

        discount(
            self.name(),
            AdjustmentKind::Coupon,
            running,
            requested,
            rate,
            format!("coupon {}", coupon.code),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionTier {
    pub threshold: Money,
    pub reduction: Money,
}

/// "Spend X, save Y": only the highest tier the running amount reaches
pub struct FullReduction {
    tiers: Vec<ReductionTier>,
}

impl FullReduction {
    pub fn new(mut tiers: Vec<ReductionTier>) -> Self {
        tiers.sort_by(|a, b| b.threshold.cmp(&a.threshold));
        Self { tiers }
    }
}

impl PriceStage for FullReduction {
    fn name(&self) -> &'static str {
        "full_reduction"
    }

    fn apply(&self, running: Money, _order: &Order, _ctx: &PricingContext) -> (Money, Option<PriceAdjustment>) {
        match self.tiers.iter().find(|tier| running >= tier.threshold) {
            Some(tier) => discount(
                self.name(),
                AdjustmentKind::Discount,
                running,
                tier.reduction,
                None,
                format!("spend {} save {}", tier.threshold, tier.reduction),
            ),
            None => (running, None),
        }
    }
}

/// Fixed amount off for a customer's first completed order
pub struct FirstOrderIncentive {
    amount: Money,
}

impl FirstOrderIncentive {
    pub fn new(amount: Money) -> Self {
        Self { amount }
    }
}

impl PriceStage for FirstOrderIncentive {
    fn name(&self) -> &'static str {
        "first_order"
    }

    fn apply(&self, running: Money, _order: &Order, ctx: &PricingContext) -> (Money, Option<PriceAdjustment>) {
        if !ctx.customer.is_first_order() {
            return (running, None);
        }
        discount(
            self.name(),
            AdjustmentKind::Discount,
            running,
            self.amount,
            None,
            "first order incentive".to_string(),
        )
    }
}

/// Flat fee on orders with physical goods, waived at or above `waived_from`
pub struct ShippingSurcharge {
    fee: Money,
    waived_from: Option<Money>,
}

impl ShippingSurcharge {
    pub fn new(fee: Money, waived_from: Option<Money>) -> Self {
        Self { fee, waived_from }
    }
}

impl PriceStage for ShippingSurcharge {
    fn name(&self) -> &'static str {
        "shipping_surcharge"
    }

    fn apply(&self, running: Money, order: &Order, _ctx: &PricingContext) -> (Money, Option<PriceAdjustment>) {
        let waived = self.waived_from.is_some_and(|limit| running >= limit);
        if order.is_virtual_only() || waived || self.fee <= Decimal::ZERO {
            return (running, None);
        }
        let fee = money(self.fee);
        (
            running.saturating_add(fee),
            Some(PriceAdjustment {
                stage: self.name().to_string(),
                kind: AdjustmentKind::Surcharge,
                amount: fee,
                rate: None,
                reason: "shipping fee".to_string(),
            }),
        )
    }
}
