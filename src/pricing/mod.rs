// ============================================================================
// Pricing - composable price-adjustment chain
// ============================================================================

pub mod chain;
pub mod stages;

pub use chain::{PriceChain, PriceQuote, PriceStage, PricingContext, PricingPolicy};
pub use stages::{
    Coupon, CouponDiscount, CouponValue, FirstOrderIncentive, FullReduction, MembershipDiscount,
    ReductionTier, ShippingSurcharge,
};
