// ============================================================================
// Customer Domain - Buyer-side value objects
// ============================================================================
//
// The engine does not manage customers; it only reads the profile snapshot
// supplied with each order request (tier, order history, identity).
//
// ============================================================================

pub mod value_objects;

pub use value_objects::*;
