// ============================================================================
// Order Domain - Lifecycle model for the Order entity
// ============================================================================
//
// - Value objects (LineItem, OrderState, PriceAdjustment, ids)
// - Transition records (TransitionRecord, TransitionTrigger)
// - Errors (OrderError taxonomy, TransitionError, LineItemError)
// - Aggregate (Order)
// - State machine (OrderStateMachine)
//
// ============================================================================

pub mod aggregate;
pub mod errors;
pub mod events;
pub mod state_machine;
pub mod value_objects;

// Re-export for convenience
pub use aggregate::*;
pub use errors::*;
pub use events::*;
pub use state_machine::*;
pub use value_objects::*;
