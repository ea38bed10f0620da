// ============================================================================
// Domain Layer - Business Model
// ============================================================================
//
// Plain data and the transition rules for orders. Nothing here performs I/O;
// collaborator calls live in the orchestrator.
//
// ============================================================================

pub mod customer;
pub mod order;
