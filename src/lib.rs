// ============================================================================
// Order Lifecycle Orchestration Engine
// ============================================================================
//
// Drives purchase orders through validation, pricing, payment, fulfillment
// and notification with a guarded state machine, compensation on failure
// and a per-order snapshot ledger for undo and rollback.
//
// ============================================================================

pub mod collaborators;
pub mod config;
pub mod domain;
pub mod history;
pub mod metrics;
pub mod orchestrator;
pub mod pricing;
pub mod utils;
pub mod validation;

pub use config::EngineConfig;
pub use domain::order::{Order, OrderError, OrderId, OrderState};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrderRequest};
