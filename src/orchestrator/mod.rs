// ============================================================================
// Orchestrator - lifecycle coordination, compensation and operator queue
// ============================================================================

pub mod builder;
pub mod engine;
pub mod interventions;
pub mod notifier;
pub mod registry;
pub mod request;

#[cfg(test)]
mod scenarios;

pub use builder::OrchestratorBuilder;
pub use engine::Orchestrator;
pub use interventions::{InterventionEntry, InterventionKind, InterventionQueue, InterventionStats};
pub use notifier::Notifier;
pub use registry::OrderRegistry;
pub use request::OrderRequest;
