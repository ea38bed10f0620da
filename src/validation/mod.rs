// ============================================================================
// Validation - ordered, fail-fast order checks
// ============================================================================

pub mod pipeline;
pub mod stages;

pub use pipeline::{PipelineResult, ValidationPipeline, ValidationStage};
pub use stages::{InventoryAvailability, RiskRules, RiskScreening, StructuralCheck};
