use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::stages::{InventoryAvailability, RiskRules, RiskScreening, StructuralCheck};
use crate::collaborators::{InventoryStore, RiskScorer};
use crate::domain::order::Order;

// ============================================================================
// Validation Pipeline
// ============================================================================
//
// Stages run strictly in order and the first failure stops the run. Stages
// only read the order; reservation happens after the whole pipeline passed.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub stage_name: String,
    pub success: bool,
    pub message: String,
}

impl PipelineResult {
    pub fn pass(stage_name: &str) -> Self {
        Self {
            stage_name: stage_name.to_string(),
            success: true,
            message: "ok".to_string(),
        }
    }

    pub fn fail(stage_name: &str, message: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.to_string(),
            success: false,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ValidationStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self, order: &Order) -> PipelineResult;
}

#[derive(Clone)]
pub struct ValidationPipeline {
    stages: Vec<Arc<dyn ValidationStage>>,
}

impl ValidationPipeline {
    pub fn new(stages: Vec<Arc<dyn ValidationStage>>) -> Self {
        Self { stages }
    }

    /// structural -> inventory -> risk
    pub fn standard(
        inventory: Arc<dyn InventoryStore>,
        risk: Arc<dyn RiskScorer>,
        rules: RiskRules,
    ) -> Self {
        Self::new(vec![
            Arc::new(StructuralCheck),
            Arc::new(InventoryAvailability::new(inventory)),
            Arc::new(RiskScreening::new(risk, rules)),
        ])
    }

    /// structural -> inventory, without risk screening
    pub fn quick(inventory: Arc<dyn InventoryStore>) -> Self {
        Self::new(vec![
            Arc::new(StructuralCheck),
            Arc::new(InventoryAvailability::new(inventory)),
        ])
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Returns the first failing result, or the last passing one
    pub async fn run(&self, order: &Order) -> PipelineResult {
        let mut last = PipelineResult::pass("empty");

        for stage in &self.stages {
            let result = stage.check(order).await;
            if !result.success {
                tracing::warn!(
                    order_id = %order.id(),
                    stage = %result.stage_name,
                    message = %result.message,
                    "Validation rejected order"
                );
                return result;
            }
            tracing::debug!(order_id = %order.id(), stage = stage.name(), "Validation stage passed");
            last = result;
        }

        last
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
