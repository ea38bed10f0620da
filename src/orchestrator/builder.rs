use std::collections::HashMap;
use std::sync::Arc;

use super::engine::{Inner, Orchestrator};
use super::interventions::InterventionQueue;
use super::notifier::Notifier;
use super::registry::OrderRegistry;
use crate::collaborators::Collaborators;
use crate::config::EngineConfig;
use crate::domain::customer::CustomerTier;
use crate::domain::order::OrderStateMachine;
use crate::history::HistoryLedger;
use crate::metrics::Metrics;
use crate::pricing::PriceChain;
use crate::utils::CircuitBreaker;
use crate::validation::ValidationPipeline;

/// Assembles an [`Orchestrator`] from collaborators and configuration.
///
/// Anything not supplied explicitly is derived from the [`EngineConfig`]:
/// the standard validation pipeline, the quick pipeline for
/// `quick_path_tiers`, and the standard price chain.
pub struct OrchestratorBuilder {
    collaborators: Collaborators,
    config: EngineConfig,
    metrics: Option<Arc<Metrics>>,
    pipeline: Option<ValidationPipeline>,
    tier_pipelines: HashMap<CustomerTier, ValidationPipeline>,
    price_chain: Option<PriceChain>,
}

impl OrchestratorBuilder {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            config: EngineConfig::default(),
            metrics: None,
            pipeline: None,
            tier_pipelines: HashMap::new(),
            price_chain: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replace the default pipeline used for tiers without an override
    pub fn with_pipeline(mut self, pipeline: ValidationPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn with_tier_pipeline(mut self, tier: CustomerTier, pipeline: ValidationPipeline) -> Self {
        self.tier_pipelines.insert(tier, pipeline);
        self
    }

    pub fn with_price_chain(mut self, chain: PriceChain) -> Self {
        self.price_chain = Some(chain);
        self
    }

    pub fn build(self) -> anyhow::Result<Orchestrator> {
        let Self {
            collaborators,
            config,
            metrics,
            pipeline,
            mut tier_pipelines,
            price_chain,
        } = self;

        let metrics = match metrics {
            Some(metrics) => metrics,
            None => Arc::new(Metrics::new()?),
        };

        let pipeline = pipeline.unwrap_or_else(|| {
            ValidationPipeline::standard(
                collaborators.inventory.clone(),
                collaborators.risk.clone(),
                config.risk_rules.clone(),
            )
        });
        for tier in &config.quick_path_tiers {
            tier_pipelines
                .entry(*tier)
                .or_insert_with(|| ValidationPipeline::quick(collaborators.inventory.clone()));
        }

        let pricing = price_chain.unwrap_or_else(|| PriceChain::standard(&config.pricing));

        let interventions = Arc::new(InterventionQueue::new());
        let notifier = Notifier::new(
            collaborators.notifications.clone(),
            config.notification_retry.clone(),
            interventions.clone(),
            metrics.clone(),
        );
        let payment_breaker = CircuitBreaker::new("payments", config.payment_breaker.clone());
        metrics.update_payment_circuit_state(payment_breaker.state());

        tracing::info!(
            validation = ?pipeline.stage_names(),
            pricing = ?pricing.stage_names(),
            tier_overrides = tier_pipelines.len(),
            history_cap = config.history_cap,
            "🧩 Orchestrator assembled"
        );

        Ok(Orchestrator::from_inner(Inner {
            collaborators,
            state_machine: OrderStateMachine::new(),
            pipeline,
            tier_pipelines,
            pricing,
            ledger: HistoryLedger::new(config.history_cap),
            registry: OrderRegistry::new(),
            payment_breaker,
            notifier,
            interventions,
            metrics,
            refund_retry: config.refund_retry,
            release_retry: config.release_retry,
        }))
    }
}
