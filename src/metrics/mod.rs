// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

use crate::utils::CircuitState;

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order outcomes and lifecycle transitions
// - Validation rejections and price adjustments
// - Compensation, retries and the intervention queue
// - Payment circuit breaker state
// - Notification delivery
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Lifecycle Metrics
    pub orders_processed: IntCounterVec,
    pub order_processing_duration: HistogramVec,
    pub transitions_total: IntCounterVec,

    // Pipeline Metrics
    pub validation_rejections: IntCounterVec,
    pub price_adjustments: IntCounterVec,

    // Resilience Metrics
    pub compensations_total: IntCounterVec,
    pub retry_attempts_total: IntCounterVec,
    pub manual_interventions_total: IntCounter,
    pub interventions_by_kind: IntCounterVec,
    pub payment_circuit_state: IntGauge,

    // Notification Metrics
    pub notifications_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Lifecycle Metrics
        let orders_processed = IntCounterVec::new(
            Opts::new("orders_processed_total", "Orders run through process_order, by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(orders_processed.clone()))?;

        let order_processing_duration = HistogramVec::new(
            HistogramOpts::new("order_processing_duration_seconds", "process_order wall time")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(order_processing_duration.clone()))?;

        let transitions_total = IntCounterVec::new(
            Opts::new("order_transitions_total", "Committed order state transitions"),
            &["from_state", "to_state"],
        )?;
        registry.register(Box::new(transitions_total.clone()))?;

        // Pipeline Metrics
        let validation_rejections = IntCounterVec::new(
            Opts::new("validation_rejections_total", "Orders rejected by validation stage"),
            &["stage"],
        )?;
        registry.register(Box::new(validation_rejections.clone()))?;

        let price_adjustments = IntCounterVec::new(
            Opts::new("price_adjustments_total", "Applied price adjustments by stage"),
            &["stage"],
        )?;
        registry.register(Box::new(price_adjustments.clone()))?;

        // Resilience Metrics
        let compensations_total = IntCounterVec::new(
            Opts::new("compensations_total", "Compensation runs by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(compensations_total.clone()))?;

        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Collaborator call attempts made under a retry policy"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let manual_interventions_total = IntCounter::new(
            "manual_interventions_total",
            "Entries pushed to the operator intervention queue",
        )?;
        registry.register(Box::new(manual_interventions_total.clone()))?;

        let interventions_by_kind = IntCounterVec::new(
            Opts::new("interventions_by_kind_total", "Intervention entries by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(interventions_by_kind.clone()))?;

        let payment_circuit_state = IntGauge::new(
            "payment_circuit_breaker_state",
            "Payment circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(payment_circuit_state.clone()))?;

        // Notification Metrics
        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Notification deliveries by kind and outcome"),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(notifications_total.clone()))?;

        Ok(Self {
            registry,
            orders_processed,
            order_processing_duration,
            transitions_total,
            validation_rejections,
            price_adjustments,
            compensations_total,
            retry_attempts_total,
            manual_interventions_total,
            interventions_by_kind,
            payment_circuit_state,
            notifications_total,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_order_outcome(&self, outcome: &str, duration_secs: f64) {
        self.orders_processed.with_label_values(&[outcome]).inc();
        self.order_processing_duration
            .with_label_values(&[outcome])
            .observe(duration_secs);
    }

    pub fn record_transition(&self, from_state: &str, to_state: &str) {
        self.transitions_total.with_label_values(&[from_state, to_state]).inc();
    }

    pub fn record_validation_rejection(&self, stage: &str) {
        self.validation_rejections.with_label_values(&[stage]).inc();
    }

    pub fn record_price_adjustment(&self, stage: &str) {
        self.price_adjustments.with_label_values(&[stage]).inc();
    }

    pub fn record_compensation(&self, outcome: &str) {
        self.compensations_total.with_label_values(&[outcome]).inc();
    }

    /// Helper to record retry attempt
    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        self.retry_attempts_total
            .with_label_values(&[operation, &attempt.to_string()])
            .inc();
    }

    pub fn record_intervention(&self, kind: &str) {
        self.manual_interventions_total.inc();
        self.interventions_by_kind.with_label_values(&[kind]).inc();
    }

    pub fn update_payment_circuit_state(&self, state: CircuitState) {
        self.payment_circuit_state.set(state.as_gauge());
    }

    pub fn record_notification(&self, kind: &str, delivered: bool) {
        let outcome = if delivered { "delivered" } else { "failed" };
        self.notifications_total.with_label_values(&[kind, outcome]).inc();
    }
}
