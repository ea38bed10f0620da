use futures_util::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::interventions::{InterventionKind, InterventionQueue};
use crate::collaborators::{NotificationKind, NotificationSink};
use crate::domain::customer::UserId;
use crate::domain::order::OrderId;
use crate::metrics::Metrics;
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};

/// Fire-and-forget delivery. Each notification runs on its own task with its
/// own retry budget; exhausted deliveries are parked on the intervention
/// queue and never reach the caller.
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    retry: RetryConfig,
    interventions: Arc<InterventionQueue>,
    metrics: Arc<Metrics>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl Notifier {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        retry: RetryConfig,
        interventions: Arc<InterventionQueue>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            sink,
            retry,
            interventions,
            metrics,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn dispatch(
        &self,
        order_id: OrderId,
        user_id: UserId,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) {
        let sink = self.sink.clone();
        let retry = self.retry.clone();
        let interventions = self.interventions.clone();
        let metrics = self.metrics.clone();

        let handle = tokio::spawn(async move {
            let outcome = retry_on_transient(&retry, "notify", |attempt| {
                metrics.record_retry_attempt("notify", attempt);
                let sink = sink.clone();
                let payload = payload.clone();
                async move { sink.notify(user_id, kind, payload).await }
            })
            .await;

            match outcome {
                RetryResult::Success { attempts, .. } => {
                    metrics.record_notification(kind.as_str(), true);
                    tracing::debug!(order_id = %order_id, kind = kind.as_str(), attempts, "Notification delivered");
                }
                RetryResult::Exhausted { error, attempts } | RetryResult::Permanent { error, attempts } => {
                    metrics.record_notification(kind.as_str(), false);
                    metrics.record_intervention(InterventionKind::Notification.as_str());
                    interventions.push(
                        order_id,
                        InterventionKind::Notification,
                        serde_json::json!({
                            "user_id": user_id.to_string(),
                            "kind": kind.as_str(),
                            "payload": payload,
                        }),
                        error.to_string(),
                        attempts,
                    );
                }
            }
        });

        let mut pending = self.pending.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Wait for every notification dispatched so far
    pub async fn flush(&self) {
        let handles = std::mem::take(&mut *self.pending.lock());
        for result in join_all(handles).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Notification task did not complete");
            }
        }
    }
}
