//! Multi-replica fan-in: read replicas publish raw `MetricsRequest`s onto a
//! dedicated `sdk_metrics` topic; a single writer replica subscribes,
//! applies them to its own `MetricService`, and is the only one that
//! actually flushes upstream (spec §4.8).

use std::sync::Arc;
use std::time::Duration;

use relay_stream::Stream;
use relay_types::{Checkpoint, MetricsRequest, RelayError, RelayResult, StreamEvent};
use tokio::sync::oneshot;
use tracing::warn;

use crate::MetricService;

pub const METRICS_TOPIC: &str = "sdk_metrics";

/// Backoff applied after a persistent subscribe failure before retrying
/// (spec §4.8: "On persistent subscribe failure, back off 30s and retry").
const SUBSCRIBE_BACKOFF: Duration = Duration::from_secs(30);

pub struct ReplicaConsumer<S> {
    stream: Arc<S>,
}

impl<S> ReplicaConsumer<S>
where
    S: Stream + 'static,
{
    pub fn new(stream: Arc<S>) -> Self {
        Self { stream }
    }

    /// Publishes a single `MetricsRequest` for the writer replica to pick
    /// up. Called by read replicas instead of calling `store_metrics`
    /// directly on their own (unflushed) `MetricService`.
    pub async fn publish(&self, req: &MetricsRequest) -> RelayResult<()> {
        let payload =
            serde_json::to_string(req).map_err(|e| RelayError::internal(format!("failed to encode metrics request: {e}")))?;
        let event = StreamEvent::new(Checkpoint::empty(), "metrics", payload);
        self.stream.publish(METRICS_TOPIC, event).await
    }

    /// Runs the single-writer consumer loop until `shutdown` fires. On a
    /// subscribe/stream error, waits out the backoff (interruptibly) and
    /// retries.
    pub async fn run(&self, service: Arc<MetricService>, mut shutdown: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                result = self.subscribe_and_apply(&service) => {
                    if let Err(e) = result {
                        warn!(error = %e, "sdk_metrics subscription failed; backing off before retry");
                        tokio::select! {
                            _ = &mut shutdown => break,
                            _ = tokio::time::sleep(SUBSCRIBE_BACKOFF) => {}
                        }
                    }
                }
            }
        }
    }

    async fn subscribe_and_apply(&self, service: &Arc<MetricService>) -> RelayResult<()> {
        relay_stream::drive(self.stream.as_ref(), METRICS_TOPIC, Checkpoint::empty(), |event| {
            let service = service.clone();
            async move {
                apply(&service, &event);
                Ok(())
            }
        })
        .await
    }
}

fn apply(service: &MetricService, event: &StreamEvent) {
    let Some(data) = event.data() else { return };
    match serde_json::from_str::<MetricsRequest>(data) {
        Ok(req) => {
            if let Err(e) = service.store_metrics(req) {
                warn!(error = %e, "failed to apply replicated sdk_metrics event");
            }
        }
        Err(e) => warn!(error = %e, "dropping malformed sdk_metrics event"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use relay_stream::MemoryStream;
    use relay_types::EnvironmentId;

    use super::*;
    use crate::{MetricsSink, NoopRecorder};

    struct DiscardingSink;

    #[async_trait]
    impl MetricsSink for DiscardingSink {
        async fn send(&self, _environment: &EnvironmentId, _cluster_identifier: &str, _batch: &MetricsRequest) -> RelayResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn published_metrics_are_applied_by_the_consumer() {
        let stream = Arc::new(MemoryStream::new());
        let consumer = ReplicaConsumer::new(stream.clone());
        let service = Arc::new(MetricService::new(
            Arc::new(DiscardingSink),
            Arc::new(NoopRecorder),
            "cluster-a",
            true,
        ));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let runner = {
            let service = service.clone();
            tokio::spawn(async move { consumer.run(service, shutdown_rx).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let req = MetricsRequest {
            environment: Some(EnvironmentId::new("e1")),
            metrics_data: vec![],
            target_data: vec![],
            attributes: HashMap::new(),
        };
        ReplicaConsumer::new(stream).publish(&req).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(service.peek(&EnvironmentId::new("e1")).is_some());

        let _ = shutdown_tx.send(());
        runner.await.unwrap();
    }
}
