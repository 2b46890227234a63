//! Per-environment SDK metrics aggregation buffer with periodic upstream
//! flush (spec §4.8). Thread-safe via a single mutex guarding the buffer,
//! held only across the slice-append / map-swap that touches it — never
//! across the upstream I/O a flush performs.

mod recorder;
mod replica;
mod sink;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use relay_types::{EnvironmentId, MetricsRequest, RelayResult};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use recorder::{MetricsRecorder, NoopRecorder};
pub use replica::{ReplicaConsumer, METRICS_TOPIC};
pub use sink::MetricsSink;

/// `running ⇄ flushing` on the ticker tick; a cancelled context transitions
/// to `stopped` (terminal) (spec §4.8, state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceState {
    Running = 0,
    Flushing = 1,
    Stopped = 2,
}

impl From<u8> for ServiceState {
    fn from(value: u8) -> Self {
        match value {
            1 => ServiceState::Flushing,
            2 => ServiceState::Stopped,
            _ => ServiceState::Running,
        }
    }
}

pub struct MetricService {
    buffer: Mutex<HashMap<EnvironmentId, MetricsRequest>>,
    enabled: bool,
    cluster_identifier: String,
    sink: Arc<dyn MetricsSink>,
    recorder: Arc<dyn MetricsRecorder>,
    state: AtomicU8,
}

impl MetricService {
    pub fn new(
        sink: Arc<dyn MetricsSink>,
        recorder: Arc<dyn MetricsRecorder>,
        cluster_identifier: impl Into<String>,
        enabled: bool,
    ) -> Self {
        Self {
            buffer: Mutex::new(HashMap::new()),
            enabled,
            cluster_identifier: cluster_identifier.into(),
            sink,
            recorder,
            state: AtomicU8::new(ServiceState::Running as u8),
        }
    }

    pub fn state(&self) -> ServiceState {
        ServiceState::from(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ServiceState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// If ingestion is disabled, returns success immediately — metric
    /// ingestion is optional (spec §4.8). Otherwise appends `metrics_data`
    /// and `target_data` onto the existing buffer for the request's
    /// environment, creating it if absent, and records `sdk_usage`.
    pub fn store_metrics(&self, req: MetricsRequest) -> RelayResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let Some(environment) = req.environment.clone() else {
            return Ok(());
        };

        let labels = req.sdk_usage_labels();
        {
            let mut buffer = self.buffer.lock().expect("metrics buffer lock poisoned");
            let entry = buffer.entry(environment.clone()).or_insert_with(|| MetricsRequest {
                environment: Some(environment.clone()),
                metrics_data: Vec::new(),
                target_data: Vec::new(),
                attributes: HashMap::new(),
            });
            entry.metrics_data.extend(req.metrics_data);
            entry.target_data.extend(req.target_data);
        }

        self.recorder.record_sdk_usage(&environment, &labels);
        Ok(())
    }

    /// Snapshots and clears the whole buffer under the lock, then flushes
    /// each environment's batch upstream outside the lock. Errors are
    /// logged; the batch is not retried in the current interval, and a
    /// failed flush still leaves that environment's buffer empty (spec §4.8,
    /// property 9).
    pub async fn flush_once(&self) {
        let snapshot: HashMap<EnvironmentId, MetricsRequest> = {
            let mut buffer = self.buffer.lock().expect("metrics buffer lock poisoned");
            std::mem::take(&mut *buffer)
        };

        for (environment, batch) in snapshot {
            let result = self.sink.send(&environment, &self.cluster_identifier, &batch).await;
            let failed = result.is_err();
            if let Err(e) = result {
                warn!(environment = %environment, error = %e, "metrics flush failed; batch is dropped, not retried");
            } else {
                debug!(environment = %environment, "flushed metrics batch upstream");
            }
            self.recorder.record_forwarded(&environment, failed);
        }
    }

    /// Test/inspection hook: the current batch held for `environment`, if
    /// any entries have been stored for it since the last flush.
    pub fn peek(&self, environment: &EnvironmentId) -> Option<MetricsRequest> {
        self.buffer.lock().expect("metrics buffer lock poisoned").get(environment).cloned()
    }

    /// Spawns the periodic flush ticker (spec §4.8, default interval 60s,
    /// `metricPostDuration: 0` disables forwarding entirely by the caller
    /// simply not calling this). Exactly one task per `MetricService`,
    /// exactly like `CheckpointingStream`'s checkpoint writer (spec §9).
    pub fn spawn_flush_loop(self: Arc<Self>, interval: Duration) -> FlushHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let service = self.clone();
        let task = tokio::spawn(async move { service.flush_loop(interval, shutdown_rx).await });
        FlushHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    async fn flush_loop(self: Arc<Self>, interval: Duration, mut shutdown: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; the first real flush is one interval out

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    self.set_state(ServiceState::Stopped);
                    break;
                }
                _ = ticker.tick() => {
                    self.set_state(ServiceState::Flushing);
                    self.flush_once().await;
                    self.set_state(ServiceState::Running);
                }
            }
        }
    }
}

/// Owns the flush loop's lifetime. Dropping this without calling
/// [`shutdown`](FlushHandle::shutdown) leaves the task running detached;
/// callers that need a clean stop should always await `shutdown()`.
pub struct FlushHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl FlushHandle {
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use async_trait::async_trait;
    use relay_types::{MetricsDataPoint, TargetDataPoint};

    use super::*;

    struct RecordingSink {
        sent: Mutex<Vec<(EnvironmentId, MetricsRequest)>>,
        fail: bool,
    }

    #[async_trait]
    impl MetricsSink for RecordingSink {
        async fn send(&self, environment: &EnvironmentId, _cluster_identifier: &str, batch: &MetricsRequest) -> RelayResult<()> {
            if self.fail {
                return Err(relay_types::RelayError::transient("boom"));
            }
            self.sent.lock().unwrap().push((environment.clone(), batch.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingRecorder {
        usage_calls: AtomicUsize,
        forwarded_ok: AtomicUsize,
        forwarded_err: AtomicUsize,
    }

    impl MetricsRecorder for CountingRecorder {
        fn record_sdk_usage(&self, _environment: &EnvironmentId, _labels: &relay_types::SdkUsageLabels) {
            self.usage_calls.fetch_add(1, AtomicOrdering::SeqCst);
        }

        fn record_forwarded(&self, _environment: &EnvironmentId, error: bool) {
            if error {
                self.forwarded_err.fetch_add(1, AtomicOrdering::SeqCst);
            } else {
                self.forwarded_ok.fetch_add(1, AtomicOrdering::SeqCst);
            }
        }
    }

    fn metrics_req(env: &str, count: u64) -> MetricsRequest {
        MetricsRequest {
            environment: Some(EnvironmentId::new(env)),
            metrics_data: vec![MetricsDataPoint {
                feature: "dark-mode".into(),
                variation: "on".into(),
                count,
            }],
            target_data: vec![TargetDataPoint {
                identifier: "user-1".into(),
                name: None,
            }],
            attributes: HashMap::new(),
        }
    }

    #[test]
    fn three_stores_concatenate_into_one_batch() {
        let sink = Arc::new(RecordingSink { sent: Mutex::new(vec![]), fail: false });
        let recorder = Arc::new(CountingRecorder::default());
        let service = MetricService::new(sink, recorder, "cluster-a", true);

        service.store_metrics(metrics_req("x", 1)).unwrap();
        service.store_metrics(metrics_req("x", 2)).unwrap();
        service.store_metrics(metrics_req("x", 3)).unwrap();

        let batch = service.peek(&EnvironmentId::new("x")).unwrap();
        assert_eq!(batch.metrics_data.len(), 3);
        assert_eq!(batch.target_data.len(), 3);
    }

    #[test]
    fn two_environments_stay_separate() {
        let sink = Arc::new(RecordingSink { sent: Mutex::new(vec![]), fail: false });
        let recorder = Arc::new(CountingRecorder::default());
        let service = MetricService::new(sink, recorder, "cluster-a", true);

        service.store_metrics(metrics_req("a", 1)).unwrap();
        service.store_metrics(metrics_req("b", 1)).unwrap();

        assert_eq!(service.peek(&EnvironmentId::new("a")).unwrap().metrics_data.len(), 1);
        assert_eq!(service.peek(&EnvironmentId::new("b")).unwrap().metrics_data.len(), 1);
    }

    #[tokio::test]
    async fn successful_flush_empties_the_buffer() {
        let sink = Arc::new(RecordingSink { sent: Mutex::new(vec![]), fail: false });
        let recorder = Arc::new(CountingRecorder::default());
        let service = MetricService::new(sink.clone(), recorder.clone(), "cluster-a", true);

        service.store_metrics(metrics_req("x", 5)).unwrap();
        service.flush_once().await;

        assert!(service.peek(&EnvironmentId::new("x")).is_none());
        assert_eq!(sink.sent.lock().unwrap().len(), 1);
        assert_eq!(recorder.forwarded_ok.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_flush_still_empties_the_buffer_without_retry() {
        let sink = Arc::new(RecordingSink { sent: Mutex::new(vec![]), fail: true });
        let recorder = Arc::new(CountingRecorder::default());
        let service = MetricService::new(sink.clone(), recorder.clone(), "cluster-a", true);

        service.store_metrics(metrics_req("x", 5)).unwrap();
        service.flush_once().await;

        assert!(service.peek(&EnvironmentId::new("x")).is_none());
        assert!(sink.sent.lock().unwrap().is_empty());
        assert_eq!(recorder.forwarded_err.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn disabled_ingestion_is_a_no_op() {
        let sink = Arc::new(RecordingSink { sent: Mutex::new(vec![]), fail: false });
        let recorder = Arc::new(CountingRecorder::default());
        let service = MetricService::new(sink, recorder, "cluster-a", false);

        service.store_metrics(metrics_req("x", 1)).unwrap();
        assert!(service.peek(&EnvironmentId::new("x")).is_none());
    }

    #[tokio::test]
    async fn flush_loop_transitions_through_states_and_stops_on_shutdown() {
        let sink = Arc::new(RecordingSink { sent: Mutex::new(vec![]), fail: false });
        let recorder = Arc::new(CountingRecorder::default());
        let service = Arc::new(MetricService::new(sink, recorder, "cluster-a", true));

        assert_eq!(service.state(), ServiceState::Running);

        let handle = service.clone().spawn_flush_loop(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown().await;

        assert_eq!(service.state(), ServiceState::Stopped);
    }
}
