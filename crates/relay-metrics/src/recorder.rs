use relay_types::{EnvironmentId, SdkUsageLabels};

/// The counter surface `MetricService` drives. Prometheus wiring itself is
/// out of scope (spec §1); this crate depends only on the trait, so the
/// `prometheus` crate stays at the edge where the binary assembles the real
/// recorder (spec §4.8 supplement).
pub trait MetricsRecorder: Send + Sync {
    /// One SDK connected with this `{sdkType, sdkVersion, sdkLanguage}`
    /// combination for `environment` (spec §4.8: `sdk_usage` counter).
    fn record_sdk_usage(&self, environment: &EnvironmentId, labels: &SdkUsageLabels);

    /// One flush attempt completed for `environment`, either successfully or
    /// not (spec §4.8: `metrics_forwarded{envID, error}`).
    fn record_forwarded(&self, environment: &EnvironmentId, error: bool);
}

/// Drops every observation. Used where no recorder is wired up (tests, or a
/// deployment that doesn't care about these counters).
#[derive(Debug, Default)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {
    fn record_sdk_usage(&self, _environment: &EnvironmentId, _labels: &SdkUsageLabels) {}
    fn record_forwarded(&self, _environment: &EnvironmentId, _error: bool) {}
}
