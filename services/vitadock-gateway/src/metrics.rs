//! Prometheus metrics exposition
//!
//! - `vitadock_authorizations_total` (counter): labels `phase`, `outcome`
//! - `vitadock_api_requests_total` (counter): labels `operation`, `outcome`
//! - `vitadock_provider_request_duration_seconds` (histogram): label `operation`

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "vitadock_provider_request_duration_seconds";

/// 5ms to 60s, covering the configurable provider timeout.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
}

/// Install the global Prometheus recorder and return a handle for `/metrics`.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    Ok(builder()?.install_recorder()?)
}

/// Record one authorization phase (`temporary_credential` or `access_credential`).
pub fn record_authorization(phase: &'static str, outcome: &'static str, duration_secs: f64) {
    metrics::counter!("vitadock_authorizations_total", "phase" => phase, "outcome" => outcome)
        .increment(1);
    metrics::histogram!(DURATION_METRIC, "operation" => phase).record(duration_secs);
}

/// Record one authenticated API call (`fetch_recent` or `submit`).
pub fn record_api_request(operation: &'static str, outcome: &'static str, duration_secs: f64) {
    metrics::counter!("vitadock_api_requests_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
    metrics::histogram!(DURATION_METRIC, "operation" => operation).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    /// build_recorder() leaves the global recorder slot free for other tests.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = builder().unwrap().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_authorization("temporary_credential", "success", 0.05);
        record_api_request("submit", "provider_error", 0.1);
    }

    #[test]
    fn authorization_counter_carries_phase_and_outcome() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_authorization("temporary_credential", "success", 0.042);
        record_authorization("access_credential", "absent", 0.2);

        let output = handle.render();
        assert!(output.contains("vitadock_authorizations_total"));
        assert!(output.contains("phase=\"temporary_credential\""));
        assert!(output.contains("phase=\"access_credential\""));
        assert!(output.contains("outcome=\"absent\""));
    }

    #[test]
    fn api_counter_and_histogram_render() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_api_request("fetch_recent", "success", 0.003);

        let output = handle.render();
        assert!(output.contains("vitadock_api_requests_total"));
        assert!(output.contains("operation=\"fetch_recent\""));
        assert!(output.contains("vitadock_provider_request_duration_seconds_bucket"));
        assert!(output.contains("le=\"0.005\""));
        assert!(output.contains("le=\"60\""));
        assert!(output.contains("le=\"+Inf\""));
    }
}
