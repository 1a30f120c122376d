//! Logging and metrics setup
//!
//! Accumulator events reach Prometheus through [`PrometheusMetrics`], which
//! is installed as the global accumulator recorder.

use centroid::{set_accumulator_metrics, AccumulatorError, AccumulatorMetrics};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;

/// Bridges accumulator events onto the `metrics` facade.
#[derive(Debug, Default)]
pub struct PrometheusMetrics;

impl AccumulatorMetrics for PrometheusMetrics {
    fn record_ingest(&self, latency: Duration, result: Result<u32, AccumulatorError>) {
        histogram!("centroid_ingest_duration_seconds").record(latency.as_secs_f64());
        if let Ok(attempts) = &result {
            histogram!("centroid_ingest_attempts").record(f64::from(*attempts));
        }
        counter!("centroid_ingest_total", "outcome" => outcome_label(&result)).increment(1);
    }

    fn record_conflict(&self, _attempt: u32) {
        counter!("centroid_store_conflicts_total").increment(1);
    }
}

pub(crate) fn outcome_label(result: &Result<u32, AccumulatorError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(AccumulatorError::Batch(_)) => "invalid_batch",
        Err(AccumulatorError::StoreUnavailable(_)) => "store_unavailable",
        Err(AccumulatorError::StoreContention { .. }) => "store_contention",
        Err(AccumulatorError::CorruptState(_)) => "corrupt_state",
        Err(AccumulatorError::TotalOverflow { .. }) => "total_overflow",
        Err(AccumulatorError::InvalidConfig(_)) => "invalid_config",
    }
}

/// Install the Prometheus recorder and route accumulator events into it.
pub fn install_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    set_accumulator_metrics(Some(Arc::new(PrometheusMetrics)));
    Ok(handle)
}

/// Structured JSON logging filtered by `level`.
pub fn init_tracing(level: &str) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json()
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use batch::BatchError;

    #[test]
    fn outcome_labels_follow_error_kind() {
        assert_eq!(outcome_label(&Ok(2)), "ok");
        assert_eq!(
            outcome_label(&Err(AccumulatorError::Batch(BatchError::EmptyBatch))),
            "invalid_batch"
        );
        assert_eq!(
            outcome_label(&Err(AccumulatorError::StoreContention { attempts: 4 })),
            "store_contention"
        );
    }

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        let metrics = PrometheusMetrics;
        metrics.record_ingest(Duration::from_millis(3), Ok(1));
        metrics.record_conflict(1);
    }
}
