use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

use crate::{AccumulatorError, IngestOutcome};

/// Metrics observer for the accumulator.
pub trait AccumulatorMetrics: Send + Sync {
    /// One finished ingest. `Ok` carries the number of attempts it took.
    fn record_ingest(&self, latency: Duration, result: Result<u32, AccumulatorError>);
    /// One compare-and-store conflict on the given attempt (1-indexed).
    fn record_conflict(&self, attempt: u32);
}

/// Install or clear the global accumulator metrics recorder.
pub fn set_accumulator_metrics(recorder: Option<Arc<dyn AccumulatorMetrics>>) {
    let lock = metrics_lock();
    let mut guard = lock
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn AccumulatorMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn AccumulatorMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn AccumulatorMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

pub(crate) fn record_conflict(attempt: u32) {
    if let Some(recorder) = metrics_recorder() {
        recorder.record_conflict(attempt);
    }
}

pub(crate) struct MetricsSpan {
    recorder: Arc<dyn AccumulatorMetrics>,
    start: Instant,
}

impl MetricsSpan {
    pub(crate) fn start() -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            start: Instant::now(),
        })
    }

    pub(crate) fn record_ingest(self, result: &Result<IngestOutcome, AccumulatorError>) {
        let summary = match result {
            Ok(outcome) => Ok(outcome.attempts),
            Err(err) => Err(err.clone()),
        };
        self.recorder.record_ingest(self.start.elapsed(), summary);
    }
}
