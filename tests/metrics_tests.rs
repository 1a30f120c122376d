//! The global metrics hook sees every ingest outcome and every conflict.
//!
//! Kept in its own test binary because the recorder is process-wide.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use centroid::{
    set_accumulator_metrics, Accumulator, AccumulatorConfig, AccumulatorError, AccumulatorMetrics,
    Aggregate, AggregateStore, CasOutcome, RetryPolicy, StoreError,
};
use store::InMemoryStore;

#[derive(Default)]
struct Recorded {
    ingests: Mutex<Vec<Result<u32, AccumulatorError>>>,
    conflicts: AtomicU32,
}

impl AccumulatorMetrics for Recorded {
    fn record_ingest(&self, _latency: Duration, result: Result<u32, AccumulatorError>) {
        self.ingests.lock().unwrap().push(result);
    }

    fn record_conflict(&self, _attempt: u32) {
        self.conflicts.fetch_add(1, Ordering::SeqCst);
    }
}

struct AlwaysConflict;

impl AggregateStore for AlwaysConflict {
    fn load(&self) -> Result<Option<Aggregate>, StoreError> {
        Ok(None)
    }

    fn compare_and_store(
        &self,
        _expected: Option<&Aggregate>,
        _next: &Aggregate,
    ) -> Result<CasOutcome, StoreError> {
        Ok(CasOutcome::Conflict)
    }

    fn name(&self) -> &'static str {
        "always_conflict"
    }
}

#[tokio::test]
async fn recorder_receives_outcomes() {
    let recorder = Arc::new(Recorded::default());
    set_accumulator_metrics(Some(recorder.clone()));

    let ok = Accumulator::new(Arc::new(InMemoryStore::new()), AccumulatorConfig::new(2)).unwrap();
    ok.ingest(vec![vec![1.0, 2.0]]).await.unwrap();
    ok.ingest(vec![]).await.unwrap_err();

    let retry = RetryPolicy::default()
        .with_max_attempts(3)
        .with_base_delay(Duration::ZERO);
    let contended = Accumulator::new(
        Arc::new(AlwaysConflict),
        AccumulatorConfig::new(2).with_retry(retry),
    )
    .unwrap();
    contended.ingest(vec![vec![1.0, 2.0]]).await.unwrap_err();

    set_accumulator_metrics(None);

    let ingests = recorder.ingests.lock().unwrap().clone();
    assert_eq!(ingests.len(), 3);
    assert_eq!(ingests[0], Ok(1));
    assert!(matches!(ingests[1], Err(AccumulatorError::Batch(_))));
    assert_eq!(
        ingests[2],
        Err(AccumulatorError::StoreContention { attempts: 3 })
    );
    assert_eq!(recorder.conflicts.load(Ordering::SeqCst), 3);
}
