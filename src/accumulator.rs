use std::sync::Arc;
use std::time::Instant;

use batch::{compute_statistics, BatchError, BatchStatistics, VectorBatch};
use serde::Serialize;
use store::{Aggregate, AggregateStore, CasOutcome, StoreError};
use tracing::{debug, info, warn};

use crate::metrics::MetricsSpan;
use crate::{AccumulatorConfig, AccumulatorError};

/// Result of one successful ingest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    /// Statistics over the ingested batch only.
    pub statistics: BatchStatistics,
    /// The aggregate as committed by this ingest.
    pub aggregate: Aggregate,
    /// Load/compare-and-store attempts it took to commit.
    pub attempts: u32,
}

/// Folds vector batches into the persisted running aggregate.
///
/// The accumulator holds no state of its own between calls: every ingest
/// reloads the aggregate, computes the next value, and commits it with
/// compare-and-store, retrying on conflict. Any number of accumulators, in
/// this process or others, can share one store.
pub struct Accumulator {
    store: Arc<dyn AggregateStore>,
    config: AccumulatorConfig,
}

impl Accumulator {
    pub fn new(
        store: Arc<dyn AggregateStore>,
        config: AccumulatorConfig,
    ) -> Result<Self, AccumulatorError> {
        if config.dim == 0 {
            return Err(AccumulatorError::Batch(BatchError::ZeroDimension));
        }
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn dim(&self) -> usize {
        self.config.dim
    }

    pub fn config(&self) -> &AccumulatorConfig {
        &self.config
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Make sure the aggregate exists before traffic is served.
    ///
    /// Stores `dim` zeros if the key is absent. Losing that race to another
    /// process is fine; either way the stored aggregate is returned after its
    /// dimension has been checked.
    pub async fn initialize(&self) -> Result<Aggregate, AccumulatorError> {
        let current = self.call(|store| store.load()).await?;
        let aggregate = match current {
            Some(existing) => existing,
            None => {
                let zero = Aggregate::zeros(self.dim());
                match self.store_next(None, &zero).await? {
                    CasOutcome::Stored => {
                        info!(dim = self.dim(), store = self.store_name(), "initialized aggregate");
                        zero
                    }
                    CasOutcome::Conflict => self
                        .call(|store| store.load())
                        .await?
                        .ok_or_else(|| {
                            AccumulatorError::StoreUnavailable(
                                "aggregate vanished during initialization".into(),
                            )
                        })?,
                }
            }
        };

        self.check_dim(&aggregate)?;
        Ok(aggregate)
    }

    /// Current aggregate; the zero aggregate if none is stored yet.
    pub async fn snapshot(&self) -> Result<Aggregate, AccumulatorError> {
        match self.call(|store| store.load()).await? {
            Some(aggregate) => {
                self.check_dim(&aggregate)?;
                Ok(aggregate)
            }
            None => Ok(Aggregate::zeros(self.dim())),
        }
    }

    /// Check that the store answers.
    pub async fn ping(&self) -> Result<(), AccumulatorError> {
        self.call(|store| store.ping()).await
    }

    /// Validate decoded rows and fold them into the aggregate.
    ///
    /// Validation failures return before the store is touched.
    pub async fn ingest(&self, rows: Vec<Vec<f64>>) -> Result<IngestOutcome, AccumulatorError> {
        let span = MetricsSpan::start();
        let result = match VectorBatch::new(rows, self.dim()) {
            Ok(batch) => self.commit(&batch).await,
            Err(err) => Err(err.into()),
        };
        if let Some(span) = span {
            span.record_ingest(&result);
        }
        result
    }

    /// Fold an already validated batch into the aggregate.
    pub async fn ingest_batch(
        &self,
        batch: &VectorBatch,
    ) -> Result<IngestOutcome, AccumulatorError> {
        let span = MetricsSpan::start();
        let result = if batch.dim() != self.dim() {
            Err(AccumulatorError::Batch(BatchError::DimensionMismatch {
                row: 0,
                expected: self.dim(),
                actual: batch.dim(),
            }))
        } else {
            self.commit(batch).await
        };
        if let Some(span) = span {
            span.record_ingest(&result);
        }
        result
    }

    async fn commit(&self, batch: &VectorBatch) -> Result<IngestOutcome, AccumulatorError> {
        let started = Instant::now();
        let policy = self.config.retry;
        let sums = batch.column_sums();
        let rows = batch.len() as u64;
        let mut attempt = 0;

        let aggregate = loop {
            attempt += 1;

            let current = self.call(|store| store.load()).await?;
            if let Some(existing) = &current {
                self.check_dim(existing)?;
            }
            let next = match &current {
                Some(existing) => existing.apply(&sums, rows)?,
                None => Aggregate::zeros(self.dim()).apply(&sums, rows)?,
            };

            let outcome = self.store_next(current, &next).await?;

            match outcome {
                CasOutcome::Stored => break next,
                CasOutcome::Conflict => {
                    crate::metrics::record_conflict(attempt);

                    let delay = policy.delay_after(attempt);
                    let out_of_time = policy
                        .deadline
                        .is_some_and(|deadline| started.elapsed() + delay >= deadline);
                    if attempt >= policy.attempts() || out_of_time {
                        warn!(
                            attempts = attempt,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "giving up on contended aggregate"
                        );
                        return Err(AccumulatorError::StoreContention { attempts: attempt });
                    }

                    debug!(attempt, delay_us = delay.as_micros() as u64, "aggregate changed, retrying");
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        };

        Ok(IngestOutcome {
            statistics: compute_statistics(batch),
            aggregate,
            attempts: attempt,
        })
    }

    fn check_dim(&self, aggregate: &Aggregate) -> Result<(), AccumulatorError> {
        if aggregate.dim() != self.dim() {
            return Err(AccumulatorError::CorruptState(format!(
                "stored aggregate has dimension {}, deployment uses {}",
                aggregate.dim(),
                self.dim()
            )));
        }
        Ok(())
    }

    /// Run one compare-and-store and report what it actually did.
    ///
    /// Unlike reads, a compare-and-store is never abandoned at the timeout:
    /// the call keeps waiting for the backend, which bounds its own duration
    /// by the same timeout, so a write that lands is never reported as a
    /// failure. A late conflict wrote nothing and is reported as
    /// `StoreUnavailable`. After a transient failure the aggregate is
    /// reloaded, and a write that committed before its reply was lost counts
    /// as stored.
    async fn store_next(
        &self,
        expected: Option<Aggregate>,
        next: &Aggregate,
    ) -> Result<CasOutcome, AccumulatorError> {
        let started = Instant::now();
        let store = Arc::clone(&self.store);
        let candidate = next.clone();
        let mut task = tokio::task::spawn_blocking(move || {
            store.compare_and_store(expected.as_ref(), &candidate)
        });

        let joined = match tokio::time::timeout(self.config.store_timeout, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    store = self.store_name(),
                    timeout_ms = self.config.store_timeout.as_millis() as u64,
                    "compare-and-store outlasted the store timeout, waiting for its outcome"
                );
                task.await
            }
        };
        let late = started.elapsed() > self.config.store_timeout;

        let result = joined.unwrap_or_else(|join_err| {
            Err(StoreError::Unavailable(format!("store task failed: {join_err}")))
        });

        match result {
            Ok(CasOutcome::Stored) => Ok(CasOutcome::Stored),
            Ok(CasOutcome::Conflict) if late => Err(AccumulatorError::StoreUnavailable(format!(
                "compare-and-store timed out after {}ms",
                self.config.store_timeout.as_millis()
            ))),
            Ok(CasOutcome::Conflict) => Ok(CasOutcome::Conflict),
            Err(err) => {
                if err.is_transient() && self.landed(next).await {
                    debug!(error = %err, "compare-and-store reply lost but the write committed");
                    Ok(CasOutcome::Stored)
                } else {
                    Err(err.into())
                }
            }
        }
    }

    /// Whether the stored aggregate is exactly `next`.
    async fn landed(&self, next: &Aggregate) -> bool {
        matches!(
            self.call(|store| store.load()).await,
            Ok(Some(current)) if &current == next
        )
    }

    /// Run one blocking read off the async runtime, bounded by the configured
    /// timeout. A read that is abandoned at the timeout has no effect.
    async fn call<T, F>(&self, op: F) -> Result<T, AccumulatorError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn AggregateStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || op(store.as_ref()));

        match tokio::time::timeout(self.config.store_timeout, task).await {
            Ok(Ok(result)) => result.map_err(AccumulatorError::from),
            Ok(Err(join_err)) => Err(AccumulatorError::StoreUnavailable(format!(
                "store task failed: {join_err}"
            ))),
            Err(_) => {
                warn!(
                    store = self.store_name(),
                    timeout_ms = self.config.store_timeout.as_millis() as u64,
                    "store call timed out"
                );
                Err(AccumulatorError::StoreUnavailable(format!(
                    "store call timed out after {}ms",
                    self.config.store_timeout.as_millis()
                )))
            }
        }
    }
}
