use crate::config::BatchConfig;
use crate::dispatch::PendingBatch;
use crate::error::{CollectError, RequestError, ValidationError};
use crate::metrics_utils::{COLLECT_WAIT_DURATION, FAILED_TOTAL, SUCCEEDED_TOTAL};
use crate::report::{BatchReport, FailureKind};
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use metrics::{counter, histogram};
use std::fmt;
use std::time::Instant;

/// Payloads that carry a number of rows.
pub trait RowCount {
    fn row_count(&self) -> usize;
}

/// Checks the shape of a successful payload.
pub trait Validator<P>: Send + Sync {
    fn validate(&self, payload: &P) -> Result<(), ValidationError>;
}

impl<P, F> Validator<P> for F
where
    F: Fn(&P) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, payload: &P) -> Result<(), ValidationError> {
        self(payload)
    }
}

/// Accepts every payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<P> Validator<P> for AcceptAll {
    fn validate(&self, _payload: &P) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Requires exactly this many rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectRows(pub usize);

impl<P: RowCount> Validator<P> for ExpectRows {
    fn validate(&self, payload: &P) -> Result<(), ValidationError> {
        let actual = payload.row_count();
        if actual == self.0 {
            Ok(())
        } else {
            Err(ValidationError::RowCount {
                expected: self.0,
                actual,
            })
        }
    }
}

/// What the collector does when a payload fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPolicy {
    /// Stop collecting and return [`CollectError::Validation`].
    Abort,
    /// Count it as a failure and keep going.
    Record,
}

/// The order in which the collector waits on handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOrder {
    /// Index by index. Waiting on handle `i` can block while `i + 1` is
    /// already done.
    Submission,
    /// Whichever handle finishes first. Failures are still reported by
    /// submission index.
    Completion,
}

/// Resolves every handle of a [`PendingBatch`] and reports on the outcome.
pub struct Collector<V = AcceptAll> {
    validator: V,
    policy: ValidationPolicy,
    order: CollectOrder,
}

impl Collector<AcceptAll> {
    /// A collector that accepts every payload and waits in submission order.
    pub fn new() -> Self {
        Self {
            validator: AcceptAll,
            policy: ValidationPolicy::Abort,
            order: CollectOrder::Submission,
        }
    }
}

impl Default for Collector<AcceptAll> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Collector<V> {
    /// Builds a collector using the policy and order of `config`.
    pub fn from_config(config: &BatchConfig, validator: V) -> Self {
        Self {
            validator,
            policy: config.validation(),
            order: config.order(),
        }
    }

    pub fn with_validator<W>(self, validator: W) -> Collector<W> {
        Collector {
            validator,
            policy: self.policy,
            order: self.order,
        }
    }

    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_order(mut self, order: CollectOrder) -> Self {
        self.order = order;
        self
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    pub fn order(&self) -> CollectOrder {
        self.order
    }

    /// Waits for every handle in `batch` and builds the report.
    ///
    /// Request errors are recorded and never stop collection. A validation
    /// failure stops it only under [`ValidationPolicy::Abort`]; the failing
    /// handle is recorded and the handles not yet awaited are dropped, which
    /// releases them.
    #[tracing::instrument(skip_all, fields(requests = batch.len(), order = ?self.order))]
    pub async fn collect<P, E>(&self, batch: PendingBatch<P, E>) -> Result<BatchReport, CollectError>
    where
        V: Validator<P>,
        E: fmt::Display,
    {
        let started = Instant::now();
        let handles = batch.into_handles();
        let mut report = BatchReport::new(handles.len());

        match self.order {
            CollectOrder::Submission => {
                let mut handles = handles.into_iter().enumerate();
                while let Some((index, handle)) = handles.next() {
                    let waiting = Instant::now();
                    let outcome = handle.await;
                    histogram!(COLLECT_WAIT_DURATION).record(waiting.elapsed().as_secs_f64());

                    if let Err(source) = self.observe(&mut report, index, outcome) {
                        report.release_unresolved(handles.len());
                        return Err(abort(report, index, source, started));
                    }
                }
            }
            CollectOrder::Completion => {
                let mut pending: FuturesUnordered<_> = handles
                    .into_iter()
                    .enumerate()
                    .map(|(index, handle)| handle.map(move |outcome| (index, outcome)))
                    .collect();
                let mut waiting = Instant::now();
                while let Some((index, outcome)) = pending.next().await {
                    histogram!(COLLECT_WAIT_DURATION).record(waiting.elapsed().as_secs_f64());
                    if let Err(source) = self.observe(&mut report, index, outcome) {
                        report.release_unresolved(pending.len());
                        return Err(abort(report, index, source, started));
                    }
                    waiting = Instant::now();
                }
            }
        }

        let report = report.finish(started.elapsed());
        tracing::debug!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "batch collected"
        );
        Ok(report)
    }

    /// Records one outcome. Returns the validation error only when it must
    /// abort collection.
    fn observe<P, E>(
        &self,
        report: &mut BatchReport,
        index: usize,
        outcome: Result<P, RequestError<E>>,
    ) -> Result<(), ValidationError>
    where
        V: Validator<P>,
        E: fmt::Display,
    {
        match outcome {
            Ok(payload) => match self.validator.validate(&payload) {
                Ok(()) => {
                    counter!(SUCCEEDED_TOTAL).increment(1);
                    report.record_success();
                }
                Err(e) => {
                    counter!(FAILED_TOTAL).increment(1);
                    match self.policy {
                        ValidationPolicy::Abort => return Err(e),
                        ValidationPolicy::Record => {
                            tracing::debug!(index, error = %e, "unexpected result");
                            report.record_failure(index, FailureKind::Validation, e.to_string());
                        }
                    }
                }
            },
            Err(e) => {
                counter!(FAILED_TOTAL).increment(1);
                tracing::debug!(index, error = %e, "request failed");
                report.record_failure(index, FailureKind::Request, e.to_string());
            }
        }
        Ok(())
    }
}

/// The offending handle is counted as a validation failure, so the partial
/// report still accounts for every submitted handle.
fn abort(
    mut report: BatchReport,
    index: usize,
    source: ValidationError,
    started: Instant,
) -> CollectError {
    tracing::error!(index, error = %source, "aborting collection");
    report.record_failure(index, FailureKind::Validation, source.to_string());
    CollectError::Validation {
        index,
        source,
        partial: Box::new(report.finish(started.elapsed())),
    }
}

impl<V> fmt::Debug for Collector<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Collector")
            .field("policy", &self.policy)
            .field("order", &self.order)
            .finish()
    }
}
