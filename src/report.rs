use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// How a request in a batch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The session returned an error or the request never completed.
    Request,
    /// The request succeeded but the payload was rejected by the validator.
    Validation,
}

/// One failed request, identified by its submission index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub index: usize,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome summary of a batch.
///
/// Built by the [`Collector`](crate::Collector) and handed back once every
/// handle has been dealt with. There is no public way to change it afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    submitted: usize,
    succeeded: usize,
    failures: Vec<Failure>,
    released: usize,
    elapsed: Duration,
}

impl BatchReport {
    pub(crate) fn new(submitted: usize) -> Self {
        Self {
            submitted,
            succeeded: 0,
            failures: Vec::new(),
            released: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub(crate) fn record_failure(&mut self, index: usize, kind: FailureKind, message: String) {
        self.failures.push(Failure {
            index,
            kind,
            message,
        });
    }

    pub(crate) fn release_unresolved(&mut self, count: usize) {
        self.released += count;
    }

    pub(crate) fn finish(mut self, elapsed: Duration) -> Self {
        self.failures.sort_by_key(|f| f.index);
        self.elapsed = elapsed;
        self
    }

    /// Number of requests in the batch.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Failures ordered by submission index.
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// Handles dropped without being awaited because collection was aborted.
    ///
    /// Always zero for a report returned by a completed collection.
    pub fn released(&self) -> usize {
        self.released
    }

    /// Handles that reached a terminal outcome.
    pub fn resolved(&self) -> usize {
        self.succeeded + self.failed()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty() && self.succeeded == self.submitted
    }

    pub fn success_rate(&self) -> f64 {
        if self.submitted == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.submitted as f64
        }
    }

    /// Resolved requests per second over the collection window.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.resolved() as f64 / secs
        }
    }

    /// Distinct failure messages with the number of times each was seen.
    pub fn failure_reasons(&self) -> BTreeMap<&str, usize> {
        let mut reasons = BTreeMap::new();
        for failure in &self.failures {
            *reasons.entry(failure.message.as_str()).or_insert(0) += 1;
        }
        reasons
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} submitted, {} succeeded, {} failed in {:?} ({:.0} req/s)",
            self.submitted,
            self.succeeded,
            self.failed(),
            self.elapsed,
            self.throughput()
        )?;
        if self.released > 0 {
            write!(f, ", {} released unresolved", self.released)?;
        }
        for (reason, count) in self.failure_reasons() {
            write!(f, "\n  {} x {}", count, reason)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report() {
        let report = BatchReport::new(0).finish(Duration::ZERO);
        assert_eq!(report.submitted(), 0);
        assert_eq!(report.resolved(), 0);
        assert_eq!(report.success_rate(), 0.0);
        assert_eq!(report.throughput(), 0.0);
        assert!(report.all_succeeded());
    }

    #[test]
    fn test_failures_sorted_by_index() {
        let mut report = BatchReport::new(4);
        report.record_failure(3, FailureKind::Request, "overloaded".into());
        report.record_success();
        report.record_failure(1, FailureKind::Validation, "expected 3 rows, got 2".into());
        report.record_success();
        let report = report.finish(Duration::from_secs(2));

        let indexes: Vec<usize> = report.failures().iter().map(|f| f.index).collect();
        assert_eq!(indexes, vec![1, 3]);
        assert_eq!(report.resolved(), 4);
        assert_eq!(report.throughput(), 2.0);
        assert!(!report.all_succeeded());
    }

    #[test]
    fn test_failure_reasons_and_display() {
        let mut report = BatchReport::new(3);
        report.record_failure(0, FailureKind::Request, "timeout".into());
        report.record_failure(2, FailureKind::Request, "timeout".into());
        report.record_success();
        let report = report.finish(Duration::from_millis(10));

        assert_eq!(report.failure_reasons().get("timeout"), Some(&2));
        let text = report.to_string();
        assert!(text.starts_with("3 submitted, 1 succeeded, 2 failed"));
        assert!(text.contains("2 x timeout"));
    }
}
