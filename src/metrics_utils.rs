use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};

pub const SUBMITTED_TOTAL: &str = "volley_requests_submitted_total";
pub const SUCCEEDED_TOTAL: &str = "volley_requests_succeeded_total";
pub const FAILED_TOTAL: &str = "volley_requests_failed_total";
pub const IN_FLIGHT: &str = "volley_requests_in_flight";
pub const REQUEST_DURATION: &str = "volley_request_duration";
pub const COLLECT_WAIT_DURATION: &str = "volley_collect_wait_duration";

pub fn describe_metrics() {
    describe_counter!(SUBMITTED_TOTAL, "Requests handed to the session.");
    describe_counter!(
        SUCCEEDED_TOTAL,
        "Requests that resolved with a payload that passed validation."
    );
    describe_counter!(
        FAILED_TOTAL,
        "Requests that resolved with an error or failed validation."
    );

    describe_gauge!(IN_FLIGHT, "The number of requests currently executing.");

    describe_histogram!(
        REQUEST_DURATION,
        "Time from a request starting on a worker to its result being ready."
    );
    describe_histogram!(
        COLLECT_WAIT_DURATION,
        "Time the collector spent blocked on a single handle."
    );
}

/// Increments a gauge on creation and decrements it on drop.
pub(crate) struct GaugeGuard {
    key: &'static str,
}

impl GaugeGuard {
    pub(crate) fn increment(key: &'static str) -> Self {
        gauge!(key).increment(1.0);
        Self { key }
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        gauge!(self.key).decrement(1.0);
    }
}
