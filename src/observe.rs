//! Observability hooks for the gateway coordinators.
//!
//! Coordinators are handed an `Arc<dyn Observer>` at construction and report
//! request counts, latencies and per-file upload outcomes through it. Nothing
//! reads these values back to make a decision.

use std::fmt;

use crate::ingestion::OutcomeStatus;

/// Request counter name, labelled by `endpoint` and `status`.
pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
/// Latency histogram name, labelled by `endpoint`.
pub const REQUEST_LATENCY_SECONDS: &str = "gateway_request_latency_seconds";
/// Per-file upload counter name, labelled by `status`.
pub const FILES_UPLOADED_TOTAL: &str = "gateway_files_uploaded_total";

/// Histogram buckets for [`REQUEST_LATENCY_SECONDS`].
pub const LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0];

/// Inbound endpoint a measurement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Chat,
    Ingest,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Chat => "chat",
            Endpoint::Ingest => "ingest",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal classification of a whole request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    Success,
    BadRequest,
    Error,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::BadRequest => "bad_request",
            RequestStatus::Error => "error",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label value of [`FILES_UPLOADED_TOTAL`] for one file outcome.
///
/// These differ from the API's outcome names; existing dashboards key on them.
pub fn file_outcome_label(status: OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::Accepted => "success",
        OutcomeStatus::UnsupportedType => "unsupported",
        OutcomeStatus::SaveFailed => "save_error",
        OutcomeStatus::PublishFailed => "publish_error",
    }
}

/// Write-only sink for gateway measurements.
///
/// Implementations must tolerate concurrent calls from many in-flight
/// requests.
pub trait Observer: Send + Sync {
    /// Count one finished request.
    fn increment_request(&self, endpoint: Endpoint, status: RequestStatus);

    /// Record the wall-clock duration of one request, in seconds.
    fn observe_latency(&self, endpoint: Endpoint, seconds: f64);

    /// Count one uploaded file by its final outcome.
    fn increment_file_outcome(&self, status: OutcomeStatus);
}

/// Observer that forwards to the process-wide `metrics` recorder.
///
/// When no recorder is installed every call is a no-op, so this is safe to use
/// from tests and library consumers as well.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver;

impl Observer for MetricsObserver {
    fn increment_request(&self, endpoint: Endpoint, status: RequestStatus) {
        metrics::counter!(
            REQUESTS_TOTAL,
            "endpoint" => endpoint.as_str(),
            "status" => status.as_str()
        )
        .increment(1);
    }

    fn observe_latency(&self, endpoint: Endpoint, seconds: f64) {
        metrics::histogram!(REQUEST_LATENCY_SECONDS, "endpoint" => endpoint.as_str()).record(seconds);
    }

    fn increment_file_outcome(&self, status: OutcomeStatus) {
        metrics::counter!(FILES_UPLOADED_TOTAL, "status" => file_outcome_label(status))
            .increment(1);
    }
}

/// Observer that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn increment_request(&self, _endpoint: Endpoint, _status: RequestStatus) {}

    fn observe_latency(&self, _endpoint: Endpoint, _seconds: f64) {}

    fn increment_file_outcome(&self, _status: OutcomeStatus) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_values_are_stable() {
        assert_eq!(Endpoint::Chat.as_str(), "chat");
        assert_eq!(Endpoint::Ingest.to_string(), "ingest");
        assert_eq!(RequestStatus::BadRequest.as_str(), "bad_request");
        assert_eq!(RequestStatus::Success.to_string(), "success");
    }

    #[test]
    fn metrics_observer_without_recorder_is_noop() {
        let observer = MetricsObserver;
        observer.increment_request(Endpoint::Chat, RequestStatus::Error);
        observer.observe_latency(Endpoint::Ingest, 0.25);
        observer.increment_file_outcome(OutcomeStatus::PublishFailed);
    }

    #[test]
    fn file_outcome_labels_match_dashboard_names() {
        assert_eq!(file_outcome_label(OutcomeStatus::Accepted), "success");
        assert_eq!(file_outcome_label(OutcomeStatus::UnsupportedType), "unsupported");
        assert_eq!(file_outcome_label(OutcomeStatus::SaveFailed), "save_error");
        assert_eq!(file_outcome_label(OutcomeStatus::PublishFailed), "publish_error");
    }

    #[test]
    fn latency_buckets_are_sorted() {
        assert!(LATENCY_BUCKETS.windows(2).all(|w| w[0] < w[1]));
    }
}
