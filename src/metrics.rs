//! Metrics for the bridge
//!
//! Thin wrappers over the `metrics` facade so call sites never spell metric names.
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    RequestsSuccess,
    RequestsError,
    RequestsRateLimited,
    RequestDuration,
    RecordsReceived,
    RecordsNormalized,
    RecordsDropped,
    BatchesDelivered,
    BatchesFailed,
    BytesSent,
    CyclesCompleted,
    CyclesFailed,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RequestsSuccess => "kismet_bridge_source_requests_success_total",
            MetricName::RequestsError => "kismet_bridge_source_requests_error_total",
            MetricName::RequestsRateLimited => "kismet_bridge_source_requests_rate_limited_total",
            MetricName::RequestDuration => "kismet_bridge_source_request_duration_seconds",
            MetricName::RecordsReceived => "kismet_bridge_records_received_total",
            MetricName::RecordsNormalized => "kismet_bridge_records_normalized_total",
            MetricName::RecordsDropped => "kismet_bridge_records_dropped_total",
            MetricName::BatchesDelivered => "kismet_bridge_batches_delivered_total",
            MetricName::BatchesFailed => "kismet_bridge_batches_failed_total",
            MetricName::BytesSent => "kismet_bridge_bytes_sent_total",
            MetricName::CyclesCompleted => "kismet_bridge_poll_cycles_completed_total",
            MetricName::CyclesFailed => "kismet_bridge_poll_cycles_failed_total",
        }
    }
}

/// Install the Prometheus exporter. Idempotent; a bad address only logs.
pub fn init_metrics(listen_addr: Option<&str>) {
    let Some(addr_str) = listen_addr else {
        return;
    };
    INIT.call_once(|| {
        let addr = match addr_str.parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("Invalid metrics listen address '{}': {}", addr_str, e);
                return;
            }
        };
        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
            Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
        }
    });
}

pub mod source {
    use super::MetricName;

    pub fn request_success(duration_secs: f64) {
        ::metrics::counter!(MetricName::RequestsSuccess.as_str()).increment(1);
        ::metrics::histogram!(MetricName::RequestDuration.as_str()).record(duration_secs);
    }

    pub fn request_error(kind: &'static str) {
        ::metrics::counter!(MetricName::RequestsError.as_str(), "kind" => kind).increment(1);
    }

    pub fn rate_limited() {
        ::metrics::counter!(MetricName::RequestsRateLimited.as_str()).increment(1);
    }
}

pub mod normalize {
    use super::MetricName;

    pub fn batch(received: usize, normalized: usize) {
        ::metrics::counter!(MetricName::RecordsReceived.as_str()).increment(received as u64);
        ::metrics::counter!(MetricName::RecordsNormalized.as_str()).increment(normalized as u64);
        ::metrics::counter!(MetricName::RecordsDropped.as_str())
            .increment(received.saturating_sub(normalized) as u64);
    }
}

pub mod transport {
    use super::MetricName;

    pub fn delivered(bytes: usize) {
        ::metrics::counter!(MetricName::BatchesDelivered.as_str()).increment(1);
        ::metrics::counter!(MetricName::BytesSent.as_str()).increment(bytes as u64);
    }

    pub fn failed(kind: &'static str) {
        ::metrics::counter!(MetricName::BatchesFailed.as_str(), "kind" => kind).increment(1);
    }
}

pub mod service {
    use super::MetricName;

    pub fn cycle_completed() {
        ::metrics::counter!(MetricName::CyclesCompleted.as_str()).increment(1);
    }

    pub fn cycle_failed(kind: &'static str) {
        ::metrics::counter!(MetricName::CyclesFailed.as_str(), "kind" => kind).increment(1);
    }
}
