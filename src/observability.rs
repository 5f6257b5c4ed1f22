use std::net::SocketAddr;

use crate::error::BookingError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings written. Labels: category.
pub const BOOKINGS_CREATED_TOTAL: &str = "callabo_bookings_created_total";

/// Counter: booking requests refused. Labels: reason.
pub const BOOKINGS_REJECTED_TOTAL: &str = "callabo_bookings_rejected_total";

/// Counter: status changes applied. Labels: to.
pub const STATUS_TRANSITIONS_TOTAL: &str = "callabo_status_transitions_total";

/// Counter: direct messages stored.
pub const MESSAGES_SENT_TOTAL: &str = "callabo_messages_sent_total";

/// Histogram: HTTP request latency in seconds. Labels: route.
pub const REQUEST_DURATION_SECONDS: &str = "callabo_request_duration_seconds";

/// Counter: notifications that could not be delivered.
pub const NOTIFICATION_FAILURES_TOTAL: &str = "callabo_notification_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: number of loaded spaces (engines).
pub const TENANTS_ACTIVE: &str = "callabo_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "callabo_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (mutations per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "callabo_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
/// A failed install is logged; the service keeps running without metrics.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics"),
        Err(e) => tracing::error!("failed to install Prometheus exporter on {addr}: {e}"),
    }
}

/// Count a refused booking under its error kind.
pub fn record_rejection(err: &BookingError) {
    metrics::counter!(BOOKINGS_REJECTED_TOTAL, "reason" => err.code()).increment(1);
}
