use std::net::SocketAddr;

use crate::engine::TransitionAction;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: reservations admitted (one per bundle item). Labels: none.
pub const ADMISSIONS_TOTAL: &str = "gearbook_admissions_total";

/// Counter: admissions or approvals refused for lack of capacity.
pub const CAPACITY_REJECTIONS_TOTAL: &str = "gearbook_capacity_rejections_total";

/// Counter: committed lifecycle transitions. Labels: action.
pub const TRANSITIONS_TOTAL: &str = "gearbook_transitions_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Counter: stale pending reservations swept to canceled.
pub const RESERVATIONS_REAPED_TOTAL: &str = "gearbook_reservations_reaped_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "gearbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "gearbook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Install the default fmt tracing subscriber. Hosts embedding the engine
/// with their own subscriber skip this.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}

/// Map a transition action to a short label for metrics.
pub fn action_label(action: TransitionAction) -> &'static str {
    match action {
        TransitionAction::Approve => "approve",
        TransitionAction::Reject => "reject",
        TransitionAction::Cancel => "cancel",
        TransitionAction::MarkReturned => "mark_returned",
    }
}
