//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Fails if a global recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// WebSocket sessions opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket sessions closed total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket sessions (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Session lifetime seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Dispatch requests processed by the hub (counter, labels: target).
pub const HUB_DISPATCH_TOTAL: &str = "hub_dispatch_total";
/// Frames accepted into a mailbox (counter).
pub const HUB_DELIVERIES_TOTAL: &str = "hub_deliveries_total";
/// Sessions evicted for a full mailbox (counter).
pub const HUB_EVICTIONS_TOTAL: &str = "hub_evictions_total";
/// Welcome envelopes that did not fit the fresh mailbox (counter).
pub const HUB_WELCOME_DROPPED_TOTAL: &str = "hub_welcome_dropped_total";
