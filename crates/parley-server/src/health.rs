//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

use crate::hub::HubStats;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"healthy"` while the hub runs, `"shutting_down"` once it has stopped.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Live WebSocket sessions.
    pub connections: usize,
    /// Users with at least one live session.
    pub connected_users: usize,
}

/// Build a health response. `stats` is `None` when the hub no longer answers.
pub fn health_check(start_time: Instant, stats: Option<HubStats>) -> HealthResponse {
    let status = if stats.is_some() {
        "healthy"
    } else {
        "shutting_down"
    };
    let stats = stats.unwrap_or_default();
    HealthResponse {
        status: status.into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections: stats.total_connections,
        connected_users: stats.connected_users,
    }
}
