//! Per-session liveness settings.

use serde::{Deserialize, Serialize};

/// Deadlines and probe cadence applied to every session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeepaliveSettings {
    /// A session with no inbound traffic for this long is considered dead.
    pub read_deadline_ms: u64,
    /// Upper bound on a single outbound write.
    pub write_deadline_ms: u64,
    /// Idle time after which the writer sends a probe. Should be below
    /// `read_deadline_ms`.
    pub probe_interval_ms: u64,
    /// Largest inbound message accepted, in bytes.
    pub max_message_size: usize,
}

impl Default for KeepaliveSettings {
    fn default() -> Self {
        Self {
            read_deadline_ms: 60_000,
            write_deadline_ms: 10_000,
            probe_interval_ms: 54_000,
            max_message_size: 512,
        }
    }
}
