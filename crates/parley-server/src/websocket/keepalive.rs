//! Read/write deadlines and probe cadence for one session.

use std::time::Duration;

use tracing::warn;

/// Liveness rules applied to every session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeepalivePolicy {
    /// Longest gap between inbound frames before the session is considered dead.
    pub read_deadline: Duration,
    /// Longest a single outbound write may take.
    pub write_deadline: Duration,
    /// Idle time after the last write before a probe is sent.
    pub probe_interval: Duration,
    /// Largest inbound message or frame, in bytes.
    pub max_message_size: usize,
}

impl Default for KeepalivePolicy {
    fn default() -> Self {
        Self {
            read_deadline: Duration::from_secs(60),
            write_deadline: Duration::from_secs(10),
            probe_interval: Duration::from_secs(54),
            max_message_size: 512,
        }
    }
}

impl KeepalivePolicy {
    /// Build a policy, pulling the probe interval under the read deadline if needed.
    pub fn new(
        read_deadline: Duration,
        write_deadline: Duration,
        probe_interval: Duration,
        max_message_size: usize,
    ) -> Self {
        Self {
            read_deadline,
            write_deadline,
            probe_interval,
            max_message_size,
        }
        .normalized()
    }

    /// Build from the `keepalive` settings section.
    pub fn from_settings(settings: &parley_settings::KeepaliveSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.read_deadline_ms),
            Duration::from_millis(settings.write_deadline_ms),
            Duration::from_millis(settings.probe_interval_ms),
            settings.max_message_size,
        )
    }

    /// A probe must go out before the peer's silence can hit the read deadline.
    fn normalized(mut self) -> Self {
        if self.probe_interval.is_zero() || self.probe_interval >= self.read_deadline {
            let corrected = self.read_deadline.mul_f64(0.9);
            warn!(
                probe_interval = ?self.probe_interval,
                read_deadline = ?self.read_deadline,
                corrected = ?corrected,
                "probe interval must be shorter than the read deadline, adjusting"
            );
            self.probe_interval = corrected;
        }
        self
    }
}
