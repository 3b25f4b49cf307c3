//! Session lifecycle phases.

use std::fmt;

use parley_core::SessionId;
use tracing::{debug, warn};

/// Where a session is in its life. Phases only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionPhase {
    /// Upgrade done, identity bound, not yet registered.
    Connecting,
    /// Registered; both loops running.
    Active,
    /// One loop hit a fatal condition; teardown in progress.
    Closing,
    /// Unregistered and both loops finished. Terminal.
    Closed,
}

impl SessionPhase {
    /// Lowercase name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one session's phase and refuses backward moves.
#[derive(Debug)]
pub struct PhaseTracker {
    session_id: SessionId,
    phase: SessionPhase,
}

impl PhaseTracker {
    /// Start in [`SessionPhase::Connecting`].
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            phase: SessionPhase::Connecting,
        }
    }

    /// Current phase.
    pub fn current(&self) -> SessionPhase {
        self.phase
    }

    /// Move to `next` if it is later than the current phase.
    pub fn advance(&mut self, next: SessionPhase) -> bool {
        if next <= self.phase {
            warn!(
                session_id = %self.session_id,
                from = %self.phase,
                to = %next,
                "rejected session phase transition"
            );
            return false;
        }
        debug!(session_id = %self.session_id, from = %self.phase, to = %next, "session phase");
        self.phase = next;
        true
    }
}
