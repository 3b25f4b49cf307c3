//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may name any subset of fields and the rest keep their defaults.

mod keepalive;
mod server;

pub use keepalive::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the parley hub.
///
/// ```json
/// {
///   "server": { "port": 9090 },
///   "hub": { "mailboxCapacity": 64 },
///   "keepalive": { "readDeadlineMs": 30000 }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParleySettings {
    /// Listener and upgrade-boundary settings.
    pub server: ServerSettings,
    /// Registry settings.
    pub hub: HubSettings,
    /// Per-session deadlines and probe cadence.
    pub keepalive: KeepaliveSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl ParleySettings {
    /// Reject values the hub cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.hub.mailbox_capacity == 0 {
            return Err(invalid("hub.mailboxCapacity must be greater than 0"));
        }
        if self.keepalive.read_deadline_ms == 0 {
            return Err(invalid("keepalive.readDeadlineMs must be greater than 0"));
        }
        if self.keepalive.write_deadline_ms == 0 {
            return Err(invalid("keepalive.writeDeadlineMs must be greater than 0"));
        }
        if self.keepalive.probe_interval_ms == 0 {
            return Err(invalid("keepalive.probeIntervalMs must be greater than 0"));
        }
        if self.keepalive.max_message_size == 0 {
            return Err(invalid("keepalive.maxMessageSize must be greater than 0"));
        }
        if self.server.max_connections == 0 {
            return Err(invalid("server.maxConnections must be greater than 0"));
        }
        if self.logging.format.parse::<parley_core::logging::LogFormat>().is_err() {
            return Err(SettingsError::InvalidValue(format!(
                "logging.format '{}' is not one of compact, json",
                self.logging.format
            )));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> SettingsError {
    SettingsError::InvalidValue(msg.to_owned())
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    /// `compact` or `json`.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
