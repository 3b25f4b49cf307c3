//! # parley-settings
//!
//! Settings for the parley hub, loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ParleySettings::default()`]
//! 2. **User file**: `~/.parley/settings.json` or an explicit path, deep-merged over defaults
//! 3. **Environment variables**: `PARLEY_*` overrides (highest priority)
//!
//! Command-line flags are applied by the binary on top of the loaded value.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_env_overrides_with, deep_merge, load_settings,
    load_settings_from_path, settings_path,
};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = ParleySettings::default();
        let path = settings_path();
        assert!(path.ends_with(".parley/settings.json"));
    }

    #[test]
    fn default_settings_values() {
        let settings = ParleySettings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.max_connections, 10_000);
        assert_eq!(settings.hub.mailbox_capacity, 256);
        assert_eq!(settings.keepalive.read_deadline_ms, 60_000);
        assert_eq!(settings.keepalive.write_deadline_ms, 10_000);
        assert_eq!(settings.keepalive.probe_interval_ms, 54_000);
        assert_eq!(settings.keepalive.max_message_size, 512);
        assert_eq!(settings.logging.level, "info");
        assert!(settings.validate().is_ok());
    }
}
