//! Server configuration.

use parley_settings::ParleySettings;

use crate::hub::HubConfig;
use crate::websocket::KeepalivePolicy;

/// Configuration for the parley server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket sessions.
    pub max_connections: usize,
    /// Hub mailbox and welcome settings.
    pub hub: HubConfig,
    /// Per-session deadlines and frame limits.
    pub keepalive: KeepalivePolicy,
    /// Header carrying the authenticated user id.
    pub user_id_header: String,
    /// Header carrying the display name.
    pub username_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 10_000,
            hub: HubConfig::default(),
            keepalive: KeepalivePolicy::default(),
            user_id_header: "x-user-id".into(),
            username_header: "x-username".into(),
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &ParleySettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_connections: settings.server.max_connections,
            hub: HubConfig::from_settings(&settings.hub),
            keepalive: KeepalivePolicy::from_settings(&settings.keepalive),
            user_id_header: settings.server.user_id_header.clone(),
            username_header: settings.server.username_header.clone(),
        }
    }

    /// `host:port` string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
