//! Listener, upgrade boundary and registry settings.

use serde::{Deserialize, Serialize};

/// Network listener and upgrade-boundary settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Upgrade requests beyond this many live sessions are refused.
    pub max_connections: usize,
    /// Header carrying the authenticated user id, set by the upstream gateway.
    pub user_id_header: String,
    /// Header carrying the authenticated user's display name.
    pub username_header: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_connections: 10_000,
            user_id_header: "x-user-id".to_string(),
            username_header: "x-username".to_string(),
        }
    }
}

/// Registry settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Outbound frames buffered per session before it is evicted.
    pub mailbox_capacity: usize,
    /// Content of the `system` envelope sent to every new session.
    pub welcome_message: String,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
            welcome_message: "Welcome to the chat assistant!".to_string(),
        }
    }
}
