//! # parley-server
//!
//! Real-time delivery for the chat backend.
//!
//! - **Hub**: a single control loop owning the session tables; every
//!   membership change and dispatch decision is a command processed in
//!   arrival order
//! - **Sessions**: one reader and one writer loop per WebSocket, a bounded
//!   mailbox between the hub and the writer, read/write deadlines and probes
//! - **HTTP surface**: the upgrade endpoint behind an identity boundary,
//!   hub stats, health, and Prometheus metrics
//! - **Shutdown**: a root `CancellationToken` stops the listener and the hub,
//!   which closes every mailbox

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod health;
pub mod hub;
pub mod identity;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use error::{HubError, SessionError};
pub use hub::{Delivery, Hub, HubConfig, HubHandle, HubStats};
pub use identity::{Identity, IdentityRejection, IdentityResolver, TrustedHeaderResolver};
pub use server::ParleyServer;
