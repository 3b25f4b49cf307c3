//! WebSocket sessions: upgrade, reader and writer loops, keepalive.

pub mod keepalive;
pub mod phase;
mod reader;
pub mod session;
pub mod upgrade;
mod writer;

pub use keepalive::KeepalivePolicy;
pub use phase::SessionPhase;
pub use session::{run_session, serve_socket};
