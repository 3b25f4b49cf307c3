//! # parley-core
//!
//! Shared vocabulary for the parley messaging hub.
//!
//! - **Branded IDs**: [`SessionId`] (generated per connection) and [`UserId`]
//!   (supplied by the identity collaborator) as newtypes for type safety
//! - **Envelope**: the transport-agnostic [`Envelope`] exchanged with clients,
//!   discriminated by [`EnvelopeKind`]
//! - **Logging**: `tracing` subscriber initialisation shared by binaries and tests

#![deny(unsafe_code)]

pub mod envelope;
pub mod ids;
pub mod logging;

pub use envelope::{Envelope, EnvelopeKind};
pub use ids::{SessionId, UserId};
