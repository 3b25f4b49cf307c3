//! Hub and session error types.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by the dispatch API.
///
/// Delivery problems (offline user, full mailbox) are not errors; they show
/// up in [`Delivery`](crate::hub::Delivery) counts instead.
#[derive(Debug, Error)]
pub enum HubError {
    /// The envelope could not be serialized. Nothing was pushed.
    #[error("failed to serialize envelope: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The hub control loop has stopped.
    #[error("hub is shut down")]
    Closed,
}

/// Conditions that end one session. Each is fatal to that session only.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No inbound frame arrived within the read deadline.
    #[error("no inbound traffic within {0:?}")]
    ReadTimeout(Duration),
    /// An outbound write did not complete within the write deadline.
    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),
    /// The underlying connection failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// An inbound frame was not a valid envelope.
    #[error("undecodable frame: {0}")]
    Decode(#[from] serde_json::Error),
    /// An inbound binary frame was not UTF-8.
    #[error("binary frame is not valid UTF-8")]
    NonUtf8Frame,
}

impl SessionError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReadTimeout(_) => "read_timeout",
            Self::WriteTimeout(_) => "write_timeout",
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
            Self::NonUtf8Frame => "non_utf8",
        }
    }
}
