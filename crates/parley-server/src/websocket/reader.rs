//! Inbound half of a session: decode, stamp, dispatch by tag.

use std::fmt;
use std::time::Duration;

use axum::extract::ws::Message;
use chrono::Utc;
use futures::{Stream, StreamExt};
use parley_core::{Envelope, EnvelopeKind, SessionId, UserId};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::SessionError;
use crate::hub::{HubHandle, SessionHandle};

/// What the reader knows about its own session.
#[derive(Clone, Debug)]
pub(crate) struct SessionContext {
    pub(crate) session_id: SessionId,
    pub(crate) user_id: UserId,
    pub(crate) username: String,
    pub(crate) hub: HubHandle,
}

impl SessionContext {
    pub(crate) fn new(session: &SessionHandle, hub: HubHandle) -> Self {
        Self {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            username: session.username.clone(),
            hub,
        }
    }
}

/// How an inbound envelope was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Inbound {
    /// A reply was queued for this session.
    Replied,
    /// Logged only.
    Observed,
    /// Not a tag clients may send; dropped.
    Discarded,
}

/// Read frames until the peer closes, a fatal error occurs, or `cancel` fires.
///
/// Every read is bounded by `read_deadline`, so any inbound frame (including
/// a pong answering a probe) refreshes it.
pub(crate) async fn run_reader<S, E>(
    stream: &mut S,
    ctx: &SessionContext,
    read_deadline: Duration,
    cancel: &CancellationToken,
) -> Result<(), SessionError>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            next = timeout(read_deadline, stream.next()) => next,
        };

        let message = match next {
            Err(_) => return Err(SessionError::ReadTimeout(read_deadline)),
            Ok(None) => {
                debug!("connection ended without close frame");
                return Ok(());
            }
            Ok(Some(Err(err))) => return Err(SessionError::Transport(err.to_string())),
            Ok(Some(Ok(message))) => message,
        };

        let envelope = match &message {
            Message::Text(text) => Envelope::decode(text.as_str())?,
            Message::Binary(data) => {
                let text = std::str::from_utf8(data).map_err(|_| SessionError::NonUtf8Frame)?;
                Envelope::decode(text)?
            }
            Message::Ping(_) | Message::Pong(_) => {
                trace!("control frame");
                continue;
            }
            Message::Close(frame) => {
                debug!(?frame, "peer sent close frame");
                return Ok(());
            }
        };

        let _ = handle_inbound(ctx, envelope);
    }
}

/// Overwrite identity fields with the session's own and set receipt time.
pub(crate) fn stamp(envelope: Envelope, ctx: &SessionContext) -> Envelope {
    Envelope {
        user_id: Some(ctx.user_id.clone()),
        username: Some(ctx.username.clone()),
        timestamp: Utc::now(),
        ..envelope
    }
}

pub(crate) fn handle_inbound(ctx: &SessionContext, envelope: Envelope) -> Inbound {
    let envelope = stamp(envelope, ctx);
    match &envelope.kind {
        EnvelopeKind::Ping => {
            if let Err(err) = ctx.hub.send_to_session(&ctx.session_id, Envelope::pong()) {
                debug!(error = %err, "pong not queued");
            }
            Inbound::Replied
        }
        EnvelopeKind::Chat => {
            info!(
                user_id = %ctx.user_id,
                content_len = envelope.content.len(),
                "inbound chat frame"
            );
            Inbound::Observed
        }
        EnvelopeKind::Pong => {
            debug!("client pong");
            Inbound::Observed
        }
        other => {
            warn!(kind = %other, "unsupported inbound envelope type, discarding");
            Inbound::Discarded
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
