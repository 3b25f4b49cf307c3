//! WebSocket session lifecycle, from registration through teardown.

use std::fmt;
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, instrument, warn};

use super::keepalive::KeepalivePolicy;
use super::phase::{PhaseTracker, SessionPhase};
use super::reader::{SessionContext, run_reader};
use super::writer::run_writer;
use crate::error::SessionError;
use crate::hub::{HubHandle, Mailbox, SessionHandle};
use crate::identity::Identity;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// Serve an upgraded socket for an authenticated user.
pub async fn serve_socket(
    socket: WebSocket,
    hub: HubHandle,
    identity: Identity,
    policy: KeepalivePolicy,
) {
    let (sink, stream) = socket.split();
    let _ = run_session(stream, sink, hub, identity, policy).await;
}

/// Run one session over any message stream/sink pair.
///
/// 1. Registers with the hub (which queues the welcome envelope)
/// 2. Spawns the writer loop over the mailbox
/// 3. Runs the reader loop until close, error or writer exit
/// 4. Unregisters and waits for the writer to finish
///
/// Returns the error that ended the session, preferring the reader's.
pub async fn run_session<S, K, E>(
    stream: S,
    sink: K,
    hub: HubHandle,
    identity: Identity,
    policy: KeepalivePolicy,
) -> Result<(), SessionError>
where
    S: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: fmt::Display + Send,
    K: Sink<Message> + Unpin + Send + 'static,
    K::Error: fmt::Display + Send,
{
    let (session, mailbox) = hub.open_session(identity.user_id, identity.username);
    drive(session, mailbox, stream, sink, hub, policy).await
}

#[instrument(skip_all, fields(session_id = %session.id, user_id = %session.user_id))]
async fn drive<S, K, E>(
    session: SessionHandle,
    mailbox: Mailbox,
    mut stream: S,
    sink: K,
    hub: HubHandle,
    policy: KeepalivePolicy,
) -> Result<(), SessionError>
where
    S: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: fmt::Display + Send,
    K: Sink<Message> + Unpin + Send + 'static,
    K::Error: fmt::Display + Send,
{
    let ctx = SessionContext::new(&session, hub.clone());
    let mut phase = PhaseTracker::new(ctx.session_id.clone());
    let started = Instant::now();

    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    hub.register(session);
    let _ = phase.advance(SessionPhase::Active);
    info!(username = %ctx.username, "session active");

    let cancel = CancellationToken::new();
    let writer = tokio::spawn(
        {
            let cancel = cancel.clone();
            let mut sink = sink;
            let mut mailbox = mailbox;
            async move {
                let result = run_writer(&mut sink, &mut mailbox, &policy, &cancel).await;
                cancel.cancel();
                let _ = timeout(policy.write_deadline, sink.close()).await;
                result
            }
        }
        .in_current_span(),
    );
    let writer_abort = writer.abort_handle();

    let read_result = run_reader(&mut stream, &ctx, policy.read_deadline, &cancel).await;
    let _ = phase.advance(SessionPhase::Closing);
    cancel.cancel();
    hub.unregister(&ctx.session_id);

    let write_result = match timeout(policy.write_deadline * 2, writer).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(SessionError::Transport(join_err.to_string())),
        Err(_) => {
            warn!("writer did not stop in time, aborting");
            writer_abort.abort();
            Ok(())
        }
    };
    let result = read_result.and(write_result);
    let _ = phase.advance(SessionPhase::Closed);

    let duration = started.elapsed();
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(duration.as_secs_f64());

    match &result {
        Ok(()) => info!(duration_secs = duration.as_secs(), "session closed"),
        Err(err) => warn!(
            duration_secs = duration.as_secs(),
            reason = err.kind(),
            error = %err,
            "session closed on error"
        ),
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
