//! The hub: single owner of session membership and dispatch.
//!
//! [`Hub::spawn`] starts one control loop that owns the [`Registry`]. Every
//! other context talks to it through a cloned [`HubHandle`], which submits
//! commands on an unbounded channel. The loop never performs network I/O and
//! never blocks on a mailbox: pushes use `try_send`, and a full mailbox gets
//! its session evicted instead of stalling the loop.

mod command;
pub mod registry;

pub use registry::{Frame, Mailbox, Registry, SessionHandle};

use std::sync::Arc;

use metrics::counter;
use parley_core::{Envelope, SessionId, UserId};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::HubError;
use crate::metrics::{
    HUB_DELIVERIES_TOTAL, HUB_DISPATCH_TOTAL, HUB_EVICTIONS_TOTAL, HUB_WELCOME_DROPPED_TOTAL,
};
use command::Command;

/// Hub tuning.
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Frames buffered per session before it is evicted.
    pub mailbox_capacity: usize,
    /// Content of the `system` envelope every new session receives first.
    pub welcome_message: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
            welcome_message: "Welcome to the chat assistant!".into(),
        }
    }
}

impl HubConfig {
    /// Build from the `hub` settings section.
    pub fn from_settings(settings: &parley_settings::HubSettings) -> Self {
        Self {
            mailbox_capacity: settings.mailbox_capacity,
            welcome_message: settings.welcome_message.clone(),
        }
    }
}

/// Outcome of one dispatch call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Mailboxes the frame was pushed into.
    pub delivered: usize,
    /// Sessions evicted because their mailbox was full.
    pub evicted: usize,
}

/// Point-in-time membership counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Distinct users with at least one live session.
    pub connected_users: usize,
    /// Live sessions.
    pub total_connections: usize,
}

/// The control loop state.
pub struct Hub {
    config: HubConfig,
    registry: Registry,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Hub {
    /// Start the control loop. It runs until `cancel` fires.
    pub fn spawn(config: HubConfig, cancel: CancellationToken) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = HubHandle {
            commands: tx,
            mailbox_capacity: config.mailbox_capacity,
        };
        let hub = Self {
            config,
            registry: Registry::new(),
            commands: rx,
        };
        let task = tokio::spawn(hub.run(cancel));
        (handle, task)
    }

    async fn run(mut self, cancel: CancellationToken) {
        info!(mailbox_capacity = self.config.mailbox_capacity, "hub started");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.handle(cmd);
                }
            }
        }
        self.commands.close();
        let closed = self.registry.clear();
        info!(closed, "hub stopped");
    }

    fn handle(&mut self, cmd: Command) {
        trace!(command = cmd.name(), "hub command");
        match cmd {
            Command::Register(session) => self.register(session),
            Command::Unregister(id) => self.unregister(&id),
            Command::SendToUser {
                user_id,
                frame,
                reply,
            } => {
                let targets = self.registry.sessions_for(&user_id).to_vec();
                let delivery = self.push_all(&targets, &frame);
                counter!(HUB_DISPATCH_TOTAL, "target" => "user").increment(1);
                debug!(
                    user_id = %user_id,
                    delivered = delivery.delivered,
                    evicted = delivery.evicted,
                    "dispatched to user"
                );
                let _ = reply.send(delivery);
            }
            Command::Broadcast { frame, reply } => {
                let targets = self.registry.session_ids();
                let delivery = self.push_all(&targets, &frame);
                counter!(HUB_DISPATCH_TOTAL, "target" => "all").increment(1);
                debug!(
                    delivered = delivery.delivered,
                    evicted = delivery.evicted,
                    "broadcast"
                );
                let _ = reply.send(delivery);
            }
            Command::SendToSession { session_id, frame } => {
                let _ = self.push_all(std::slice::from_ref(&session_id), &frame);
                counter!(HUB_DISPATCH_TOTAL, "target" => "session").increment(1);
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    fn register(&mut self, session: SessionHandle) {
        match Envelope::system(self.config.welcome_message.as_str()).encode() {
            Ok(json) => match session.push(Frame::from(json)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    counter!(HUB_WELCOME_DROPPED_TOTAL).increment(1);
                    warn!(session_id = %session.id, "mailbox full at registration, welcome dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(session_id = %session.id, "mailbox closed before welcome");
                }
            },
            Err(err) => warn!(error = %err, "failed to encode welcome envelope"),
        }

        info!(
            session_id = %session.id,
            user_id = %session.user_id,
            username = %session.username,
            "session registered"
        );
        self.registry.insert(session);
        debug!(
            total = self.registry.session_count(),
            users = self.registry.user_count(),
            "registry size"
        );
    }

    fn unregister(&mut self, id: &SessionId) {
        if let Some(session) = self.registry.remove(id) {
            info!(
                session_id = %session.id,
                user_id = %session.user_id,
                connected_secs = session.connected_at.elapsed().as_secs(),
                total = self.registry.session_count(),
                "session unregistered"
            );
        }
    }

    fn push_all(&mut self, targets: &[SessionId], frame: &Frame) -> Delivery {
        let mut delivery = Delivery::default();
        for id in targets {
            let Some(session) = self.registry.get(id) else {
                continue;
            };
            match session.push(Arc::clone(frame)) {
                Ok(()) => delivery.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    if let Some(evicted) = self.registry.remove(id) {
                        counter!(HUB_EVICTIONS_TOTAL).increment(1);
                        warn!(
                            session_id = %evicted.id,
                            user_id = %evicted.user_id,
                            "mailbox full, evicting session"
                        );
                    }
                    delivery.evicted += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    if let Some(gone) = self.registry.remove(id) {
                        debug!(session_id = %gone.id, "mailbox closed, removing session");
                    }
                }
            }
        }
        counter!(HUB_DELIVERIES_TOTAL).increment(u64::try_from(delivery.delivered).unwrap_or(u64::MAX));
        delivery
    }

    fn stats(&self) -> HubStats {
        HubStats {
            connected_users: self.registry.user_count(),
            total_connections: self.registry.session_count(),
        }
    }
}

/// Cloneable entry point to the hub control loop.
#[derive(Clone, Debug)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<Command>,
    mailbox_capacity: usize,
}

impl HubHandle {
    /// Create a session handle and mailbox sized for this hub.
    pub fn open_session(&self, user_id: UserId, username: impl Into<String>) -> (SessionHandle, Mailbox) {
        SessionHandle::new(user_id, username, self.mailbox_capacity)
    }

    /// Add a session. The welcome envelope is queued before any later dispatch.
    ///
    /// After shutdown the handle is dropped, which closes its mailbox.
    pub fn register(&self, session: SessionHandle) {
        if self.commands.send(Command::Register(session)).is_err() {
            debug!("hub is shut down, registration dropped");
        }
    }

    /// Remove a session and close its mailbox. Unknown ids are a no-op.
    pub fn unregister(&self, session_id: &SessionId) {
        let _ = self.commands.send(Command::Unregister(session_id.clone()));
    }

    /// Push an envelope to every session of `user_id`.
    ///
    /// An offline user is not an error. Returns once the pushes have been
    /// attempted; never waits on network I/O.
    pub async fn send_to_user(
        &self,
        user_id: &UserId,
        envelope: Envelope,
    ) -> Result<Delivery, HubError> {
        let frame = encode(envelope)?;
        let (reply, rx) = oneshot::channel();
        self.submit(Command::SendToUser {
            user_id: user_id.clone(),
            frame,
            reply,
        })?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Push an envelope to every live session.
    pub async fn broadcast(&self, envelope: Envelope) -> Result<Delivery, HubError> {
        let frame = encode(envelope)?;
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Broadcast { frame, reply })?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Push an envelope to one session without waiting for the outcome.
    pub(crate) fn send_to_session(
        &self,
        session_id: &SessionId,
        envelope: Envelope,
    ) -> Result<(), HubError> {
        let frame = encode(envelope)?;
        self.submit(Command::SendToSession {
            session_id: session_id.clone(),
            frame,
        })
    }

    /// Membership counts. Observes every command submitted before it.
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Stats { reply })?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Distinct users with at least one live session; 0 after shutdown.
    pub async fn connected_user_count(&self) -> usize {
        self.stats().await.map_or(0, |s| s.connected_users)
    }

    /// Live sessions; 0 after shutdown.
    pub async fn total_connection_count(&self) -> usize {
        self.stats().await.map_or(0, |s| s.total_connections)
    }

    /// Whether the control loop has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn submit(&self, cmd: Command) -> Result<(), HubError> {
        self.commands.send(cmd).map_err(|_| HubError::Closed)
    }
}

/// Stamp the dispatch time and serialize once.
fn encode(envelope: Envelope) -> Result<Frame, HubError> {
    let json = envelope.stamped_now().encode()?;
    Ok(Frame::from(json))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
