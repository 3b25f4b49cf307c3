//! Requests submitted to the hub control loop.

use parley_core::{SessionId, UserId};
use tokio::sync::oneshot;

use super::registry::{Frame, SessionHandle};
use super::{Delivery, HubStats};

/// One unit of work for the control loop, processed in arrival order.
#[derive(Debug)]
pub(crate) enum Command {
    Register(SessionHandle),
    Unregister(SessionId),
    SendToUser {
        user_id: UserId,
        frame: Frame,
        reply: oneshot::Sender<Delivery>,
    },
    Broadcast {
        frame: Frame,
        reply: oneshot::Sender<Delivery>,
    },
    SendToSession {
        session_id: SessionId,
        frame: Frame,
    },
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Register(_) => "register",
            Self::Unregister(_) => "unregister",
            Self::SendToUser { .. } => "send_to_user",
            Self::Broadcast { .. } => "broadcast",
            Self::SendToSession { .. } => "send_to_session",
            Self::Stats { .. } => "stats",
        }
    }
}
