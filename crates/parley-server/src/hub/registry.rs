//! Session membership tables.
//!
//! Plain data owned by the hub control loop. A session is present in
//! `sessions` exactly when its id appears in exactly one `users` entry, and
//! no user entry is ever left empty.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Instant;

use parley_core::{SessionId, UserId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// One envelope serialized once, shared by every mailbox it is pushed to.
pub type Frame = Arc<str>;

/// Receiving end of a session mailbox. Drained only by that session's writer.
pub type Mailbox = mpsc::Receiver<Frame>;

/// The registry's view of a live session.
///
/// Holds the only sender for the session's mailbox, so dropping the handle
/// closes the mailbox and lets the writer loop finish.
#[derive(Debug)]
pub struct SessionHandle {
    /// Connection identity.
    pub id: SessionId,
    /// Owning user, fixed for the session's lifetime.
    pub user_id: UserId,
    /// Display name captured at connect time.
    pub username: String,
    /// When the session was accepted.
    pub connected_at: Instant,
    mailbox: mpsc::Sender<Frame>,
}

impl SessionHandle {
    /// Create a handle and its mailbox with room for `capacity` frames.
    pub fn new(user_id: UserId, username: impl Into<String>, capacity: usize) -> (Self, Mailbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: SessionId::new(),
            user_id,
            username: username.into(),
            connected_at: Instant::now(),
            mailbox: tx,
        };
        (handle, rx)
    }

    /// Non-blocking push onto the mailbox.
    pub(crate) fn push(&self, frame: Frame) -> Result<(), TrySendError<Frame>> {
        self.mailbox.try_send(frame)
    }
}

/// Session and per-user tables.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<SessionId, SessionHandle>,
    users: HashMap<UserId, Vec<SessionId>>,
}

impl Registry {
    /// Empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session, appending it to its user's list.
    ///
    /// Re-inserting an id already present replaces the old handle.
    pub fn insert(&mut self, handle: SessionHandle) {
        let _ = self.remove(&handle.id);
        self.users
            .entry(handle.user_id.clone())
            .or_default()
            .push(handle.id.clone());
        let _ = self.sessions.insert(handle.id.clone(), handle);
    }

    /// Remove a session from both tables. Absent ids are a no-op.
    pub fn remove(&mut self, id: &SessionId) -> Option<SessionHandle> {
        let handle = self.sessions.remove(id)?;
        if let Entry::Occupied(mut entry) = self.users.entry(handle.user_id.clone()) {
            entry.get_mut().retain(|sid| sid != id);
            if entry.get().is_empty() {
                let _ = entry.remove();
            }
        }
        Some(handle)
    }

    /// Look up a live session.
    pub fn get(&self, id: &SessionId) -> Option<&SessionHandle> {
        self.sessions.get(id)
    }

    /// A user's sessions in registration order.
    pub fn sessions_for(&self, user_id: &UserId) -> &[SessionId] {
        self.users.get(user_id).map_or(&[], Vec::as_slice)
    }

    /// Snapshot of every live session id.
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.keys().cloned().collect()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of users with at least one live session.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Drop every session, closing all mailboxes. Returns how many there were.
    pub fn clear(&mut self) -> usize {
        let n = self.sessions.len();
        self.sessions.clear();
        self.users.clear();
        n
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(user: &str) -> (SessionHandle, Mailbox) {
        SessionHandle::new(UserId::from(user), user, 4)
    }

    #[test]
    fn insert_and_count() {
        let mut reg = Registry::new();
        let (a, _ra) = handle("alice");
        let (b, _rb) = handle("alice");
        let (c, _rc) = handle("bob");
        reg.insert(a);
        reg.insert(b);
        reg.insert(c);
        assert_eq!(reg.session_count(), 3);
        assert_eq!(reg.user_count(), 2);
        assert_eq!(reg.sessions_for(&UserId::from("alice")).len(), 2);
    }

    #[test]
    fn sessions_kept_in_registration_order() {
        let mut reg = Registry::new();
        let (a, _ra) = handle("u");
        let (b, _rb) = handle("u");
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        reg.insert(a);
        reg.insert(b);
        assert_eq!(reg.sessions_for(&UserId::from("u")), &[a_id, b_id]);
    }

    #[test]
    fn removing_last_session_drops_user_entry() {
        let mut reg = Registry::new();
        let (a, _ra) = handle("alice");
        let (b, _rb) = handle("alice");
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        reg.insert(a);
        reg.insert(b);

        assert!(reg.remove(&a_id).is_some());
        assert_eq!(reg.user_count(), 1);
        assert_eq!(reg.sessions_for(&UserId::from("alice")), &[b_id.clone()]);

        assert!(reg.remove(&b_id).is_some());
        assert_eq!(reg.user_count(), 0);
        assert!(reg.sessions_for(&UserId::from("alice")).is_empty());
    }

    #[test]
    fn remove_is_idempotent() {
        let mut reg = Registry::new();
        let (a, _ra) = handle("alice");
        let id = a.id.clone();
        reg.insert(a);
        assert!(reg.remove(&id).is_some());
        assert!(reg.remove(&id).is_none());
        assert_eq!(reg.session_count(), 0);
    }

    #[test]
    fn reinsert_same_id_does_not_duplicate() {
        let mut reg = Registry::new();
        let (a, _ra) = handle("alice");
        let id = a.id.clone();
        reg.insert(a);
        let (mut again, _r2) = handle("alice");
        again.id = id.clone();
        reg.insert(again);
        assert_eq!(reg.session_count(), 1);
        assert_eq!(reg.sessions_for(&UserId::from("alice")), &[id]);
    }

    #[tokio::test]
    async fn removal_closes_mailbox() {
        let mut reg = Registry::new();
        let (a, mut rx) = handle("alice");
        let id = a.id.clone();
        reg.insert(a);
        drop(reg.remove(&id));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn clear_closes_everything() {
        let mut reg = Registry::new();
        let (a, mut ra) = handle("alice");
        let (b, mut rb) = handle("bob");
        reg.insert(a);
        reg.insert(b);
        assert_eq!(reg.clear(), 2);
        assert_eq!(reg.user_count(), 0);
        assert!(ra.recv().await.is_none());
        assert!(rb.recv().await.is_none());
    }

    #[test]
    fn push_reports_full_and_closed() {
        let (h, rx) = SessionHandle::new(UserId::from("u"), "u", 1);
        assert!(h.push(Frame::from("one")).is_ok());
        assert!(matches!(h.push(Frame::from("two")), Err(TrySendError::Full(_))));
        drop(rx);
        assert!(matches!(h.push(Frame::from("three")), Err(TrySendError::Closed(_))));
    }

    #[test]
    fn zero_capacity_rounds_up_to_one() {
        let (h, _rx) = SessionHandle::new(UserId::from("u"), "u", 0);
        assert!(h.push(Frame::from("one")).is_ok());
        assert!(matches!(h.push(Frame::from("two")), Err(TrySendError::Full(_))));
    }
}
