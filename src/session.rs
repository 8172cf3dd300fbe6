//! Session: server-side state for one connected client
//!
//! A `Session` is created once authentication succeeds and owns the
//! client's identity, its open flag, its current room membership, and the
//! outbound line channel. Command dispatch lives here; the connection
//! handler only reads lines and feeds them in.
//!
//! Equality contract: two `Session` handles are equal iff their usernames
//! are equal. Room member sets and owner checks rely on this.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::SendError;
use crate::protocol::{self, Command};
use crate::room::Room;
use crate::server::ServerCore;
use crate::types::{RoomName, SessionId};

/// Item on a session's outbound channel, drained by its writer task
#[derive(Debug)]
pub enum Outbound {
    /// One protocol line (newline appended by the writer)
    Line(String),
    /// Close the connection after flushing
    Disconnect,
}

/// Server-side state for one connected, authenticated client
pub struct Session {
    /// Connection identifier for logs
    id: SessionId,
    /// Unique among live sessions; immutable after authentication
    username: String,
    /// Outbound line channel to this client's writer task
    outbound: mpsc::UnboundedSender<Outbound>,
    /// Monotonic true→false; flipped exactly once by shutdown
    open: AtomicBool,
    /// The room this session is currently a member of, if any
    current_room: Mutex<Option<Arc<Room>>>,
}

impl Session {
    pub fn new(username: impl Into<String>, outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id: SessionId::new(),
            username: username.into(),
            outbound,
            open: AtomicBool::new(true),
            current_room: Mutex::new(None),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Queue one line for delivery to this client.
    ///
    /// A no-op once the session has been shut down; callers ignore the
    /// result because sending to a departed member must never abort a
    /// broadcast.
    pub fn send(&self, line: impl Into<String>) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::SessionClosed);
        }
        self.outbound
            .send(Outbound::Line(line.into()))
            .map_err(|_| SendError::ChannelClosed)
    }

    /// The room this session currently belongs to, if any
    pub fn current_room(&self) -> Option<Arc<Room>> {
        self.current_room.lock().unwrap().clone()
    }

    /// Forcibly clear room membership and deliver the `kickOut` sentinel.
    ///
    /// Called by the room (under its lock) on kick and close. The
    /// connection stays open; the client is simply roomless afterwards.
    pub fn kick_from_room(&self) {
        *self.current_room.lock().unwrap() = None;
        let _ = self.send(protocol::KICK_OUT);
    }

    /// Flip open→closed. Returns true for the first caller only.
    fn mark_closed(&self) -> bool {
        self.open
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Idempotent shutdown: leave the current room, deregister, close the
    /// connection, announce the departure.
    ///
    /// Safe to invoke from both the read-loop-exit path and any racing
    /// path; the first caller wins and later calls return immediately.
    /// Leaving is a plain leave even for a room owner: disconnecting does
    /// not close an owned room.
    pub fn shutdown(&self, core: &ServerCore) {
        if !self.mark_closed() {
            return;
        }
        debug!("Session {} ('{}') shutting down", self.id, self.username);

        let current = self.current_room.lock().unwrap().take();
        if let Some(room) = current {
            room.leave(self, core.rooms());
        }
        core.deregister(self);
        let _ = self.outbound.send(Outbound::Disconnect);
        core.broadcast_system(&format!("{} disconnected", self.username));
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
    }
}

impl Eq for Session {}

impl Hash for Session {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.username.hash(state);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

/// Dispatch one parsed command for a session.
///
/// `Command::Exit` is handled by the read loop and is a no-op here.
pub fn dispatch(session: &Arc<Session>, cmd: Command<'_>, core: &ServerCore) {
    match cmd {
        Command::Join(raw) => join_room(session, raw, core),
        Command::Leave => leave_room(session, core),
        Command::Rooms => {
            let _ = session.send(protocol::room_listing(&core.rooms().room_info()));
        }
        Command::Close => close_room(session, core),
        Command::Kick(target) => kick_user(session, target, core),
        Command::Members => list_members(session),
        Command::Help => {
            let _ = session.send(protocol::HELP_TEXT);
        }
        Command::Exit => {}
        Command::Chat(text) => chat(session, text),
    }
}

fn join_room(session: &Arc<Session>, raw: &str, core: &ServerCore) {
    let Some(name) = RoomName::parse(raw) else {
        let _ = session.send(protocol::ERR_EMPTY_ROOM_NAME);
        return;
    };

    // Leave the old room first; this may delete it if we were the sole
    // member, so rejoining the same name can land in a fresh room.
    let old = session.current_room.lock().unwrap().take();
    if let Some(old) = old {
        old.leave(session, core.rooms());
        let _ = session.send(format!("Left room: {}", old.name()));
    }

    let _ = session.send(format!("Joined room: {}", name));
    let room = loop {
        let candidate = core.rooms().get_or_create(&name, session);
        if candidate.join(session) {
            break candidate;
        }
        // Lost a race with empty-room deletion; the next lookup creates a
        // fresh room.
    };
    *session.current_room.lock().unwrap() = Some(room);
    info!("'{}' joined room {}", session.username(), name);
}

fn leave_room(session: &Arc<Session>, core: &ServerCore) {
    let current = session.current_room.lock().unwrap().clone();
    let Some(room) = current else {
        let _ = session.send(protocol::ERR_NOT_IN_ROOM);
        return;
    };

    if room.is_owner(session) {
        // The owner leaving closes the whole room; the close path clears
        // everyone's membership, this session's included.
        room.close(core.rooms());
    } else {
        session.current_room.lock().unwrap().take();
        room.leave(session, core.rooms());
        let _ = session.send(format!("Left room: {}", room.name()));
    }
}

fn close_room(session: &Arc<Session>, core: &ServerCore) {
    let current = session.current_room.lock().unwrap().clone();
    match current {
        Some(room) if room.is_owner(session) => room.close(core.rooms()),
        _ => {
            let _ = session.send(protocol::ERR_NOT_OWNER);
        }
    }
}

fn kick_user(session: &Arc<Session>, target: &str, core: &ServerCore) {
    let current = session.current_room.lock().unwrap().clone();
    match current {
        Some(room) if room.is_owner(session) => {
            if room.kick(target, core.rooms()) {
                let _ = session.send(format!("User '{}' has been kicked.", target));
            } else {
                let _ = session.send(protocol::ERR_USER_NOT_FOUND);
            }
        }
        _ => {
            let _ = session.send(protocol::ERR_KICK_NOT_OWNER);
        }
    }
}

fn list_members(session: &Arc<Session>) {
    let current = session.current_room.lock().unwrap().clone();
    match current {
        Some(room) => room.send_members_to(session),
        None => {
            let _ = session.send(protocol::ERR_NOT_IN_ROOM);
        }
    }
}

fn chat(session: &Arc<Session>, text: &str) {
    let current = session.current_room.lock().unwrap().clone();
    match current {
        Some(room) => room.broadcast(&format!("{}: {}", session.username(), text)),
        None => {
            let _ = session.send(protocol::ERR_NO_ROOM_FOR_CHAT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session(name: &str) -> (Arc<Session>, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Session::new(name, tx)), rx)
    }

    fn drain_lines(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let Outbound::Line(line) = msg {
                lines.push(line);
            }
        }
        lines
    }

    #[test]
    fn test_equality_by_username() {
        let (a1, _rx1) = test_session("alice");
        let (a2, _rx2) = test_session("alice");
        let (b, _rx3) = test_session("bob");

        assert_eq!(*a1, *a2);
        assert_ne!(*a1, *b);
    }

    #[test]
    fn test_send_delivers_line() {
        let (session, mut rx) = test_session("alice");
        session.send("hello").unwrap();
        assert_eq!(drain_lines(&mut rx), vec!["hello".to_string()]);
    }

    #[test]
    fn test_send_is_noop_after_close() {
        let (session, mut rx) = test_session("alice");
        assert!(session.mark_closed());
        assert!(session.send("hello").is_err());
        assert!(drain_lines(&mut rx).is_empty());
    }

    #[test]
    fn test_mark_closed_first_caller_wins() {
        let (session, _rx) = test_session("alice");
        assert!(session.mark_closed());
        assert!(!session.mark_closed());
        assert!(!session.is_open());
    }

    #[test]
    fn test_kick_from_room_sends_sentinel() {
        let (session, mut rx) = test_session("alice");
        session.kick_from_room();
        assert!(session.current_room().is_none());
        assert_eq!(drain_lines(&mut rx), vec![protocol::KICK_OUT.to_string()]);
    }
}
