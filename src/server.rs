//! ServerCore: live-session registry and accept loop
//!
//! Holds the process-wide set of authenticated sessions keyed by
//! username, which is also the username-uniqueness enforcement point,
//! plus the room registry. The accept loop spawns one handler task per
//! inbound connection and never blocks on any individual session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::handler::handle_connection;
use crate::protocol;
use crate::registry::RoomRegistry;
use crate::session::Session;

/// Shared server state: authenticated sessions and the room registry
pub struct ServerCore {
    /// All authenticated sessions: username -> Session
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    /// The process-wide room registry
    rooms: RoomRegistry,
}

impl ServerCore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            rooms: RoomRegistry::new(),
        }
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Whether a username is currently held by a live session
    pub fn is_username_taken(&self, candidate: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(candidate)
    }

    /// Atomically claim a username for a session.
    ///
    /// Returns false when the name is already taken; the caller re-prompts.
    /// This insert-if-absent is the only uniqueness enforcement point, so
    /// the second of two concurrent claims for the same name always loses.
    pub fn try_register(&self, session: Arc<Session>) -> bool {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(session.username()) {
            return false;
        }
        info!(
            "'{}' connected (session {}). Active clients: {}",
            session.username(),
            session.id(),
            sessions.len() + 1
        );
        sessions.insert(session.username().to_string(), session);
        true
    }

    /// Remove a session from the registry, freeing its username
    pub fn deregister(&self, session: &Session) {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.remove(session.username()).is_some() {
            info!(
                "'{}' disconnected. Active clients: {}",
                session.username(),
                sessions.len()
            );
        }
    }

    /// Deliver a `[System]`-prefixed line to every live session
    pub fn broadcast_system(&self, text: &str) {
        let sessions = self.sessions.lock().unwrap();
        let line = protocol::system_frame(text);
        for session in sessions.values() {
            if session.is_open() {
                let _ = session.send(line.clone());
            }
        }
    }

    /// Number of currently registered sessions
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

impl Default for ServerCore {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept loop: spawn one handler task per inbound connection.
///
/// Accept failures are logged and the loop keeps going; only the caller
/// failing to bind the listener is fatal.
pub async fn serve(listener: TcpListener, core: Arc<ServerCore>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let core = core.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, core).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Command;
    use crate::session::{self, Outbound};
    use crate::types::RoomName;
    use tokio::sync::mpsc;

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
    fn test_username_claim_is_exclusive() {
        let core = ServerCore::new();
        let (first, _rx1) = test_session("alice");
        let (second, _rx2) = test_session("alice");

        assert!(core.try_register(first));
        assert!(core.is_username_taken("alice"));
        assert!(!core.try_register(second));
        assert_eq!(core.session_count(), 1);
    }

    #[test]
    fn test_deregister_frees_username() {
        let core = ServerCore::new();
        let (alice, _rx1) = test_session("alice");
        core.try_register(alice.clone());

        core.deregister(&alice);

        assert!(!core.is_username_taken("alice"));
        let (again, _rx2) = test_session("alice");
        assert!(core.try_register(again));
    }

    #[test]
    fn test_broadcast_system_skips_closed_sessions() {
        let core = ServerCore::new();
        let (alice, mut alice_rx) = test_session("alice");
        let (bob, mut bob_rx) = test_session("bob");
        core.try_register(alice.clone());
        core.try_register(bob.clone());

        bob.shutdown(&core);
        drain_lines(&mut alice_rx);
        drain_lines(&mut bob_rx);

        core.broadcast_system("hello");

        assert_eq!(drain_lines(&mut alice_rx), vec!["[System] hello".to_string()]);
        assert!(drain_lines(&mut bob_rx).is_empty());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let core = ServerCore::new();
        let (alice, mut alice_rx) = test_session("alice");
        let (bob, mut bob_rx) = test_session("bob");
        core.try_register(alice.clone());
        core.try_register(bob.clone());
        session::dispatch(&alice, Command::Join("lobby"), &core);
        session::dispatch(&bob, Command::Join("lobby"), &core);

        bob.shutdown(&core);
        bob.shutdown(&core);

        // Same final state as a single shutdown
        assert!(bob.current_room().is_none());
        assert!(!core.is_username_taken("bob"));
        assert_eq!(core.rooms().room_info().len(), 1);
        assert_eq!(core.rooms().room_info()[0].1, 1);

        // Exactly one Disconnect on the wire
        let mut disconnects = 0;
        while let Ok(msg) = bob_rx.try_recv() {
            if matches!(msg, Outbound::Disconnect) {
                disconnects += 1;
            }
        }
        assert_eq!(disconnects, 1);

        // Alice saw exactly one departure notice
        let lines = drain_lines(&mut alice_rx);
        let system_lines: Vec<_> = lines
            .iter()
            .filter(|l| l.as_str() == "[System] bob disconnected")
            .collect();
        assert_eq!(system_lines.len(), 1);
    }

    #[test]
    fn test_owner_shutdown_leaves_room_without_closing() {
        let core = ServerCore::new();
        let (alice, _alice_rx) = test_session("alice");
        let (bob, mut bob_rx) = test_session("bob");
        core.try_register(alice.clone());
        core.try_register(bob.clone());
        session::dispatch(&alice, Command::Join("lobby"), &core);
        session::dispatch(&bob, Command::Join("lobby"), &core);
        drain_lines(&mut bob_rx);

        alice.shutdown(&core);

        // A plain leave: the survivor keeps membership, the room lists on,
        // and no close notice or kickOut goes out
        assert!(bob.current_room().is_some());
        assert_eq!(core.rooms().room_info(), vec![(RoomName::parse("lobby").unwrap(), 1)]);
        let lines = drain_lines(&mut bob_rx);
        assert!(lines.contains(&"[lobby] alice left lobby".to_string()));
        assert!(!lines
            .iter()
            .any(|l| l == "kickOut" || l.starts_with("[Room Closed]")));
    }

    #[test]
    fn test_disconnect_of_sole_member_cleans_up_room() {
        let core = ServerCore::new();
        let (alice, _alice_rx) = test_session("alice");
        core.try_register(alice.clone());
        session::dispatch(&alice, Command::Join("x"), &core);

        alice.shutdown(&core);

        assert!(core.rooms().room_info().is_empty());
        assert_eq!(core.session_count(), 0);
    }
}
