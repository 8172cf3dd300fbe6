//! RoomRegistry: the process-wide name→room map
//!
//! Rooms are created lazily on first join and unlinked when they become
//! empty. `get_or_create` and `remove_if_empty` are each a single atomic
//! step under the registry mutex; the lock order is always registry →
//! room, never the reverse.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::room::Room;
use crate::session::Session;
use crate::types::RoomName;

/// Process-wide mapping from room name to live room
pub struct RoomRegistry {
    rooms: Mutex<HashMap<RoomName, Arc<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Atomic insert-if-absent. An existing room is returned as-is:
    /// ownership is fixed at creation and never reassigned to a later
    /// joiner, even one passing themself as prospective owner.
    pub fn get_or_create(&self, name: &RoomName, owner: &Arc<Session>) -> Arc<Room> {
        let mut rooms = self.rooms.lock().unwrap();
        rooms
            .entry(name.clone())
            .or_insert_with(|| {
                debug!("Room {} created by '{}'", name, owner.username());
                Arc::new(Room::new(name.clone(), owner.clone()))
            })
            .clone()
    }

    /// Snapshot of every room name and its member count, sorted by name
    pub fn room_info(&self) -> Vec<(RoomName, usize)> {
        let rooms = self.rooms.lock().unwrap();
        let mut info: Vec<(RoomName, usize)> = rooms
            .values()
            .map(|room| (room.name().clone(), room.member_count()))
            .collect();
        info.sort();
        info
    }

    /// Unlink the named room only if it has zero members at the time of
    /// the check.
    ///
    /// The emptiness check and the unlink happen under the registry lock
    /// with the room marked dead first, so a room that gained a member in
    /// the meantime survives, and a room that is removed can never be
    /// joined again through a stale handle.
    pub fn remove_if_empty(&self, name: &RoomName) {
        let mut rooms = self.rooms.lock().unwrap();
        if let Some(room) = rooms.get(name) {
            if room.mark_dead_if_empty() {
                rooms.remove(name);
                debug!("Room {} deleted (empty)", name);
            }
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Outbound;
    use tokio::sync::mpsc;

    fn test_session(name: &str) -> (Arc<Session>, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Session::new(name, tx)), rx)
    }

    fn name(raw: &str) -> RoomName {
        RoomName::parse(raw).unwrap()
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = RoomRegistry::new();
        let (alice, _rx1) = test_session("alice");
        let (bob, _rx2) = test_session("bob");

        let first = registry.get_or_create(&name("lobby"), &alice);
        let second = registry.get_or_create(&name("lobby"), &bob);

        assert!(Arc::ptr_eq(&first, &second));
        // Ownership stays with the creator
        assert!(first.is_owner(&alice));
        assert!(!first.is_owner(&bob));
    }

    #[test]
    fn test_room_info_reports_member_counts() {
        let registry = RoomRegistry::new();
        let (alice, _rx1) = test_session("alice");
        let (bob, _rx2) = test_session("bob");

        let lobby = registry.get_or_create(&name("lobby"), &alice);
        lobby.join(&alice);
        lobby.join(&bob);
        registry.get_or_create(&name("side"), &bob);

        assert_eq!(
            registry.room_info(),
            vec![(name("lobby"), 2), (name("side"), 0)]
        );
    }

    #[test]
    fn test_remove_if_empty_spares_populated_rooms() {
        let registry = RoomRegistry::new();
        let (alice, _rx) = test_session("alice");
        let lobby = registry.get_or_create(&name("lobby"), &alice);
        lobby.join(&alice);

        registry.remove_if_empty(&name("lobby"));

        assert_eq!(registry.room_info(), vec![(name("lobby"), 1)]);
    }

    #[test]
    fn test_remove_if_empty_unlinks_and_kills_empty_rooms() {
        let registry = RoomRegistry::new();
        let (alice, _rx) = test_session("alice");
        let lobby = registry.get_or_create(&name("lobby"), &alice);

        registry.remove_if_empty(&name("lobby"));

        assert!(registry.room_info().is_empty());
        // A stale handle cannot be joined; a fresh lookup makes a new room
        assert!(!lobby.join(&alice));
        let fresh = registry.get_or_create(&name("lobby"), &alice);
        assert!(!Arc::ptr_eq(&lobby, &fresh));
        assert!(fresh.join(&alice));
    }

    #[test]
    fn test_remove_if_empty_of_unknown_name_is_noop() {
        let registry = RoomRegistry::new();
        registry.remove_if_empty(&name("ghost"));
        assert!(registry.room_info().is_empty());
    }
}
