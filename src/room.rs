//! Room: a named, owned group of sessions
//!
//! A room is created on first join and deleted when it becomes empty.
//! The owner is the session that created it; ownership never transfers,
//! and only the owner may close the room or kick members.
//!
//! Every mutating operation runs under the room's own mutex so a
//! broadcast never observes a half-updated member set. Delivery into a
//! member is a channel send, so the lock is never held across I/O.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::protocol;
use crate::registry::RoomRegistry;
use crate::session::Session;
use crate::types::RoomName;

struct RoomState {
    members: HashSet<Arc<Session>>,
    /// Set by the registry when this room is unlinked; joins fail from
    /// then on so a deleted room can never gain a member.
    dead: bool,
}

/// A named chat room with a fixed owner
pub struct Room {
    name: RoomName,
    owner: Arc<Session>,
    state: Mutex<RoomState>,
}

impl Room {
    pub fn new(name: RoomName, owner: Arc<Session>) -> Self {
        Self {
            name,
            owner,
            state: Mutex::new(RoomState {
                members: HashSet::new(),
                dead: false,
            }),
        }
    }

    pub fn name(&self) -> &RoomName {
        &self.name
    }

    /// Owner comparison follows Session's equality contract: by username,
    /// not object identity.
    pub fn is_owner(&self, session: &Session) -> bool {
        *self.owner == *session
    }

    pub fn member_count(&self) -> usize {
        self.state.lock().unwrap().members.len()
    }

    /// Add a member, announce the join, and push a fresh member snapshot
    /// to everyone.
    ///
    /// Returns false if this room has already been unlinked from the
    /// registry; the caller should retry `get_or_create`.
    pub fn join(&self, session: &Arc<Session>) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.dead {
            return false;
        }
        state.members.insert(session.clone());
        self.broadcast_locked(
            &mut state,
            &format!("{} joined {}", session.username(), self.name),
        );
        self.push_snapshot_locked(&state);
        true
    }

    /// Remove a member if present. Announces the departure only when a
    /// removal actually happened, but unconditionally re-pushes the
    /// member snapshot (the kick path announces differently).
    ///
    /// The empty-room check runs after the removal is visible; the
    /// registry re-checks the count under both locks, so a join that
    /// lands in between keeps the room alive.
    pub fn leave(&self, session: &Session, registry: &RoomRegistry) {
        let removed;
        {
            let mut state = self.state.lock().unwrap();
            removed = state.members.remove(session);
            if removed {
                self.broadcast_locked(
                    &mut state,
                    &format!("{} left {}", session.username(), self.name),
                );
            }
            self.push_snapshot_locked(&state);
        }
        if removed {
            registry.remove_if_empty(&self.name);
        }
    }

    /// Close the room: notify every member, force them into the kicked
    /// state, clear membership, and request deletion. Safe with zero
    /// members.
    pub fn close(&self, registry: &RoomRegistry) {
        {
            let mut state = self.state.lock().unwrap();
            for member in &state.members {
                let _ = member.send(protocol::room_closed_notice(self.name.as_str()));
                member.kick_from_room();
            }
            state.members.clear();
        }
        registry.remove_if_empty(&self.name);
    }

    /// Kick a member by case-insensitive username match.
    ///
    /// The victim is removed before the `left` notice is broadcast, so
    /// they receive only the `kickOut` sentinel. Returns whether a match
    /// was found; a vanished target is a no-op failure, not an error.
    pub fn kick(&self, target: &str, registry: &RoomRegistry) -> bool {
        let found;
        {
            let mut state = self.state.lock().unwrap();
            let victim = state
                .members
                .iter()
                .find(|m| m.username().eq_ignore_ascii_case(target))
                .cloned();
            match victim {
                Some(victim) => {
                    victim.kick_from_room();
                    state.members.remove(&victim);
                    self.broadcast_locked(
                        &mut state,
                        &format!("{} left {}", victim.username(), self.name),
                    );
                    self.push_snapshot_locked(&state);
                    found = true;
                }
                None => found = false,
            }
        }
        if found {
            registry.remove_if_empty(&self.name);
        }
        found
    }

    /// Deliver `[<room>] <text>` to every member, pruning closed sessions
    /// first.
    pub fn broadcast(&self, text: &str) {
        let mut state = self.state.lock().unwrap();
        self.broadcast_locked(&mut state, text);
    }

    /// Send the current member snapshot to one session (the `/members`
    /// command).
    pub fn send_members_to(&self, session: &Session) {
        let state = self.state.lock().unwrap();
        let _ = session.send(self.snapshot_locked(&state));
    }

    /// Mark this room dead if it has no members. Called by the registry
    /// under the registry lock, immediately before unlinking.
    pub(crate) fn mark_dead_if_empty(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.members.is_empty() {
            state.dead = true;
            true
        } else {
            false
        }
    }

    fn broadcast_locked(&self, state: &mut RoomState, text: &str) {
        // Prune members whose connection has already closed
        state.members.retain(|m| m.is_open());
        let line = protocol::room_frame(self.name.as_str(), text);
        for member in &state.members {
            let _ = member.send(line.clone());
        }
    }

    fn snapshot_locked(&self, state: &RoomState) -> String {
        let mut names: Vec<String> = state
            .members
            .iter()
            .map(|m| m.username().to_string())
            .collect();
        names.sort();
        protocol::member_snapshot(&names)
    }

    fn push_snapshot_locked(&self, state: &RoomState) {
        let block = self.snapshot_locked(state);
        for member in &state.members {
            let _ = member.send(block.clone());
        }
    }
}
