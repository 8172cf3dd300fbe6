//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers for type safety:
//! - `SessionId`: UUID-based connection identifier, used for logging
//! - `RoomName`: validated, user-supplied room name

use uuid::Uuid;

/// Unique session identifier (newtype pattern)
///
/// Wraps a UUID v4 to identify a connection in logs before (and after)
/// authentication. Usernames, not session ids, are the functional key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated room name.
///
/// Room names come from `/join <room>` input; surrounding whitespace is
/// stripped and the empty string is rejected. Names are case-sensitive keys
/// into the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomName(String);

impl RoomName {
    /// Parse a room name from raw command input.
    ///
    /// Returns `None` when the trimmed input is empty.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_unique() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_room_name_trims() {
        let name = RoomName::parse("  lobby  ").unwrap();
        assert_eq!(name.as_str(), "lobby");
    }

    #[test]
    fn test_room_name_rejects_blank() {
        assert!(RoomName::parse("").is_none());
        assert!(RoomName::parse("   ").is_none());
    }

    #[test]
    fn test_room_name_case_sensitive() {
        let a = RoomName::parse("Lobby").unwrap();
        let b = RoomName::parse("lobby").unwrap();
        assert_ne!(a, b);
    }
}
