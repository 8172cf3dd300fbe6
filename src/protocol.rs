//! Line protocol: client command parsing and server reply framing
//!
//! The wire format is one UTF-8 text line per logical message in each
//! direction. Structured replies (member snapshot, room listing) are
//! multi-line messages terminated by the literal sentinel line `done`.
//! All literal strings here are part of the protocol and must stay
//! bit-exact.

use crate::types::RoomName;

/// Authentication prompt, repeated on username collision
pub const USERNAME_PROMPT: &str = "Enter your username:";

/// Sentinel delivered to a session whose room membership was forcibly
/// cleared (kick or room close)
pub const KICK_OUT: &str = "kickOut";

/// Terminator line for member snapshots and room listings
pub const DONE: &str = "done";

pub const ERR_NOT_OWNER: &str = "You are not the room owner.";
pub const ERR_KICK_NOT_OWNER: &str = "Only room owners can kick users.";
pub const ERR_USER_NOT_FOUND: &str = "User not found in the room.";
pub const ERR_NOT_IN_ROOM: &str = "Not in any room";
pub const ERR_EMPTY_ROOM_NAME: &str = "Room name cannot be empty";
pub const ERR_NO_ROOM_FOR_CHAT: &str = "You must join a room first (/join roomname)";

/// Static command summary for `/help`
pub const HELP_TEXT: &str = "Commands:
/join [room] - Join or create a room
/leave       - Leave current room
/rooms       - List all rooms
/members     - List members of current room
/kick [user] - (Owner only) Kick user from room
/close       - (Owner only) Close and delete room
/exit        - Exit the chat
/help        - Show this help message";

/// A parsed client command
///
/// Any line that matches no command is a chat message for the current room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Join(&'a str),
    Leave,
    Rooms,
    Close,
    Kick(&'a str),
    Members,
    Help,
    Exit,
    Chat(&'a str),
}

impl<'a> Command<'a> {
    /// Parse one input line.
    ///
    /// Bare commands match case-insensitively. The `/join ` and `/kick `
    /// prefixes are literal; their argument is passed through trimmed.
    pub fn parse(line: &'a str) -> Self {
        if let Some(rest) = line.strip_prefix("/join ") {
            return Command::Join(rest.trim());
        }
        if let Some(rest) = line.strip_prefix("/kick ") {
            return Command::Kick(rest.trim());
        }
        if line.eq_ignore_ascii_case("/leave") {
            return Command::Leave;
        }
        if line.eq_ignore_ascii_case("/rooms") {
            return Command::Rooms;
        }
        if line.eq_ignore_ascii_case("/close") {
            return Command::Close;
        }
        if line.eq_ignore_ascii_case("/members") {
            return Command::Members;
        }
        if line.eq_ignore_ascii_case("/help") {
            return Command::Help;
        }
        if line.eq_ignore_ascii_case("/exit") {
            return Command::Exit;
        }
        Command::Chat(line)
    }
}

/// Frame a broadcast line for a room: `[<room>] <text>`
pub fn room_frame(room: &str, text: &str) -> String {
    format!("[{}] {}", room, text)
}

/// Frame a system-wide notice: `[System] <text>`
pub fn system_frame(text: &str) -> String {
    format!("[System] {}", text)
}

/// Close notice sent to every member before their `kickOut`
pub fn room_closed_notice(room: &str) -> String {
    format!("[Room Closed] Room '{}' has been closed by the owner.", room)
}

/// Build a member snapshot: `Members:` header, one username per line,
/// `done` terminator.
pub fn member_snapshot(names: &[String]) -> String {
    let mut block = String::from("Members:");
    for name in names {
        block.push('\n');
        block.push_str(name);
    }
    block.push('\n');
    block.push_str(DONE);
    block
}

/// Build the `/rooms` listing: `Available rooms:` header, one
/// `- <name> (<n> user[s])` line per room, `done` terminator.
pub fn room_listing(info: &[(RoomName, usize)]) -> String {
    let mut block = String::from("Available rooms:");
    for (name, count) in info {
        block.push('\n');
        block.push_str(&format!(
            "- {} ({} user{})",
            name,
            count,
            if *count == 1 { "" } else { "s" }
        ));
    }
    block.push('\n');
    block.push_str(DONE);
    block
}
