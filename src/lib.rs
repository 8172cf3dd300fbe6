//! Multi-Room Text Chat Server Library
//!
//! A TCP chat server where clients pick a unique username, then join
//! named rooms to exchange broadcast messages over a newline-delimited
//! text protocol.
//!
//! # Features
//! - Username handshake with uniqueness enforcement
//! - Named rooms, created lazily on first join and deleted when empty
//! - Fixed room ownership: only the creator may close or kick
//! - Room broadcast with member-snapshot pushes on membership changes
//! - System-wide notices on disconnect
//!
//! # Architecture
//! Shared-state with fine-grained locks:
//! - `ServerCore` guards the username→session map; registration is an
//!   atomic insert-if-absent
//! - `RoomRegistry` guards the name→room map with atomic get-or-create
//!   and conditional remove-if-empty
//! - each `Room` guards its own member set; no lock is held across I/O
//!   because delivery into a session is an unbounded channel send
//! - one read task and one writer task per connection
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use room_chat::{serve, ServerCore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:1234").await.unwrap();
//!     let core = Arc::new(ServerCore::new());
//!     serve(listener, core).await;
//! }
//! ```

pub mod error;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use protocol::Command;
pub use registry::RoomRegistry;
pub use room::Room;
pub use server::{serve, ServerCore};
pub use session::{dispatch, Outbound, Session};
pub use types::{RoomName, SessionId};
