//! Per-connection handler
//!
//! Owns one client connection's I/O: splits the TCP stream, spawns a
//! writer task draining the session's outbound channel, runs the
//! username handshake, then feeds lines into command dispatch until
//! `/exit`, EOF, or a read failure triggers shutdown.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::AppError;
use crate::protocol::{self, Command};
use crate::server::ServerCore;
use crate::session::{self, Outbound, Session};

/// Handle one client connection from accept to disconnect.
pub async fn handle_connection(stream: TcpStream, core: Arc<ServerCore>) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New connection from {}", peer_addr);

    let (read_half, write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_outbound(write_half, out_rx));

    let session = match authenticate(&mut lines, &out_tx, &core).await? {
        Some(session) => session,
        None => {
            // Client went away before picking a name
            debug!("Connection from {} closed before authentication", peer_addr);
            drop(out_tx);
            let _ = writer.await;
            return Ok(());
        }
    };

    info!(
        "Session {} authenticated as '{}' from {}",
        session.id(),
        session.username(),
        peer_addr
    );

    // Command loop: one line per logical message until /exit or read failure
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match Command::parse(&line) {
                Command::Exit => break,
                cmd => session::dispatch(&session, cmd, &core),
            },
            Ok(None) => break,
            Err(e) => {
                debug!("Read error for '{}': {}", session.username(), e);
                break;
            }
        }
    }

    session.shutdown(&core);
    drop(out_tx);
    let _ = writer.await;

    Ok(())
}

/// Username handshake: prompt, read a candidate, claim it atomically.
///
/// Repeats on collision with no retry bound; blank candidates are
/// silently re-prompted. Returns `None` when the client disconnects
/// before completing the handshake.
async fn authenticate(
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
    out_tx: &mpsc::UnboundedSender<Outbound>,
    core: &Arc<ServerCore>,
) -> Result<Option<Arc<Session>>, AppError> {
    loop {
        out_tx
            .send(Outbound::Line(protocol::USERNAME_PROMPT.to_string()))
            .map_err(|_| AppError::ChannelSend)?;

        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        let candidate = line.trim();
        if candidate.is_empty() {
            continue;
        }
        if core.is_username_taken(candidate) {
            debug!("Username '{}' already taken, re-prompting", candidate);
            continue;
        }

        let session = Arc::new(Session::new(candidate, out_tx.clone()));
        if core.try_register(session.clone()) {
            let _ = session.send(format!("{} connected", session.username()));
            return Ok(Some(session));
        }
        // Claimed concurrently between the check and the insert
        debug!("Username '{}' claimed concurrently, re-prompting", candidate);
    }
}

/// Writer task: drain the outbound channel onto the socket, one line per
/// message, until the channel closes, a write fails, or a `Disconnect`
/// arrives.
async fn write_outbound(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(msg) = rx.recv().await {
        match msg {
            Outbound::Line(line) => {
                if write_half.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if write_half.write_all(b"\n").await.is_err() {
                    break;
                }
            }
            Outbound::Disconnect => break,
        }
    }
    let _ = write_half.shutdown().await;
}
