//! Connection and message handling
//!
//! Every connection runs a reader task, an interpreter task and a writer
//! task, joined by two bounded queues:
//! socket -> reader -> inbound -> interpreter -> outbound -> writer -> socket.
//! A full queue blocks its producer, so a slow peer throttles the session.

use super::ServerInner;
use super::interpreter::CommandInterpreter;
use crate::protocol::Message;
use crate::transport::{
    AsyncConnection, QUEUE_CAPACITY, TransportError, encode_message, read_message, write_message,
};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinError;

type ServerResult<T> = std::result::Result<T, TransportError>;

pub(super) async fn handle_connection(
    stream: TcpStream,
    inner: Arc<ServerInner>,
) -> ServerResult<()> {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown peer".to_string());
    log::info!("Connection from {}", peer);

    let interpreter = CommandInterpreter::new(
        inner.server_name.clone(),
        Arc::clone(&inner.catalog),
        Arc::clone(&inner.launcher),
    );
    let result = run_session(AsyncConnection::from_tcp(stream), interpreter, &peer).await;

    log::info!("Connection from {} closed", peer);
    result
}

/// Bounded queue used between the tasks of one session
pub(super) fn session_queue() -> (mpsc::Sender<Message>, mpsc::Receiver<Message>) {
    mpsc::channel(QUEUE_CAPACITY)
}

/// Run one session until the peer disconnects or a read, parse or write fails
///
/// The connection halves are dropped exactly once, when their task ends.
pub(super) async fn run_session<R, W>(
    conn: AsyncConnection<R, W>,
    interpreter: CommandInterpreter,
    peer: &str,
) -> ServerResult<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (reader, writer) = conn.into_parts();
    let (inbound_tx, inbound_rx) = session_queue();
    let (outbound_tx, outbound_rx) = session_queue();

    let mut writer_task = tokio::spawn(write_loop(writer, outbound_rx, peer.to_string()));
    let interpreter_task = tokio::spawn(interpreter.run(inbound_rx, outbound_tx.clone()));

    let read_result = tokio::select! {
        result = read_loop(reader, inbound_tx, peer) => result,
        written = &mut writer_task => {
            // The writer is gone, so the interpreter stops on its next reply
            log::debug!("Writer for {} stopped before the reader", peer);
            return flatten(written);
        }
    };

    // Let the interpreter finish what is already queued, then stop the writer
    if let Err(e) = interpreter_task.await {
        log::error!("Interpreter for {} panicked: {}", peer, e);
    }
    if outbound_tx.send(Message::shutdown()).await.is_err() {
        log::debug!("Writer for {} already stopped", peer);
    }
    drop(outbound_tx);

    let write_result = flatten(writer_task.await);
    read_result.and(write_result)
}

async fn read_loop<R>(
    mut reader: R,
    inbound: mpsc::Sender<Message>,
    peer: &str,
) -> ServerResult<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match read_message(&mut reader).await {
            Ok(Some(message)) => {
                log::debug!("{} -> {}", peer, encode_message(&message));
                if inbound.send(message).await.is_err() {
                    return Ok(());
                }
            }
            Ok(None) => return Ok(()),
            Err(e) => {
                log::warn!("Dropping {}: {}", peer, e);
                return Err(e);
            }
        }
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut outbound: mpsc::Receiver<Message>,
    peer: String,
) -> ServerResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbound.recv().await {
        if message.is_shutdown() {
            break;
        }
        log::debug!("{} <- {}", peer, encode_message(&message));
        write_message(&mut writer, &message).await?;
    }

    if let Err(e) = writer.shutdown().await {
        log::debug!("Failed to shut down connection to {}: {}", peer, e);
    }
    Ok(())
}

fn flatten(joined: Result<ServerResult<()>, JoinError>) -> ServerResult<()> {
    joined.map_err(|e| TransportError::Io(std::io::Error::other(e)))?
}
