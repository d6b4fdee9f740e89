//! The forwarding activity: the broker's frame decode/route/relay loop.
//!
//! One relay task exists per running controller. It exclusively owns the
//! bus listener and all per-connection handles (single-writer model), so no
//! locking is needed around routing state:
//!
//! ```text
//! Connection 1 ─ reader task ─┐                 ┌─ writer task ─ Connection 1
//! Connection 2 ─ reader task ─┼─► relay loop  ──┼─ writer task ─ Connection 2
//! Connection N ─ reader task ─┘   (routing)     └─ writer task ─ Connection N
//! ```
//!
//! Readers assemble length-prefixed frames and feed a single event channel;
//! the relay loop decodes each frame's packet header and forwards the raw
//! frame to the destination's writer queue (or fans it out). Writers drain
//! their queues independently, so a slow destination delays only itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::packet::{Packet, PacketType, BROADCAST_ADDR};
use crate::transport::{encode_frame, BusListener, BusStream, FrameAssembler};

/// Read buffer size for connection readers.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Identifier of a connected party, unique per relay run.
type ConnId = u64;

/// Events fed to the relay loop by connection readers.
enum RelayEvent {
    /// A complete frame arrived from a connection.
    Inbound { conn: ConnId, frame: Bytes },
    /// A connection's stream ended or failed.
    Disconnected { conn: ConnId },
}

/// Handles owned by the relay loop for one connected party.
struct Connection {
    /// Outbound frame queue, drained by the connection's writer task.
    ///
    /// Unbounded: a slow consumer grows its own queue rather than blocking
    /// delivery to other destinations (accepted limitation).
    outbound: mpsc::UnboundedSender<Bytes>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

/// Run the forwarding activity until the shutdown signal flips.
///
/// Signals `ready` once the loop is live and able to accept connections;
/// the controller blocks on that signal before reporting itself running.
/// On shutdown the listener is released, readers are stopped and every
/// writer queue is drained before this returns, so no accepted frame is
/// dropped silently.
pub(crate) async fn relay_loop(
    mut listener: BusListener,
    ready: oneshot::Sender<()>,
    mut shutdown: watch::Receiver<bool>,
    event_capacity: usize,
    party_count: Arc<AtomicUsize>,
) {
    let (event_tx, mut events) = mpsc::channel::<RelayEvent>(event_capacity);

    let mut connections: HashMap<ConnId, Connection> = HashMap::new();
    let mut routes: HashMap<u16, ConnId> = HashMap::new();
    let mut next_conn: ConnId = 0;

    if ready.send(()).is_err() {
        // Controller abandoned the start; nothing was handed out yet.
        return;
    }

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::debug!("shutdown signalled");
                break;
            }

            accepted = listener.accept() => match accepted {
                Ok(stream) => {
                    let conn = next_conn;
                    next_conn += 1;
                    connections.insert(conn, spawn_connection(conn, stream, event_tx.clone()));
                    party_count.store(connections.len(), Ordering::Release);
                    tracing::debug!(conn, "party connected");
                }
                Err(e) => {
                    tracing::error!("endpoint accept failed, relay exiting: {}", e);
                    break;
                }
            },

            event = events.recv() => match event {
                Some(RelayEvent::Inbound { conn, frame }) => {
                    route_frame(conn, frame, &mut routes, &connections);
                }
                Some(RelayEvent::Disconnected { conn }) => {
                    remove_connection(conn, &mut connections, &mut routes);
                    party_count.store(connections.len(), Ordering::Release);
                }
                // Unreachable while we hold event_tx.
                None => break,
            },
        }
    }

    // Unbind the endpoint before draining so no new party can connect
    // mid-shutdown.
    drop(listener);

    // Stop the readers, then route what they already handed off. A frame a
    // reader assembled but never handed to the event channel is discarded
    // here; record which connections were cut off.
    for (conn, connection) in &connections {
        connection.reader.abort();
        tracing::debug!(
            conn = *conn,
            "reader stopped at shutdown, frames not yet handed off are discarded"
        );
    }
    while let Ok(event) = events.try_recv() {
        match event {
            RelayEvent::Inbound { conn, frame } => {
                route_frame(conn, frame, &mut routes, &connections);
            }
            RelayEvent::Disconnected { .. } => {}
        }
    }

    for (conn, connection) in connections.drain() {
        // Closing the queue lets the writer flush whatever is queued and
        // exit on its own.
        drop(connection.outbound);
        if let Err(e) = connection.writer.await {
            if !e.is_cancelled() {
                tracing::warn!(conn, "writer task failed during drain: {}", e);
            }
        }
    }
    party_count.store(0, Ordering::Release);
}

/// Decide the disposition of one inbound frame and enqueue it.
///
/// Routing uses only the packet header: reserved-type packets are dropped,
/// the sender's `src` address is learned into the routing table, then `dest`
/// selects point-to-point delivery or fan-out. The payload is relayed
/// untouched.
fn route_frame(
    sender: ConnId,
    frame: Bytes,
    routes: &mut HashMap<u16, ConnId>,
    connections: &HashMap<ConnId, Connection>,
) {
    let packet = match Packet::from_frame(&frame) {
        Ok(packet) => packet,
        Err(e) => {
            tracing::warn!(conn = sender, "dropping malformed frame: {}", e);
            return;
        }
    };

    // The reserved packet type is never forwarded.
    if packet.packet_type() == PacketType::Reserved {
        tracing::warn!(
            conn = sender,
            src = packet.src(),
            "dropping reserved-type packet"
        );
        return;
    }

    // Source learning. The broadcast address is never a valid source.
    let src = packet.src();
    if src != BROADCAST_ADDR {
        let previous = routes.insert(src, sender);
        if previous.is_some_and(|prev| prev != sender) {
            tracing::debug!(address = src, conn = sender, "source address moved");
        }
    }

    let wire = encode_frame(&frame);
    let dest = packet.dest();

    if dest != BROADCAST_ADDR {
        if let Some(conn) = routes.get(&dest) {
            if let Some(connection) = connections.get(conn) {
                deliver(*conn, connection, wire);
                return;
            }
        }
        tracing::debug!(
            conn = sender,
            dest,
            "destination unknown, fanning out to all other parties"
        );
    }

    for (conn, connection) in connections {
        if *conn != sender {
            deliver(*conn, connection, wire.clone());
        }
    }
}

fn deliver(conn: ConnId, connection: &Connection, wire: Bytes) {
    if connection.outbound.send(wire).is_err() {
        // Writer already gone; the reader's Disconnected event will clean up.
        tracing::debug!(conn, "discarding frame for closed connection");
    }
}

fn remove_connection(
    conn: ConnId,
    connections: &mut HashMap<ConnId, Connection>,
    routes: &mut HashMap<u16, ConnId>,
) {
    if let Some(connection) = connections.remove(&conn) {
        connection.reader.abort();
        drop(connection.outbound);
        drop(connection.writer);
        routes.retain(|_, owner| *owner != conn);
        tracing::debug!(conn, "party disconnected");
    }
}

fn spawn_connection(conn: ConnId, stream: BusStream, events: mpsc::Sender<RelayEvent>) -> Connection {
    let (read_half, write_half) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    Connection {
        outbound: outbound_tx,
        writer: tokio::spawn(connection_writer(conn, write_half, outbound_rx)),
        reader: tokio::spawn(connection_reader(conn, read_half, events)),
    }
}

/// Per-connection reader: assemble frames from stream reads and feed them
/// to the relay loop, in arrival order.
async fn connection_reader(
    conn: ConnId,
    mut reader: ReadHalf<BusStream>,
    events: mpsc::Sender<RelayEvent>,
) {
    let mut assembler = FrameAssembler::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(conn, "read error: {}", e);
                break;
            }
        };

        let frames = match assembler.push(&buf[..n]) {
            Ok(frames) => frames,
            Err(e) => {
                // The stream position is untrustworthy after a framing
                // violation; drop the connection.
                tracing::warn!(conn, "closing connection: {}", e);
                break;
            }
        };

        for frame in frames {
            if events
                .send(RelayEvent::Inbound { conn, frame })
                .await
                .is_err()
            {
                return;
            }
        }
    }

    let _ = events.send(RelayEvent::Disconnected { conn }).await;
}

/// Per-connection writer: drain the outbound queue onto the stream.
///
/// Exits when the queue closes (disconnect or relay shutdown), after
/// writing everything still queued.
async fn connection_writer(
    conn: ConnId,
    mut writer: WriteHalf<BusStream>,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
) {
    while let Some(wire) = outbound.recv().await {
        if let Err(e) = writer.write_all(&wire).await {
            tracing::debug!(conn, "write failed, discarding remaining frames: {}", e);
            break;
        }
        if writer.flush().await.is_err() {
            break;
        }
    }
    let _ = writer.shutdown().await;
}
