//! The two tasks that serve one connection.
//!
//! The read pump turns inbound frames into room commands. The write pump
//! drains the member's outbound queue onto the wire and sends keepalive
//! pings. Each owns one half of the connection.
//!
//! ```text
//!   peer ──► read pump ──► room mailbox ──► room actor
//!   peer ◄── write pump ◄── outbound queue ◄──┘
//! ```
//!
//! Shutdown runs in one direction. When the read pump stops it
//! unregisters the member; the room drops the member's queue; the write
//! pump sees the queue close, sends a close frame and stops. If the write
//! pump stops first (a failed or late write) the read pump notices and
//! takes the same path.

use huddle_protocol::{ClientId, Codec, decode_client_frame};
use huddle_room::{OutboundQueue, RoomHandle, Ticket};
use huddle_transport::{CloseReason, Frame, FrameReader, FrameWriter, TransportError};
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior, timeout, timeout_at};
use tracing::{debug, warn};

use crate::KeepaliveConfig;

/// Per-connection limits shared by both pumps.
#[derive(Debug, Clone, Copy)]
pub struct PumpSettings {
    pub keepalive: KeepaliveConfig,
    pub max_frame_bytes: usize,
}

/// What the read pump needs to speak for its member.
#[derive(Debug, Clone)]
pub struct MemberLink {
    pub room: RoomHandle,
    pub client_id: ClientId,
    pub ticket: Ticket,
}

/// Runs both pumps for one registered member and returns once both stop.
///
/// The write pump gets its own task; the read pump runs on the caller's.
pub async fn run_pumps<R, W, C>(
    reader: R,
    writer: W,
    queue: OutboundQueue,
    link: MemberLink,
    codec: C,
    settings: PumpSettings,
) where
    R: FrameReader,
    W: FrameWriter,
    C: Codec + Clone,
{
    let (done_tx, done_rx) = oneshot::channel::<()>();
    let write_codec = codec.clone();
    let keepalive = settings.keepalive;
    let write_task = tokio::spawn(async move {
        write_pump(writer, queue, write_codec, keepalive).await;
        drop(done_tx);
    });

    read_pump(reader, link, codec, settings, done_rx).await;

    if let Err(e) = write_task.await {
        warn!(error = %e, "write pump panicked");
    }
}

/// Reads frames until the peer goes away, the read deadline passes or the
/// write pump stops, then unregisters the member.
///
/// Any frame, data or pong, pushes the deadline out by `pong_wait`.
/// Oversized and undecodable frames are logged and skipped.
pub async fn read_pump<R, C>(
    mut reader: R,
    link: MemberLink,
    codec: C,
    settings: PumpSettings,
    mut writer_done: oneshot::Receiver<()>,
) where
    R: FrameReader,
    C: Codec,
{
    let MemberLink {
        room,
        client_id,
        ticket,
    } = link;
    let room_id = room.room_id().clone();
    let pong_wait = settings.keepalive.pong_wait;
    let mut deadline = Instant::now() + pong_wait;

    loop {
        let read = tokio::select! {
            read = timeout_at(deadline, reader.next_frame()) => read,
            _ = &mut writer_done => {
                debug!(%room_id, %client_id, "write half stopped");
                break;
            }
        };

        let data = match read {
            Err(_) => {
                debug!(%room_id, %client_id, "read deadline passed");
                break;
            }
            Ok(Err(e)) => {
                debug!(%room_id, %client_id, error = %e, "read failed");
                break;
            }
            Ok(Ok(None)) => {
                debug!(%room_id, %client_id, "closed by peer");
                break;
            }
            Ok(Ok(Some(Frame::Pong))) => {
                deadline = Instant::now() + pong_wait;
                continue;
            }
            Ok(Ok(Some(Frame::Data(data)))) => {
                deadline = Instant::now() + pong_wait;
                data
            }
        };

        if data.len() > settings.max_frame_bytes {
            warn!(%room_id, %client_id, bytes = data.len(), "oversized frame discarded");
            continue;
        }

        let frame = match decode_client_frame(&codec, &data) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%room_id, %client_id, error = %e, "malformed frame discarded");
                continue;
            }
        };

        if let Err(e) = room.dispatch(client_id.clone(), ticket, frame).await {
            debug!(%room_id, %client_id, error = %e, "room gone");
            break;
        }
    }

    // The room may already be gone; nothing left to tell it then.
    let _ = room.unregister(client_id, ticket).await;
}

/// Writes queued frames and keepalive pings until the queue closes or a
/// write fails.
///
/// Each write must finish within `write_wait`. A closed queue means the
/// room dropped the member and ends with a normal close frame.
pub async fn write_pump<W, C>(
    mut writer: W,
    mut queue: OutboundQueue,
    codec: C,
    keepalive: KeepaliveConfig,
) where
    W: FrameWriter,
    C: Codec,
{
    let write_wait = keepalive.write_wait;
    let mut ping = tokio::time::interval_at(
        Instant::now() + keepalive.ping_period,
        keepalive.ping_period,
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let written = tokio::select! {
            next = queue.recv() => match next {
                Some(frame) => match codec.encode(frame.as_ref()) {
                    Ok(bytes) => within(write_wait, writer.send(bytes)).await,
                    Err(e) => {
                        warn!(error = %e, "outbound frame could not be encoded");
                        continue;
                    }
                },
                None => {
                    let _ = within(write_wait, writer.close(CloseReason::Normal)).await;
                    debug!("outbound queue closed");
                    return;
                }
            },
            _ = ping.tick() => within(write_wait, writer.ping()).await,
        };

        if let Err(e) = written {
            debug!(error = %e, "write failed");
            let _ = within(write_wait, writer.close(CloseReason::Normal)).await;
            return;
        }
    }
}

/// Runs one write under the write deadline.
pub(crate) async fn within<F>(limit: std::time::Duration, write: F) -> Result<(), TransportError>
where
    F: Future<Output = Result<(), TransportError>>,
{
    timeout(limit, write).await.unwrap_or_else(|_| {
        Err(TransportError::ConnectionClosed("write deadline passed".into()))
    })
}
