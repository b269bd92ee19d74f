//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::{
    CloseReason, ConnectionId, Frame, FrameReader, FrameWriter,
    HandshakeRequest, Rejection, TransportError,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// Listens for TCP connections that will be upgraded to WebSockets.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts the next TCP connection.
    ///
    /// The WebSocket handshake is *not* performed here; call
    /// [`PendingUpgrade::upgrade`] from the connection's own task so a slow
    /// client cannot stall the accept loop.
    pub async fn accept(&mut self) -> Result<PendingUpgrade, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %peer, "accepted TCP connection");

        Ok(PendingUpgrade { id, peer, stream })
    }
}

/// A TCP connection waiting for its HTTP upgrade.
pub struct PendingUpgrade {
    id: ConnectionId,
    peer: SocketAddr,
    stream: TcpStream,
}

impl PendingUpgrade {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Performs the WebSocket handshake.
    ///
    /// `screen` sees the request path and query before the upgrade
    /// response is written. Returning `Err` refuses the upgrade with the
    /// rejection's HTTP status; returning `Ok(value)` completes it and
    /// hands `value` back alongside the connection.
    pub async fn upgrade<T, F>(
        self,
        screen: F,
    ) -> Result<(T, WebSocketConnection), TransportError>
    where
        T: Send,
        F: FnOnce(&HandshakeRequest) -> Result<T, Rejection> + Send + Unpin,
    {
        let mut verdict: Option<Result<T, Rejection>> = None;

        let callback = |req: &Request, resp: Response| {
            let request = HandshakeRequest {
                path: req.uri().path().to_string(),
                query: req.uri().query().map(str::to_string),
            };
            match screen(&request) {
                Ok(accepted) => {
                    verdict = Some(Ok(accepted));
                    Ok(resp)
                }
                Err(rejection) => {
                    let mut refusal: ErrorResponse =
                        ErrorResponse::new(Some(rejection.reason.clone()));
                    *refusal.status_mut() =
                        StatusCode::from_u16(rejection.status)
                            .unwrap_or(StatusCode::BAD_REQUEST);
                    verdict = Some(Err(rejection));
                    Err(refusal)
                }
            }
        };

        let handshake =
            tokio_tungstenite::accept_hdr_async(self.stream, callback).await;

        match (handshake, verdict) {
            (Ok(ws), Some(Ok(accepted))) => {
                tracing::debug!(id = %self.id, peer = %self.peer, "upgraded to WebSocket");
                Ok((accepted, WebSocketConnection { id: self.id, ws }))
            }
            (_, Some(Err(rejection))) => {
                tracing::debug!(id = %self.id, %rejection, "upgrade refused");
                Err(TransportError::UpgradeRejected(rejection.to_string()))
            }
            (Err(e), _) => Err(TransportError::UpgradeRejected(e.to_string())),
            (Ok(_), None) => Err(TransportError::UpgradeRejected(
                "handshake finished without a screening verdict".into(),
            )),
        }
    }
}

/// An upgraded WebSocket connection, not yet split.
pub struct WebSocketConnection {
    id: ConnectionId,
    ws: WsStream,
}

impl WebSocketConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Splits the connection into its read and write halves.
    pub fn split(self) -> (WebSocketReader, WebSocketWriter) {
        let (sink, stream) = self.ws.split();
        (
            WebSocketReader {
                id: self.id,
                stream,
            },
            WebSocketWriter {
                id: self.id,
                sink,
            },
        )
    }
}

/// Read half of a WebSocket connection.
pub struct WebSocketReader {
    id: ConnectionId,
    stream: SplitStream<WsStream>,
}

impl WebSocketReader {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl FrameReader for WebSocketReader {
    async fn next_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Frame::Data(text.as_bytes().to_vec())));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(Frame::Data(data.to_vec())));
                }
                Some(Ok(Message::Pong(_))) => return Ok(Some(Frame::Pong)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Pings are answered by tungstenite itself.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }
}

/// Write half of a WebSocket connection.
pub struct WebSocketWriter {
    id: ConnectionId,
    sink: SplitSink<WsStream, Message>,
}

impl WebSocketWriter {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    async fn write(&mut self, msg: Message) -> Result<(), TransportError> {
        self.sink.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}

impl FrameWriter for WebSocketWriter {
    async fn send(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
        let msg = match String::from_utf8(data) {
            Ok(text) => Message::Text(text.into()),
            Err(e) => Message::Binary(e.into_bytes().into()),
        };
        self.write(msg).await
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.write(Message::Ping(Vec::new().into())).await
    }

    async fn close(&mut self, reason: CloseReason) -> Result<(), TransportError> {
        let frame = match reason {
            CloseReason::Normal => CloseFrame {
                code: CloseCode::Normal,
                reason: String::new().into(),
            },
            CloseReason::Policy(text) => CloseFrame {
                code: CloseCode::Policy,
                reason: text.into(),
            },
        };
        let sent = self.write(Message::Close(Some(frame))).await;
        // The close frame may already be out if the peer closed first.
        let _ = self.sink.close().await;
        sent
    }
}
