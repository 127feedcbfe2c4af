//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, OriginPolicy, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// How long a TCP peer gets to complete the WebSocket upgrade.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;
type Accepted = Result<WebSocketConnection, TransportError>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// A background task owns the listener and runs every upgrade in its own
/// task, so a peer that connects and then stalls never holds up the
/// others. Finished upgrades are handed out by [`accept`](Transport::accept)
/// in completion order.
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    incoming: mpsc::UnboundedReceiver<Accepted>,
    acceptor: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport that accepts any origin.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_origin(addr, OriginPolicy::Any).await
    }

    /// Binds a new WebSocket transport that refuses upgrade requests from
    /// origins outside `origin`.
    pub async fn bind_with_origin(
        addr: &str,
        origin: OriginPolicy,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr = listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(%local_addr, %origin, "WebSocket transport listening");

        let (tx, incoming) = mpsc::unbounded_channel();
        let acceptor = tokio::spawn(accept_loop(listener, origin, tx));
        Ok(Self {
            local_addr,
            incoming,
            acceptor,
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        match self.incoming.recv().await {
            Some(accepted) => accepted,
            None => Err(TransportError::AcceptFailed(std::io::Error::other(
                "listener task stopped",
            ))),
        }
    }
}

/// Accepts TCP peers and spawns one upgrade task per peer.
async fn accept_loop(
    listener: TcpListener,
    origin: OriginPolicy,
    tx: mpsc::UnboundedSender<Accepted>,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(peer) => peer,
            Err(e) => {
                if tx.send(Err(TransportError::AcceptFailed(e))).is_err() {
                    return;
                }
                continue;
            }
        };

        let origin = origin.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let accepted = match tokio::time::timeout(
                HANDSHAKE_TIMEOUT,
                upgrade(stream, addr, origin),
            )
            .await
            {
                Ok(accepted) => accepted,
                Err(_) => {
                    tracing::debug!(%addr, "WebSocket handshake timed out");
                    Err(TransportError::HandshakeFailed(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "handshake timed out",
                    )))
                }
            };
            // The transport is gone if nobody is listening.
            let _ = tx.send(accepted);
        });
    }
}

/// Runs the WebSocket upgrade for one TCP peer, checking its `Origin`.
async fn upgrade(stream: TcpStream, addr: SocketAddr, policy: OriginPolicy) -> Accepted {
    let rejected = Arc::new(OnceLock::new());
    let rejected_origin = Arc::clone(&rejected);
    let check_origin =
        move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let origin = req
                .headers()
                .get("origin")
                .and_then(|value| value.to_str().ok());
            if policy.allows(origin) {
                return Ok(resp);
            }
            let _ = rejected_origin.set(origin.unwrap_or_default().to_string());
            let mut refusal = ErrorResponse::new(Some("origin not allowed".to_string()));
            *refusal.status_mut() = StatusCode::FORBIDDEN;
            Err(refusal)
        };

    let ws = match tokio_tungstenite::accept_hdr_async(stream, check_origin).await {
        Ok(ws) => ws,
        Err(e) => {
            if let Some(origin) = rejected.get() {
                tracing::debug!(%addr, %origin, "refused connection from foreign origin");
                return Err(TransportError::OriginRejected(origin.clone()));
            }
            return Err(TransportError::HandshakeFailed(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e,
            )));
        }
    };

    let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    tracing::debug!(%id, %addr, "accepted WebSocket connection");

    let (sink, source) = ws.split();
    Ok(WebSocketConnection {
        id,
        sink: Mutex::new(sink),
        source: Mutex::new(source),
        opened: Instant::now(),
        last_seen_ms: AtomicU64::new(0),
    })
}

/// A single WebSocket connection.
///
/// The socket is split so that the writer half and the reader half are
/// locked independently.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    source: Mutex<SplitStream<WsStream>>,
    opened: Instant,
    /// Milliseconds after `opened` at which the last frame arrived.
    last_seen_ms: AtomicU64,
}

impl WebSocketConnection {
    fn touch(&self) {
        let now = self.opened.elapsed().as_millis() as u64;
        self.last_seen_ms.store(now, Ordering::Relaxed);
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        // JSON goes out as text frames so browsers get a string, not a Blob.
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut source = self.source.lock().await;
        loop {
            let next = source.next().await;
            if let Some(Ok(_)) = next {
                self.touch();
            }
            match next {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Pings and pongs only count as activity.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .send(Message::Ping(Default::default()))
            .await
            .map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    fn idle_for(&self) -> Duration {
        let last_seen = Duration::from_millis(self.last_seen_ms.load(Ordering::Relaxed));
        self.opened.elapsed().saturating_sub(last_seen)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
