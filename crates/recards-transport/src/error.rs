/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the listener or accepting a TCP peer failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// A TCP peer never completed the WebSocket upgrade, or botched it.
    #[error("handshake failed: {0}")]
    HandshakeFailed(#[source] std::io::Error),

    /// The upgrade request came from an origin the server does not serve.
    #[error("origin rejected: {0}")]
    OriginRejected(String),
}
