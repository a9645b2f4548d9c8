//! Streaming-transport capability: establish a connection to an endpoint,
//! pull opaque messages off it, close it.
//!
//! The harness never interprets message content; payloads are counted, not
//! decoded. Two wire formats are supported: WebSocket (`ws://`, `wss://`)
//! and newline-delimited TCP (`tcp://host:port`, or a bare `host:port`).

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

pub mod tcp;
pub mod ws;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unsupported endpoint scheme in `{0}`")]
    UnsupportedScheme(String),
    #[error("invalid endpoint `{0}`: {1}")]
    InvalidEndpoint(String, String),
    #[error("invalid handshake header `{0}`")]
    InvalidHeader(String),
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket failure: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Ws,
    Tcp,
}

/// Immutable connection target: address plus connection-level settings.
/// Created once at startup, shared by every worker.
#[derive(Debug, Clone)]
pub struct Endpoint {
    url: String,
    scheme: Scheme,
    connect_timeout: Duration,
    headers: Vec<(String, String)>,
}

impl Endpoint {
    /// Parse a target address. A bare `host:port` is treated as TCP.
    pub fn parse(url: &str) -> Result<Self, TransportError> {
        let scheme = if url.starts_with("ws://") || url.starts_with("wss://") {
            Scheme::Ws
        } else if let Some(addr) = url.strip_prefix("tcp://") {
            if !addr.contains(':') {
                return Err(TransportError::InvalidEndpoint(
                    url.to_string(),
                    "tcp endpoint needs host:port".to_string(),
                ));
            }
            Scheme::Tcp
        } else if url.contains("://") {
            return Err(TransportError::UnsupportedScheme(url.to_string()));
        } else if url.contains(':') {
            Scheme::Tcp
        } else {
            return Err(TransportError::InvalidEndpoint(
                url.to_string(),
                "expected ws://, wss://, tcp://host:port, or host:port".to_string(),
            ));
        };

        Ok(Self {
            url: url.to_string(),
            scheme,
            connect_timeout: Duration::from_secs(5),
            headers: Vec::new(),
        })
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The `host:port` part of a TCP endpoint.
    pub fn tcp_addr(&self) -> &str {
        self.url.strip_prefix("tcp://").unwrap_or(&self.url)
    }
}

/// Outcome of one bounded receive.
pub enum Recv {
    /// One opaque message payload.
    Message(Bytes),
    /// The receive ceiling elapsed with no traffic; the connection is still up.
    Idle,
    /// The peer ended the stream cleanly.
    Closed,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Open one connection to the endpoint, bounded by its connect timeout.
    async fn establish(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Box<dyn StreamConnection>, TransportError>;
}

#[async_trait]
pub trait StreamConnection: Send {
    /// Wait up to `ceiling` for the next message. `Idle` is not a failure;
    /// it exists so callers can observe shutdown between receives.
    async fn receive_next(&mut self, ceiling: Duration) -> Result<Recv, TransportError>;

    /// Best-effort close; errors are discarded.
    async fn close(&mut self);
}

/// Select the transport implementation for an endpoint's scheme.
pub fn transport_for(endpoint: &Endpoint) -> Arc<dyn Transport> {
    match endpoint.scheme() {
        Scheme::Ws => Arc::new(ws::WsTransport),
        Scheme::Tcp => Arc::new(tcp::TcpTransport),
    }
}
