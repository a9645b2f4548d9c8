use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{Endpoint, Recv, StreamConnection, Transport, TransportError};

/// WebSocket streaming via tungstenite; text and binary frames are messages,
/// control frames are not.
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn establish(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Box<dyn StreamConnection>, TransportError> {
        let mut request = endpoint.url().into_client_request()?;
        for (name, value) in endpoint.headers() {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
            request.headers_mut().insert(header_name, header_value);
        }

        let (stream, _response) =
            match timeout(endpoint.connect_timeout(), connect_async(request)).await {
                Ok(connected) => connected?,
                Err(_) => return Err(TransportError::ConnectTimeout(endpoint.connect_timeout())),
            };

        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamConnection for WsConnection {
    async fn receive_next(&mut self, ceiling: Duration) -> Result<Recv, TransportError> {
        match timeout(ceiling, self.stream.next()).await {
            Err(_) => Ok(Recv::Idle),
            Ok(None) => Ok(Recv::Closed),
            Ok(Some(Ok(Message::Text(text)))) => Ok(Recv::Message(Bytes::from(text))),
            Ok(Some(Ok(Message::Binary(data)))) => Ok(Recv::Message(Bytes::from(data))),
            Ok(Some(Ok(Message::Close(_)))) => Ok(Recv::Closed),
            // Ping/pong and raw frames are transport chatter, not payload.
            Ok(Some(Ok(_))) => Ok(Recv::Idle),
            Ok(Some(Err(tungstenite::Error::ConnectionClosed))) => Ok(Recv::Closed),
            Ok(Some(Err(e))) => Err(e.into()),
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
