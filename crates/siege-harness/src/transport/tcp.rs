use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{Endpoint, Recv, StreamConnection, Transport, TransportError};

/// Newline-delimited streaming over TCP: one message per `\n`-terminated line.
pub struct TcpTransport;

#[async_trait]
impl Transport for TcpTransport {
    async fn establish(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Box<dyn StreamConnection>, TransportError> {
        let stream = match timeout(
            endpoint.connect_timeout(),
            TcpStream::connect(endpoint.tcp_addr()),
        )
        .await
        {
            Ok(stream) => stream?,
            Err(_) => return Err(TransportError::ConnectTimeout(endpoint.connect_timeout())),
        };

        Ok(Box::new(TcpConnection {
            reader: BufReader::new(stream),
            line: Vec::new(),
        }))
    }
}

struct TcpConnection {
    reader: BufReader<TcpStream>,
    // Partial line carried across receive ceilings; a timeout mid-line must
    // not lose or split the message.
    line: Vec<u8>,
}

impl TcpConnection {
    fn take_line(&mut self) -> Bytes {
        if self.line.last() == Some(&b'\n') {
            self.line.pop();
        }
        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }
        Bytes::from(std::mem::take(&mut self.line))
    }
}

#[async_trait]
impl StreamConnection for TcpConnection {
    async fn receive_next(&mut self, ceiling: Duration) -> Result<Recv, TransportError> {
        match timeout(ceiling, self.reader.read_until(b'\n', &mut self.line)).await {
            Err(_) => Ok(Recv::Idle),
            Ok(Ok(0)) => {
                if self.line.is_empty() {
                    Ok(Recv::Closed)
                } else {
                    // EOF after an unterminated final line: deliver it now,
                    // report Closed on the next call.
                    Ok(Recv::Message(self.take_line()))
                }
            }
            Ok(Ok(_)) => Ok(Recv::Message(self.take_line())),
            Ok(Err(e)) => Err(e.into()),
        }
    }

    async fn close(&mut self) {
        let _ = self.reader.get_mut().shutdown().await;
    }
}
