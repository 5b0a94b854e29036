//! Secured WebSocket transport

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound half of a connected transport
pub struct TransportWriter {
    sink: SplitSink<WsStream, Message>,
}

/// Inbound half of a connected transport
pub struct TransportReader {
    stream: SplitStream<WsStream>,
}

/// A connected transport, split so the receive loop can own reads
/// while senders share the writer.
pub struct Transport {
    pub writer: TransportWriter,
    pub reader: TransportReader,
    /// Local socket address, used for the obfuscated-IP logon field
    pub local_addr: Option<SocketAddr>,
}

impl Transport {
    /// Opens a TLS WebSocket to the given address within the timeout.
    pub async fn connect(address: &Url, connect_timeout: Duration) -> Result<Self> {
        // rustls requires a process-level crypto provider before the
        // first TLS handshake.
        let _ = rustls::crypto::ring::default_provider().install_default();
        debug!(%address, "connecting");
        let (ws, _response) =
            tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(address.as_str()))
                .await
                .map_err(|_| Error::ConnectTimeout {
                    address: address.to_string(),
                    timeout_secs: connect_timeout.as_secs(),
                })??;
        let local_addr = match ws.get_ref() {
            MaybeTlsStream::Plain(tcp) => tcp.local_addr().ok(),
            MaybeTlsStream::Rustls(tls) => tls.get_ref().0.local_addr().ok(),
            _ => None,
        };
        let (sink, stream) = ws.split();
        Ok(Self {
            writer: TransportWriter { sink },
            reader: TransportReader { stream },
            local_addr,
        })
    }
}

impl TransportWriter {
    /// Sends one binary message.
    pub async fn send(&mut self, payload: Bytes) -> Result<()> {
        trace!(len = payload.len(), "transport send");
        self.sink.send(Message::Binary(payload)).await?;
        Ok(())
    }

    /// Performs the closing handshake.
    pub async fn close(&mut self) -> Result<()> {
        self.sink
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            })))
            .await?;
        Ok(())
    }
}

impl TransportReader {
    /// Receives the next binary payload.
    ///
    /// Returns `Ok(None)` on a clean close. Control frames are
    /// skipped; text frames are ignored since the protocol never
    /// sends them.
    pub async fn receive(&mut self) -> Result<Option<Bytes>> {
        loop {
            let Some(message) = self.stream.next().await else {
                return Ok(None);
            };
            match message? {
                Message::Binary(payload) => return Ok(Some(payload)),
                Message::Close(frame) => {
                    let code = frame.as_ref().map_or(CloseCode::Normal, |f| f.code);
                    if matches!(code, CloseCode::Normal | CloseCode::Away) {
                        debug!("peer closed connection cleanly");
                        return Ok(None);
                    }
                    return Err(Error::ClosedWithError { code: code.into() });
                }
                Message::Ping(_) | Message::Pong(_) => {}
                other => {
                    trace!(?other, "ignoring non-binary message");
                }
            }
        }
    }
}
