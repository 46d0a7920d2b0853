//! WebSocket transport.

use super::{Connector, Transport, TransportEvent};
use crate::error::{ClientError, Result};
use crate::protocol::Payload;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

/// Default timeout for connection establishment.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connector for `ws://` / `wss://` endpoints.
#[derive(Debug)]
pub struct WsConnector {
    url: Url,
    timeout: Duration,
}

impl WsConnector {
    /// Validate the server address and build a connector for it.
    pub fn new(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|error| ClientError::InvalidAddress {
            url: url.to_string(),
            message: error.to_string(),
        })?;
        match parsed.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(ClientError::InvalidAddress {
                    url: url.to_string(),
                    message: format!("unsupported scheme \"{other}\""),
                });
            }
        }
        Ok(WsConnector {
            url: parsed,
            timeout: CONNECT_TIMEOUT,
        })
    }

    /// Override the connection establishment timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        debug!(url = %self.url, "connecting");
        let (ws, _response) = tokio::time::timeout(self.timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| ClientError::ConnectTimeout(self.timeout))?
            .map_err(|error| ClientError::Connect {
                url: self.url.to_string(),
                message: error.to_string(),
            })?;
        debug!(url = %self.url, "connected");
        Ok(Box::new(WsTransport { ws }))
    }
}

/// A live WebSocket connection.
pub struct WsTransport {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, payload: Payload) -> Result<()> {
        let message = match payload {
            Payload::Text(text) => WsMessage::Text(text.into()),
            Payload::Binary(data) => WsMessage::Binary(data),
        };
        self.ws.send(message).await.map_err(ClientError::transport)
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            match self.ws.next().await {
                None => return TransportEvent::Closed,
                Some(Ok(WsMessage::Text(text))) => {
                    return TransportEvent::Message(Payload::Text(text.as_str().to_owned()));
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    return TransportEvent::Message(Payload::Binary(data));
                }
                Some(Ok(WsMessage::Close(_))) => return TransportEvent::Closed,
                // Ping/pong keepalive frames are answered by the library.
                Some(Ok(_)) => continue,
                Some(Err(error)) => return TransportEvent::Error(error.to_string()),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_accepts_ws_schemes() {
        assert!(WsConnector::new("ws://localhost:8000/").is_ok());
        assert!(WsConnector::new("wss://example.org/sim").is_ok());
    }

    #[test]
    fn test_connector_rejects_other_schemes() {
        let error = WsConnector::new("http://localhost:8000/").unwrap_err();
        assert!(matches!(error, ClientError::InvalidAddress { .. }));
    }

    #[test]
    fn test_connector_rejects_garbage() {
        assert!(WsConnector::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        // Port 1 is never a listening WebSocket server.
        let connector = WsConnector::new("ws://127.0.0.1:1/")
            .unwrap()
            .with_timeout(Duration::from_secs(2));
        let result = connector.connect().await;
        assert!(result.is_err());
    }
}
