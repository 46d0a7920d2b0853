//! Transport abstraction.
//!
//! The engine drives a single bidirectional message transport through this
//! seam. The provided implementation is WebSocket ([`ws::WsConnector`]);
//! tests substitute channel-backed fakes.

pub mod ws;

use crate::error::Result;
use crate::protocol::Payload;
use async_trait::async_trait;

/// Something the transport reported.
#[derive(Debug)]
pub enum TransportEvent {
    /// An inbound message.
    Message(Payload),
    /// The connection closed cleanly (either side).
    Closed,
    /// The connection failed; it must be considered gone.
    Error(String),
}

/// A live bidirectional connection.
#[async_trait]
pub trait Transport: Send {
    /// Send one payload.
    async fn send(&mut self, payload: Payload) -> Result<()>;

    /// Wait for the next inbound event. Cancel-safe.
    async fn next_event(&mut self) -> TransportEvent;

    /// Close the connection. Best effort.
    async fn close(&mut self);
}

/// Establishes transports on demand.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new connection to the server.
    async fn connect(&self) -> Result<Box<dyn Transport>>;
}
