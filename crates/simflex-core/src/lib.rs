//! simflex-core — protocol client engine for the simflex simulation service.
//!
//! The simflex server drives long-running market simulations behind a
//! persistent WebSocket connection with a line-oriented textual protocol:
//! generate a problem instance, list and fetch instances, queue a simulation
//! job, poll its progress, fetch result artifacts. This crate implements the
//! client side of that protocol: the connection lifecycle, the strictly
//! serialized single-in-flight dispatcher, and the per-operation state
//! machines (including the polling loops and the detach-and-keep-running
//! mode).
//!
//! Presentation is out of scope: handlers publish structured
//! [`ClientEvent`]s on a channel and front-ends render them however they
//! like. Instance documents and result archives pass through as opaque
//! payloads.
//!
//! # Example
//!
//! ```rust,ignore
//! use simflex_core::{spawn, EngineConfig, InstanceSelector, WsConnector};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> simflex_core::Result<()> {
//!     let connector = Arc::new(WsConnector::new("ws://localhost:8000/")?);
//!     let (client, mut events, _engine) = spawn(connector, EngineConfig::default());
//!
//!     client.watch_server_status()?;
//!     client.list_instances()?;
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod event;
pub mod instance;
pub mod op;
pub mod protocol;
mod session;
pub mod transport;

// Re-export commonly used types
pub use engine::{spawn, Client, EngineConfig, EngineHandle, DEFAULT_POLL_DELAY};
pub use error::{ClientError, Result};
pub use event::{ClientEvent, ServerStatus};
pub use instance::{parse_instance_list, InstanceId, InstanceRecord, InstanceSelector};
pub use protocol::{Command, Payload, ReplyKind};
pub use transport::ws::WsConnector;
pub use transport::{Connector, Transport, TransportEvent};
