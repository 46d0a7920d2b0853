//! Structured events emitted by the client engine.
//!
//! Operation handlers never touch a display. Everything a front-end needs —
//! connection changes, fetched artifacts, progress, failures — is published
//! on the event channel as a [`ClientEvent`] and rendered by whoever
//! subscribes.

use crate::instance::InstanceRecord;
use bytes::Bytes;
use serde::Serialize;

/// Global computing status of the server, as reported by the persistent
/// status poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ServerStatus {
    /// A simulation is executing.
    Computing {
        /// Progression of the current job, in `[0, 1]`.
        progress: f64,
        /// Number of additional jobs queued behind it.
        queued_jobs: u64,
        /// True when the progression advanced enough since the last report
        /// to be worth a log line.
        advanced: bool,
    },
    /// No simulation is executing.
    Waiting,
}

/// Events published by the client engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// The transport connection opened.
    Connected,
    /// The transport connection closed (server- or client-initiated).
    Disconnected,
    /// Connection establishment failed.
    ConnectFailed { message: String },
    /// The transport reported an error; the connection has been torn down.
    TransportError { message: String },
    /// A message arrived while no operation was awaiting a reply. It has
    /// been dropped.
    UnexpectedMessage { preview: String },

    /// The server's instance list.
    InstanceList { records: Vec<InstanceRecord> },
    /// A blank instance template was requested; nothing was fetched.
    BlankInstanceLoaded,
    /// A saved instance document, opaque to the engine.
    InstanceFetched { hash: String, data: Bytes },
    /// The requested instance does not exist on the server.
    InstanceNotFound { hash: String, message: String },
    /// An instance was deleted.
    InstanceDeleted { hash: String },
    /// An instance's results were cleared.
    InstanceReset { hash: String },

    /// Instance generation finished; the new instance id was extracted from
    /// the final reply.
    InstanceGenerated { hash: String },
    /// Progression report while a simulation runs.
    SimulationProgress {
        hash: String,
        progress: f64,
        advanced: bool,
    },
    /// The simulation finished successfully.
    SimulationCompleted { hash: String },
    /// The simulation failed or was aborted server-side.
    SimulationFailed { hash: String, message: String },
    /// The client detached from a running job; it keeps running server-side.
    RunDetached { hash: String },

    /// A daily result archive, opaque to the engine.
    DailyResult { hash: String, day: u32, data: Bytes },
    /// A global results document, opaque to the engine.
    GlobalResults { hash: String, data: Bytes },

    /// Server activity indicator update from the status poll.
    ServerActivity { status: ServerStatus },

    /// An operation terminated on a protocol violation or other failure.
    /// `message` quotes the offending raw reply.
    OperationFailed { operation: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize_with_type_tag() {
        let event = ClientEvent::InstanceDeleted {
            hash: "ab12cd34".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"instance_deleted\""));
        assert!(json.contains("ab12cd34"));
    }

    #[test]
    fn test_server_status_serializes_state_tag() {
        let status = ServerStatus::Computing {
            progress: 0.25,
            queued_jobs: 2,
            advanced: true,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"state\":\"computing\""));
    }
}
