//! End-to-end engine scenarios against a scripted peer.
//!
//! The peer plays the server side of the wire protocol over channel-backed
//! transports, asserting on every command the engine sends and injecting the
//! scripted replies. Polling delays run on tokio's paused clock.

use async_trait::async_trait;
use simflex_core::{
    spawn, ClientError, ClientEvent, Connector, EngineConfig, InstanceId, Payload, ServerStatus,
    Transport, TransportEvent,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct ScriptedTransport {
    from_engine: mpsc::UnboundedSender<Payload>,
    to_engine: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, payload: Payload) -> simflex_core::Result<()> {
        self.from_engine
            .send(payload)
            .map_err(|_| ClientError::transport("peer gone"))
    }

    async fn next_event(&mut self) -> TransportEvent {
        self.to_engine.recv().await.unwrap_or(TransportEvent::Closed)
    }

    async fn close(&mut self) {}
}

/// The scripted server side of one connection.
struct Peer {
    sent: mpsc::UnboundedReceiver<Payload>,
    inject: mpsc::UnboundedSender<TransportEvent>,
}

impl Peer {
    async fn expect_text(&mut self, expected: &str) {
        let payload = timeout(WAIT, self.sent.recv())
            .await
            .expect("timed out waiting for a command")
            .expect("transport dropped");
        assert_eq!(payload, Payload::text(expected));
    }

    fn reply(&self, text: &str) {
        self.inject
            .send(TransportEvent::Message(Payload::text(text)))
            .expect("engine gone");
    }

    fn reply_binary(&self, data: Vec<u8>) {
        self.inject
            .send(TransportEvent::Message(Payload::binary(data)))
            .expect("engine gone");
    }

    fn close(&self) {
        let _ = self.inject.send(TransportEvent::Closed);
    }
}

/// Connector handing out one pre-scripted transport.
struct ScriptedConnector {
    slot: Mutex<Option<ScriptedTransport>>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> simflex_core::Result<Box<dyn Transport>> {
        match self.slot.lock().unwrap().take() {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(ClientError::Connect {
                url: "scripted".into(),
                message: "no more connections scripted".into(),
            }),
        }
    }
}

fn scripted() -> (Arc<ScriptedConnector>, Peer) {
    let (from_engine_tx, from_engine_rx) = mpsc::unbounded_channel();
    let (to_engine_tx, to_engine_rx) = mpsc::unbounded_channel();
    let connector = Arc::new(ScriptedConnector {
        slot: Mutex::new(Some(ScriptedTransport {
            from_engine: from_engine_tx,
            to_engine: to_engine_rx,
        })),
    });
    let peer = Peer {
        sent: from_engine_rx,
        inject: to_engine_tx,
    };
    (connector, peer)
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("engine gone")
}

/// Let the engine task drain already-submitted commands before scripting
/// the next reply.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn id(value: &str) -> InstanceId {
    InstanceId::new(value).unwrap()
}

#[tokio::test(start_paused = true)]
async fn list_connects_on_demand_and_parses_records() {
    let (connector, mut peer) = scripted();
    let (client, mut events, _engine) = spawn(connector, EngineConfig::default());

    client.list_instances().unwrap();
    peer.expect_text("list generated instances").await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

    peer.reply("abc;One\nxyz;");
    match next_event(&mut events).await {
        ClientEvent::InstanceList { records } => {
            assert_eq!(records.len(), 2);
            // Replies are lowercased on receipt.
            assert_eq!(records[0].display_label(), "abc - one");
            assert_eq!(records[1].display_label(), "xyz");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn unexpected_message_is_reported_and_dropped() {
    let (connector, mut peer) = scripted();
    let (client, mut events, _engine) = spawn(connector, EngineConfig::default());

    client.list_instances().unwrap();
    peer.expect_text("list generated instances").await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
    peer.reply("");
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::InstanceList { .. }
    ));

    // Nothing is pending now: this message must be dropped.
    peer.reply("ok surprise");
    match next_event(&mut events).await {
        ClientEvent::UnexpectedMessage { preview } => assert_eq!(preview, "ok surprise"),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn generate_polls_until_the_artifact_id_arrives() {
    let (connector, mut peer) = scripted();
    let (client, mut events, _engine) = spawn(connector, EngineConfig::default());

    client.generate_instance("<instance/>".to_string()).unwrap();
    peer.expect_text("instance generation request").await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

    peer.reply("OK instance generation request");
    peer.expect_text("<instance/>").await;

    peer.reply("OK instance received");
    peer.expect_text("ready?").await;

    // Still running: the engine waits out the polling delay (paused clock)
    // and asks again.
    peer.reply("OK running \"ab12cd34\"");
    peer.expect_text("ready?").await;

    peer.reply("OK instance generated \"ab12cd34\"");
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::InstanceGenerated {
            hash: "ab12cd34".into()
        }
    );

    // Completion chains a re-list and a fetch of the new instance.
    peer.expect_text("list generated instances").await;
    peer.reply("ab12cd34;Generated");
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::InstanceList { .. }
    ));

    peer.expect_text("get instance \"ab12cd34\"").await;
    peer.reply_binary(b"<instance/>".to_vec());
    match next_event(&mut events).await {
        ClientEvent::InstanceFetched { hash, data } => {
            assert_eq!(hash, "ab12cd34");
            assert_eq!(data.as_ref(), b"<instance/>".as_slice());
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn simulate_detach_severs_locally_and_stops_the_queue() {
    let (connector, mut peer) = scripted();
    let (client, mut events, _engine) = spawn(connector, EngineConfig::default());

    client.simulate_instance(id("ab12cd34")).unwrap();
    peer.expect_text("instance simulation request \"ab12cd34\"").await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

    // Detach requested before the next status round arrives.
    client.request_detach().unwrap();
    settle().await;
    peer.reply("ok waiting");

    peer.expect_text("run disconnected").await;
    peer.reply("ok run disconnected");

    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::RunDetached {
            hash: "ab12cd34".into()
        }
    );
    assert_eq!(next_event(&mut events).await, ClientEvent::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn delete_violation_skips_chain_and_releases_next_operation() {
    let (connector, mut peer) = scripted();
    let (client, mut events, _engine) = spawn(connector, EngineConfig::default());

    client.delete_instance(id("xyz12345")).unwrap();
    client.list_instances().unwrap();

    peer.expect_text("delete instance \"xyz12345\"").await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

    peer.reply("error something");
    match next_event(&mut events).await {
        ClientEvent::OperationFailed { operation, .. } => {
            assert_eq!(operation, "delete instance");
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // The very next command is the queued list — not the deleted-id chain.
    peer.expect_text("list generated instances").await;
    peer.reply("");
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::InstanceList { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn status_poll_keeps_rescheduling() {
    let (connector, mut peer) = scripted();
    let (client, mut events, _engine) = spawn(connector, EngineConfig::default());

    client.watch_server_status().unwrap();
    peer.expect_text("is computing simulation?").await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

    peer.reply("is computing simulation with progression 0.25 and 2 jobs");
    match next_event(&mut events).await {
        ClientEvent::ServerActivity {
            status:
                ServerStatus::Computing {
                    progress,
                    queued_jobs,
                    advanced,
                },
        } => {
            assert!((progress - 0.25).abs() < f64::EPSILON);
            assert_eq!(queued_jobs, 2);
            assert!(advanced);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // After the polling delay the same query goes out again, forever.
    peer.expect_text("is computing simulation?").await;
    peer.reply("is waiting for simulation");
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::ServerActivity {
            status: ServerStatus::Waiting
        }
    );
    peer.expect_text("is computing simulation?").await;
}

#[tokio::test(start_paused = true)]
async fn daily_result_passes_binary_payload_through() {
    let (connector, mut peer) = scripted();
    let (client, mut events, _engine) = spawn(connector, EngineConfig::default());

    client.fetch_daily_result(id("ab12cd34"), 5).unwrap();
    peer.expect_text("get daily result \"ab12cd34\" \"5\"").await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

    let archive = vec![0x50, 0x4b, 0x03, 0x04, 0xff];
    peer.reply_binary(archive.clone());
    match next_event(&mut events).await {
        ClientEvent::DailyResult { hash, day, data } => {
            assert_eq!(hash, "ab12cd34");
            assert_eq!(day, 5);
            assert_eq!(data.as_ref(), archive.as_slice());
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn server_close_surfaces_disconnect() {
    let (connector, mut peer) = scripted();
    let (client, mut events, _engine) = spawn(connector, EngineConfig::default());

    client.list_instances().unwrap();
    peer.expect_text("list generated instances").await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

    peer.close();
    assert_eq!(next_event(&mut events).await, ClientEvent::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_engine_task() {
    let (connector, mut peer) = scripted();
    let (client, mut events, engine) = spawn(connector, EngineConfig::default());

    client.list_instances().unwrap();
    peer.expect_text("list generated instances").await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

    client.shutdown().unwrap();
    timeout(WAIT, engine.join()).await.expect("engine did not stop");
    assert!(client.list_instances().is_err());
}
