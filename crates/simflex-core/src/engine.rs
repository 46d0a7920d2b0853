//! The client engine task and its public handle.
//!
//! [`spawn`] starts one engine task per session. The task owns the session
//! state, the transport and every timer, so all protocol work happens on a
//! single cooperative control flow: it multiplexes the command channel, the
//! transport event stream, the in-flight connect attempt and the earliest
//! pending poll deadline, feeds whichever fires into the session, then
//! executes the effects the session produced. Callers interact through the
//! cheap cloneable [`Client`] handle and consume results from the event
//! channel.

use crate::error::{ClientError, Result};
use crate::event::ClientEvent;
use crate::instance::{InstanceId, InstanceSelector};
use crate::op::{
    DeleteInstance, GenerateInstance, GetDailyResult, GetGlobalResults, GetInstance,
    ListInstances, Operation, ResetInstance, ServerStatusPoll, SimulateInstance,
};
use crate::session::{Effect, Session};
use crate::transport::{Connector, Transport, TransportEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{info, warn};

/// Fixed delay between job status polls.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(1);

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay between polling rounds of long-running jobs.
    pub poll_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            poll_delay: DEFAULT_POLL_DELAY,
        }
    }
}

enum EngineCommand {
    Enqueue(Box<dyn Operation>),
    RequestDetach,
    RequestAbort,
    Disconnect,
    Shutdown,
}

/// Handle used to drive a running engine.
#[derive(Clone)]
pub struct Client {
    commands: mpsc::UnboundedSender<EngineCommand>,
}

impl Client {
    fn send(&self, command: EngineCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::EngineGone)
    }

    /// Enqueue an arbitrary operation.
    pub fn enqueue(&self, op: Box<dyn Operation>) -> Result<()> {
        self.send(EngineCommand::Enqueue(op))
    }

    /// Fetch the server's instance list.
    pub fn list_instances(&self) -> Result<()> {
        self.enqueue(Box::new(ListInstances::new()))
    }

    /// Fetch an instance document, or the blank template locally.
    pub fn load_instance(&self, selector: InstanceSelector) -> Result<()> {
        self.enqueue(Box::new(GetInstance::new(selector)))
    }

    /// Delete a saved instance (re-lists and reloads the blank template on
    /// success).
    pub fn delete_instance(&self, hash: InstanceId) -> Result<()> {
        self.enqueue(Box::new(DeleteInstance::new(hash)))
    }

    /// Clear a saved instance's results (re-fetches it on success).
    pub fn reset_instance(&self, hash: InstanceId) -> Result<()> {
        self.enqueue(Box::new(ResetInstance::new(hash)))
    }

    /// Generate a new instance from a raw parameter document.
    pub fn generate_instance(&self, document: String) -> Result<()> {
        self.enqueue(Box::new(GenerateInstance::new(document)))
    }

    /// Queue and drive the simulation of a saved instance.
    pub fn simulate_instance(&self, hash: InstanceId) -> Result<()> {
        self.enqueue(Box::new(SimulateInstance::new(hash)))
    }

    /// Start the persistent server activity poll.
    pub fn watch_server_status(&self) -> Result<()> {
        self.enqueue(Box::new(ServerStatusPoll::new()))
    }

    /// Fetch the result archive for one simulated day.
    pub fn fetch_daily_result(&self, hash: InstanceId, day: u32) -> Result<()> {
        self.enqueue(Box::new(GetDailyResult::new(hash, day)))
    }

    /// Fetch the aggregated results document.
    pub fn fetch_global_results(&self, hash: InstanceId) -> Result<()> {
        self.enqueue(Box::new(GetGlobalResults::new(hash)))
    }

    /// Ask the running simulation to detach and keep running server-side.
    pub fn request_detach(&self) -> Result<()> {
        self.send(EngineCommand::RequestDetach)
    }

    /// Ask the running simulation to abort.
    pub fn request_abort(&self) -> Result<()> {
        self.send(EngineCommand::RequestAbort)
    }

    /// Hard abort: abandon all queued and in-flight work and close the
    /// connection.
    pub fn disconnect(&self) -> Result<()> {
        self.send(EngineCommand::Disconnect)
    }

    /// Stop the engine entirely.
    pub fn shutdown(&self) -> Result<()> {
        self.send(EngineCommand::Shutdown)
    }
}

/// Handle to the running engine task. Dropping it aborts the task.
pub struct EngineHandle {
    task: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Wait for the engine task to finish.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Start an engine task for the given server connector.
///
/// Returns the command handle, the event stream and the task handle.
pub fn spawn(
    connector: Arc<dyn Connector>,
    config: EngineConfig,
) -> (Client, mpsc::UnboundedReceiver<ClientEvent>, EngineHandle) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let engine = Engine {
        session: Session::new(),
        connector,
        poll_delay: config.poll_delay,
        transport: None,
        connecting: None,
        polls: Vec::new(),
        events: event_tx,
        commands: command_rx,
    };
    let task = tokio::spawn(engine.run());
    (
        Client {
            commands: command_tx,
        },
        event_rx,
        EngineHandle { task: Some(task) },
    )
}

enum Wake {
    Command(Option<EngineCommand>),
    Transport(TransportEvent),
    Connected(std::result::Result<Result<Box<dyn Transport>>, JoinError>),
    PollDue(u64),
}

struct Engine {
    session: Session,
    connector: Arc<dyn Connector>,
    poll_delay: Duration,
    transport: Option<Box<dyn Transport>>,
    connecting: Option<JoinHandle<Result<Box<dyn Transport>>>>,
    /// Outstanding poll deadlines. Cleared whenever the transport goes away;
    /// the session ignores stale tokens regardless.
    polls: Vec<(Instant, u64)>,
    events: mpsc::UnboundedSender<ClientEvent>,
    commands: mpsc::UnboundedReceiver<EngineCommand>,
}

impl Engine {
    async fn run(mut self) {
        info!("client engine started");
        loop {
            self.apply_effects().await;
            let next_poll = self.polls.iter().copied().min_by_key(|(at, _)| *at);
            let wake = tokio::select! {
                command = self.commands.recv() => Wake::Command(command),
                event = transport_event(&mut self.transport) => Wake::Transport(event),
                result = connect_result(&mut self.connecting) => Wake::Connected(result),
                token = poll_timer(next_poll) => Wake::PollDue(token),
            };
            match wake {
                Wake::Command(None) | Wake::Command(Some(EngineCommand::Shutdown)) => {
                    self.shutdown().await;
                    break;
                }
                Wake::Command(Some(command)) => self.handle_command(command),
                Wake::Transport(TransportEvent::Message(payload)) => {
                    self.session.on_message(payload);
                }
                Wake::Transport(TransportEvent::Closed) => {
                    self.transport = None;
                    self.polls.clear();
                    self.session.on_closed();
                }
                Wake::Transport(TransportEvent::Error(message)) => {
                    self.session.on_transport_error(message);
                }
                Wake::Connected(result) => {
                    self.connecting = None;
                    match result {
                        Ok(Ok(transport)) => {
                            self.transport = Some(transport);
                            self.session.on_connected();
                        }
                        Ok(Err(error)) => self.session.on_connect_failed(error.to_string()),
                        Err(join_error) => self.session.on_connect_failed(join_error.to_string()),
                    }
                }
                Wake::PollDue(token) => {
                    self.polls.retain(|(_, t)| *t != token);
                    self.session.poll_due(token);
                }
            }
        }
        info!("client engine stopped");
    }

    fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Enqueue(op) => self.session.enqueue(op),
            EngineCommand::RequestDetach => self.session.request_detach(),
            EngineCommand::RequestAbort => self.session.request_abort(),
            EngineCommand::Disconnect => self.session.disconnect(),
            // Handled by the run loop before dispatching here.
            EngineCommand::Shutdown => {}
        }
    }

    /// Execute everything the session asked for. Effects appended while
    /// executing (e.g. the teardown triggered by a failed send) are handled
    /// in the same pass.
    async fn apply_effects(&mut self) {
        while let Some(effect) = self.session.next_effect() {
            match effect {
                Effect::Transmit(payload) => match &mut self.transport {
                    Some(transport) => {
                        if let Err(error) = transport.send(payload).await {
                            self.session.on_transport_error(error.to_string());
                        }
                    }
                    None => warn!("trying to send a message with no transport"),
                },
                Effect::StartConnect => {
                    if self.connecting.is_none() && self.transport.is_none() {
                        let connector = Arc::clone(&self.connector);
                        self.connecting =
                            Some(tokio::spawn(async move { connector.connect().await }));
                    }
                }
                Effect::SchedulePoll { token } => {
                    self.polls.push((Instant::now() + self.poll_delay, token));
                }
                Effect::CloseTransport => {
                    if let Some(handle) = self.connecting.take() {
                        handle.abort();
                    }
                    if let Some(mut transport) = self.transport.take() {
                        transport.close().await;
                    }
                    self.polls.clear();
                }
                Effect::Emit(event) => {
                    let _ = self.events.send(event);
                }
            }
        }
    }

    async fn shutdown(&mut self) {
        self.session.disconnect();
        self.apply_effects().await;
    }
}

async fn transport_event(transport: &mut Option<Box<dyn Transport>>) -> TransportEvent {
    match transport {
        Some(transport) => transport.next_event().await,
        None => std::future::pending().await,
    }
}

async fn connect_result(
    connecting: &mut Option<JoinHandle<Result<Box<dyn Transport>>>>,
) -> std::result::Result<Result<Box<dyn Transport>>, JoinError> {
    match connecting {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn poll_timer(next: Option<(Instant, u64)>) -> u64 {
    match next {
        Some((deadline, token)) => {
            tokio::time::sleep_until(deadline).await;
            token
        }
        None => std::future::pending().await,
    }
}
