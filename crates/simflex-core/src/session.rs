//! The serialized request/response scheduler.
//!
//! One `Session` owns the two queues that define the client's concurrency
//! model: the request queue (operations not yet started) and the
//! pending-response queue (operations that sent a command and await exactly
//! one reply). The wire protocol has no correlation ids — replies are
//! attributed to the oldest pending operation purely by arrival order — so
//! the session never lets a second command out while one is outstanding.
//!
//! The session is synchronous and deterministic: connection events, inbound
//! messages and poll expirations are fed in as method calls, and everything
//! the outside world must do in response (transmit, connect, schedule a
//! timer, close, publish an event) is returned through the [`Effect`] queue.
//! The async engine drains that queue; tests drain it directly.

use crate::event::ClientEvent;
use crate::op::{Finish, OpContext, Operation, Step};
use crate::protocol::Payload;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// An action the session asks its driver to perform.
#[derive(Debug)]
pub(crate) enum Effect {
    /// Send a payload over the live transport.
    Transmit(Payload),
    /// Begin asynchronous connection establishment.
    StartConnect,
    /// Arrange for `poll_due(token)` to be called after the polling delay.
    SchedulePoll { token: u64 },
    /// Close and drop the transport (and abort any in-flight connect).
    CloseTransport,
    /// Publish an event to the presentation layer.
    Emit(ClientEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    /// No transport exists.
    Absent,
    /// Connection establishment is in flight.
    Connecting,
    /// The transport is open.
    Open,
}

/// A queued or in-flight operation together with its delivery state.
struct OperationHandle {
    op: Box<dyn Operation>,
    /// The most recent reply delivered to this handle, retained so the
    /// `call_next_handler` release primitive can re-invoke it.
    last_reply: Option<Payload>,
}

impl OperationHandle {
    fn new(op: Box<dyn Operation>) -> Self {
        OperationHandle {
            op,
            last_reply: None,
        }
    }
}

enum Invocation {
    Begin,
    Reply,
}

/// Queue and dispatch state for one client session.
pub(crate) struct Session {
    link: LinkState,
    /// Operations not yet started (FIFO).
    requests: VecDeque<OperationHandle>,
    /// Operations awaiting exactly one reply. Never longer than 1 in
    /// practice: a new command is not sent while one is outstanding.
    pending: VecDeque<OperationHandle>,
    /// Operations waiting out a polling delay, keyed by timer token.
    /// Cleared on teardown, which is what invalidates outstanding timers.
    parked: Vec<(u64, OperationHandle)>,
    next_poll_token: u64,
    /// Re-entrancy guard: true while a handler is executing.
    processing: bool,
    detach_requested: bool,
    abort_requested: bool,
    effects: VecDeque<Effect>,
}

impl Session {
    pub(crate) fn new() -> Self {
        Session {
            link: LinkState::Absent,
            requests: VecDeque::new(),
            pending: VecDeque::new(),
            parked: Vec::new(),
            next_poll_token: 0,
            processing: false,
            detach_requested: false,
            abort_requested: false,
            effects: VecDeque::new(),
        }
    }

    /// Append an operation to the request queue and release it if the
    /// pipeline is idle.
    pub(crate) fn enqueue(&mut self, op: Box<dyn Operation>) {
        debug!(operation = op.name(), "operation enqueued");
        self.requests.push_back(OperationHandle::new(op));
        self.call_next_request();
    }

    /// Ask the running simulation to detach on its next status round.
    pub(crate) fn request_detach(&mut self) {
        self.detach_requested = true;
    }

    /// Ask the running simulation to abort on its next status round.
    pub(crate) fn request_abort(&mut self) {
        self.abort_requested = true;
    }

    /// Next driver action, if any.
    pub(crate) fn next_effect(&mut self) -> Option<Effect> {
        self.effects.pop_front()
    }

    /// The transport opened.
    pub(crate) fn on_connected(&mut self) {
        info!("connected");
        self.link = LinkState::Open;
        self.emit(ClientEvent::Connected);
        self.call_next_request();
    }

    /// Connection establishment failed. Queued operations are kept; a later
    /// enqueue or explicit reconnect may retry.
    pub(crate) fn on_connect_failed(&mut self, message: String) {
        warn!(%message, "connection failed");
        self.link = LinkState::Absent;
        self.emit(ClientEvent::ConnectFailed { message });
    }

    /// The transport closed, whether user- or server-initiated. In-flight
    /// work is abandoned silently; not-yet-started operations survive for a
    /// manual reconnect.
    pub(crate) fn on_closed(&mut self) {
        info!("disconnected");
        self.link = LinkState::Absent;
        self.teardown_in_flight();
        self.emit(ClientEvent::Disconnected);
    }

    /// The transport reported an error: tear the connection down. No
    /// automatic reconnect is attempted.
    pub(crate) fn on_transport_error(&mut self, message: String) {
        warn!(%message, "transport error");
        self.link = LinkState::Absent;
        self.teardown_in_flight();
        self.emit(ClientEvent::TransportError { message });
        self.effects.push_back(Effect::CloseTransport);
    }

    /// Dispatch an inbound message to the oldest pending operation.
    ///
    /// With nothing pending the message is unexpected: logged and dropped,
    /// no operation is created or mutated. Textual payloads are normalized
    /// (trimmed, lowercased) before the handler sees them.
    pub(crate) fn on_message(&mut self, payload: Payload) {
        if self.pending.is_empty() {
            warn!(message = %payload.preview(), "unexpected message dropped");
            self.emit(ClientEvent::UnexpectedMessage {
                preview: payload.preview(),
            });
            return;
        }
        let Some(mut handle) = self.pending.pop_front() else {
            return;
        };
        handle.last_reply = Some(payload.normalized());
        self.invoke(handle, Invocation::Reply);
    }

    /// A scheduled poll delay expired. Stale tokens (invalidated by a
    /// teardown since scheduling) are ignored.
    pub(crate) fn poll_due(&mut self, token: u64) {
        let Some(index) = self.parked.iter().position(|(t, _)| *t == token) else {
            debug!(token, "stale poll timer ignored");
            return;
        };
        let (_, handle) = self.parked.remove(index);
        self.requests.push_back(handle);
        self.call_next_request();
    }

    /// Hard abort: clear both queues, then close the transport. Abandoned
    /// operations get no completion notification.
    pub(crate) fn disconnect(&mut self) {
        // Queues are cleared before the close effect is issued so nothing
        // can transmit into a closing transport.
        self.requests.clear();
        self.teardown_in_flight();
        match self.link {
            LinkState::Open => {
                self.link = LinkState::Absent;
                self.effects.push_back(Effect::CloseTransport);
                self.emit(ClientEvent::Disconnected);
            }
            LinkState::Connecting => {
                self.link = LinkState::Absent;
                self.effects.push_back(Effect::CloseTransport);
            }
            LinkState::Absent => {}
        }
    }

    /// Release the oldest pending handler if nothing is processing.
    ///
    /// Only meaningful when a reply was already delivered to it; a handle
    /// still waiting for its reply is left in place.
    pub(crate) fn call_next_handler(&mut self) {
        if self.processing {
            return;
        }
        let Some(handle) = self.pending.pop_front() else {
            return;
        };
        if handle.last_reply.is_some() {
            self.invoke(handle, Invocation::Reply);
        } else {
            self.pending.push_front(handle);
        }
    }

    /// Release the oldest queued operation if no reply is outstanding.
    ///
    /// This is the sole entry point that starts or resumes an operation, and
    /// it is an idempotent no-op whenever the preconditions do not hold.
    pub(crate) fn call_next_request(&mut self) {
        if self.pending.is_empty() {
            if let Some(handle) = self.requests.pop_front() {
                self.invoke(handle, Invocation::Begin);
            }
        }
    }

    fn emit(&mut self, event: ClientEvent) {
        self.effects.push_back(Effect::Emit(event));
    }

    /// Abandon in-flight and parked work. Clearing `parked` is what
    /// invalidates any still-outstanding poll timers.
    fn teardown_in_flight(&mut self) {
        self.pending.clear();
        self.parked.clear();
        self.detach_requested = false;
        self.abort_requested = false;
        self.processing = false;
    }

    fn transmit(&mut self, payload: Payload) {
        if self.link == LinkState::Open {
            self.effects.push_back(Effect::Transmit(payload));
        } else {
            // Sends without a transport are suppressed, not errors.
            warn!("trying to send a message with no live connection");
        }
    }

    fn park(&mut self, handle: OperationHandle) {
        let token = self.next_poll_token;
        self.next_poll_token += 1;
        self.parked.push((token, handle));
        self.effects.push_back(Effect::SchedulePoll { token });
    }

    /// Run one handler invocation and apply the step it returns.
    fn invoke(&mut self, mut handle: OperationHandle, invocation: Invocation) {
        if matches!(invocation, Invocation::Begin) && self.link != LinkState::Open {
            // Unconnected: park the operation back in the request queue and
            // arrange a connection; `on_connected` releases it again.
            debug!(operation = handle.op.name(), "no connection, connecting first");
            self.requests.push_back(handle);
            if self.link == LinkState::Absent {
                self.link = LinkState::Connecting;
                self.effects.push_back(Effect::StartConnect);
            }
            return;
        }
        if self.processing {
            // Nested dispatch is forbidden; put the handle back where it
            // came from.
            warn!(operation = handle.op.name(), "re-entrant dispatch suppressed");
            match invocation {
                Invocation::Begin => self.requests.push_front(handle),
                Invocation::Reply => self.pending.push_front(handle),
            }
            return;
        }

        self.processing = true;
        let mut events = Vec::new();
        let step = {
            let mut ctx = OpContext::new(
                &mut events,
                &mut self.detach_requested,
                &mut self.abort_requested,
            );
            match invocation {
                Invocation::Begin => handle.op.begin(&mut ctx),
                Invocation::Reply => {
                    let reply = handle
                        .last_reply
                        .clone()
                        .unwrap_or_else(|| Payload::Text(String::new()));
                    handle.op.on_reply(&mut ctx, &reply)
                }
            }
        };
        self.processing = false;

        for event in events {
            self.emit(event);
        }
        match step {
            Step::Send(payload) => {
                debug_assert!(
                    self.pending.is_empty(),
                    "a command is already outstanding"
                );
                self.transmit(payload);
                self.pending.push_back(handle);
            }
            Step::NotifyAndPoll(payload) => {
                self.transmit(payload);
                self.park(handle);
            }
            Step::Poll => self.park(handle),
            Step::Done(finish) => self.finish(handle, finish),
        }
    }

    fn finish(&mut self, handle: OperationHandle, finish: Finish) {
        debug!(
            operation = handle.op.name(),
            failed = finish.failed,
            "operation finished"
        );
        drop(handle);
        if finish.disconnect {
            self.disconnect();
            return;
        }
        for op in finish.chain {
            self.requests.push_back(OperationHandle::new(op));
        }
        self.call_next_request();
    }
}
