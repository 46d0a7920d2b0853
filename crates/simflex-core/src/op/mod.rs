//! Operation state-machine framework.
//!
//! Every protocol exchange — listing instances, generating one, driving a
//! simulation — is an [`Operation`]: a state machine the session invokes when
//! the operation should act. The first invocation ([`Operation::begin`])
//! happens when the session releases the operation from the request queue
//! with a live connection, and again after every polling delay. Each
//! subsequent invocation ([`Operation::on_reply`]) delivers exactly one
//! server reply. The returned [`Step`] tells the session what to do next.
//!
//! Failure policy: a reply that matches no expected prefix is a protocol
//! violation. The operation logs it with the raw message and its current
//! state, reports it on the event stream, and terminates. Operations bound
//! to a server-side job additionally force a full disconnect, since the
//! session state on the server must be assumed inconsistent.

mod instances;
mod jobs;
mod results;

pub use instances::{DeleteInstance, GetInstance, ListInstances, ResetInstance};
pub use jobs::{GenerateInstance, ServerStatusPoll, SimulateInstance};
pub use results::{GetDailyResult, GetGlobalResults};

use crate::error::ClientError;
use crate::event::ClientEvent;
use crate::protocol::Payload;
use tracing::warn;

/// What an operation wants the session to do next.
#[derive(Debug)]
pub enum Step {
    /// Transmit a payload and wait for exactly one reply.
    Send(Payload),
    /// Transmit a payload that the server does not answer, then re-enter
    /// after the polling delay. Used for job aborts.
    NotifyAndPoll(Payload),
    /// Re-enter after the polling delay.
    Poll,
    /// The operation reached a terminal state.
    Done(Finish),
}

/// Terminal outcome of an operation.
#[derive(Debug)]
pub struct Finish {
    pub(crate) failed: bool,
    /// Hard-disconnect the session (job failures, detach acknowledgment).
    pub(crate) disconnect: bool,
    /// Follow-up operations to enqueue (e.g. re-list after a delete).
    pub(crate) chain: Vec<Box<dyn Operation>>,
}

impl Finish {
    /// Successful completion.
    pub fn success() -> Self {
        Finish {
            failed: false,
            disconnect: false,
            chain: Vec::new(),
        }
    }

    /// Successful completion with chained follow-up operations.
    pub fn success_chaining(chain: Vec<Box<dyn Operation>>) -> Self {
        Finish {
            failed: false,
            disconnect: false,
            chain,
        }
    }

    /// Failed completion; the next queued operation still runs.
    pub fn failure() -> Self {
        Finish {
            failed: true,
            disconnect: false,
            chain: Vec::new(),
        }
    }

    /// Failed completion that abandons the session entirely.
    pub fn failure_disconnect() -> Self {
        Finish {
            failed: true,
            disconnect: true,
            chain: Vec::new(),
        }
    }

    /// Successful completion that closes the connection locally (detach).
    pub fn detached() -> Self {
        Finish {
            failed: false,
            disconnect: true,
            chain: Vec::new(),
        }
    }
}

/// Context handed to an operation on every invocation.
///
/// Carries the event buffer and the session-scoped detach/abort request
/// flags. Events are published once the handler returns.
pub struct OpContext<'a> {
    events: &'a mut Vec<ClientEvent>,
    detach_requested: &'a mut bool,
    abort_requested: &'a mut bool,
}

impl<'a> OpContext<'a> {
    pub(crate) fn new(
        events: &'a mut Vec<ClientEvent>,
        detach_requested: &'a mut bool,
        abort_requested: &'a mut bool,
    ) -> Self {
        OpContext {
            events,
            detach_requested,
            abort_requested,
        }
    }

    /// Publish an event to the presentation layer.
    pub fn emit(&mut self, event: ClientEvent) {
        self.events.push(event);
    }

    /// Consume a pending detach request, if any.
    pub fn take_detach_request(&mut self) -> bool {
        std::mem::take(self.detach_requested)
    }

    /// Consume a pending abort request, if any.
    pub fn take_abort_request(&mut self) -> bool {
        std::mem::take(self.abort_requested)
    }
}

/// A single protocol exchange, possibly multi-round.
pub trait Operation: Send {
    /// Name used in logs and failure events, e.g. `"delete instance"`.
    fn name(&self) -> &'static str;

    /// First dispatch, and re-entry after each polling delay. The connection
    /// is live when this is called.
    fn begin(&mut self, ctx: &mut OpContext<'_>) -> Step;

    /// A reply arrived for the payload this operation last sent.
    fn on_reply(&mut self, ctx: &mut OpContext<'_>, reply: &Payload) -> Step;
}

impl std::fmt::Debug for dyn Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Operation({})", self.name())
    }
}

/// Log a protocol violation and report it on the event stream.
///
/// Returns a plain failure; job-bound operations upgrade it with
/// [`Finish::failure_disconnect`] semantics at the call site.
pub(crate) fn protocol_failure(
    ctx: &mut OpContext<'_>,
    operation: &'static str,
    state: &str,
    reply: &Payload,
) -> Finish {
    let violation = ClientError::Protocol {
        operation: operation.to_string(),
        state: state.to_string(),
        message: reply.preview(),
    };
    warn!("{violation}");
    ctx.emit(ClientEvent::OperationFailed {
        operation: operation.to_string(),
        message: reply.preview(),
    });
    Finish::failure()
}

/// Log and report an operation re-entered in a state it cannot act from.
pub(crate) fn state_failure(
    ctx: &mut OpContext<'_>,
    operation: &'static str,
    state: &str,
) -> Finish {
    warn!(operation, state, "operation re-entered in unexpected state");
    ctx.emit(ClientEvent::OperationFailed {
        operation: operation.to_string(),
        message: format!("re-entered in unexpected state: {state}"),
    });
    Finish::failure()
}

/// Epsilon-gated progress tracking: returns true (and records the value)
/// only when `progress` advanced at least 0.01 past the last recorded value.
pub(crate) fn progress_advanced(last: &mut Option<f64>, progress: f64) -> bool {
    let advanced = match *last {
        None => true,
        Some(previous) => previous < progress - 0.01,
    };
    if advanced {
        *last = Some(progress);
    }
    advanced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_advanced_epsilon() {
        let mut last = None;
        assert!(progress_advanced(&mut last, 0.0));
        assert!(!progress_advanced(&mut last, 0.005));
        assert!(!progress_advanced(&mut last, 0.01));
        assert!(progress_advanced(&mut last, 0.02));
        assert_eq!(last, Some(0.02));
        // Regressions never count as an advance.
        assert!(!progress_advanced(&mut last, 0.01));
    }
}
