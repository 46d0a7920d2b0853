//! Long-running job operations: instance generation, simulation, and the
//! persistent server status poll.
//!
//! All three share the timed-polling pattern: ask, receive an immediate
//! status, wait out the polling delay, ask again. The connection is never
//! held open with an outstanding reply between rounds. A reply outside the
//! expected set aborts the whole session (hard disconnect), since the
//! server-side exchange state is unknowable from that point on.

use super::{
    progress_advanced, protocol_failure, state_failure, Finish, OpContext, Operation, Step,
};
use crate::event::{ClientEvent, ServerStatus};
use crate::instance::{InstanceId, InstanceSelector};
use crate::op::instances::{GetInstance, ListInstances};
use crate::protocol::reply::{self, ReplyKind};
use crate::protocol::{Command, Payload};
use tracing::{info, warn};

/// Generate a new instance from a parameter document.
///
/// The longest exchange in the catalog: open the generation request, upload
/// the raw document, wait for the reception ack, then poll readiness until
/// the server reports the generated instance id. On success the new id is
/// re-listed and fetched.
pub struct GenerateInstance {
    document: String,
    state: GenState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GenState {
    Start,
    /// Generation request sent, awaiting agreement.
    Requested,
    /// Document uploaded, awaiting the reception ack.
    Uploaded,
    /// Readiness query sent, awaiting a status.
    Generating,
    /// Waiting out the polling delay.
    Parked,
}

impl GenerateInstance {
    pub fn new(document: String) -> Self {
        GenerateInstance {
            document,
            state: GenState::Start,
        }
    }
}

impl Operation for GenerateInstance {
    fn name(&self) -> &'static str {
        "generate instance"
    }

    fn begin(&mut self, ctx: &mut OpContext<'_>) -> Step {
        match self.state {
            GenState::Start => {
                info!("requesting an instance generation");
                self.state = GenState::Requested;
                Step::Send(Command::InstanceGenerationRequest.into_payload())
            }
            GenState::Parked => {
                self.state = GenState::Generating;
                Step::Send(Command::Ready.into_payload())
            }
            _ => Step::Done(state_failure(ctx, self.name(), &format!("{:?}", self.state))),
        }
    }

    fn on_reply(&mut self, ctx: &mut OpContext<'_>, reply: &Payload) -> Step {
        let kind = reply.as_text().map(reply::classify);
        match self.state {
            GenState::Requested => match kind {
                Some(ReplyKind::GenerationAccepted) => {
                    self.state = GenState::Uploaded;
                    Step::Send(Payload::text(self.document.clone()))
                }
                _ => Step::Done(Finish {
                    disconnect: true,
                    ..protocol_failure(ctx, self.name(), "requested", reply)
                }),
            },
            GenState::Uploaded => match kind {
                Some(ReplyKind::InstanceReceived) => {
                    self.state = GenState::Generating;
                    Step::Send(Command::Ready.into_payload())
                }
                _ => Step::Done(Finish {
                    disconnect: true,
                    ..protocol_failure(ctx, self.name(), "uploaded", reply)
                }),
            },
            GenState::Generating => match kind {
                Some(ReplyKind::Running) | Some(ReplyKind::Waiting) => {
                    self.state = GenState::Parked;
                    Step::Poll
                }
                Some(ReplyKind::InstanceGenerated) => {
                    let text = reply.as_text().unwrap_or_default();
                    match reply::generated_hash(text).and_then(|h| InstanceId::new(h).ok()) {
                        Some(id) => {
                            info!(hash = %id, "instance generated");
                            ctx.emit(ClientEvent::InstanceGenerated {
                                hash: id.to_string(),
                            });
                            Step::Done(Finish::success_chaining(vec![
                                Box::new(ListInstances::new()),
                                Box::new(GetInstance::new(InstanceSelector::Saved(id))),
                            ]))
                        }
                        None => Step::Done(Finish {
                            disconnect: true,
                            ..protocol_failure(ctx, self.name(), "generating", reply)
                        }),
                    }
                }
                _ => Step::Done(Finish {
                    disconnect: true,
                    ..protocol_failure(ctx, self.name(), "generating", reply)
                }),
            },
            GenState::Start | GenState::Parked => {
                Step::Done(state_failure(ctx, self.name(), &format!("{:?}", self.state)))
            }
        }
    }
}

/// Drive the simulation of a saved instance.
///
/// Queues the job, then polls readiness until the server reports completion.
/// Supports a detach request (sever locally, keep the job running
/// server-side) and an abort request (`terminate`), both consumed on the
/// next running/waiting status.
pub struct SimulateInstance {
    hash: InstanceId,
    state: SimState,
    last_progress: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimState {
    Start,
    /// A query is outstanding (simulation request, readiness or detach).
    Waiting,
    /// Waiting out the polling delay.
    Parked,
}

impl SimulateInstance {
    pub fn new(hash: InstanceId) -> Self {
        SimulateInstance {
            hash,
            state: SimState::Start,
            last_progress: None,
        }
    }

    /// Shared handling of a running/waiting status: a detach request takes
    /// precedence, then an abort request, otherwise keep polling.
    fn continue_or_sever(&mut self, ctx: &mut OpContext<'_>) -> Step {
        if ctx.take_detach_request() {
            info!(hash = %self.hash, "asking to run disconnected");
            Step::Send(Command::RunDisconnected.into_payload())
        } else if ctx.take_abort_request() {
            info!(hash = %self.hash, "asking to terminate the job");
            self.state = SimState::Parked;
            Step::NotifyAndPoll(Command::Terminate.into_payload())
        } else {
            self.state = SimState::Parked;
            Step::Poll
        }
    }
}

impl Operation for SimulateInstance {
    fn name(&self) -> &'static str {
        "simulate instance"
    }

    fn begin(&mut self, ctx: &mut OpContext<'_>) -> Step {
        match self.state {
            SimState::Start => {
                info!(hash = %self.hash, "requesting the simulation");
                self.state = SimState::Waiting;
                Step::Send(Command::InstanceSimulationRequest(self.hash.clone()).into_payload())
            }
            SimState::Parked => {
                self.state = SimState::Waiting;
                Step::Send(Command::Ready.into_payload())
            }
            SimState::Waiting => {
                Step::Done(state_failure(ctx, self.name(), &format!("{:?}", self.state)))
            }
        }
    }

    fn on_reply(&mut self, ctx: &mut OpContext<'_>, reply: &Payload) -> Step {
        debug_assert_eq!(self.state, SimState::Waiting);
        let Some(text) = reply.as_text() else {
            return Step::Done(Finish {
                disconnect: true,
                ..protocol_failure(ctx, self.name(), "waiting", reply)
            });
        };
        match reply::classify(text) {
            ReplyKind::Running => {
                if let Some(progress) = reply::running_progress(text) {
                    let advanced = progress_advanced(&mut self.last_progress, progress);
                    ctx.emit(ClientEvent::SimulationProgress {
                        hash: self.hash.to_string(),
                        progress,
                        advanced,
                    });
                }
                self.continue_or_sever(ctx)
            }
            ReplyKind::Waiting => self.continue_or_sever(ctx),
            ReplyKind::InstanceSimulated => {
                info!(hash = %self.hash, "instance simulated");
                ctx.emit(ClientEvent::SimulationCompleted {
                    hash: self.hash.to_string(),
                });
                Step::Done(Finish::success_chaining(vec![Box::new(GetInstance::new(
                    InstanceSelector::Saved(self.hash.clone()),
                ))]))
            }
            ReplyKind::RunDisconnected => {
                info!(hash = %self.hash, "run disconnected");
                ctx.emit(ClientEvent::RunDetached {
                    hash: self.hash.to_string(),
                });
                Step::Done(Finish::detached())
            }
            ReplyKind::SimulationError => {
                warn!(hash = %self.hash, message = %text, "simulation failed");
                ctx.emit(ClientEvent::SimulationFailed {
                    hash: self.hash.to_string(),
                    message: text.to_string(),
                });
                Step::Done(Finish::failure_disconnect())
            }
            _ => Step::Done(Finish {
                disconnect: true,
                ..protocol_failure(ctx, self.name(), "waiting", reply)
            }),
        }
    }
}

/// Persistent poll of the server's global computing status.
///
/// Never terminal while the connection lives: every status reply reschedules
/// the next query. Drives the front-end's activity indicator and progression
/// display.
pub struct ServerStatusPoll {
    state: StatusState,
    last_progress: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusState {
    Start,
    Waiting,
    Parked,
}

impl ServerStatusPoll {
    pub fn new() -> Self {
        ServerStatusPoll {
            state: StatusState::Start,
            last_progress: None,
        }
    }
}

impl Default for ServerStatusPoll {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for ServerStatusPoll {
    fn name(&self) -> &'static str {
        "server status"
    }

    fn begin(&mut self, ctx: &mut OpContext<'_>) -> Step {
        match self.state {
            StatusState::Start | StatusState::Parked => {
                self.state = StatusState::Waiting;
                Step::Send(Command::IsComputingSimulation.into_payload())
            }
            StatusState::Waiting => {
                Step::Done(state_failure(ctx, self.name(), &format!("{:?}", self.state)))
            }
        }
    }

    fn on_reply(&mut self, ctx: &mut OpContext<'_>, reply: &Payload) -> Step {
        debug_assert_eq!(self.state, StatusState::Waiting);
        let kind = reply.as_text().map(reply::classify);
        match kind {
            Some(ReplyKind::ComputingStatus) => {
                let text = reply.as_text().unwrap_or_default();
                match reply::computing_progress(text) {
                    Some((progress, queued_jobs)) => {
                        let advanced = progress_advanced(&mut self.last_progress, progress);
                        ctx.emit(ClientEvent::ServerActivity {
                            status: ServerStatus::Computing {
                                progress,
                                queued_jobs,
                                advanced,
                            },
                        });
                        self.state = StatusState::Parked;
                        Step::Poll
                    }
                    None => Step::Done(protocol_failure(ctx, self.name(), "waiting", reply)),
                }
            }
            Some(ReplyKind::WaitingStatus) => {
                ctx.emit(ClientEvent::ServerActivity {
                    status: ServerStatus::Waiting,
                });
                self.state = StatusState::Parked;
                Step::Poll
            }
            _ => Step::Done(protocol_failure(ctx, self.name(), "waiting", reply)),
        }
    }
}
