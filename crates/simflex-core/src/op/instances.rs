//! Instance bookkeeping operations: list, fetch, delete, reset.

use super::{protocol_failure, Finish, OpContext, Operation, Step};
use crate::event::ClientEvent;
use crate::instance::{parse_instance_list, InstanceId, InstanceSelector};
use crate::protocol::reply::{self, ReplyKind};
use crate::protocol::{Command, Payload};
use tracing::{debug, info};

/// Fetch the server's instance list.
pub struct ListInstances {
    state: ListState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListState {
    Start,
    Waiting,
}

impl ListInstances {
    pub fn new() -> Self {
        ListInstances {
            state: ListState::Start,
        }
    }
}

impl Default for ListInstances {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for ListInstances {
    fn name(&self) -> &'static str {
        "list instances"
    }

    fn begin(&mut self, _ctx: &mut OpContext<'_>) -> Step {
        info!("requesting the list of generated instances");
        self.state = ListState::Waiting;
        Step::Send(Command::ListGeneratedInstances.into_payload())
    }

    fn on_reply(&mut self, ctx: &mut OpContext<'_>, reply: &Payload) -> Step {
        debug_assert_eq!(self.state, ListState::Waiting);
        // The whole body is the result: `\n`-separated `id;label` records,
        // possibly empty. A reply from the server's error path is the only
        // text we refuse to interpret as a list.
        match reply.as_text() {
            Some(body) if !body.starts_with("error") => {
                let records = parse_instance_list(body);
                debug!(count = records.len(), "instance list received");
                ctx.emit(ClientEvent::InstanceList { records });
                Step::Done(Finish::success())
            }
            _ => Step::Done(protocol_failure(ctx, self.name(), "waiting", reply)),
        }
    }
}

/// Fetch one instance document, or load the blank template locally when the
/// unsaved instance is selected.
pub struct GetInstance {
    selector: InstanceSelector,
    state: GetState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GetState {
    Start,
    Waiting,
}

impl GetInstance {
    pub fn new(selector: InstanceSelector) -> Self {
        GetInstance {
            selector,
            state: GetState::Start,
        }
    }

    fn hash(&self) -> String {
        match &self.selector {
            InstanceSelector::New => "new".to_string(),
            InstanceSelector::Saved(id) => id.to_string(),
        }
    }
}

impl Operation for GetInstance {
    fn name(&self) -> &'static str {
        "get instance"
    }

    fn begin(&mut self, ctx: &mut OpContext<'_>) -> Step {
        match &self.selector {
            // The unsaved instance never exists server-side: skip the round
            // trip and let the front-end load its blank template.
            InstanceSelector::New => {
                debug!("loading the blank instance template locally");
                ctx.emit(ClientEvent::BlankInstanceLoaded);
                Step::Done(Finish::success())
            }
            InstanceSelector::Saved(id) => {
                info!(hash = %id, "requesting instance");
                self.state = GetState::Waiting;
                Step::Send(Command::GetInstance(id.clone()).into_payload())
            }
        }
    }

    fn on_reply(&mut self, ctx: &mut OpContext<'_>, reply: &Payload) -> Step {
        debug_assert_eq!(self.state, GetState::Waiting);
        match reply.as_text() {
            Some(text) if reply::classify(text) == ReplyKind::UnknownInstance => {
                info!(hash = %self.hash(), "instance not found");
                ctx.emit(ClientEvent::InstanceNotFound {
                    hash: self.hash(),
                    message: text.to_string(),
                });
                Step::Done(Finish::success())
            }
            // Anything else is the document itself, opaque to the engine.
            Some(text) => {
                ctx.emit(ClientEvent::InstanceFetched {
                    hash: self.hash(),
                    data: text.to_string().into_bytes().into(),
                });
                Step::Done(Finish::success())
            }
            None => {
                let data = reply.as_binary().cloned().unwrap_or_default();
                ctx.emit(ClientEvent::InstanceFetched {
                    hash: self.hash(),
                    data,
                });
                Step::Done(Finish::success())
            }
        }
    }
}

/// Delete a saved instance; on success, re-list and reload the blank
/// template.
pub struct DeleteInstance {
    hash: InstanceId,
    state: DeleteState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeleteState {
    Start,
    Waiting,
}

impl DeleteInstance {
    pub fn new(hash: InstanceId) -> Self {
        DeleteInstance {
            hash,
            state: DeleteState::Start,
        }
    }
}

impl Operation for DeleteInstance {
    fn name(&self) -> &'static str {
        "delete instance"
    }

    fn begin(&mut self, _ctx: &mut OpContext<'_>) -> Step {
        info!(hash = %self.hash, "requesting instance deletion");
        self.state = DeleteState::Waiting;
        Step::Send(Command::DeleteInstance(self.hash.clone()).into_payload())
    }

    fn on_reply(&mut self, ctx: &mut OpContext<'_>, reply: &Payload) -> Step {
        debug_assert_eq!(self.state, DeleteState::Waiting);
        match reply.as_text().map(reply::classify) {
            Some(ReplyKind::Deleted) => {
                info!(hash = %self.hash, "instance deleted");
                ctx.emit(ClientEvent::InstanceDeleted {
                    hash: self.hash.to_string(),
                });
                Step::Done(Finish::success_chaining(vec![
                    Box::new(ListInstances::new()),
                    Box::new(GetInstance::new(InstanceSelector::New)),
                ]))
            }
            _ => Step::Done(protocol_failure(ctx, self.name(), "waiting", reply)),
        }
    }
}

/// Clear an instance's simulation results; on success, re-fetch it.
pub struct ResetInstance {
    hash: InstanceId,
    state: ResetState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResetState {
    Start,
    Waiting,
}

impl ResetInstance {
    pub fn new(hash: InstanceId) -> Self {
        ResetInstance {
            hash,
            state: ResetState::Start,
        }
    }
}

impl Operation for ResetInstance {
    fn name(&self) -> &'static str {
        "reset instance"
    }

    fn begin(&mut self, _ctx: &mut OpContext<'_>) -> Step {
        info!(hash = %self.hash, "requesting instance reset");
        self.state = ResetState::Waiting;
        Step::Send(Command::ResetInstance(self.hash.clone()).into_payload())
    }

    fn on_reply(&mut self, ctx: &mut OpContext<'_>, reply: &Payload) -> Step {
        debug_assert_eq!(self.state, ResetState::Waiting);
        match reply.as_text().map(reply::classify) {
            Some(ReplyKind::Reset) => {
                info!(hash = %self.hash, "instance reset");
                ctx.emit(ClientEvent::InstanceReset {
                    hash: self.hash.to_string(),
                });
                Step::Done(Finish::success_chaining(vec![Box::new(GetInstance::new(
                    InstanceSelector::Saved(self.hash.clone()),
                ))]))
            }
            _ => Step::Done(protocol_failure(ctx, self.name(), "waiting", reply)),
        }
    }
}
