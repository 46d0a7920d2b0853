//! Result retrieval operations.
//!
//! Result payloads are opaque to the engine: the daily archive and the
//! global results document are handed to the presentation layer as raw
//! bytes. A textual reply in their place is a protocol violation.

use super::{protocol_failure, Finish, OpContext, Operation, Step};
use crate::event::ClientEvent;
use crate::instance::InstanceId;
use crate::protocol::{Command, Payload};
use tracing::info;

/// Fetch the result archive for one simulated day.
pub struct GetDailyResult {
    hash: InstanceId,
    day: u32,
    state: FetchState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchState {
    Start,
    Waiting,
}

impl GetDailyResult {
    pub fn new(hash: InstanceId, day: u32) -> Self {
        GetDailyResult {
            hash,
            day,
            state: FetchState::Start,
        }
    }
}

impl Operation for GetDailyResult {
    fn name(&self) -> &'static str {
        "get daily result"
    }

    fn begin(&mut self, _ctx: &mut OpContext<'_>) -> Step {
        info!(hash = %self.hash, day = self.day, "requesting daily result");
        self.state = FetchState::Waiting;
        Step::Send(Command::GetDailyResult(self.hash.clone(), self.day).into_payload())
    }

    fn on_reply(&mut self, ctx: &mut OpContext<'_>, reply: &Payload) -> Step {
        debug_assert_eq!(self.state, FetchState::Waiting);
        match reply.as_binary() {
            Some(data) => {
                info!(hash = %self.hash, day = self.day, "daily result obtained");
                ctx.emit(ClientEvent::DailyResult {
                    hash: self.hash.to_string(),
                    day: self.day,
                    data: data.clone(),
                });
                Step::Done(Finish::success())
            }
            None => Step::Done(protocol_failure(ctx, self.name(), "waiting", reply)),
        }
    }
}

/// Fetch the aggregated results document of a simulated instance.
pub struct GetGlobalResults {
    hash: InstanceId,
    state: FetchState,
}

impl GetGlobalResults {
    pub fn new(hash: InstanceId) -> Self {
        GetGlobalResults {
            hash,
            state: FetchState::Start,
        }
    }
}

impl Operation for GetGlobalResults {
    fn name(&self) -> &'static str {
        "get global results"
    }

    fn begin(&mut self, _ctx: &mut OpContext<'_>) -> Step {
        info!(hash = %self.hash, "requesting global results");
        self.state = FetchState::Waiting;
        Step::Send(Command::GetGlobalResults(self.hash.clone()).into_payload())
    }

    fn on_reply(&mut self, ctx: &mut OpContext<'_>, reply: &Payload) -> Step {
        debug_assert_eq!(self.state, FetchState::Waiting);
        match reply.as_binary() {
            Some(data) => {
                info!(hash = %self.hash, "global results obtained");
                ctx.emit(ClientEvent::GlobalResults {
                    hash: self.hash.to_string(),
                    data: data.clone(),
                });
                Step::Done(Finish::success())
            }
            None => Step::Done(protocol_failure(ctx, self.name(), "waiting", reply)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Harness {
        events: Vec<ClientEvent>,
        detach: bool,
        abort: bool,
    }

    impl Harness {
        fn new() -> Self {
            Harness {
                events: Vec::new(),
                detach: false,
                abort: false,
            }
        }

        fn ctx(&mut self) -> OpContext<'_> {
            OpContext::new(&mut self.events, &mut self.detach, &mut self.abort)
        }
    }

    #[test]
    fn test_daily_result_command_and_payload() {
        let mut harness = Harness::new();
        let mut op = GetDailyResult::new(InstanceId::new("ab12cd34").unwrap(), 5);
        let step = op.begin(&mut harness.ctx());
        match step {
            Step::Send(payload) => {
                assert_eq!(payload, Payload::text("get daily result \"ab12cd34\" \"5\""));
            }
            other => panic!("expected Send, got {other:?}"),
        }

        let step = op.on_reply(&mut harness.ctx(), &Payload::binary(vec![0x50, 0x4b]));
        assert!(matches!(step, Step::Done(finish) if !finish.failed));
        match &harness.events[..] {
            [ClientEvent::DailyResult { hash, day, data }] => {
                assert_eq!(hash, "ab12cd34");
                assert_eq!(*day, 5);
                assert_eq!(data.as_ref(), [0x50u8, 0x4b].as_slice());
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_daily_result_text_reply_is_violation() {
        let mut harness = Harness::new();
        let mut op = GetDailyResult::new(InstanceId::new("ab12cd34").unwrap(), 5);
        op.begin(&mut harness.ctx());
        let step = op.on_reply(&mut harness.ctx(), &Payload::text("error whatever"));
        assert!(matches!(step, Step::Done(finish) if finish.failed && !finish.disconnect));
    }

    #[test]
    fn test_global_results_fetch() {
        let mut harness = Harness::new();
        let mut op = GetGlobalResults::new(InstanceId::new("ab12cd34").unwrap());
        let step = op.begin(&mut harness.ctx());
        match step {
            Step::Send(payload) => {
                assert_eq!(payload, Payload::text("get global results \"ab12cd34\""));
            }
            other => panic!("expected Send, got {other:?}"),
        }

        let step = op.on_reply(&mut harness.ctx(), &Payload::binary(vec![b'<', b'x']));
        assert!(matches!(step, Step::Done(finish) if !finish.failed));
        assert!(matches!(
            &harness.events[..],
            [ClientEvent::GlobalResults { .. }]
        ));
    }
}
