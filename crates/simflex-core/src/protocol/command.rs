//! Client-to-server command grammar.
//!
//! Every command is a single newline-free textual line. `Display` renders the
//! exact wire form; [`Command::into_payload`] is what operations hand to the
//! session for transmission. Raw instance documents are not commands — they
//! are sent as plain payloads during the generation exchange.

use crate::instance::InstanceId;
use crate::protocol::Payload;
use std::fmt;

/// A protocol command addressed to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ask for the list of generated instances.
    ListGeneratedInstances,
    /// Fetch the parameter document of a saved instance.
    GetInstance(InstanceId),
    /// Delete a saved instance and all of its results.
    DeleteInstance(InstanceId),
    /// Clear the simulation results of a saved instance.
    ResetInstance(InstanceId),
    /// Open an instance generation exchange (the raw document follows).
    InstanceGenerationRequest,
    /// Ask whether the current job has finished.
    Ready,
    /// Detach from a running job, leaving it running server-side.
    RunDisconnected,
    /// Abort the current job.
    Terminate,
    /// Queue a simulation of a saved instance.
    InstanceSimulationRequest(InstanceId),
    /// Query the server's global computing status.
    IsComputingSimulation,
    /// Fetch the result archive for one day of a simulated instance.
    GetDailyResult(InstanceId, u32),
    /// Fetch the aggregated results document of a simulated instance.
    GetGlobalResults(InstanceId),
}

impl Command {
    /// Render this command as a wire payload.
    pub fn into_payload(self) -> Payload {
        Payload::Text(self.to_string())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::ListGeneratedInstances => write!(f, "list generated instances"),
            Command::GetInstance(hash) => write!(f, "get instance \"{hash}\""),
            Command::DeleteInstance(hash) => write!(f, "delete instance \"{hash}\""),
            Command::ResetInstance(hash) => write!(f, "reset instance \"{hash}\""),
            Command::InstanceGenerationRequest => write!(f, "instance generation request"),
            Command::Ready => write!(f, "ready?"),
            Command::RunDisconnected => write!(f, "run disconnected"),
            Command::Terminate => write!(f, "terminate"),
            Command::InstanceSimulationRequest(hash) => {
                write!(f, "instance simulation request \"{hash}\"")
            }
            Command::IsComputingSimulation => write!(f, "is computing simulation?"),
            Command::GetDailyResult(hash, day) => {
                write!(f, "get daily result \"{hash}\" \"{day}\"")
            }
            Command::GetGlobalResults(hash) => write!(f, "get global results \"{hash}\""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> InstanceId {
        InstanceId::new(value).unwrap()
    }

    #[test]
    fn test_wire_forms() {
        let cases = [
            (Command::ListGeneratedInstances, "list generated instances"),
            (Command::GetInstance(id("ab12cd34")), "get instance \"ab12cd34\""),
            (
                Command::DeleteInstance(id("ab12cd34")),
                "delete instance \"ab12cd34\"",
            ),
            (
                Command::ResetInstance(id("ab12cd34")),
                "reset instance \"ab12cd34\"",
            ),
            (
                Command::InstanceGenerationRequest,
                "instance generation request",
            ),
            (Command::Ready, "ready?"),
            (Command::RunDisconnected, "run disconnected"),
            (Command::Terminate, "terminate"),
            (
                Command::InstanceSimulationRequest(id("ab12cd34")),
                "instance simulation request \"ab12cd34\"",
            ),
            (Command::IsComputingSimulation, "is computing simulation?"),
            (
                Command::GetDailyResult(id("ab12cd34"), 17),
                "get daily result \"ab12cd34\" \"17\"",
            ),
            (
                Command::GetGlobalResults(id("ab12cd34")),
                "get global results \"ab12cd34\"",
            ),
        ];
        for (command, expected) in cases {
            assert_eq!(command.to_string(), expected);
        }
    }

    #[test]
    fn test_commands_are_single_line() {
        let command = Command::GetDailyResult(id("ab12cd34"), 3);
        assert!(!command.to_string().contains('\n'));
    }

    #[test]
    fn test_into_payload_is_text() {
        let payload = Command::Ready.into_payload();
        assert_eq!(payload, Payload::text("ready?"));
    }
}
