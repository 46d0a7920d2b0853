//! Console command parsing.

use simflex_core::{InstanceId, InstanceSelector};
use std::path::PathBuf;

/// Usage text for the `help` command.
pub const HELP: &str = "\
commands:
  list                     list the generated instances
  load <id|new>            fetch an instance (or load the blank template)
  generate <file>          generate an instance from a parameter document
  simulate <id>            queue and follow the simulation of an instance
  detach                   detach from the running simulation, keep it running
  abort                    abort the running simulation
  delete <id>              delete an instance
  reset <id>               clear an instance's results
  daily <id> <day>         fetch the result archive for one day
  global <id>              fetch the global results document
  disconnect               abandon all work and close the connection
  help                     show this help
  quit                     exit";

/// A command typed at the console prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Load(InstanceSelector),
    Generate(PathBuf),
    Simulate(InstanceId),
    Detach,
    Abort,
    Delete(InstanceId),
    Reset(InstanceId),
    Daily(InstanceId, u32),
    Global(InstanceId),
    Disconnect,
    Help,
    Quit,
}

/// Parse one input line. Returns `None` for blank lines.
pub fn parse(line: &str) -> Option<Result<ConsoleCommand, String>> {
    let mut parts = line.split_whitespace();
    let verb = parts.next()?;
    let result = match verb {
        "list" => Ok(ConsoleCommand::List),
        "load" => selector_arg(parts.next()).map(ConsoleCommand::Load),
        "generate" | "gen" => match parts.next() {
            Some(path) => Ok(ConsoleCommand::Generate(PathBuf::from(path))),
            None => Err("usage: generate <file>".to_string()),
        },
        "simulate" | "sim" => id_arg(parts.next()).map(ConsoleCommand::Simulate),
        "detach" => Ok(ConsoleCommand::Detach),
        "abort" => Ok(ConsoleCommand::Abort),
        "delete" => id_arg(parts.next()).map(ConsoleCommand::Delete),
        "reset" => id_arg(parts.next()).map(ConsoleCommand::Reset),
        "daily" => match (id_arg(parts.next()), parts.next()) {
            (Ok(id), Some(day)) => match day.parse() {
                Ok(day) => Ok(ConsoleCommand::Daily(id, day)),
                Err(_) => Err(format!("invalid day \"{day}\"")),
            },
            (Err(message), _) => Err(message),
            (_, None) => Err("usage: daily <id> <day>".to_string()),
        },
        "global" => id_arg(parts.next()).map(ConsoleCommand::Global),
        "disconnect" => Ok(ConsoleCommand::Disconnect),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        other => Err(format!("unknown command \"{other}\" (try \"help\")")),
    };
    let result = match result {
        Ok(command) => match parts.next() {
            None => Ok(command),
            Some(extra) => Err(format!("unexpected argument \"{extra}\"")),
        },
        err => err,
    };
    Some(result)
}

fn id_arg(arg: Option<&str>) -> Result<InstanceId, String> {
    let value = arg.ok_or_else(|| "an instance id is required".to_string())?;
    InstanceId::new(value).map_err(|error| error.to_string())
}

fn selector_arg(arg: Option<&str>) -> Result<InstanceSelector, String> {
    let value = arg.ok_or_else(|| "an instance id (or \"new\") is required".to_string())?;
    InstanceSelector::parse(value).map_err(|error| error.to_string())
}
