//! Server reply classification.
//!
//! Replies carry no correlation ids; a handler recognizes them purely by
//! their textual prefix. The mapping lives in one explicit table with an
//! explicit [`ReplyKind::Unrecognized`] fallback so that every operation
//! interprets reply text the same way. Matching assumes the dispatcher's
//! normalization (trimmed, lowercased) has already been applied.

use regex::Regex;
use std::sync::LazyLock;

/// Category of a textual server reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// `ok deleted ...`
    Deleted,
    /// `ok reset ...`
    Reset,
    /// `ok instance generation request ...`
    GenerationAccepted,
    /// `ok instance received ...`
    InstanceReceived,
    /// `ok instance generated "<id>"`
    InstanceGenerated,
    /// `ok instance simulated ...`
    InstanceSimulated,
    /// `ok running ...` — the job is executing; may carry a progression.
    Running,
    /// `ok waiting ...` — the job is queued behind others.
    Waiting,
    /// `ok run disconnected ...`
    RunDisconnected,
    /// `error unknown instance ...`
    UnknownInstance,
    /// `error instance simulation ...` — the job itself failed or was aborted.
    SimulationError,
    /// `is computing simulation with progression <f> and <n> jobs`
    ComputingStatus,
    /// `is waiting for simulation ...`
    WaitingStatus,
    /// Anything else: a protocol violation for whoever receives it.
    Unrecognized,
}

/// Prefix table, checked in order. More specific prefixes come before the
/// families they would otherwise shadow.
const REPLY_PREFIXES: &[(&str, ReplyKind)] = &[
    ("ok deleted", ReplyKind::Deleted),
    ("ok reset", ReplyKind::Reset),
    ("ok instance generation request", ReplyKind::GenerationAccepted),
    ("ok instance received", ReplyKind::InstanceReceived),
    ("ok instance generated", ReplyKind::InstanceGenerated),
    ("ok instance simulated", ReplyKind::InstanceSimulated),
    ("ok run disconnected", ReplyKind::RunDisconnected),
    ("ok running", ReplyKind::Running),
    ("ok waiting", ReplyKind::Waiting),
    ("error unknown instance", ReplyKind::UnknownInstance),
    ("error instance simulation", ReplyKind::SimulationError),
    ("is computing simulation", ReplyKind::ComputingStatus),
    ("is waiting for simulation", ReplyKind::WaitingStatus),
];

/// Classify a normalized textual reply.
pub fn classify(text: &str) -> ReplyKind {
    for (prefix, kind) in REPLY_PREFIXES {
        if text.starts_with(prefix) {
            return *kind;
        }
    }
    ReplyKind::Unrecognized
}

static GENERATED_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(\w{8})""#).unwrap());

static COMPUTING_PROGRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"is computing simulation with progression ([0-9.]+) and ([0-9]+) jobs").unwrap()
});

static RUNNING_PROGRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ok running\s+([0-9]+(?:\.[0-9]+)?)(?:\s|$)").unwrap());

/// Extract the 8-character artifact id from an `ok instance generated` reply.
pub fn generated_hash(text: &str) -> Option<String> {
    GENERATED_HASH
        .captures(text)
        .map(|captures| captures[1].to_string())
}

/// Extract the progression fraction and queued job count from an
/// `is computing simulation ...` status reply.
pub fn computing_progress(text: &str) -> Option<(f64, u64)> {
    let captures = COMPUTING_PROGRESS.captures(text)?;
    let progress = captures[1].parse().ok()?;
    let jobs = captures[2].parse().ok()?;
    Some((progress, jobs))
}

/// Extract the optional progression payload from an `ok running` reply.
///
/// Simulation status replies append the job's progression; generation status
/// replies append a quoted id instead, which yields `None` here.
pub fn running_progress(text: &str) -> Option<f64> {
    RUNNING_PROGRESS
        .captures(text)
        .and_then(|captures| captures[1].parse().ok())
}
