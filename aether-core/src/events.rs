//! Defines all public event and snapshot types emitted by the Aether engines.
//!
//! Listeners either register a callback with `subscribe` or take a broadcast
//! receiver for one of these strongly-typed streams.

use crate::common::SubscriberId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A snapshot of the phase cycle, taken after a tick has been applied.
///
/// Snapshots are owned copies; holding one never pins or affects the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleState {
    /// Name of the current phase.
    pub phase: String,
    /// Position of the current phase in the configured order.
    pub phase_index: usize,
    /// Completion of the current traversal, floored. Always in `0..=99`.
    pub progress: u32,
    /// The un-floored progress accumulator, in `[0, 100)`.
    pub exact_progress: f64,
    pub label: String,
    pub conductance: i32,
    /// Number of full cycles completed so far.
    pub cycle: u64,
}

/// Fired when the cycle leaves one phase and enters the next.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseTransition {
    pub from: String,
    pub to: String,
    /// Index of the phase being entered.
    pub to_index: usize,
    /// `true` when the transition wrapped from the last phase to the first.
    pub cycle_completed: bool,
    /// Completed cycle count after this transition.
    pub cycle: u64,
}

/// The derived "mitosis" signal, fired on entry into the trigger phase.
#[derive(Debug, Clone, PartialEq)]
pub struct MitosisEvent {
    pub cycle: u64,
    pub phase: String,
    pub timestamp: DateTime<Utc>,
}

/// Events related to the lifecycle of the engines themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum SystemEvent {
    /// Fired when the tick loop begins.
    EngineStarted { timestamp: DateTime<Utc> },
    /// Fired when the tick loop exits.
    EngineStopped { ticks: u64 },
    SubscriberAdded { id: SubscriberId },
    SubscriberRemoved { id: SubscriberId },
}

/// The closed set of ledger event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Key,
    Other,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Key => "KEY",
            EventKind::Other => "OTHER",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Error returned when a string names no `EventKind`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind '{0}', expected KEY or OTHER")]
pub struct ParseEventKindError(pub String);

impl FromStr for EventKind {
    type Err = ParseEventKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("key") {
            Ok(EventKind::Key)
        } else if s.eq_ignore_ascii_case("other") {
            Ok(EventKind::Other)
        } else {
            Err(ParseEventKindError(s.to_string()))
        }
    }
}

/// One immutable entry in the `EventLedger`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEvent {
    pub id: Uuid,
    /// 1-based global sequence number. Never reused, even after eviction.
    pub index: u64,
    pub kind: EventKind,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    /// Non-negative cost metric aggregated by `byte_stride`.
    pub weight: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_parses_case_insensitively() {
        assert_eq!("KEY".parse::<EventKind>(), Ok(EventKind::Key));
        assert_eq!("other".parse::<EventKind>(), Ok(EventKind::Other));
        assert_eq!(
            "move".parse::<EventKind>(),
            Err(ParseEventKindError("move".to_string()))
        );
    }

    #[test]
    fn event_kind_displays_its_tag() {
        assert_eq!(EventKind::Key.to_string(), "KEY");
        assert_eq!(format!("{:<6}|", EventKind::Other), "OTHER |");
    }
}
