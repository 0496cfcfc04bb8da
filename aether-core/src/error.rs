//! Error types for the Aether engines.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("phase list is empty")]
    EmptyPhaseList,

    #[error("phase '{phase}' has a zero duration")]
    ZeroDuration { phase: String },

    #[error("tick interval must be greater than zero")]
    ZeroTickInterval,

    #[error("phase '{phase}' is declared more than once")]
    DuplicatePhase { phase: String },

    #[error("mitosis trigger phase '{phase}' is not in the phase list")]
    UnknownMitosisPhase { phase: String },

    #[error("mitosis interval must be at least one cycle")]
    ZeroMitosisInterval,

    #[error("ledger capacity must be greater than zero")]
    ZeroCapacity,

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn zero_duration(phase: impl Into<String>) -> Self {
        Self::ZeroDuration {
            phase: phase.into(),
        }
    }

    pub fn duplicate_phase(phase: impl Into<String>) -> Self {
        Self::DuplicatePhase {
            phase: phase.into(),
        }
    }

    pub fn unknown_mitosis_phase(phase: impl Into<String>) -> Self {
        Self::UnknownMitosisPhase {
            phase: phase.into(),
        }
    }
}
