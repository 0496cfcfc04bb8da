//! The synchronous phase state machine driven by the engine's tick loop.
//!
//! Each tick adds `100 / (duration_ms / tick_interval_ms)` to the progress of
//! the current phase. Once progress reaches 100 it resets to zero and the
//! cycle moves on to the next phase, wrapping from the last back to the first.
//! Progress is accumulated, not derived from wall-clock time, so a phase whose
//! duration isn't a multiple of the tick interval carries a small rounding
//! drift from one traversal to the next.

use crate::config::{CycleConfig, PhaseConfig};
use crate::error::Result;
use crate::events::{CycleState, PhaseTransition};

const FULL: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct PhaseCycle {
    phases: Vec<PhaseConfig>,
    tick_interval_ms: u64,
    current: usize,
    progress: f64,
    cycle: u64,
}

impl PhaseCycle {
    /// Builds a cycle positioned at the start of the first phase.
    pub fn new(config: &CycleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            phases: config.phases.clone(),
            tick_interval_ms: config.tick_interval_ms,
            current: 0,
            progress: 0.0,
            cycle: 0,
        })
    }

    pub fn current_phase(&self) -> &PhaseConfig {
        &self.phases[self.current]
    }

    /// Progress added by one tick in the current phase.
    pub fn increment(&self) -> f64 {
        let phase = self.current_phase();
        FULL / (phase.duration_ms as f64 / self.tick_interval_ms as f64)
    }

    /// Applies one tick. Returns the transition if the phase advanced.
    pub fn step(&mut self) -> Option<PhaseTransition> {
        self.progress += self.increment();
        if self.progress < FULL {
            return None;
        }

        let from = self.current;
        self.progress = 0.0;
        self.current = (self.current + 1) % self.phases.len();
        let cycle_completed = self.current == 0;
        if cycle_completed {
            self.cycle += 1;
        }
        Some(PhaseTransition {
            from: self.phases[from].name.clone(),
            to: self.phases[self.current].name.clone(),
            to_index: self.current,
            cycle_completed,
            cycle: self.cycle,
        })
    }

    pub fn snapshot(&self) -> CycleState {
        let phase = self.current_phase();
        CycleState {
            phase: phase.name.clone(),
            phase_index: self.current,
            progress: self.progress.floor() as u32,
            exact_progress: self.progress,
            label: phase.label.clone(),
            conductance: phase.conductance,
            cycle: self.cycle,
        }
    }
}
