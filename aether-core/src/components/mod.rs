//! Building blocks that derive higher-level signals from the phase cycle.
//!
//! Watchers observe the transitions produced by the `PhaseCycleEngine` and
//! decide when a derived event should fire.

pub mod watcher;
