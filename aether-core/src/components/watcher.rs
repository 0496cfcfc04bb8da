//! Defines watchers that react to phase transitions to produce derived events.

use crate::config::MitosisConfig;
use crate::events::{MitosisEvent, PhaseTransition};
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;

/// Watches phase transitions and fires a `MitosisEvent` on entry into the
/// trigger phase whenever the completed cycle count is a multiple of `every`.
#[doc(hidden)]
pub(crate) struct MitosisWatcher {
    phase: String,
    every: u32,
}

impl MitosisWatcher {
    /// Creates a watcher, or `None` when mitosis is disabled.
    pub(crate) fn new(config: &MitosisConfig) -> Option<Self> {
        config.enabled.then(|| Self {
            phase: config.phase.clone(),
            every: config.every.max(1),
        })
    }

    /// Processes a transition and broadcasts a `MitosisEvent` if it is due.
    /// Returns `true` if the event fired.
    pub(crate) fn process_transition(
        &mut self,
        transition: &PhaseTransition,
        mitosis_sender: &broadcast::Sender<MitosisEvent>,
    ) -> bool {
        if transition.to != self.phase {
            return false;
        }
        if transition.cycle % u64::from(self.every) != 0 {
            return false;
        }
        debug!(
            "Mitosis triggered on entry into '{}' (cycle {}).",
            self.phase, transition.cycle
        );
        mitosis_sender
            .send(MitosisEvent {
                cycle: transition.cycle,
                phase: self.phase.clone(),
                timestamp: Utc::now(),
            })
            .ok();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entering(to: &str, cycle: u64) -> PhaseTransition {
        PhaseTransition {
            from: "prev".to_string(),
            to: to.to_string(),
            to_index: 0,
            cycle_completed: false,
            cycle,
        }
    }

    #[test]
    fn disabled_config_builds_no_watcher() {
        let config = MitosisConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(MitosisWatcher::new(&config).is_none());
    }

    #[test]
    fn fires_only_on_entry_into_the_trigger_phase() {
        let (tx, mut rx) = broadcast::channel(8);
        let mut watcher = MitosisWatcher::new(&MitosisConfig::default()).unwrap();

        assert!(!watcher.process_transition(&entering("S", 0), &tx));
        assert!(watcher.process_transition(&entering("M", 0), &tx));
        assert!(!watcher.process_transition(&entering("G1", 1), &tx));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.phase, "M");
        assert_eq!(event.cycle, 0);
        assert!(rx.try_recv().is_err());
    }

    fn fired_cycles(every: u32, cycles: std::ops::Range<u64>) -> Vec<u64> {
        let (tx, mut rx) = broadcast::channel(16);
        let config = MitosisConfig {
            every,
            ..Default::default()
        };
        let mut watcher = MitosisWatcher::new(&config).unwrap();
        for cycle in cycles {
            watcher.process_transition(&entering("G2", cycle), &tx);
            watcher.process_transition(&entering("M", cycle), &tx);
        }
        let mut fired = Vec::new();
        while let Ok(event) = rx.try_recv() {
            fired.push(event.cycle);
        }
        fired
    }

    #[test]
    fn fires_on_cycles_that_are_multiples_of_every() {
        assert_eq!(fired_cycles(1, 0..4), [0, 1, 2, 3]);
        assert_eq!(fired_cycles(2, 0..6), [0, 2, 4]);
        assert_eq!(fired_cycles(3, 0..7), [0, 3, 6]);
    }
}
