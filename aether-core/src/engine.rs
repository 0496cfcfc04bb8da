//! The engine that drives the phase cycle on a fixed tick.

use crate::common::{lock, SubscriberId};
use crate::components::watcher::MitosisWatcher;
use crate::config::CycleConfig;
use crate::cycle::PhaseCycle;
use crate::error::Result;
use crate::events::{CycleState, MitosisEvent, PhaseTransition, SystemEvent};
use crate::subscription::{Registry, Subscription};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// State mutated by a tick. Kept under one lock so a snapshot never observes
/// a half-applied step.
struct CycleCore {
    cycle: PhaseCycle,
    mitosis: Option<MitosisWatcher>,
    ticks: u64,
}

/// The phase-cycle engine.
///
/// Construct one per process and hand out clones; every clone is a handle to
/// the same running cycle. The tick loop is the only writer of the cycle state
/// while it runs. Readers get owned `CycleState` snapshots.
#[derive(Clone)]
pub struct PhaseCycleEngine {
    config: Arc<CycleConfig>,
    core: Arc<Mutex<CycleCore>>,
    subscribers: Arc<Registry<CycleState>>,
    state_sender: broadcast::Sender<CycleState>,
    transition_sender: broadcast::Sender<PhaseTransition>,
    mitosis_sender: broadcast::Sender<MitosisEvent>,
    system_event_sender: broadcast::Sender<SystemEvent>,
    shutdown: Arc<Mutex<Option<broadcast::Sender<()>>>>,
}

// Core implementation block for internal logic.
impl PhaseCycleEngine {
    /// Creates a stopped engine positioned at the start of the first phase.
    pub fn new(config: CycleConfig) -> Result<Self> {
        const CHANNEL_CAPACITY: usize = 256;
        let cycle = PhaseCycle::new(&config)?;
        let (state_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (transition_sender, _) = broadcast::channel(64);
        let (mitosis_sender, _) = broadcast::channel(64);
        let (system_event_sender, _) = broadcast::channel(64);

        let core = CycleCore {
            mitosis: MitosisWatcher::new(&config.mitosis),
            cycle,
            ticks: 0,
        };

        Ok(Self {
            config: Arc::new(config),
            core: Arc::new(Mutex::new(core)),
            subscribers: Arc::new(Registry::new(
                "PhaseCycleEngine",
                Some(system_event_sender.clone()),
            )),
            state_sender,
            transition_sender,
            mitosis_sender,
            system_event_sender,
            shutdown: Arc::new(Mutex::new(None)),
        })
    }

    #[doc(hidden)]
    async fn tick_loop(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let period = self.config.tick_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        self.system_event_sender
            .send(SystemEvent::EngineStarted {
                timestamp: Utc::now(),
            })
            .ok();
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }
        let ticks = lock(&self.core).ticks;
        self.system_event_sender
            .send(SystemEvent::EngineStopped { ticks })
            .ok();
        info!("PhaseCycleEngine stopped after {} ticks.", ticks);
    }
}

// Public API implementation block.
impl PhaseCycleEngine {
    /// Starts the tick loop on the current tokio runtime.
    ///
    /// Calling `start` while the loop is already running does nothing and
    /// returns `false`. Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut shutdown = lock(&self.shutdown);
        if shutdown.is_some() {
            warn!("PhaseCycleEngine::start called while already running; ignoring.");
            return false;
        }
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        *shutdown = Some(shutdown_tx);
        drop(shutdown);

        info!(
            "PhaseCycleEngine starting with {} phases at {:?} per tick.",
            self.config.phases.len(),
            self.config.tick_interval()
        );
        let engine = self.clone();
        tokio::spawn(async move { engine.tick_loop(shutdown_rx).await });
        true
    }

    /// Stops the tick loop. Returns `false` if it wasn't running.
    ///
    /// The cycle keeps its position; a later `start` resumes from it.
    pub fn stop(&self) -> bool {
        match lock(&self.shutdown).take() {
            Some(shutdown_tx) => {
                info!("PhaseCycleEngine stop requested.");
                shutdown_tx.send(()).ok();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shutdown).is_some()
    }

    /// Starts the engine and runs until Ctrl+C, then stops it.
    pub async fn run(&self) -> anyhow::Result<()> {
        self.start();
        info!("Engine running. Press Ctrl+C to shut down.");
        tokio::signal::ctrl_c().await?;

        info!("Shutdown signal received.");
        if !self.stop() {
            error!("Engine was no longer running at shutdown.");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    }

    /// Applies exactly one tick and notifies every subscriber.
    ///
    /// The tick loop calls this on every interval; callers with their own
    /// scheduler may drive the engine by calling it directly.
    pub fn tick(&self) -> CycleState {
        let (state, transition) = {
            let mut core = lock(&self.core);
            core.ticks += 1;
            let transition = core.cycle.step();
            if let Some(transition) = &transition {
                if let Some(watcher) = core.mitosis.as_mut() {
                    watcher.process_transition(transition, &self.mitosis_sender);
                }
            }
            (core.cycle.snapshot(), transition)
        };

        trace!(
            "Tick: phase '{}' at {:.2}%.",
            state.phase,
            state.exact_progress
        );
        if let Some(transition) = transition {
            debug!(
                "Phase '{}' -> '{}' (cycle {}).",
                transition.from, transition.to, transition.cycle
            );
            self.transition_sender.send(transition).ok();
        }
        self.subscribers.notify(&state);
        self.state_sender.send(state.clone()).ok();
        state
    }

    /// Returns a snapshot of the current phase and progress.
    pub fn state(&self) -> CycleState {
        lock(&self.core).cycle.snapshot()
    }

    /// Number of ticks applied since construction.
    pub fn ticks(&self) -> u64 {
        lock(&self.core).ticks
    }

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Registers a callback invoked with the post-tick snapshot on every tick.
    pub fn subscribe(
        &self,
        callback: impl Fn(&CycleState) + Send + Sync + 'static,
    ) -> Subscription<CycleState> {
        self.subscribers.insert(Arc::new(callback))
    }

    /// Removes a callback by id. Returns `true` if it was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.subscribers.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Subscribes to the per-tick `CycleState` stream.
    pub fn subscribe_states(&self) -> broadcast::Receiver<CycleState> {
        self.state_sender.subscribe()
    }

    /// Subscribes to the `PhaseTransition` stream.
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<PhaseTransition> {
        self.transition_sender.subscribe()
    }

    /// Subscribes to the `MitosisEvent` stream.
    pub fn subscribe_mitosis(&self) -> broadcast::Receiver<MitosisEvent> {
        self.mitosis_sender.subscribe()
    }

    /// Subscribes to the `SystemEvent` stream.
    pub fn subscribe_system_events(&self) -> broadcast::Receiver<SystemEvent> {
        self.system_event_sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MitosisConfig, PhaseConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn two_phase_engine() -> PhaseCycleEngine {
        PhaseCycleEngine::new(CycleConfig {
            tick_interval_ms: 100,
            phases: vec![
                PhaseConfig::new("P1", 1000, "first", -10),
                PhaseConfig::new("P2", 500, "second", 20),
            ],
            mitosis: MitosisConfig {
                phase: "P2".to_string(),
                ..Default::default()
            },
        })
        .unwrap()
    }

    #[test]
    fn state_before_any_tick_is_the_first_phase() {
        let engine = two_phase_engine();
        let state = engine.state();
        assert_eq!(state.phase, "P1");
        assert_eq!(state.progress, 0);
        assert_eq!(state.label, "first");
        assert_eq!(state.conductance, -10);
        assert!(!engine.is_running());
    }

    #[test]
    fn manual_ticks_notify_subscribers_with_the_same_snapshot() {
        let engine = two_phase_engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = engine.subscribe(move |state| sink.lock().unwrap().push(state.clone()));

        let returned: Vec<_> = (0..3).map(|_| engine.tick()).collect();
        assert_eq!(*seen.lock().unwrap(), returned);
        assert_eq!(returned[2].progress, 30);
        assert_eq!(engine.ticks(), 3);
    }

    #[test]
    fn unsubscribe_by_id_stops_notifications() {
        let engine = two_phase_engine();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let subscription = engine.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        engine.tick();
        assert!(engine.unsubscribe(subscription.id()));
        engine.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(engine.subscriber_count(), 0);
    }

    #[test]
    fn transitions_and_mitosis_are_broadcast() {
        let engine = two_phase_engine();
        let mut transitions = engine.subscribe_transitions();
        let mut mitosis = engine.subscribe_mitosis();

        for _ in 0..10 {
            engine.tick();
        }
        let transition = transitions.try_recv().unwrap();
        assert_eq!((transition.from.as_str(), transition.to.as_str()), ("P1", "P2"));
        assert_eq!(mitosis.try_recv().unwrap().phase, "P2");

        for _ in 0..5 {
            engine.tick();
        }
        assert_eq!(transitions.try_recv().unwrap().to, "P1");
        assert!(mitosis.try_recv().is_err());
    }

    #[test]
    fn panicking_subscriber_does_not_stop_ticking() {
        let engine = two_phase_engine();
        let _bad = engine.subscribe(|_| panic!("subscriber failure"));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _good = engine.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        engine.tick();
        engine.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(engine.state().progress, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_loop_advances_on_the_fixed_interval() {
        let engine = two_phase_engine();
        assert!(engine.start());
        tokio::time::sleep(Duration::from_millis(1250)).await;

        let state = engine.state();
        assert_eq!(state.phase, "P2");
        assert_eq!(state.progress, 40);
        assert_eq!(engine.ticks(), 12);
        engine.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_ignored() {
        let engine = two_phase_engine();
        assert!(engine.start());
        assert!(!engine.start());
        tokio::time::sleep(Duration::from_millis(550)).await;
        assert_eq!(engine.ticks(), 5);
        engine.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_freezes_the_cycle_and_start_resumes_it() {
        let engine = two_phase_engine();
        let mut system = engine.subscribe_system_events();
        engine.start();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(engine.stop());
        assert!(!engine.stop());
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(engine.ticks(), 3);
        assert_eq!(engine.state().progress, 30);

        assert!(matches!(
            system.recv().await.unwrap(),
            SystemEvent::EngineStarted { .. }
        ));
        assert_eq!(
            system.recv().await.unwrap(),
            SystemEvent::EngineStopped { ticks: 3 }
        );

        engine.start();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(engine.ticks(), 5);
        engine.stop();
    }
}
