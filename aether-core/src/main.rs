use aether::prelude::*;
use anyhow::Result;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // 2. Load configuration: defaults, optional TOML file, AETHER_* overrides.
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = AetherConfig::load(config_path.as_deref())?;

    // 3. Create one instance of each engine for the lifetime of the process.
    let engine = PhaseCycleEngine::new(config.cycle)?;
    let ledger = EventLedger::new(config.ledger)?;

    // 4. Spawn concurrent tasks to listen to the event streams.
    spawn_event_listeners(&engine, &ledger);

    // 5. Run the engine until Ctrl+C.
    engine.run().await?;

    let state = engine.state();
    info!(
        "Final state: phase '{}' at {}% after {} cycles.",
        state.phase, state.progress, state.cycle
    );
    info!(
        "Ledger: {} events recorded, {} retained, byte stride {}.",
        ledger.total_count(),
        ledger.retained_count(),
        ledger.byte_stride()
    );
    Ok(())
}

/// Logs engine events and mirrors transitions and mitosis into the ledger.
fn spawn_event_listeners(engine: &PhaseCycleEngine, ledger: &EventLedger) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            info!("[SYSTEM] => {:?}", event);
        }
    });

    let mut transition_rx = engine.subscribe_transitions();
    let recorder = ledger.clone();
    tokio::spawn(async move {
        while let Ok(transition) = transition_rx.recv().await {
            info!("[PHASE] => {} -> {}", transition.from, transition.to);
            recorder.record(
                EventKind::Other,
                format!("{} -> {}", transition.from, transition.to),
                DEFAULT_WEIGHT,
            );
        }
    });

    let mut mitosis_rx = engine.subscribe_mitosis();
    let recorder = ledger.clone();
    tokio::spawn(async move {
        while let Ok(event) = mitosis_rx.recv().await {
            info!("[MITOSIS] => cycle {} entered '{}'", event.cycle, event.phase);
            recorder.record_key(format!("mitosis #{}", event.cycle));
        }
    });

    let mut ledger_rx = ledger.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = ledger_rx.recv().await {
            info!(
                "[LEDGER] => #{} [{}] {}",
                event.index, event.kind, event.label
            );
        }
    });
}
