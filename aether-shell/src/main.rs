mod commands;

use aether::prelude::*;
use aether::{ENGINE_NAME, VERSION as LIB_VERSION};
use anyhow::Result;
use colored::Colorize;
use commands::Command;
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct CommandHighlighter;

impl Highlighter for CommandHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            Cow::Owned(format!("{} {}", command.yellow().bold(), rest.yellow()))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    let rule = "-".repeat(72);
    println!("{}", "AetherOS // phase console".cyan().bold());
    println!("{}", rule.dimmed());
    println!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!(
        "{}",
        "    Distributed under the MIT OR Apache-2.0 license.".dimmed()
    );
    println!("{}", rule.dimmed());
}

/// Spawns tasks that print engine events; transitions only while watching.
fn spawn_event_listeners(engine: &PhaseCycleEngine, is_watching: Arc<AtomicBool>) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            if let SystemEvent::EngineStarted { .. } | SystemEvent::EngineStopped { .. } = event {
                println!("\n<-- [SYSTEM EVENT] {:?}", event);
            }
        }
    });

    let mut transition_rx = engine.subscribe_transitions();
    tokio::spawn(async move {
        while let Ok(transition) = transition_rx.recv().await {
            if is_watching.load(Ordering::Relaxed) {
                println!(
                    "<-- [PHASE] {} -> {} (cycle {})",
                    transition.from, transition.to, transition.cycle
                );
            }
        }
    });

    let mut mitosis_rx = engine.subscribe_mitosis();
    tokio::spawn(async move {
        while let Ok(event) = mitosis_rx.recv().await {
            println!(
                "<-- [{}] cycle {} entered '{}'",
                "MITOSIS".magenta().bold(),
                event.cycle,
                event.phase
            );
        }
    });
}

fn print_state(state: &CycleState) {
    println!(
        "--> {} [{}] {:>3}%  conductance {:+}  cycle {}",
        state.phase.cyan().bold(),
        state.label,
        state.progress,
        state.conductance,
        state.cycle
    );
}

fn print_event(event: &LedgerEvent) {
    println!(
        "  #{:<6} {:<5} {:<24} w={:<8} {}",
        event.index,
        event.kind,
        event.label,
        event.weight,
        event.timestamp.format("%H:%M:%S%.3f").to_string().dimmed()
    );
}

/// Executes one command. Returns `false` when the shell should exit.
fn execute(
    command: Command,
    engine: &PhaseCycleEngine,
    ledger: &EventLedger,
    is_watching: &AtomicBool,
) -> bool {
    match command {
        Command::State => print_state(&engine.state()),
        Command::Watch(on) => {
            is_watching.store(on, Ordering::Relaxed);
            if on {
                println!("--> Watching phase transitions.");
            } else {
                println!("--> Stopped watching phase transitions.");
            }
        }
        Command::Record {
            kind,
            label,
            weight,
        } => {
            let event = ledger.record(kind, label, weight);
            print!("--> Recorded");
            print_event(&event);
        }
        Command::History(n) => {
            let history = ledger.history();
            println!(
                "Ledger ({} retained of {} recorded, capacity {}):",
                history.len(),
                ledger.total_count(),
                ledger.capacity()
            );
            for event in history.iter().take(n) {
                print_event(event);
            }
        }
        Command::Count => println!("--> {} events recorded.", ledger.total_count()),
        Command::Stride => println!("--> Byte stride: {}", ledger.byte_stride()),
        Command::Phases => {
            let current = engine.state().phase_index;
            for (index, phase) in engine.config().phases.iter().enumerate() {
                let marker = if index == current { "*" } else { " " };
                println!(
                    " {} {:<4} {:>6} ms  {:+4}  {}",
                    marker, phase.name, phase.duration_ms, phase.conductance, phase.label
                );
            }
        }
        Command::Start => {
            if engine.start() {
                println!("--> Tick loop started.");
            } else {
                println!("--> Tick loop is already running.");
            }
        }
        Command::Stop => {
            if engine.stop() {
                println!("--> Tick loop stopped.");
            } else {
                println!("--> Tick loop is not running.");
            }
        }
        Command::Help => println!("{}", commands::HELP),
        Command::Exit => return false,
        Command::Empty => {}
    }
    true
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let config_path = env::args_os().nth(1).map(PathBuf::from);
    let config = AetherConfig::load(config_path.as_deref())?;
    let engine = PhaseCycleEngine::new(config.cycle)?;
    let ledger = EventLedger::new(config.ledger)?;

    let is_watching = Arc::new(AtomicBool::new(false));
    spawn_event_listeners(&engine, is_watching.clone());

    info!("Starting {}...", ENGINE_NAME);
    engine.start();

    let mut rl = Editor::new()?;
    rl.set_helper(Some(CommandHighlighter));

    println!(
        "{} is running. Type 'help' for commands or 'exit' to quit.",
        ENGINE_NAME.cyan()
    );

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        match rl.readline(&prompt) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                match commands::parse(&line) {
                    Ok(command) => {
                        if !execute(command, &engine, &ledger, &is_watching) {
                            break;
                        }
                    }
                    Err(message) => println!("{}", message),
                }
            }
            Err(_) => {
                println!("Exiting aether-shell...");
                break;
            }
        }
    }

    engine.stop();
    Ok(())
}
