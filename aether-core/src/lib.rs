//! # Aether
//!
//! The two stateful engines behind the AetherOS console.
//!
//! ## Core Concepts
//!
//! - **PhaseCycleEngine**: a free-running state machine that walks an ordered
//!   list of phases on a fixed tick. Each phase has its own duration, label and
//!   display-only conductance. Entering the trigger phase fires a derived
//!   mitosis signal.
//! - **EventLedger**: an append-only, capacity-bounded log. Every recorded event
//!   gets a permanent 1-based index; old events are evicted first-in first-out
//!   while the index counter keeps counting.
//! - **Event-Driven**: both engines notify registered callbacks synchronously
//!   and also publish `tokio::sync::broadcast` streams for async consumers.
//! - **Configuration-Driven**: phases, tick speed and ledger capacity come from
//!   an `AetherConfig`, usually loaded from a TOML file.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use aether::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AetherConfig::default();
//!     let engine = PhaseCycleEngine::new(config.cycle)?;
//!     let ledger = EventLedger::new(config.ledger)?;
//!
//!     let _subscription = engine.subscribe(|state| {
//!         println!("{} {}% ({})", state.phase, state.progress, state.label);
//!     });
//!
//!     let recorder = ledger.clone();
//!     let mut mitosis = engine.subscribe_mitosis();
//!     tokio::spawn(async move {
//!         while let Ok(event) = mitosis.recv().await {
//!             recorder.record(EventKind::Key, format!("mitosis #{}", event.cycle), DEFAULT_WEIGHT);
//!         }
//!     });
//!
//!     engine.run().await?;
//!     println!("{} events, stride {}", ledger.total_count(), ledger.byte_stride());
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Aether Engine";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod common;
pub mod components;
pub mod config;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod subscription;

pub use error::{Error, Result};

/// A prelude module for easy importing of the most common Aether types.
pub mod prelude {
    pub use crate::common::SubscriberId;
    pub use crate::config::{AetherConfig, CycleConfig, LedgerConfig, MitosisConfig, PhaseConfig};
    pub use crate::engine::PhaseCycleEngine;
    pub use crate::events::{
        CycleState, EventKind, LedgerEvent, MitosisEvent, PhaseTransition, SystemEvent,
    };
    pub use crate::ledger::{EventLedger, DEFAULT_WEIGHT};
    pub use crate::subscription::Subscription;
}
