//! Defines all configuration structures for the Aether engines.
//!
//! These structs are deserialized with `serde` through the `config` crate, so
//! the phase sequence, tick speed and ledger retention can be defined in a
//! TOML file or overridden from the environment. Every field has a default;
//! an empty source yields the reference cell cycle.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `AETHER_LEDGER__CAPACITY=50`.
pub const ENV_PREFIX: &str = "AETHER";

/// The top-level configuration for both engines.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AetherConfig {
    pub cycle: CycleConfig,
    pub ledger: LedgerConfig,
}

/// Configuration for the `PhaseCycleEngine`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Fixed interval between ticks, regardless of phase duration.
    pub tick_interval_ms: u64,

    /// Defines the sequence of phases. The engine walks this vector in order
    /// and wraps from the last entry back to the first.
    pub phases: Vec<PhaseConfig>,

    pub mitosis: MitosisConfig,
}

/// Defines a single phase in the engine's cycle.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PhaseConfig {
    /// Identifier reported as `CycleState::phase`.
    pub name: String,
    /// How long one traversal of the phase takes.
    pub duration_ms: u64,
    /// A human-readable label for display and logging.
    #[serde(default)]
    pub label: String,
    /// Display-only energy reading associated with the phase.
    #[serde(default)]
    pub conductance: i32,
}

/// Controls when the derived mitosis signal fires.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MitosisConfig {
    pub enabled: bool,
    /// Name of the phase whose entry triggers mitosis.
    pub phase: String,
    /// Fire on entry into `phase` only when the completed cycle count is a
    /// multiple of `every`.
    pub every: u32,
}

/// Configuration for the `EventLedger`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Maximum number of events retained before FIFO eviction.
    pub capacity: usize,
}

impl PhaseConfig {
    pub fn new(
        name: impl Into<String>,
        duration_ms: u64,
        label: impl Into<String>,
        conductance: i32,
    ) -> Self {
        Self {
            name: name.into(),
            duration_ms,
            label: label.into(),
            conductance,
        }
    }
}

impl AetherConfig {
    /// Loads the configuration: defaults, then the optional TOML file at
    /// `path`, then `AETHER_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        let loaded: AetherConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Parses a TOML document without touching the filesystem or environment.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let parsed: AetherConfig = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        self.cycle.validate()?;
        self.ledger.validate()
    }
}

impl CycleConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(Error::ZeroTickInterval);
        }
        if self.phases.is_empty() {
            return Err(Error::EmptyPhaseList);
        }
        let mut seen = HashSet::new();
        for phase in &self.phases {
            if phase.duration_ms == 0 {
                return Err(Error::zero_duration(&phase.name));
            }
            if !seen.insert(phase.name.as_str()) {
                return Err(Error::duplicate_phase(&phase.name));
            }
        }
        if self.mitosis.enabled {
            if self.mitosis.every == 0 {
                return Err(Error::ZeroMitosisInterval);
            }
            if !seen.contains(self.mitosis.phase.as_str()) {
                return Err(Error::unknown_mitosis_phase(&self.mitosis.phase));
            }
        }
        Ok(())
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        Ok(())
    }
}

// --- Default values ---

/// The reference cell cycle: G1 -> S -> G2 -> M.
pub fn default_phases() -> Vec<PhaseConfig> {
    vec![
        PhaseConfig::new("G1", 4000, "Gap 1 / Growth", -70),
        PhaseConfig::new("S", 3000, "Synthesis", -55),
        PhaseConfig::new("G2", 2000, "Gap 2 / Preparation", -40),
        PhaseConfig::new("M", 1000, "Mitosis", 30),
    ]
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            phases: default_phases(),
            mitosis: MitosisConfig::default(),
        }
    }
}

impl Default for MitosisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            phase: "M".to_string(),
            every: 1,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { capacity: 500 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_describe_the_reference_cycle() {
        let config = AetherConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cycle.tick_interval(), Duration::from_millis(100));
        let names: Vec<_> = config.cycle.phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["G1", "S", "G2", "M"]);
        assert_eq!(config.ledger.capacity, 500);
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config = AetherConfig::from_toml_str("").unwrap();
        assert_eq!(config, AetherConfig::default());
    }

    #[test]
    fn toml_overrides_phases_and_capacity() {
        let source = r#"
            [cycle]
            tick_interval_ms = 50

            [[cycle.phases]]
            name = "P1"
            duration_ms = 1000
            label = "first"
            conductance = -5

            [[cycle.phases]]
            name = "P2"
            duration_ms = 500

            [cycle.mitosis]
            phase = "P2"
            every = 3

            [ledger]
            capacity = 3
        "#;
        let config = AetherConfig::from_toml_str(source).unwrap();
        assert_eq!(config.cycle.tick_interval_ms, 50);
        assert_eq!(config.cycle.phases.len(), 2);
        assert_eq!(config.cycle.phases[0].conductance, -5);
        assert_eq!(config.cycle.phases[1].label, "");
        assert_eq!(config.cycle.mitosis.every, 3);
        assert!(config.cycle.mitosis.enabled);
        assert_eq!(config.ledger.capacity, 3);
    }

    #[test]
    fn load_reads_a_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ledger]\ncapacity = 42").unwrap();
        let config = AetherConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.ledger.capacity, 42);
        assert_eq!(config.cycle, CycleConfig::default());
    }

    #[test]
    fn load_fails_for_a_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            AetherConfig::load(Some(&missing)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn rejects_empty_phase_list() {
        let config = CycleConfig {
            phases: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::EmptyPhaseList)));
    }

    #[test]
    fn rejects_zero_duration_and_zero_tick() {
        let mut config = CycleConfig::default();
        config.phases[2].duration_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::ZeroDuration { phase }) if phase == "G2"
        ));

        let config = CycleConfig {
            tick_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::ZeroTickInterval)));
    }

    #[test]
    fn rejects_duplicate_phase_names() {
        let mut config = CycleConfig::default();
        config.phases.push(PhaseConfig::new("S", 10, "again", 0));
        assert!(matches!(
            config.validate(),
            Err(Error::DuplicatePhase { phase }) if phase == "S"
        ));
    }

    #[test]
    fn mitosis_trigger_must_name_a_phase_unless_disabled() {
        let mut config = CycleConfig::default();
        config.mitosis.phase = "X".to_string();
        assert!(matches!(
            config.validate(),
            Err(Error::UnknownMitosisPhase { .. })
        ));

        config.mitosis.enabled = false;
        assert!(config.validate().is_ok());

        config.mitosis = MitosisConfig {
            every: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::ZeroMitosisInterval)));
    }

    #[test]
    fn rejects_zero_capacity() {
        let config = LedgerConfig { capacity: 0 };
        assert!(matches!(config.validate(), Err(Error::ZeroCapacity)));
    }
}
