use crate::core::constants::thermal_energy_kj_mol;
use crate::engine::water;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Unknown water model: '{0}' (supported models: TIP3P, SPCE)")]
    UnknownWaterModel(String),
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("JSON error for '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// Whether the solute's internal conformation is sampled during production.
///
/// Each mode dispatches to its own defaults table; a resolved configuration
/// carries values from exactly one of the two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlexibilityMode {
    Rigid,
    Flexible,
}

struct ModeDefaults {
    insertion_interval: u64,
    destruction_interval: u64,
    vacuum_conformer_cycles: u64,
    site_displacement: f64,
    move_weights: [u32; 2],
}

impl FlexibilityMode {
    fn defaults(self) -> ModeDefaults {
        match self {
            FlexibilityMode::Rigid => ModeDefaults {
                insertion_interval: 100,
                destruction_interval: 100,
                vacuum_conformer_cycles: 0,
                site_displacement: 0.0,
                move_weights: [1, 1],
            },
            FlexibilityMode::Flexible => ModeDefaults {
                insertion_interval: 100,
                destruction_interval: 1000,
                vacuum_conformer_cycles: 10000,
                site_displacement: 0.1,
                move_weights: [1, 5],
            },
        }
    }
}

/// Thermodynamic state of the simulation box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thermodynamics {
    /// Number of solvent molecules (N).
    pub solvent_count: u32,
    /// Temperature in K.
    pub temperature: f64,
    /// Pressure in Pa.
    pub pressure: u64,
    /// Solvent concentration in M.
    pub concentration: f64,
}

/// Water-model constants after unit reduction, frozen at resolve time so the
/// protocol encoder never performs physics-unit arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterParams {
    pub model: String,
    pub sigma: f64,
    /// Well depth divided by kT at the resolved temperature.
    pub reduced_well_depth: f64,
    pub bond_length: f64,
    pub bond_angle: f64,
    pub hydrogen_charge: f64,
    pub dielectric_code: u32,
}

/// Ewald summation decomposition triples, passed opaquely to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EwaldParams {
    /// Decomposition used while sampling the structure.
    pub structural: [u32; 3],
    /// Decomposition used during insertion/destruction dynamics.
    pub dynamic: [u32; 3],
}

/// Insertion/destruction kinetics along the fourth dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kinetics {
    /// Maximum altitude in the 4th dimension, in Å.
    pub altitude_max: f64,
    /// Insertion/destruction speed, in sqrt(kT/M).
    pub speed: f64,
    /// Time step, in sqrt(M/kT)·Å.
    pub time_step: f64,
    /// Solute site mass during insertion/destruction.
    pub site_mass: f64,
}

/// Accumulation histogram parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Accumulation range, in kT.
    pub range: u32,
    /// Bin width, in kT.
    pub bin_width: f64,
}

/// Where the initial configuration comes from: a named equilibrated reference
/// artifact pair, or a box built from scratch with a random seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    pub create_box: bool,
}

/// Production-phase parameters; present only when a production or analysis
/// campaign is being resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionParams {
    pub mode: FlexibilityMode,
    /// Number of accumulation steps per run.
    pub accumulations: u64,
    /// Cycles between insertion accumulations.
    pub insertion_interval: u64,
    /// Cycles between destruction accumulations.
    pub destruction_interval: u64,
    /// Cycles of vacuum conformer generation per solute move.
    pub vacuum_conformer_cycles: u64,
    /// Maximum displacement of a solute site, in Å.
    pub site_displacement: f64,
    /// Relative probabilities to move the whole solute vs. one site.
    pub move_weights: [u32; 2],
    /// Maximum translation of a solvent molecule, in Å.
    pub solvent_translation: f64,
    /// Maximum rotation of a solvent molecule, in degrees.
    pub solvent_rotation: u32,
    /// Force-bias pair for solvent moves.
    pub force_bias: [f64; 2],
    /// Volume exchange attempt probability.
    pub volume_exchange_prob: f64,
    /// Maximum ln(volume) exchange step.
    pub ln_volume_step: f64,
}

/// Structure-workflow parameters (radial distribution accumulation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureParams {
    /// Number of g(r) bins.
    pub gr_bins: u32,
    /// g(r) bin size, in Å.
    pub gr_bin_width: f64,
    /// nmax for solvent-solvent accumulation.
    pub solvent_nmax: u32,
    /// Solute symmetry code.
    pub solute_symmetry: u32,
    /// nmax for the solute.
    pub solute_nmax: u32,
}

/// The immutable, fully resolved parameter bundle for one campaign run.
///
/// Every numeric default is resolved exactly once, at [`RunConfig::resolve`]
/// time; the protocol encoder only reads values from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub thermodynamics: Thermodynamics,
    pub water: WaterParams,
    pub ewald: EwaldParams,
    pub kinetics: Kinetics,
    pub histogram: Histogram,
    /// Monte Carlo equilibration cycles run before the destruction checkpoint.
    pub equilibration_cycles: u64,
    pub reference: Reference,
    pub production: Option<ProductionParams>,
    pub structure: Option<StructureParams>,
}

/// Explicit (command-line) overrides for the base configuration. Any field
/// left `None` falls back to the persisted snapshot, then to the defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOverrides {
    pub water_model: Option<String>,
    pub solvent_count: Option<u32>,
    pub temperature: Option<f64>,
    pub pressure: Option<u64>,
    pub concentration: Option<f64>,
    pub ewald_structural: Option<[u32; 3]>,
    pub ewald_dynamic: Option<[u32; 3]>,
    pub altitude_max: Option<f64>,
    pub speed: Option<f64>,
    pub time_step: Option<f64>,
    pub site_mass: Option<f64>,
    pub histogram_range: Option<u32>,
    pub histogram_bin_width: Option<f64>,
    pub equilibration_cycles: Option<u64>,
    pub reference: Option<String>,
    pub create_box: Option<bool>,
}

/// Explicit overrides for the production-phase parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductionOverrides {
    pub accumulations: Option<u64>,
    pub insertion_interval: Option<u64>,
    pub destruction_interval: Option<u64>,
    pub vacuum_conformer_cycles: Option<u64>,
    pub site_displacement: Option<f64>,
    pub move_weights: Option<[u32; 2]>,
    pub solvent_translation: Option<f64>,
    pub solvent_rotation: Option<u32>,
    pub force_bias: Option<[f64; 2]>,
    pub volume_exchange_prob: Option<f64>,
    pub ln_volume_step: Option<f64>,
}

/// Explicit overrides for the structure-workflow parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureOverrides {
    pub gr_bins: Option<u32>,
    pub gr_bin_width: Option<f64>,
    pub solvent_nmax: Option<u32>,
    pub solute_symmetry: Option<u32>,
    pub solute_nmax: Option<u32>,
}

mod defaults {
    pub const WATER_MODEL: &str = "TIP3P";
    pub const SOLVENT_COUNT: u32 = 100;
    pub const TEMPERATURE: f64 = 298.15;
    pub const PRESSURE: u64 = 100_000;
    pub const CONCENTRATION: f64 = 55.4;
    pub const EWALD_STRUCTURAL: [u32; 3] = [8, 4, 4];
    pub const EWALD_DYNAMIC: [u32; 3] = [8, 3, 3];
    pub const ALTITUDE_MAX: f64 = 3.0;
    pub const SPEED: f64 = 0.05;
    pub const TIME_STEP: f64 = 0.02;
    pub const SITE_MASS: f64 = 1e21;
    pub const HISTOGRAM_RANGE: u32 = 2000;
    pub const HISTOGRAM_BIN_WIDTH: f64 = 0.5;
    pub const EQUILIBRATION_CYCLES: u64 = 10_000;
    pub const REFERENCE: &str = "100tip3p";
    pub const ACCUMULATIONS: u64 = 1000;
    pub const SOLVENT_TRANSLATION: f64 = 0.3;
    pub const SOLVENT_ROTATION: u32 = 30;
    pub const FORCE_BIAS: [f64; 2] = [0.5, 0.5];
    pub const VOLUME_EXCHANGE_PROB: f64 = 0.2;
    pub const LN_VOLUME_STEP: f64 = 0.05;
    pub const GR_BINS: u32 = 500;
    pub const GR_BIN_WIDTH: f64 = 0.025;
    pub const SOLVENT_NMAX: u32 = 6;
    pub const SOLUTE_SYMMETRY: u32 = 0;
    pub const SOLUTE_NMAX: u32 = 0;
}

impl RunConfig {
    /// Resolves the parameter cascade into an immutable configuration.
    ///
    /// Precedence per field: explicit override, then the persisted `base`
    /// snapshot (if any), then the built-in default. The water model is
    /// looked up here and its well depth reduced by kT at the resolved
    /// temperature; the encoder never touches physical units.
    pub fn resolve(overrides: &RunOverrides, base: Option<&RunConfig>) -> Result<Self, ConfigError> {
        let temperature = overrides
            .temperature
            .or(base.map(|b| b.thermodynamics.temperature))
            .unwrap_or(defaults::TEMPERATURE);

        let model_name = overrides
            .water_model
            .clone()
            .or_else(|| base.map(|b| b.water.model.clone()))
            .unwrap_or_else(|| defaults::WATER_MODEL.to_string());
        let model = water::lookup(&model_name)
            .ok_or_else(|| ConfigError::UnknownWaterModel(model_name.clone()))?;
        let water = WaterParams {
            model: model_name,
            sigma: model.sigma,
            reduced_well_depth: model.well_depth_kj_mol / thermal_energy_kj_mol(temperature),
            bond_length: model.bond_length,
            bond_angle: model.bond_angle,
            hydrogen_charge: model.hydrogen_charge,
            dielectric_code: model.dielectric_code,
        };

        Ok(RunConfig {
            thermodynamics: Thermodynamics {
                solvent_count: overrides
                    .solvent_count
                    .or(base.map(|b| b.thermodynamics.solvent_count))
                    .unwrap_or(defaults::SOLVENT_COUNT),
                temperature,
                pressure: overrides
                    .pressure
                    .or(base.map(|b| b.thermodynamics.pressure))
                    .unwrap_or(defaults::PRESSURE),
                concentration: overrides
                    .concentration
                    .or(base.map(|b| b.thermodynamics.concentration))
                    .unwrap_or(defaults::CONCENTRATION),
            },
            water,
            ewald: EwaldParams {
                structural: overrides
                    .ewald_structural
                    .or(base.map(|b| b.ewald.structural))
                    .unwrap_or(defaults::EWALD_STRUCTURAL),
                dynamic: overrides
                    .ewald_dynamic
                    .or(base.map(|b| b.ewald.dynamic))
                    .unwrap_or(defaults::EWALD_DYNAMIC),
            },
            kinetics: Kinetics {
                altitude_max: overrides
                    .altitude_max
                    .or(base.map(|b| b.kinetics.altitude_max))
                    .unwrap_or(defaults::ALTITUDE_MAX),
                speed: overrides
                    .speed
                    .or(base.map(|b| b.kinetics.speed))
                    .unwrap_or(defaults::SPEED),
                time_step: overrides
                    .time_step
                    .or(base.map(|b| b.kinetics.time_step))
                    .unwrap_or(defaults::TIME_STEP),
                site_mass: overrides
                    .site_mass
                    .or(base.map(|b| b.kinetics.site_mass))
                    .unwrap_or(defaults::SITE_MASS),
            },
            histogram: Histogram {
                range: overrides
                    .histogram_range
                    .or(base.map(|b| b.histogram.range))
                    .unwrap_or(defaults::HISTOGRAM_RANGE),
                bin_width: overrides
                    .histogram_bin_width
                    .or(base.map(|b| b.histogram.bin_width))
                    .unwrap_or(defaults::HISTOGRAM_BIN_WIDTH),
            },
            equilibration_cycles: overrides
                .equilibration_cycles
                .or(base.map(|b| b.equilibration_cycles))
                .unwrap_or(defaults::EQUILIBRATION_CYCLES),
            reference: Reference {
                name: overrides
                    .reference
                    .clone()
                    .or_else(|| base.map(|b| b.reference.name.clone()))
                    .unwrap_or_else(|| defaults::REFERENCE.to_string()),
                create_box: overrides
                    .create_box
                    .or(base.map(|b| b.reference.create_box))
                    .unwrap_or(false),
            },
            production: None,
            structure: None,
        })
    }

    /// Resolves the production-phase parameters for the given flexibility
    /// mode and attaches them to this configuration.
    ///
    /// A snapshot is consulted only when it was resolved for the same mode;
    /// rigid and flexible defaults never mix in one configuration.
    pub fn with_production(
        mut self,
        overrides: &ProductionOverrides,
        mode: FlexibilityMode,
        base: Option<&RunConfig>,
    ) -> Self {
        let base = base
            .and_then(|b| b.production.as_ref())
            .filter(|p| p.mode == mode);
        let mode_defaults = mode.defaults();

        self.production = Some(ProductionParams {
            mode,
            accumulations: overrides
                .accumulations
                .or(base.map(|p| p.accumulations))
                .unwrap_or(defaults::ACCUMULATIONS),
            insertion_interval: overrides
                .insertion_interval
                .or(base.map(|p| p.insertion_interval))
                .unwrap_or(mode_defaults.insertion_interval),
            destruction_interval: overrides
                .destruction_interval
                .or(base.map(|p| p.destruction_interval))
                .unwrap_or(mode_defaults.destruction_interval),
            vacuum_conformer_cycles: overrides
                .vacuum_conformer_cycles
                .or(base.map(|p| p.vacuum_conformer_cycles))
                .unwrap_or(mode_defaults.vacuum_conformer_cycles),
            site_displacement: overrides
                .site_displacement
                .or(base.map(|p| p.site_displacement))
                .unwrap_or(mode_defaults.site_displacement),
            move_weights: overrides
                .move_weights
                .or(base.map(|p| p.move_weights))
                .unwrap_or(mode_defaults.move_weights),
            solvent_translation: overrides
                .solvent_translation
                .or(base.map(|p| p.solvent_translation))
                .unwrap_or(defaults::SOLVENT_TRANSLATION),
            solvent_rotation: overrides
                .solvent_rotation
                .or(base.map(|p| p.solvent_rotation))
                .unwrap_or(defaults::SOLVENT_ROTATION),
            force_bias: overrides
                .force_bias
                .or(base.map(|p| p.force_bias))
                .unwrap_or(defaults::FORCE_BIAS),
            volume_exchange_prob: overrides
                .volume_exchange_prob
                .or(base.map(|p| p.volume_exchange_prob))
                .unwrap_or(defaults::VOLUME_EXCHANGE_PROB),
            ln_volume_step: overrides
                .ln_volume_step
                .or(base.map(|p| p.ln_volume_step))
                .unwrap_or(defaults::LN_VOLUME_STEP),
        });
        self
    }

    /// Resolves and attaches the structure-workflow parameters.
    pub fn with_structure(
        mut self,
        overrides: &StructureOverrides,
        base: Option<&RunConfig>,
    ) -> Self {
        let base = base.and_then(|b| b.structure.as_ref());

        self.structure = Some(StructureParams {
            gr_bins: overrides
                .gr_bins
                .or(base.map(|s| s.gr_bins))
                .unwrap_or(defaults::GR_BINS),
            gr_bin_width: overrides
                .gr_bin_width
                .or(base.map(|s| s.gr_bin_width))
                .unwrap_or(defaults::GR_BIN_WIDTH),
            solvent_nmax: overrides
                .solvent_nmax
                .or(base.map(|s| s.solvent_nmax))
                .unwrap_or(defaults::SOLVENT_NMAX),
            solute_symmetry: overrides
                .solute_symmetry
                .or(base.map(|s| s.solute_symmetry))
                .unwrap_or(defaults::SOLUTE_SYMMETRY),
            solute_nmax: overrides
                .solute_nmax
                .or(base.map(|s| s.solute_nmax))
                .unwrap_or(defaults::SOLUTE_NMAX),
        });
        self
    }

    pub fn production(&self) -> Result<&ProductionParams, ConfigError> {
        self.production
            .as_ref()
            .ok_or(ConfigError::MissingParameter("production"))
    }

    pub fn structure(&self) -> Result<&StructureParams, ConfigError> {
        self.structure
            .as_ref()
            .ok_or(ConfigError::MissingParameter("structure"))
    }

    /// Persists the fully resolved configuration as a JSON snapshot, to be
    /// reloaded by [`RunConfig::load_snapshot`] to reproduce a prior
    /// resolution exactly.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), SnapshotError> {
        let file = std::fs::File::create(path).map_err(|e| SnapshotError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        serde_json::to_writer_pretty(file, self).map_err(|e| SnapshotError::Json {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn load_snapshot(path: &Path) -> Result<Self, SnapshotError> {
        let file = std::fs::File::open(path).map_err(|e| SnapshotError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        serde_json::from_reader(file).map_err(|e| SnapshotError::Json {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolve_applies_built_in_defaults() {
        let config = RunConfig::resolve(&RunOverrides::default(), None).unwrap();

        assert_eq!(config.thermodynamics.solvent_count, 100);
        assert_eq!(config.thermodynamics.temperature, 298.15);
        assert_eq!(config.ewald.structural, [8, 4, 4]);
        assert_eq!(config.ewald.dynamic, [8, 3, 3]);
        assert_eq!(config.water.model, "TIP3P");
        assert_eq!(config.reference.name, "100tip3p");
        assert!(!config.reference.create_box);
        assert!(config.production.is_none());
    }

    #[test]
    fn resolve_computes_reduced_well_depth_at_resolved_temperature() {
        let config = RunConfig::resolve(&RunOverrides::default(), None).unwrap();

        let kt = thermal_energy_kj_mol(298.15);
        assert_eq!(config.water.reduced_well_depth, 0.6364 / kt);
        assert_eq!(config.water.dielectric_code, 99);
    }

    #[test]
    fn resolve_rejects_unknown_water_model() {
        let overrides = RunOverrides {
            water_model: Some("TIP4P".to_string()),
            ..Default::default()
        };

        let err = RunConfig::resolve(&overrides, None).unwrap_err();
        assert_eq!(err, ConfigError::UnknownWaterModel("TIP4P".to_string()));
    }

    #[test]
    fn rigid_mode_resolves_rigid_defaults_only() {
        let config = RunConfig::resolve(&RunOverrides::default(), None)
            .unwrap()
            .with_production(&ProductionOverrides::default(), FlexibilityMode::Rigid, None);

        let production = config.production().unwrap();
        assert_eq!(production.insertion_interval, 100);
        assert_eq!(production.destruction_interval, 100);
        assert_eq!(production.vacuum_conformer_cycles, 0);
        assert_eq!(production.site_displacement, 0.0);
        assert_eq!(production.move_weights, [1, 1]);
    }

    #[test]
    fn flexible_mode_resolves_flexible_defaults_only() {
        let config = RunConfig::resolve(&RunOverrides::default(), None)
            .unwrap()
            .with_production(
                &ProductionOverrides::default(),
                FlexibilityMode::Flexible,
                None,
            );

        let production = config.production().unwrap();
        assert_eq!(production.insertion_interval, 100);
        assert_eq!(production.destruction_interval, 1000);
        assert_eq!(production.vacuum_conformer_cycles, 10000);
        assert_eq!(production.site_displacement, 0.1);
        assert_eq!(production.move_weights, [1, 5]);
    }

    #[test]
    fn snapshot_of_other_mode_is_ignored_for_production() {
        let flexible = RunConfig::resolve(&RunOverrides::default(), None)
            .unwrap()
            .with_production(
                &ProductionOverrides::default(),
                FlexibilityMode::Flexible,
                None,
            );

        // Re-resolving rigid against a flexible snapshot must not leak
        // flexible values into the rigid configuration.
        let rigid = RunConfig::resolve(&RunOverrides::default(), Some(&flexible))
            .unwrap()
            .with_production(
                &ProductionOverrides::default(),
                FlexibilityMode::Rigid,
                Some(&flexible),
            );

        let production = rigid.production().unwrap();
        assert_eq!(production.destruction_interval, 100);
        assert_eq!(production.vacuum_conformer_cycles, 0);
        assert_eq!(production.move_weights, [1, 1]);
    }

    #[test]
    fn explicit_overrides_win_over_snapshot_and_defaults() {
        let snapshot = RunConfig::resolve(
            &RunOverrides {
                temperature: Some(300.0),
                solvent_count: Some(200),
                ..Default::default()
            },
            None,
        )
        .unwrap();

        let overrides = RunOverrides {
            solvent_count: Some(500),
            ..Default::default()
        };
        let config = RunConfig::resolve(&overrides, Some(&snapshot)).unwrap();

        assert_eq!(config.thermodynamics.solvent_count, 500);
        // Falls through to the snapshot, not the default.
        assert_eq!(config.thermodynamics.temperature, 300.0);
        assert_eq!(config.thermodynamics.pressure, 100_000);
    }

    #[test]
    fn snapshot_round_trip_preserves_every_field() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params_ini.json");

        let config = RunConfig::resolve(
            &RunOverrides {
                water_model: Some("SPCE".to_string()),
                create_box: Some(true),
                ..Default::default()
            },
            None,
        )
        .unwrap()
        .with_production(
            &ProductionOverrides {
                accumulations: Some(250),
                ..Default::default()
            },
            FlexibilityMode::Flexible,
            None,
        );

        config.save_snapshot(&path).unwrap();
        let reloaded = RunConfig::load_snapshot(&path).unwrap();

        assert_eq!(config, reloaded);
    }
}
