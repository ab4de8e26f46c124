use crate::error::{CliError, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use h4d::engine::config::{
    FlexibilityMode, ProductionOverrides, RunOverrides, StructureOverrides,
};
use h4d::workflows::campaign::IndexPolicy;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "H4D-MC Developers",
    version,
    about = "H4D CLI - Campaign driver for 4D-insertion Monte Carlo hydration free-energy calculations.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build and equilibrate the solvent box for every solute and submit the
    /// initialisation jobs.
    Init(InitArgs),
    /// Encode and submit one insertion and one destruction run per solute.
    Run(RunArgs),
    /// Run the engine's analysis phase and tabulate the free-energy estimates.
    Analyze(AnalyzeArgs),
    /// Initialise the structure (g(r) accumulation) workflow.
    StructInit(StructInitArgs),
    /// Encode and submit one structure-accumulation run per solute.
    StructRun(StructRunArgs),
}

/// Arguments shared by every campaign command.
#[derive(Args, Debug)]
pub struct CampaignArgs {
    /// Campaign root directory, containing input-files/ and solutein/.
    #[arg(long, default_value = ".", value_name = "DIR")]
    pub root: PathBuf,

    /// Tab-separated solute catalog file.
    #[arg(short, long, default_value = "solutes.csv", value_name = "PATH")]
    pub solutes: PathBuf,

    /// Resolve parameters from a saved snapshot before applying overrides.
    #[arg(long, value_name = "PATH")]
    pub load_params: Option<PathBuf>,

    /// Fixed random seed, for reproducible protocol documents.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerKind {
    Slurm,
    Loadleveler,
    None,
}

/// Job submission options.
#[derive(Args, Debug)]
pub struct SchedulerArgs {
    /// Cluster scheduler used to submit the generated job scripts.
    #[arg(short = 'j', long, value_enum, default_value_t = SchedulerKind::Slurm)]
    pub scheduler: SchedulerKind,

    /// Stage documents and job scripts without submitting anything.
    #[arg(long)]
    pub no_launch: bool,
}

/// Box and thermodynamic-state overrides. Anything left unset falls back to
/// the loaded snapshot, then to the built-in defaults.
#[derive(Args, Debug, Default)]
pub struct BoxArgs {
    /// Water model (TIP3P or SPCE).
    #[arg(long, value_name = "MODEL")]
    pub water: Option<String>,

    /// Number of solvent molecules.
    #[arg(short = 'N', long = "nsolvent", value_name = "INT")]
    pub nsolvent: Option<u32>,

    /// Temperature, in K.
    #[arg(short = 'T', long, value_name = "FLOAT")]
    pub temperature: Option<f64>,

    /// Pressure, in Pa.
    #[arg(short = 'P', long, value_name = "INT")]
    pub pressure: Option<u64>,

    /// Solvent concentration, in M.
    #[arg(short = 'C', long, value_name = "FLOAT")]
    pub concentration: Option<f64>,

    /// Ewald decomposition used while sampling the structure (kmax nx ny).
    #[arg(long, num_args = 3, value_name = "INT")]
    pub ewald: Option<Vec<u32>>,

    /// Ewald decomposition used during insertion/destruction (kmax nx ny).
    #[arg(long, num_args = 3, value_name = "INT")]
    pub ewald2: Option<Vec<u32>>,

    /// Maximum altitude in the 4th dimension, in Å.
    #[arg(long, value_name = "FLOAT")]
    pub wmax: Option<f64>,

    /// Insertion/destruction speed, in sqrt(kT/M).
    #[arg(long, value_name = "FLOAT")]
    pub speed: Option<f64>,

    /// Insertion/destruction time step, in sqrt(M/kT)·Å.
    #[arg(long, value_name = "FLOAT")]
    pub dt: Option<f64>,

    /// Solute site mass during insertion/destruction.
    #[arg(long, value_name = "FLOAT")]
    pub mass: Option<f64>,

    /// Accumulation histogram range, in kT.
    #[arg(long, value_name = "INT")]
    pub hrange: Option<u32>,

    /// Accumulation histogram bin width, in kT.
    #[arg(long, value_name = "FLOAT")]
    pub dh: Option<f64>,

    /// Monte Carlo equilibration cycles.
    #[arg(long, value_name = "INT")]
    pub equil: Option<u64>,

    /// Name of the equilibrated reference artifact pair.
    #[arg(long = "ref", value_name = "NAME")]
    pub reference: Option<String>,

    /// Build the solvent box from scratch instead of loading the reference.
    #[arg(long)]
    pub create_box: bool,
}

impl BoxArgs {
    pub fn to_overrides(&self) -> Result<RunOverrides> {
        Ok(RunOverrides {
            water_model: self.water.clone(),
            solvent_count: self.nsolvent,
            temperature: self.temperature,
            pressure: self.pressure,
            concentration: self.concentration,
            ewald_structural: triple(&self.ewald, "--ewald")?,
            ewald_dynamic: triple(&self.ewald2, "--ewald2")?,
            altitude_max: self.wmax,
            speed: self.speed,
            time_step: self.dt,
            site_mass: self.mass,
            histogram_range: self.hrange,
            histogram_bin_width: self.dh,
            equilibration_cycles: self.equil,
            reference: self.reference.clone(),
            create_box: self.create_box.then_some(true),
        })
    }
}

/// Production-phase overrides.
#[derive(Args, Debug, Default)]
pub struct ProductionArgs {
    /// Sample the solute's internal conformation (flexible mode).
    #[arg(long)]
    pub flex: bool,

    /// Number of accumulation steps per run.
    #[arg(long, value_name = "INT")]
    pub nacc: Option<u64>,

    /// Cycles between insertion accumulations.
    #[arg(long, value_name = "INT")]
    pub nii: Option<u64>,

    /// Cycles between destruction accumulations.
    #[arg(long, value_name = "INT")]
    pub nid: Option<u64>,

    /// Cycles of vacuum conformer generation per solute move.
    #[arg(long, value_name = "INT")]
    pub nvac: Option<u64>,

    /// Maximum displacement of a solute site, in Å.
    #[arg(long, value_name = "FLOAT")]
    pub ds: Option<f64>,

    /// Relative probabilities to move the whole solute vs. one site.
    #[arg(long, num_args = 2, value_name = "INT")]
    pub pw: Option<Vec<u32>>,

    /// Maximum translation of a solvent molecule, in Å.
    #[arg(long, value_name = "FLOAT")]
    pub dw: Option<f64>,

    /// Maximum rotation of a solvent molecule, in degrees.
    #[arg(long, value_name = "INT")]
    pub rw: Option<u32>,

    /// Force-bias pair for solvent moves.
    #[arg(long, num_args = 2, value_name = "FLOAT")]
    pub fb: Option<Vec<f64>>,

    /// Volume exchange attempt probability.
    #[arg(long, value_name = "FLOAT")]
    pub vxp: Option<f64>,

    /// Maximum ln(volume) exchange step.
    #[arg(long, value_name = "FLOAT")]
    pub lnv: Option<f64>,
}

impl ProductionArgs {
    pub fn mode(&self) -> FlexibilityMode {
        if self.flex {
            FlexibilityMode::Flexible
        } else {
            FlexibilityMode::Rigid
        }
    }

    pub fn to_overrides(&self) -> Result<ProductionOverrides> {
        Ok(ProductionOverrides {
            accumulations: self.nacc,
            insertion_interval: self.nii,
            destruction_interval: self.nid,
            vacuum_conformer_cycles: self.nvac,
            site_displacement: self.ds,
            move_weights: pair(&self.pw, "--pw")?,
            solvent_translation: self.dw,
            solvent_rotation: self.rw,
            force_bias: pair(&self.fb, "--fb")?,
            volume_exchange_prob: self.vxp,
            ln_volume_step: self.lnv,
        })
    }
}

/// Structure-workflow (g(r) accumulation) overrides.
#[derive(Args, Debug, Default)]
pub struct StructureArgs {
    /// Number of g(r) bins.
    #[arg(long, value_name = "INT")]
    pub gr_bins: Option<u32>,

    /// g(r) bin size, in Å.
    #[arg(long, value_name = "FLOAT")]
    pub gr_width: Option<f64>,

    /// nmax for solvent-solvent accumulation.
    #[arg(long, value_name = "INT")]
    pub nmax: Option<u32>,

    /// Solute symmetry code.
    #[arg(long, value_name = "INT")]
    pub symmetry: Option<u32>,

    /// nmax for the solute.
    #[arg(long, value_name = "INT")]
    pub solute_nmax: Option<u32>,
}

impl StructureArgs {
    pub fn to_overrides(&self) -> StructureOverrides {
        StructureOverrides {
            gr_bins: self.gr_bins,
            gr_bin_width: self.gr_width,
            solvent_nmax: self.nmax,
            solute_symmetry: self.symmetry,
            solute_nmax: self.solute_nmax,
        }
    }
}

/// How the checkpoint index is chosen for resumable commands.
#[derive(Args, Debug)]
#[group(required = false, multiple = false)]
pub struct IndexArgs {
    /// Run from this checkpoint index.
    #[arg(short = 'i', long, value_name = "INT")]
    pub index: Option<u64>,

    /// Probe each solute workspace for its latest checkpoint (the default).
    #[arg(long)]
    pub auto: bool,
}

impl IndexArgs {
    pub fn policy(&self) -> IndexPolicy {
        match self.index {
            Some(index) => IndexPolicy::Explicit(index),
            None => IndexPolicy::Auto,
        }
    }
}

/// Arguments for the `init` subcommand.
#[derive(Args, Debug)]
pub struct InitArgs {
    #[command(flatten)]
    pub campaign: CampaignArgs,
    #[command(flatten)]
    pub box_params: BoxArgs,
    #[command(flatten)]
    pub scheduler: SchedulerArgs,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub campaign: CampaignArgs,
    #[command(flatten)]
    pub box_params: BoxArgs,
    #[command(flatten)]
    pub production: ProductionArgs,
    #[command(flatten)]
    pub scheduler: SchedulerArgs,
    #[command(flatten)]
    pub index: IndexArgs,
}

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub campaign: CampaignArgs,
    #[command(flatten)]
    pub index: IndexArgs,

    /// Dump the raw insertion/destruction distributions alongside the
    /// estimates.
    #[arg(long)]
    pub pid: bool,

    /// Analyse every checkpoint index up to the latest one, tabulating the
    /// evolution of the estimates.
    #[arg(long)]
    pub evol: bool,
}

/// Arguments for the `struct-init` subcommand.
#[derive(Args, Debug)]
pub struct StructInitArgs {
    #[command(flatten)]
    pub campaign: CampaignArgs,
    #[command(flatten)]
    pub box_params: BoxArgs,
    #[command(flatten)]
    pub structure: StructureArgs,
    #[command(flatten)]
    pub scheduler: SchedulerArgs,
}

/// Arguments for the `struct-run` subcommand.
#[derive(Args, Debug)]
pub struct StructRunArgs {
    #[command(flatten)]
    pub campaign: CampaignArgs,
    #[command(flatten)]
    pub box_params: BoxArgs,
    #[command(flatten)]
    pub production: ProductionArgs,
    #[command(flatten)]
    pub scheduler: SchedulerArgs,
    #[command(flatten)]
    pub index: IndexArgs,
}

fn triple<T: Copy>(values: &Option<Vec<T>>, flag: &str) -> Result<Option<[T; 3]>> {
    values
        .as_deref()
        .map(|v| {
            v.try_into()
                .map_err(|_| CliError::Argument(format!("{flag} takes exactly 3 values")))
        })
        .transpose()
}

fn pair<T: Copy>(values: &Option<Vec<T>>, flag: &str) -> Result<Option<[T; 2]>> {
    values
        .as_deref()
        .map(|v| {
            v.try_into()
                .map_err(|_| CliError::Argument(format!("{flag} takes exactly 2 values")))
        })
        .transpose()
}
