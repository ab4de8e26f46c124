//! Phase-specific encoding of a run configuration into the engine's command
//! grammar.
//!
//! The engine parses its standard input positionally: numeric command codes
//! select blocks, fields follow in a fixed order, and blank lines terminate
//! blocks. Field order is the wire format: the encoder writes each record
//! verbatim, including the leading spaces and blank separators the engine
//! expects, and never reorders or infers fields.
//!
//! The four energy-workflow phases form a strict pipeline per solute:
//!
//! ```text
//! INIT(0) → INSERT(i) → DESTROY(i) → [ANALYZE(i)] → INSERT(i+1) → ...
//! ```
//!
//! A referenced checkpoint artifact being absent does not abort encoding;
//! the condition is attached to the document as a warning and the engine
//! itself fails loudly when fed the document. Random seeds are drawn from an
//! injected [`Rng`], one per stochastic block, so that runs are reproducible
//! under a fixed seed.

use crate::core::catalog::SoluteRecord;
use crate::engine::checkpoint::accumulation_path;
use crate::engine::config::{ConfigError, RunConfig};
use rand::Rng;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Shared neutral topology used when no solute-specific one exists.
pub const DUMMY_TOPOLOGY: &str = "dummy.top";

/// Solvent/volume move limits used during equilibration, fixed by the
/// engine's initialisation grammar.
const EQUILIBRATION_MOVES: &str = "0.3 \n 30 \n 0.5 0.5 \n 0 \n 0.2 \n 0.05 \n 0 \n 1 1 \n 0 \n";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to write protocol document '{path}': {source}")]
    Write { path: String, source: io::Error },
}

/// Non-fatal conditions observed while encoding; the orchestrator surfaces
/// them as warnings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeWarning {
    #[error("referenced checkpoint artifact 'acc_{label}' is absent")]
    MissingCheckpoint { label: String },
}

/// A write-once protocol document: the rendered wire-format text plus any
/// warnings raised while probing the artifacts it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolDocument {
    text: String,
    warnings: Vec<EncodeWarning>,
}

impl ProtocolDocument {
    fn new() -> Self {
        Self {
            text: String::new(),
            warnings: Vec::new(),
        }
    }

    fn put(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    fn warn(&mut self, warning: EncodeWarning) {
        self.warnings.push(warning);
    }

    /// The exact byte sequence the engine consumes on standard input.
    pub fn render(&self) -> &str {
        &self.text
    }

    pub fn warnings(&self) -> &[EncodeWarning] {
        &self.warnings
    }

    pub fn write_to_file(&self, path: &Path) -> Result<(), ProtocolError> {
        std::fs::write(path, &self.text).map_err(|e| ProtocolError::Write {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }
}

fn draw_seed(rng: &mut impl Rng) -> u32 {
    rng.gen_range(1..=10000)
}

/// Renders a float field the way the engine's existing input decks have it:
/// whole values keep a trailing `.0` and magnitudes outside `1e-4..1e16` use
/// a signed, zero-padded exponent (`1e+21`, `1e-05`).
fn wire_float(value: f64) -> String {
    if value == 0.0 {
        return "0.0".to_string();
    }
    let abs = value.abs();
    if !(1e-4..1e16).contains(&abs) {
        let text = format!("{value:e}");
        return match text.split_once('e') {
            Some((mantissa, exponent)) => {
                let exponent: i32 = exponent.parse().unwrap_or(0);
                let sign = if exponent < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exponent.abs())
            }
            None => text,
        };
    }
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Emits the "load reference configuration" block for the given checkpoint
/// label, or records a warning when the artifact is absent. `slot` selects
/// the engine-side configuration slot (0 = insertion, 1 = destruction).
fn load_checkpoint_block(doc: &mut ProtocolDocument, dir: &Path, label: &str, slot: u8) {
    if accumulation_path(dir, label).is_file() {
        doc.put("53\n");
        doc.put(&format!("{label}\n {slot} 0\n \n"));
    } else {
        doc.warn(EncodeWarning::MissingCheckpoint {
            label: label.to_string(),
        });
    }
}

/// Emits the solvent/box parameter block: counts, thermodynamic state, the
/// resolved water-model constants, the structural Ewald decomposition, and
/// the dielectric code, in the engine's fixed order.
fn solvent_box_block(doc: &mut ProtocolDocument, config: &RunConfig) {
    let t = &config.thermodynamics;
    let w = &config.water;
    doc.put("1\n");
    doc.put(&format!(
        "{}\n {}\n {}\n",
        t.solvent_count,
        wire_float(t.temperature),
        t.pressure
    ));
    doc.put(&format!(
        "{}\n {}\n {} {}\n {}\n",
        wire_float(w.sigma),
        wire_float(w.reduced_well_depth),
        wire_float(w.bond_length),
        wire_float(w.bond_angle),
        wire_float(w.hydrogen_charge)
    ));
    let e = config.ewald.structural;
    doc.put(&format!("{}\n {} {}\n", e[0], e[1], e[2]));
    doc.put(&format!("{}\n", w.dielectric_code));
}

/// Emits the solute topology sub-block. A missing solute-specific `.top`
/// file silently substitutes the shared dummy topology.
fn solute_topology_block(doc: &mut ProtocolDocument, dir: &Path, solute: &str) {
    doc.put(&format!("{solute}.in \n 1 \n 0\n"));
    if dir.join(format!("{solute}.top")).is_file() {
        doc.put(&format!("{solute}.top\n"));
    } else {
        debug!(solute, "no solute-specific topology, using {DUMMY_TOPOLOGY}");
        doc.put(&format!("{DUMMY_TOPOLOGY} \n"));
    }
}

/// Encodes the initialisation document: box setup, solute insertion,
/// equilibration, and the labeled `{solute}_ins0` / `{solute}_des0`
/// checkpoint writes.
pub fn encode_init(
    config: &RunConfig,
    solute: &SoluteRecord,
    dir: &Path,
    rng: &mut impl Rng,
) -> ProtocolDocument {
    let mut doc = ProtocolDocument::new();
    let create_box = config.reference.create_box;

    if !create_box {
        load_checkpoint_block(&mut doc, dir, &config.reference.name, 0);
    }

    solvent_box_block(&mut doc, config);
    doc.put("4\n 0\n");
    solute_topology_block(&mut doc, dir, &solute.name);
    doc.put(&format!(
        "{}\n\n",
        wire_float(config.thermodynamics.concentration)
    ));

    // Insertion/destruction kinetics and accumulation histogram.
    let k = &config.kinetics;
    let mu0 = solute.reference_free_energy.unwrap_or(0.0);
    let v0 = solute.reference_volume.unwrap_or(0.0);
    doc.put("4\n");
    doc.put("500 \n 0.025 \n 0.1 0.1 \n 1 1\n");
    doc.put("1\n");
    doc.put(&format!(
        "{} {} \n 0 1 \n {} \n 0 \n",
        k.altitude_max,
        wire_float(k.speed),
        wire_float(k.time_step)
    ));
    doc.put("1\n 1 1 1 \n");
    let e2 = config.ewald.dynamic;
    doc.put(&format!("{} {} {} \n", e2[0], e2[1], e2[2]));
    doc.put(&format!(
        "{} \n {} \n {} \n {} \n {} \n 1 \n \n",
        config.histogram.range,
        wire_float(config.histogram.bin_width),
        wire_float(mu0),
        wire_float(v0),
        wire_float(k.site_mass)
    ));

    if create_box {
        doc.put(&format!("2 \n {}\n \n", draw_seed(rng)));
    }

    // Solvent equilibration.
    doc.put("8\n");
    doc.put(&format!("00\n {}\n", draw_seed(rng)));
    if create_box {
        doc.put("10000 \n 10000 \n 0\n");
        doc.put(EQUILIBRATION_MOVES);
    } else {
        doc.put("0\n \n");
    }

    // Save the insertion starting point.
    doc.put("4\n 2\n 12 \n");
    doc.put(&format!("{}_ins0 \n 0 \n \n", solute.name));

    // Insert the solute, equilibrate for destruction.
    doc.put(&format!("7\n 0\n {}\n\n", draw_seed(rng)));
    doc.put(&format!("8\n {}\n", draw_seed(rng)));
    doc.put(&format!(
        "{} \n {} \n 0\n",
        config.equilibration_cycles, config.equilibration_cycles
    ));
    doc.put(EQUILIBRATION_MOVES);
    doc.put(" \n");

    // Save the destruction starting point.
    doc.put("4\n 2\n 12 \n");
    doc.put(&format!("{}_des0", solute.name));

    doc
}

/// Encodes one insertion-accumulation run starting from checkpoint `index`
/// and ending with a `{solute}_ins{index+1}` checkpoint write.
pub fn encode_insertion(
    config: &RunConfig,
    solute: &SoluteRecord,
    dir: &Path,
    index: u64,
    rng: &mut impl Rng,
) -> Result<ProtocolDocument, ProtocolError> {
    let p = config.production()?;
    let mut doc = ProtocolDocument::new();

    load_checkpoint_block(&mut doc, dir, &format!("{}_ins{index}", solute.name), 0);

    doc.put(&format!("8\n00\n {}\n", draw_seed(rng)));
    let total_cycles = p.accumulations * p.insertion_interval;
    doc.put(&format!("{}\n 0\n {}\n", total_cycles, p.insertion_interval));
    doc.put(&format!(
        "{}\n {}\n {}\n {}\n 0\n",
        wire_float(p.solvent_translation),
        p.solvent_rotation,
        wire_float(p.force_bias[0]),
        wire_float(p.force_bias[1])
    ));
    doc.put(&format!(
        "{}\n {}\n",
        wire_float(p.volume_exchange_prob),
        wire_float(p.ln_volume_step)
    ));
    doc.put(&format!(
        "{}\n 1 1\n {}\n\n",
        p.site_displacement, p.vacuum_conformer_cycles
    ));
    doc.put(&format!("4\n 2\n 12\n{}_ins{}", solute.name, index + 1));

    Ok(doc)
}

/// Encodes one destruction-accumulation run, symmetric to insertion but
/// batched by the destruction interval and using the move-probability weight
/// pair in place of the vacuum-conformer block.
pub fn encode_destruction(
    config: &RunConfig,
    solute: &SoluteRecord,
    dir: &Path,
    index: u64,
    rng: &mut impl Rng,
) -> Result<ProtocolDocument, ProtocolError> {
    let p = config.production()?;
    let mut doc = ProtocolDocument::new();

    load_checkpoint_block(&mut doc, dir, &format!("{}_des{index}", solute.name), 1);

    doc.put(&format!("8\n {}\n", draw_seed(rng)));
    let total_cycles = p.accumulations * p.destruction_interval;
    doc.put(&format!(
        "{}\n 0\n {}\n",
        total_cycles, p.destruction_interval
    ));
    doc.put(&format!(
        "{}\n {}\n {}\n {}\n 0\n",
        wire_float(p.solvent_translation),
        p.solvent_rotation,
        wire_float(p.force_bias[0]),
        wire_float(p.force_bias[1])
    ));
    doc.put(&format!(
        "{}\n {}\n",
        wire_float(p.volume_exchange_prob),
        wire_float(p.ln_volume_step)
    ));
    doc.put(&format!(
        "{}\n {} {}\n 0\n\n",
        p.site_displacement, p.move_weights[0], p.move_weights[1]
    ));
    doc.put(&format!("4\n 2\n 12\n{}_des{}", solute.name, index + 1));

    Ok(doc)
}

/// Encodes the analysis document for checkpoint `index`: loads both the
/// insertion and destruction accumulations, requests the fixed
/// post-processing histogram, optionally dumps the raw distributions, and
/// seeds the estimator with the solute's reference free energy.
pub fn encode_analysis(
    solute: &SoluteRecord,
    dir: &Path,
    index: u64,
    dump_distributions: bool,
) -> ProtocolDocument {
    let mut doc = ProtocolDocument::new();

    load_checkpoint_block(&mut doc, dir, &format!("{}_ins{index}", solute.name), 0);
    doc.put("8\n00\n 90\n 0\n 4\n 0\n");

    load_checkpoint_block(&mut doc, dir, &format!("{}_des{index}", solute.name), 1);
    doc.put("8\n 90\n 0\n 4\n");

    if dump_distributions {
        doc.put("2\n 15\n");
        doc.put(&format!("pinsdes_{}_{}", solute.name, index));
    }

    let mu0 = solute.reference_free_energy.unwrap_or(0.0);
    doc.put(&format!(
        "1\n 6\n 1\n -50\n 1\n -400 400\n 6\n {}\n",
        wire_float(mu0)
    ));

    doc
}

/// Encodes the structure-workflow initialisation document, ending with a
/// `{solute}_s0` checkpoint write.
pub fn encode_structure_init(
    config: &RunConfig,
    solute: &SoluteRecord,
    dir: &Path,
    rng: &mut impl Rng,
) -> Result<ProtocolDocument, ProtocolError> {
    let s = config.structure()?;
    let mut doc = ProtocolDocument::new();
    let create_box = config.reference.create_box;

    if !create_box {
        load_checkpoint_block(&mut doc, dir, &config.reference.name, 0);
    }

    solvent_box_block(&mut doc, config);
    doc.put(&format!("{}\n 0\n", s.solvent_nmax));
    solute_topology_block(&mut doc, dir, &solute.name);
    doc.put(&format!(
        "{}\n\n",
        wire_float(config.thermodynamics.concentration)
    ));

    // g(r) accumulation setup; kinetics are fixed for the structure workflow.
    doc.put("4\n");
    doc.put(&format!(
        "{} \n {} \n 0.1 0.1 \n 1 1\n",
        s.gr_bins,
        wire_float(s.gr_bin_width)
    ));
    doc.put("0\n");
    doc.put("3 0.05 \n 0 1 \n 0.02 \n 0 \n");
    doc.put("1\n 1 1 1 \n");
    doc.put("8 3 3 \n");
    doc.put("2000 \n 0.5 \n 0 \n 0 \n 1e20 \n 1 \n \n");

    if create_box {
        doc.put(&format!("2 \n {}\n \n", draw_seed(rng)));
    }

    doc.put("8\n");
    doc.put(&format!("00\n {}\n", draw_seed(rng)));
    if create_box {
        doc.put("10000 \n 10000 \n 0\n");
        doc.put(EQUILIBRATION_MOVES);
    } else {
        doc.put("0\n \n");
    }
    doc.put("4\n 0\n");

    doc.put(&format!("7\n 0\n {}\n\n", draw_seed(rng)));
    doc.put(&format!("8\n {}\n", draw_seed(rng)));
    doc.put(&format!(
        "{} \n {} \n 0\n",
        config.equilibration_cycles, config.equilibration_cycles
    ));
    doc.put(EQUILIBRATION_MOVES);
    doc.put(" \n");

    doc.put("4\n 2\n 12 \n");
    doc.put(&format!("{}_s0", solute.name));

    Ok(doc)
}

/// Encodes one structure-accumulation run over the `s` checkpoint tag.
pub fn encode_structure_accumulation(
    config: &RunConfig,
    solute: &SoluteRecord,
    dir: &Path,
    index: u64,
    rng: &mut impl Rng,
) -> Result<ProtocolDocument, ProtocolError> {
    let p = config.production()?;
    let mut doc = ProtocolDocument::new();

    load_checkpoint_block(&mut doc, dir, &format!("{}_s{index}", solute.name), 1);

    doc.put(&format!("8\n {}\n", draw_seed(rng)));
    let total_cycles = p.accumulations * p.insertion_interval;
    doc.put(&format!("{}\n 0\n {}\n", total_cycles, p.insertion_interval));
    doc.put(&format!(
        "{}\n {}\n {}\n {}\n 0\n",
        wire_float(p.solvent_translation),
        p.solvent_rotation,
        wire_float(p.force_bias[0]),
        wire_float(p.force_bias[1])
    ));
    doc.put(&format!(
        "{}\n {}\n",
        wire_float(p.volume_exchange_prob),
        wire_float(p.ln_volume_step)
    ));
    doc.put(&format!(
        "{}\n 1 1\n {}\n\n",
        p.site_displacement, p.vacuum_conformer_cycles
    ));
    doc.put(&format!("4\n 2\n 12\n{}_s{}", solute.name, index + 1));

    Ok(doc)
}
