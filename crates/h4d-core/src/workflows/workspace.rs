//! Creation and population of per-solute working directories.
//!
//! Each solute owns an exclusive workspace under the campaign root, seeded
//! with the engine binary, the shared dummy topology, the solute's structure
//! file, and optionally an equilibrated reference artifact pair. The engine
//! only ever sees its own workspace; nothing is shared between solutes.

use crate::engine::checkpoint::{accumulation_path, restart_path};
use crate::engine::scheduler::ENGINE_BINARY;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory under the campaign root holding engine binaries, job scripts,
/// dummy topology files, and reference artifacts.
pub const INPUT_DIR: &str = "input-files";
/// Directory under the campaign root holding solute structure files.
pub const STRUCTURES_DIR: &str = "solutein";

/// Neutral structure file staged into every workspace.
pub const DUMMY_STRUCTURE: &str = "dummy.in";
/// Neutral topology file staged into every workspace.
pub const DUMMY_TOPOLOGY_FILE: &str = "dummy.top";

/// Placeholder in job scripts replaced by the target simulation index.
const JOB_INDEX_PLACEHOLDER: &str = "YY";

/// Well-known locations inside one campaign directory.
#[derive(Debug, Clone)]
pub struct CampaignPaths {
    root: PathBuf,
}

impl CampaignPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.join(INPUT_DIR)
    }

    pub fn structures_dir(&self) -> PathBuf {
        self.root.join(STRUCTURES_DIR)
    }

    pub fn solute_dir(&self, solute: &str) -> PathBuf {
        self.root.join(solute)
    }
}

/// Creates and seeds the workspace for one solute.
///
/// Copies the engine binary, the dummy structure/topology pair, and the
/// solute's own structure file; the solute-specific topology and the
/// reference artifact pair are copied only when present/requested.
pub fn stage_solute_dir(
    paths: &CampaignPaths,
    solute: &str,
    reference: Option<&str>,
) -> io::Result<PathBuf> {
    let dir = paths.solute_dir(solute);
    fs::create_dir_all(&dir)?;

    let input_dir = paths.input_dir();
    for file in [ENGINE_BINARY, DUMMY_STRUCTURE, DUMMY_TOPOLOGY_FILE] {
        fs::copy(input_dir.join(file), dir.join(file))?;
    }

    let structures_dir = paths.structures_dir();
    let structure = format!("{solute}.in");
    fs::copy(structures_dir.join(&structure), dir.join(&structure))?;

    let topology = format!("{solute}.top");
    if structures_dir.join(&topology).is_file() {
        fs::copy(structures_dir.join(&topology), dir.join(&topology))?;
    } else {
        debug!(solute, "no solute-specific topology file to stage");
    }

    if let Some(reference) = reference {
        for source in [
            accumulation_path(&input_dir, reference),
            restart_path(&input_dir, reference),
        ] {
            let name = source.file_name().map(PathBuf::from).unwrap_or_default();
            fs::copy(&source, dir.join(name))?;
        }
    }

    Ok(dir)
}

/// Copies a job script from the input directory into a solute workspace.
pub fn stage_job_script(paths: &CampaignPaths, solute: &str, script: &str) -> io::Result<PathBuf> {
    let target = paths.solute_dir(solute).join(script);
    fs::copy(paths.input_dir().join(script), &target)?;
    Ok(target)
}

/// Substitutes the index placeholder in a staged job script.
pub fn instantiate_job_script(script: &Path, index: u64) -> io::Result<()> {
    let content = fs::read_to_string(script)?;
    fs::write(
        script,
        content.replace(JOB_INDEX_PLACEHOLDER, &index.to_string()),
    )
}
