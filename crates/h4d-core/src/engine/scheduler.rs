//! The seam between the campaign driver and the outside world: cluster job
//! submission and synchronous local engine invocation.
//!
//! Submission is fire-and-forget: the driver hands a job script to the
//! scheduler and moves on to the next solute without waiting for completion.
//! Only the analysis workflow runs the engine synchronously, because it needs
//! the textual output back immediately.

use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, info};

/// Name of the engine executable staged into each solute workspace.
pub const ENGINE_BINARY: &str = "h4dmc.x";

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Failed to invoke '{program}': {source}")]
    Io { program: String, source: io::Error },
    #[error("'{program}' exited with {status}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
    },
}

/// Submits a prepared job script from within a solute workspace.
pub trait JobScheduler {
    fn submit(&self, workdir: &Path, script: &str) -> Result<(), SchedulerError>;
    fn name(&self) -> &'static str;
}

/// slurm submission via `sbatch`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Slurm;

/// IBM LoadLeveler submission via `llsubmit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadLeveler;

/// Stages everything but submits nothing; used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLaunch;

fn run_submit(program: &str, workdir: &Path, script: &str) -> Result<(), SchedulerError> {
    let status = Command::new(program)
        .arg(script)
        .current_dir(workdir)
        .status()
        .map_err(|e| SchedulerError::Io {
            program: program.to_string(),
            source: e,
        })?;
    if !status.success() {
        return Err(SchedulerError::Failed {
            program: program.to_string(),
            status,
        });
    }
    info!(program, script, workdir = %workdir.display(), "job submitted");
    Ok(())
}

impl JobScheduler for Slurm {
    fn submit(&self, workdir: &Path, script: &str) -> Result<(), SchedulerError> {
        run_submit("sbatch", workdir, script)
    }

    fn name(&self) -> &'static str {
        "slurm"
    }
}

impl JobScheduler for LoadLeveler {
    fn submit(&self, workdir: &Path, script: &str) -> Result<(), SchedulerError> {
        run_submit("llsubmit", workdir, script)
    }

    fn name(&self) -> &'static str {
        "loadleveler"
    }
}

impl JobScheduler for NoLaunch {
    fn submit(&self, workdir: &Path, script: &str) -> Result<(), SchedulerError> {
        debug!(script, workdir = %workdir.display(), "submission skipped");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Runs the engine synchronously inside a workspace, wiring a protocol
/// document file to its standard input and capturing standard output.
pub trait EngineRunner {
    fn run(&self, workdir: &Path, input_file: &str, output_file: &str)
    -> Result<(), SchedulerError>;
}

/// Invokes the engine binary staged in the workspace directory.
#[derive(Debug, Clone)]
pub struct LocalEngine {
    pub binary: String,
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self {
            binary: ENGINE_BINARY.to_string(),
        }
    }
}

impl EngineRunner for LocalEngine {
    fn run(
        &self,
        workdir: &Path,
        input_file: &str,
        output_file: &str,
    ) -> Result<(), SchedulerError> {
        let program = workdir.join(&self.binary);
        let stdin = File::open(workdir.join(input_file)).map_err(|e| SchedulerError::Io {
            program: self.binary.clone(),
            source: e,
        })?;
        let stdout = File::create(workdir.join(output_file)).map_err(|e| SchedulerError::Io {
            program: self.binary.clone(),
            source: e,
        })?;

        let status = Command::new(&program)
            .current_dir(workdir)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .status()
            .map_err(|e| SchedulerError::Io {
                program: program.to_string_lossy().to_string(),
                source: e,
            })?;
        if !status.success() {
            return Err(SchedulerError::Failed {
                program: program.to_string_lossy().to_string(),
                status,
            });
        }
        debug!(input_file, output_file, "engine run finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn no_launch_always_succeeds() {
        let dir = tempdir().unwrap();
        NoLaunch.submit(dir.path(), "job-ins").unwrap();
        assert_eq!(NoLaunch.name(), "none");
    }

    #[test]
    fn local_engine_fails_cleanly_when_input_is_missing() {
        let dir = tempdir().unwrap();
        let runner = LocalEngine::default();

        let err = runner.run(dir.path(), "input-ana", "out-ana").unwrap_err();
        assert!(matches!(err, SchedulerError::Io { .. }));
    }
}
