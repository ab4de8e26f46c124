pub mod analyze;
pub mod init;
pub mod run;
pub mod structure;

use crate::cli::SchedulerKind;
use crate::error::Result;
use anyhow::anyhow;
use h4d::engine::config::RunConfig;
use h4d::engine::scheduler::{JobScheduler, LoadLeveler, NoLaunch, Slurm};
use h4d::workflows::campaign::CampaignSummary;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;
use tracing::info;

pub(crate) fn load_base(path: Option<&Path>) -> Result<Option<RunConfig>> {
    let Some(path) = path else {
        return Ok(None);
    };
    info!(path = %path.display(), "loading parameter snapshot");
    Ok(Some(RunConfig::load_snapshot(path)?))
}

pub(crate) fn make_scheduler(kind: SchedulerKind) -> Box<dyn JobScheduler> {
    match kind {
        SchedulerKind::Slurm => Box::new(Slurm),
        SchedulerKind::Loadleveler => Box::new(LoadLeveler),
        SchedulerKind::None => Box::new(NoLaunch),
    }
}

pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

pub(crate) fn report_summary(phase: &str, summary: &CampaignSummary) -> Result<()> {
    for (solute, error) in &summary.failed {
        eprintln!("  ✗ {solute}: {error}");
    }

    if summary.failed.is_empty() {
        println!(
            "✓ {phase}: {} solute(s) encoded, {} job(s) submitted.",
            summary.encoded, summary.submitted
        );
        Ok(())
    } else if summary.encoded > 0 {
        println!(
            "⚠ {phase}: {} solute(s) encoded, {} failed.",
            summary.encoded,
            summary.failed.len()
        );
        Ok(())
    } else {
        Err(anyhow!("{phase} failed for every solute").into())
    }
}
