use crate::core::catalog::{SoluteCatalog, SoluteRecord};
use crate::engine::analysis::{self, EvolutionTable, FlatTable};
use crate::engine::checkpoint;
use crate::engine::config::RunConfig;
use crate::engine::error::CampaignError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::protocol::{self, ProtocolDocument};
use crate::engine::scheduler::{EngineRunner, JobScheduler};
use crate::workflows::workspace::{
    CampaignPaths, instantiate_job_script, stage_job_script, stage_solute_dir,
};
use rand::Rng;
use std::fs;
use std::path::Path;
use tracing::{info, instrument, warn};

const INIT_DOCUMENT: &str = "input-ini";
const INSERTION_DOCUMENT: &str = "input-ins";
const DESTRUCTION_DOCUMENT: &str = "input-des";
const ANALYSIS_DOCUMENT: &str = "input-ana";
const STRUCTURE_DOCUMENT: &str = "input-str";
const ANALYSIS_OUTPUT: &str = "out-ana";

const INIT_SNAPSHOT: &str = "params_ini.json";

/// How the per-solute simulation index is determined for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPolicy {
    /// Use this index for every solute.
    Explicit(u64),
    /// Probe each solute's workspace for its highest existing checkpoint.
    Auto,
}

impl IndexPolicy {
    /// Resolves the index for one solute, probing the workspace at most
    /// once. An undetermined index is a fatal precondition failure; no
    /// encoding may happen after it.
    fn resolve(&self, dir: &Path, solute: &str) -> Result<u64, CampaignError> {
        match self {
            IndexPolicy::Explicit(index) => Ok(*index),
            IndexPolicy::Auto => checkpoint::current_index(dir, solute).ok_or_else(|| {
                CampaignError::UndeterminedIndex {
                    solute: solute.to_string(),
                }
            }),
        }
    }
}

/// Everything a campaign workflow needs: the resolved configuration, the
/// solute batch, the campaign directory layout, and the external
/// collaborators.
pub struct CampaignContext<'a> {
    pub config: &'a RunConfig,
    pub catalog: &'a SoluteCatalog,
    pub paths: CampaignPaths,
    pub scheduler: &'a dyn JobScheduler,
    pub engine: &'a dyn EngineRunner,
    pub reporter: &'a ProgressReporter<'a>,
    /// When false, documents are staged but no job is submitted.
    pub launch: bool,
}

/// Outcome of one campaign pass. Failed solutes are carried here rather than
/// aborting the batch.
#[derive(Debug, Default)]
pub struct CampaignSummary {
    pub encoded: usize,
    pub submitted: usize,
    pub failed: Vec<(String, CampaignError)>,
}

fn surface_warnings(ctx: &CampaignContext, solute: &str, phase: &'static str, doc: &ProtocolDocument) {
    for warning in doc.warnings() {
        warn!(solute, phase, %warning, "encode warning");
    }
    ctx.reporter.report(Progress::DocumentEncoded {
        phase,
        warnings: doc.warnings().len(),
    });
}

fn submit(ctx: &CampaignContext, solute: &str, dir: &Path, script: &str) -> Result<(), CampaignError> {
    stage_job_script(&ctx.paths, solute, script)?;
    ctx.scheduler.submit(dir, script)?;
    ctx.reporter.report(Progress::JobSubmitted {
        scheduler: ctx.scheduler.name(),
    });
    Ok(())
}

fn for_each_solute(
    ctx: &CampaignContext,
    mut body: impl FnMut(&SoluteRecord) -> Result<bool, CampaignError>,
) -> CampaignSummary {
    let mut summary = CampaignSummary::default();
    ctx.reporter.report(Progress::CampaignStart {
        total_solutes: ctx.catalog.len() as u64,
    });

    for solute in ctx.catalog.iter() {
        ctx.reporter.report(Progress::SoluteStart {
            name: solute.name.clone(),
        });
        match body(solute) {
            Ok(submitted) => {
                summary.encoded += 1;
                if submitted {
                    summary.submitted += 1;
                }
            }
            Err(e) => {
                warn!(solute = %solute.name, error = %e, "solute failed, continuing batch");
                summary.failed.push((solute.name.clone(), e));
            }
        }
        ctx.reporter.report(Progress::SoluteFinish);
    }

    ctx.reporter.report(Progress::CampaignFinish);
    summary
}

/// Stages every solute's workspace, encodes the initialisation document, and
/// submits the initialisation job.
///
/// The resolved configuration is persisted as `params_ini.json` at the
/// campaign root before any workspace is touched.
#[instrument(skip_all, name = "initialisation_campaign")]
pub fn initialise(
    ctx: &CampaignContext,
    rng: &mut impl Rng,
) -> Result<CampaignSummary, CampaignError> {
    ctx.config
        .save_snapshot(&ctx.paths.root().join(INIT_SNAPSHOT))?;
    info!(solutes = ctx.catalog.len(), "starting initialisation campaign");

    let reference = (!ctx.config.reference.create_box).then_some(ctx.config.reference.name.as_str());

    Ok(for_each_solute(ctx, |solute| {
        let dir = stage_solute_dir(&ctx.paths, &solute.name, reference)?;

        let doc = protocol::encode_init(ctx.config, solute, &dir, rng);
        surface_warnings(ctx, &solute.name, "init", &doc);
        doc.write_to_file(&dir.join(INIT_DOCUMENT))?;

        if ctx.launch {
            submit(ctx, &solute.name, &dir, "job-ini")?;
        }
        Ok(ctx.launch)
    }))
}

/// Encodes and submits one insertion and one destruction run per solute.
///
/// The simulation index is resolved once per solute and reused for both
/// phases; the two runs of one solute are only ever chained by the engine,
/// never submitted against each other.
#[instrument(skip_all, name = "production_campaign")]
pub fn produce(
    ctx: &CampaignContext,
    index_policy: IndexPolicy,
    rng: &mut impl Rng,
) -> Result<CampaignSummary, CampaignError> {
    info!(solutes = ctx.catalog.len(), "starting production campaign");
    let mut last_index = None;

    let summary = for_each_solute(ctx, |solute| {
        let dir = ctx.paths.solute_dir(&solute.name);
        let index = index_policy.resolve(&dir, &solute.name)?;
        last_index = Some(index);

        let ins = protocol::encode_insertion(ctx.config, solute, &dir, index, rng)?;
        surface_warnings(ctx, &solute.name, "insertion", &ins);
        ins.write_to_file(&dir.join(INSERTION_DOCUMENT))?;

        let des = protocol::encode_destruction(ctx.config, solute, &dir, index, rng)?;
        surface_warnings(ctx, &solute.name, "destruction", &des);
        des.write_to_file(&dir.join(DESTRUCTION_DOCUMENT))?;

        if ctx.launch {
            for script in ["job-ins", "job-des"] {
                let staged = stage_job_script(&ctx.paths, &solute.name, script)?;
                instantiate_job_script(&staged, index + 1)?;
                ctx.scheduler.submit(&dir, script)?;
            }
            ctx.reporter.report(Progress::JobSubmitted {
                scheduler: ctx.scheduler.name(),
            });
        }
        Ok(ctx.launch)
    });

    if let Some(index) = last_index {
        ctx.config
            .save_snapshot(&ctx.paths.root().join(format!("params_run_{}.json", index + 1)))?;
    }
    Ok(summary)
}

fn analyse_one(
    ctx: &CampaignContext,
    solute: &SoluteRecord,
    dir: &Path,
    index: u64,
    dump_distributions: bool,
) -> Result<analysis::AnalysisResult, CampaignError> {
    let doc = protocol::encode_analysis(solute, dir, index, dump_distributions);
    surface_warnings(ctx, &solute.name, "analysis", &doc);
    doc.write_to_file(&dir.join(ANALYSIS_DOCUMENT))?;

    ctx.engine.run(dir, ANALYSIS_DOCUMENT, ANALYSIS_OUTPUT)?;
    let output = fs::read_to_string(dir.join(ANALYSIS_OUTPUT))?;
    Ok(analysis::parse_engine_output(&output)?)
}

/// Runs the analysis phase for every solute at one snapshot index and
/// tabulates the estimates.
///
/// Unparsable engine output for one solute yields an empty row, not an
/// aborted pass. The table is persisted as `HFE-{accumulations}.csv` at the
/// campaign root.
#[instrument(skip_all, name = "analysis_campaign")]
pub fn analyse(
    ctx: &CampaignContext,
    index_policy: IndexPolicy,
    dump_distributions: bool,
) -> Result<FlatTable, CampaignError> {
    info!(solutes = ctx.catalog.len(), "starting analysis campaign");
    let mut table = FlatTable::new();

    for_each_solute(ctx, |solute| {
        let dir = ctx.paths.solute_dir(&solute.name);
        let index = index_policy.resolve(&dir, &solute.name)?;

        match analyse_one(ctx, solute, &dir, index, dump_distributions) {
            Ok(result) => table.push(&solute.name, Some(result)),
            Err(e) => {
                warn!(solute = %solute.name, error = %e, "analysis failed, row left empty");
                table.push(&solute.name, None);
            }
        }
        Ok(false)
    });

    if let Some(accumulations) = table.accumulations() {
        let path = ctx.paths.root().join(format!("HFE-{accumulations}.csv"));
        let mut file = fs::File::create(&path)?;
        table.write_tsv(&mut file)?;
        info!(path = %path.display(), "analysis table written");
    }
    Ok(table)
}

/// Runs the analysis phase for every snapshot index from 1 up to the
/// resolved index, producing the evolution of the estimates over
/// accumulation counts.
///
/// The maximum index is resolved once, against the first solute's workspace,
/// and persisted as `HFE_evol.csv` plus its JSON mirror.
#[instrument(skip_all, name = "analysis_evolution_campaign")]
pub fn analyse_evolution(
    ctx: &CampaignContext,
    index_policy: IndexPolicy,
    dump_distributions: bool,
) -> Result<EvolutionTable, CampaignError> {
    let first = ctx
        .catalog
        .iter()
        .next()
        .ok_or_else(|| CampaignError::UndeterminedIndex {
            solute: "<empty catalog>".to_string(),
        })?;
    let max_index = index_policy.resolve(&ctx.paths.solute_dir(&first.name), &first.name)?;
    info!(
        solutes = ctx.catalog.len(),
        max_index, "starting evolution analysis campaign"
    );

    let mut table = EvolutionTable::new();
    for_each_solute(ctx, |solute| {
        let dir = ctx.paths.solute_dir(&solute.name);
        for index in 1..=max_index {
            match analyse_one(ctx, solute, &dir, index, dump_distributions) {
                Ok(result) => table.insert(&solute.name, result),
                Err(e) => {
                    warn!(solute = %solute.name, index, error = %e, "snapshot skipped");
                }
            }
        }
        Ok(false)
    });

    let mut csv = fs::File::create(ctx.paths.root().join("HFE_evol.csv"))?;
    table.write_tsv(&mut csv)?;
    let mut json = fs::File::create(ctx.paths.root().join("HFE_evol.json"))?;
    table.write_json(&mut json)?;
    Ok(table)
}

/// Structure-workflow variant of [`initialise`]: equilibrates each solute's
/// box and writes the `{solute}_s0` checkpoint.
#[instrument(skip_all, name = "structure_initialisation_campaign")]
pub fn initialise_structure(
    ctx: &CampaignContext,
    rng: &mut impl Rng,
) -> Result<CampaignSummary, CampaignError> {
    ctx.config
        .save_snapshot(&ctx.paths.root().join(INIT_SNAPSHOT))?;
    info!(
        solutes = ctx.catalog.len(),
        "starting structure initialisation campaign"
    );

    let reference = (!ctx.config.reference.create_box).then_some(ctx.config.reference.name.as_str());

    Ok(for_each_solute(ctx, |solute| {
        let dir = stage_solute_dir(&ctx.paths, &solute.name, reference)?;

        let doc = protocol::encode_structure_init(ctx.config, solute, &dir, rng)?;
        surface_warnings(ctx, &solute.name, "structure-init", &doc);
        doc.write_to_file(&dir.join(INIT_DOCUMENT))?;

        if ctx.launch {
            submit(ctx, &solute.name, &dir, "job-ini")?;
        }
        Ok(ctx.launch)
    }))
}

/// Structure-workflow variant of [`produce`], accumulating over the `s`
/// checkpoint tag.
#[instrument(skip_all, name = "structure_accumulation_campaign")]
pub fn accumulate_structure(
    ctx: &CampaignContext,
    index_policy: IndexPolicy,
    rng: &mut impl Rng,
) -> Result<CampaignSummary, CampaignError> {
    info!(
        solutes = ctx.catalog.len(),
        "starting structure accumulation campaign"
    );
    let mut last_index = None;

    let summary = for_each_solute(ctx, |solute| {
        let dir = ctx.paths.solute_dir(&solute.name);
        let index = index_policy.resolve(&dir, &solute.name)?;
        last_index = Some(index);

        let doc = protocol::encode_structure_accumulation(ctx.config, solute, &dir, index, rng)?;
        surface_warnings(ctx, &solute.name, "structure", &doc);
        doc.write_to_file(&dir.join(STRUCTURE_DOCUMENT))?;

        if ctx.launch {
            let staged = stage_job_script(&ctx.paths, &solute.name, "job-str")?;
            instantiate_job_script(&staged, index + 1)?;
            ctx.scheduler.submit(&dir, "job-str")?;
            ctx.reporter.report(Progress::JobSubmitted {
                scheduler: ctx.scheduler.name(),
            });
        }
        Ok(ctx.launch)
    });

    if let Some(index) = last_index {
        ctx.config
            .save_snapshot(&ctx.paths.root().join(format!("params_run_{}.json", index + 1)))?;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{FlexibilityMode, ProductionOverrides, RunOverrides};
    use crate::engine::scheduler::{LocalEngine, NoLaunch, SchedulerError};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn seeded_campaign(root: &Path, solutes: &[&str]) -> (CampaignPaths, SoluteCatalog) {
        let paths = CampaignPaths::new(root);
        fs::create_dir_all(paths.input_dir()).unwrap();
        fs::create_dir_all(paths.structures_dir()).unwrap();
        for file in ["h4dmc.x", "dummy.in", "dummy.top"] {
            File::create(paths.input_dir().join(file)).unwrap();
        }

        let mut catalog_file = File::create(root.join("solutes.csv")).unwrap();
        writeln!(catalog_file, "Name\tV0\tmu0").unwrap();
        for solute in solutes {
            File::create(paths.structures_dir().join(format!("{solute}.in"))).unwrap();
            writeln!(catalog_file, "{solute}\t0.05\t-2.0").unwrap();
        }
        let catalog = SoluteCatalog::load(&root.join("solutes.csv")).unwrap();
        (paths, catalog)
    }

    fn rigid_config(create_box: bool) -> RunConfig {
        RunConfig::resolve(
            &RunOverrides {
                create_box: Some(create_box),
                ..Default::default()
            },
            None,
        )
        .unwrap()
        .with_production(&ProductionOverrides::default(), FlexibilityMode::Rigid, None)
    }

    #[test]
    fn initialise_stages_and_encodes_every_solute() {
        let root = tempdir().unwrap();
        let (paths, catalog) = seeded_campaign(root.path(), &["methane", "ethanol"]);
        let config = rigid_config(true);
        let reporter = ProgressReporter::new();
        let ctx = CampaignContext {
            config: &config,
            catalog: &catalog,
            paths,
            scheduler: &NoLaunch,
            engine: &LocalEngine::default(),
            reporter: &reporter,
            launch: false,
        };

        let summary = initialise(&ctx, &mut StdRng::seed_from_u64(11)).unwrap();

        assert_eq!(summary.encoded, 2);
        assert_eq!(summary.submitted, 0);
        assert!(summary.failed.is_empty());
        assert!(root.path().join("methane").join("input-ini").is_file());
        assert!(root.path().join("ethanol").join("input-ini").is_file());
        assert!(root.path().join("params_ini.json").is_file());
    }

    #[test]
    fn initialise_isolates_per_solute_failures() {
        let root = tempdir().unwrap();
        let (paths, _) = seeded_campaign(root.path(), &["methane"]);
        // "ghost" has no structure file, so its staging must fail.
        let mut catalog_file = File::create(root.path().join("mixed.csv")).unwrap();
        writeln!(catalog_file, "Name\tV0\tmu0").unwrap();
        writeln!(catalog_file, "ghost\t0.1\t-1.0").unwrap();
        writeln!(catalog_file, "methane\t0.05\t-2.0").unwrap();
        let catalog = SoluteCatalog::load(&root.path().join("mixed.csv")).unwrap();

        let config = rigid_config(true);
        let reporter = ProgressReporter::new();
        let ctx = CampaignContext {
            config: &config,
            catalog: &catalog,
            paths,
            scheduler: &NoLaunch,
            engine: &LocalEngine::default(),
            reporter: &reporter,
            launch: false,
        };

        let summary = initialise(&ctx, &mut StdRng::seed_from_u64(11)).unwrap();

        assert_eq!(summary.encoded, 1);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "ghost");
        assert!(root.path().join("methane").join("input-ini").is_file());
    }

    #[test]
    fn produce_resolves_index_once_and_writes_both_documents() {
        let root = tempdir().unwrap();
        let (paths, catalog) = seeded_campaign(root.path(), &["methane"]);
        let dir = paths.solute_dir("methane");
        fs::create_dir_all(&dir).unwrap();
        File::create(dir.join("acc_methane_des0")).unwrap();
        File::create(dir.join("acc_methane_des1")).unwrap();

        let config = rigid_config(false);
        let reporter = ProgressReporter::new();
        let ctx = CampaignContext {
            config: &config,
            catalog: &catalog,
            paths,
            scheduler: &NoLaunch,
            engine: &LocalEngine::default(),
            reporter: &reporter,
            launch: false,
        };

        let summary = produce(&ctx, IndexPolicy::Auto, &mut StdRng::seed_from_u64(3)).unwrap();

        assert_eq!(summary.encoded, 1);
        let ins = fs::read_to_string(dir.join("input-ins")).unwrap();
        let des = fs::read_to_string(dir.join("input-des")).unwrap();
        assert!(ins.ends_with("methane_ins2"));
        assert!(des.ends_with("methane_des2"));
        assert!(root.path().join("params_run_2.json").is_file());
    }

    #[test]
    fn produce_fails_fast_on_undetermined_index() {
        let root = tempdir().unwrap();
        let (paths, catalog) = seeded_campaign(root.path(), &["methane"]);
        fs::create_dir_all(paths.solute_dir("methane")).unwrap();

        let config = rigid_config(false);
        let reporter = ProgressReporter::new();
        let ctx = CampaignContext {
            config: &config,
            catalog: &catalog,
            paths,
            scheduler: &NoLaunch,
            engine: &LocalEngine::default(),
            reporter: &reporter,
            launch: false,
        };

        let summary = produce(&ctx, IndexPolicy::Auto, &mut StdRng::seed_from_u64(3)).unwrap();

        // No checkpoints exist: the solute fails before anything is encoded.
        assert_eq!(summary.encoded, 0);
        assert!(matches!(
            summary.failed[0].1,
            CampaignError::UndeterminedIndex { .. }
        ));
        assert!(!paths_contains(&ctx.paths.solute_dir("methane"), "input-ins"));
    }

    fn paths_contains(dir: &Path, name: &str) -> bool {
        dir.join(name).exists()
    }

    struct FakeEngine {
        output: String,
    }

    impl EngineRunner for FakeEngine {
        fn run(
            &self,
            workdir: &Path,
            _input_file: &str,
            output_file: &str,
        ) -> Result<(), SchedulerError> {
            fs::write(workdir.join(output_file), &self.output).map_err(|e| SchedulerError::Io {
                program: "fake".to_string(),
                source: e,
            })
        }
    }

    fn fake_engine_output(nacc: u64, estimate: f64, err: f64) -> String {
        let mut text = format!("Nombre d'accumulations {nacc}\nBAR estimator\n");
        for _ in 0..8 {
            text.push_str("...\n");
        }
        text.push_str(&format!("BAR {estimate} {err}\n"));
        text
    }

    #[test]
    fn analyse_tabulates_results_and_writes_table() {
        let root = tempdir().unwrap();
        let (paths, catalog) = seeded_campaign(root.path(), &["methane", "ethanol"]);
        for solute in ["methane", "ethanol"] {
            let dir = paths.solute_dir(solute);
            fs::create_dir_all(&dir).unwrap();
            File::create(dir.join(format!("acc_{solute}_ins1"))).unwrap();
            File::create(dir.join(format!("acc_{solute}_des1"))).unwrap();
        }

        let config = rigid_config(false);
        let reporter = ProgressReporter::new();
        let engine = FakeEngine {
            output: fake_engine_output(500, 1.234, 0.056),
        };
        let ctx = CampaignContext {
            config: &config,
            catalog: &catalog,
            paths,
            scheduler: &NoLaunch,
            engine: &engine,
            reporter: &reporter,
            launch: false,
        };

        let table = analyse(&ctx, IndexPolicy::Explicit(1), false).unwrap();

        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.accumulations(), Some(500));
        let written = fs::read_to_string(root.path().join("HFE-500.csv")).unwrap();
        assert!(written.starts_with("Name\t HFE\t err\n"));
        assert!(written.contains("methane\t 1.234\t 0.056"));
    }

    #[test]
    fn analyse_keeps_going_when_one_solute_output_is_unparsable() {
        let root = tempdir().unwrap();
        let (paths, catalog) = seeded_campaign(root.path(), &["methane"]);
        fs::create_dir_all(paths.solute_dir("methane")).unwrap();

        let config = rigid_config(false);
        let reporter = ProgressReporter::new();
        let engine = FakeEngine {
            output: "no markers here\n".to_string(),
        };
        let ctx = CampaignContext {
            config: &config,
            catalog: &catalog,
            paths,
            scheduler: &NoLaunch,
            engine: &engine,
            reporter: &reporter,
            launch: false,
        };

        let table = analyse(&ctx, IndexPolicy::Explicit(1), false).unwrap();

        assert_eq!(table.rows().len(), 1);
        assert!(table.rows()[0].result.is_none());
    }

    #[test]
    fn analyse_evolution_collects_each_snapshot() {
        let root = tempdir().unwrap();
        let (paths, catalog) = seeded_campaign(root.path(), &["methane"]);
        let dir = paths.solute_dir("methane");
        fs::create_dir_all(&dir).unwrap();
        for i in 0..=2 {
            File::create(dir.join(format!("acc_methane_des{i}"))).unwrap();
        }

        let config = rigid_config(false);
        let reporter = ProgressReporter::new();
        let engine = FakeEngine {
            output: fake_engine_output(500, -1.5, 0.1),
        };
        let ctx = CampaignContext {
            config: &config,
            catalog: &catalog,
            paths,
            scheduler: &NoLaunch,
            engine: &engine,
            reporter: &reporter,
            launch: false,
        };

        let table = analyse_evolution(&ctx, IndexPolicy::Auto, false).unwrap();

        // The fake engine reports the same count for every snapshot, so the
        // table holds one column pair.
        assert_eq!(table.snapshot_counts().collect::<Vec<_>>(), vec![500]);
        assert!(root.path().join("HFE_evol.csv").is_file());
        assert!(root.path().join("HFE_evol.json").is_file());
    }
}
