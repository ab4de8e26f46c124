use crate::cli::AnalyzeArgs;
use crate::commands::load_base;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use h4d::core::catalog::SoluteCatalog;
use h4d::engine::config::{RunConfig, RunOverrides};
use h4d::engine::progress::ProgressReporter;
use h4d::engine::scheduler::{LocalEngine, NoLaunch};
use h4d::workflows::campaign::{self, CampaignContext};
use h4d::workflows::workspace::CampaignPaths;
use std::io;
use tracing::info;

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let base = load_base(args.campaign.load_params.as_deref())?;
    let config = RunConfig::resolve(&RunOverrides::default(), base.as_ref())?;
    let catalog = SoluteCatalog::load(&args.campaign.solutes)?;
    info!(solutes = catalog.len(), evol = args.evol, "starting analysis");

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let ctx = CampaignContext {
        config: &config,
        catalog: &catalog,
        paths: CampaignPaths::new(&args.campaign.root),
        scheduler: &NoLaunch,
        engine: &LocalEngine::default(),
        reporter: &reporter,
        launch: false,
    };

    let mut stdout = io::stdout();
    if args.evol {
        let table = campaign::analyse_evolution(&ctx, args.index.policy(), args.pid)?;
        table.write_tsv(&mut stdout)?;
    } else {
        let table = campaign::analyse(&ctx, args.index.policy(), args.pid)?;
        table.write_tsv(&mut stdout)?;
    }
    Ok(())
}
