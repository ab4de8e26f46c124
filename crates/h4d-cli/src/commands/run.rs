use crate::cli::RunArgs;
use crate::commands::{load_base, make_rng, make_scheduler, report_summary};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use h4d::core::catalog::SoluteCatalog;
use h4d::engine::config::RunConfig;
use h4d::engine::progress::ProgressReporter;
use h4d::engine::scheduler::LocalEngine;
use h4d::workflows::campaign::{self, CampaignContext};
use h4d::workflows::workspace::CampaignPaths;
use tracing::info;

pub fn run(args: RunArgs) -> Result<()> {
    let base = load_base(args.campaign.load_params.as_deref())?;
    let config = RunConfig::resolve(&args.box_params.to_overrides()?, base.as_ref())?
        .with_production(
            &args.production.to_overrides()?,
            args.production.mode(),
            base.as_ref(),
        );
    let catalog = SoluteCatalog::load(&args.campaign.solutes)?;
    info!(
        solutes = catalog.len(),
        mode = ?args.production.mode(),
        "starting production campaign"
    );

    let scheduler = make_scheduler(args.scheduler.scheduler);
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let ctx = CampaignContext {
        config: &config,
        catalog: &catalog,
        paths: CampaignPaths::new(&args.campaign.root),
        scheduler: scheduler.as_ref(),
        engine: &LocalEngine::default(),
        reporter: &reporter,
        launch: !args.scheduler.no_launch,
    };

    let mut rng = make_rng(args.campaign.seed);
    let summary = campaign::produce(&ctx, args.index.policy(), &mut rng)?;
    report_summary("production", &summary)
}
