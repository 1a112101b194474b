use super::setup_pseudo_binary;
use crate::cli::PdArgs;
use crate::config::build_config;
use crate::data::DataManager;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use crate::utils::table;
use interstab::engine::progress::ProgressReporter;
use tracing::info;

pub fn run(args: PdArgs) -> Result<()> {
    info!("Initializing data manager...");
    let data_manager = DataManager::new()?;
    run_with(&args, &data_manager)
}

pub fn run_with(args: &PdArgs, data_manager: &DataManager) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app = build_config(&args.system, data_manager)?;
    let source = DataManager::entry_cache(&app.cache_dir, &app.analysis.exclusions);
    let analysis = setup_pseudo_binary(&args.pair, &source, &app)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the closed-system mixing workflow...");
    let profile = analysis.closed_mixing(&reporter)?;
    let rows = analysis.rows(&profile);
    let (name1, name2) = (analysis.entry1().name(), analysis.entry2().name());

    println!(
        "{}",
        table::render_profile("Pseudo-binary evolution profile", name1, name2, &rows)
    );

    if let Some(output) = &args.output {
        table::write_profile_csv(output, name1, name2, &rows)?;
        println!("✓ Profile written to: {}", output.display());
    }
    Ok(())
}
