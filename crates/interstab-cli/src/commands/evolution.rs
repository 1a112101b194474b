use super::{diagram_around, resolve_phase};
use crate::cli::EvolutionArgs;
use crate::config::build_config;
use crate::data::DataManager;
use crate::error::Result;
use crate::utils::table;
use interstab::core::hull::reaction::NullSpaceBalancer;
use interstab::workflows::single_phase::{self, ElementProfile};
use tracing::info;

pub fn run(args: EvolutionArgs) -> Result<()> {
    info!("Initializing data manager...");
    let data_manager = DataManager::new()?;
    let profile = run_with(&args, &data_manager)?;
    println!("{}", table::render_element_profile(&profile));
    Ok(())
}

pub fn run_with(args: &EvolutionArgs, data_manager: &DataManager) -> Result<ElementProfile> {
    let app = build_config(&args.system, data_manager)?;
    let source = DataManager::entry_cache(&app.cache_dir, &app.analysis.exclusions);
    let entry = resolve_phase(&args.reactant, args.energy_correction, &source)?;
    let diagram = diagram_around(&entry, Some(&args.open_element), &app, &source)?;

    let profile = single_phase::element_profile(
        &entry,
        &diagram,
        &args.open_element,
        args.allow_positive_mu,
        &NullSpaceBalancer,
    )?;
    if let Some((low, high)) = profile.stability_window() {
        info!(low, high, "Found stability window.");
    }
    Ok(profile)
}
