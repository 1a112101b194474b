use super::setup_pseudo_binary;
use crate::cli::GppdArgs;
use crate::config::build_config;
use crate::data::DataManager;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use crate::utils::table;
use interstab::engine::progress::ProgressReporter;
use tracing::info;

pub fn run(args: GppdArgs) -> Result<()> {
    info!("Initializing data manager...");
    let data_manager = DataManager::new()?;
    run_with(&args, &data_manager)
}

pub fn run_with(args: &GppdArgs, data_manager: &DataManager) -> Result<()> {
    let app = build_config(&args.system, data_manager)?;
    let source = DataManager::entry_cache(&app.cache_dir, &app.analysis.exclusions);
    let analysis = setup_pseudo_binary(&args.pair, &source, &app)?;

    println!(
        "Chemical potential is mu_{} = {} eV, using the elemental phase as reference.",
        args.open_element, args.mu
    );

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!(element = %args.open_element, mu = args.mu, "Invoking the open-system mixing workflow...");
    let profile = analysis.open_mixing(&args.open_element, args.mu, &reporter)?;
    let rows = analysis.rows(&profile);
    let (name1, name2) = (analysis.entry1().name(), analysis.entry2().name());

    println!(
        "{}",
        table::render_profile(
            "Pseudo-binary evolution profile in the open system",
            name1,
            name2,
            &rows
        )
    );

    if let Some(output) = &args.output {
        table::write_profile_csv(output, name1, name2, &rows)?;
        println!("✓ Profile written to: {}", output.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{PairArgs, SystemArgs};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn oxide_and_metal_share_one_equilibrium_at_low_oxygen_potential() {
        let cache = tempdir().unwrap();
        fs::write(
            cache.path().join("Li_O_Entries.csv"),
            "formula,energy\nLi,-2.0\nO2,-9.0\nLi2O,-15.0\n",
        )
        .unwrap();
        let out = tempdir().unwrap();
        let csv_path = out.path().join("gppd.csv");
        let args = GppdArgs {
            pair: PairArgs {
                reactant1: "Li2O@-15.0".to_string(),
                reactant2: "Li@-2.0".to_string(),
                energy_correction1: 0.0,
                energy_correction2: 0.0,
            },
            open_element: "O".to_string(),
            mu: -7.25,
            system: SystemArgs::default(),
            output: Some(csv_path.clone()),
        };

        let manager = DataManager::with_custom_path(cache.path().to_path_buf());
        run_with(&args, &manager).unwrap();

        let content = fs::read_to_string(csv_path).unwrap();
        let rows: Vec<&str> = content.lines().skip(1).collect();
        assert!(!rows.is_empty());
        assert!(rows.iter().all(|row| row.split(',').nth(4) == Some("Li")));
    }
}
