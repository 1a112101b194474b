use super::setup_pseudo_binary;
use crate::cli::ScanArgs;
use crate::config::{build_config, build_scan_config};
use crate::data::DataManager;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use crate::utils::table;
use interstab::engine::profile::ScanResult;
use interstab::engine::progress::ProgressReporter;
use tracing::{info, warn};

pub fn run(args: ScanArgs) -> Result<()> {
    info!("Initializing data manager...");
    let data_manager = DataManager::new()?;
    let result = run_with(&args, &data_manager)?;
    println!(
        "{}",
        table::render_scan(&result, &args.pair.reactant1, &args.pair.reactant2)
    );
    Ok(())
}

pub fn run_with(args: &ScanArgs, data_manager: &DataManager) -> Result<ScanResult> {
    let app = build_config(&args.system, data_manager)?;
    let scan_config = build_scan_config(args, &app)?;
    let source = DataManager::entry_cache(&app.cache_dir, &app.analysis.exclusions);
    let analysis = setup_pseudo_binary(&args.pair, &source, &app)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Screening mu_{} from {} to {} eV...",
        scan_config.open_element, scan_config.mu_low, scan_config.mu_high
    );
    let result = analysis.scan(&scan_config, &reporter)?;
    if result.windows.len() == 1 {
        warn!("No phase equilibrium change found in the requested chemical potential range.");
    }
    info!(
        windows = result.windows.len(),
        transitions = result.transitions.len(),
        "Scan finished."
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{PairArgs, SystemArgs};
    use std::fs;
    use tempfile::tempdir;

    fn scan_args(no_merge: bool) -> ScanArgs {
        ScanArgs {
            pair: PairArgs {
                reactant1: "Li2O@-15.0".to_string(),
                reactant2: "Li@-2.0".to_string(),
                energy_correction1: 0.0,
                energy_correction2: 0.0,
            },
            open_element: "O".to_string(),
            mu_low: 1.0,
            mu_high: -8.0,
            no_merge,
            ratio_tolerance: None,
            system: SystemArgs::default(),
        }
    }

    #[test]
    fn scan_splits_at_the_oxide_formation_potential() {
        let cache = tempdir().unwrap();
        fs::write(
            cache.path().join("Li_O_Entries.csv"),
            "formula,energy\nLi,-2.0\nO2,-9.0\nLi2O,-15.0\n",
        )
        .unwrap();
        let manager = DataManager::with_custom_path(cache.path().to_path_buf());

        let result = run_with(&scan_args(false), &manager).unwrap();
        assert_eq!(result.open_element, "O");
        let labels: Vec<&str> = result.windows.iter().map(|w| w.label.as_str()).collect();
        assert_eq!(labels, vec!["Li", "Li2O"]);
        assert!((result.windows[0].mu_high + 6.5).abs() < 1e-9);
        assert_eq!(result.windows[0].mu_low, -8.0);
        assert_eq!(result.windows[1].mu_high, 1.0);
    }
}
