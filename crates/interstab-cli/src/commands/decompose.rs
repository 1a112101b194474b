use super::{diagram_around, resolve_phase};
use crate::cli::DecomposeArgs;
use crate::config::build_config;
use crate::data::DataManager;
use crate::error::Result;
use crate::utils::table;
use interstab::core::hull::reaction::NullSpaceBalancer;
use interstab::workflows::single_phase::{self, PhaseEquilibrium};
use tracing::info;

pub fn run(args: DecomposeArgs) -> Result<()> {
    info!("Initializing data manager...");
    let data_manager = DataManager::new()?;
    let equilibrium = run_with(&args, &data_manager)?;
    let open = args.open_element.as_deref().zip(args.mu);
    println!("{}", table::render_equilibrium(&equilibrium, open));
    Ok(())
}

pub fn run_with(args: &DecomposeArgs, data_manager: &DataManager) -> Result<PhaseEquilibrium> {
    let app = build_config(&args.system, data_manager)?;
    let source = DataManager::entry_cache(&app.cache_dir, &app.analysis.exclusions);
    let entry = resolve_phase(&args.reactant, args.energy_correction, &source)?;
    let diagram = diagram_around(&entry, args.open_element.as_deref(), &app, &source)?;

    let equilibrium = match (&args.open_element, args.mu) {
        (Some(element), Some(mu)) => {
            single_phase::open_decompose(&entry, &diagram, element, mu, &NullSpaceBalancer)?
        }
        _ => single_phase::decompose(&entry, &diagram, &NullSpaceBalancer)?,
    };
    Ok(equilibrium)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SystemArgs;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn li_o_cache() -> (TempDir, DataManager) {
        let cache = tempdir().unwrap();
        fs::write(
            cache.path().join("Li_O_Entries.csv"),
            "formula,energy\nLi,-2.0\nO2,-9.0\nLi2O,-15.0\n",
        )
        .unwrap();
        let manager = DataManager::with_custom_path(cache.path().to_path_buf());
        (cache, manager)
    }

    fn args(reactant: &str, open: Option<(&str, f64)>) -> DecomposeArgs {
        DecomposeArgs {
            reactant: reactant.to_string(),
            energy_correction: 0.0,
            open_element: open.map(|(el, _)| el.to_string()),
            mu: open.map(|(_, mu)| mu),
            system: SystemArgs::default(),
        }
    }

    #[test]
    fn peroxide_decomposes_in_the_closed_system() {
        let (_cache, manager) = li_o_cache();
        let result = run_with(&args("Li2O2@-18.0", None), &manager).unwrap();
        assert_eq!(result.phases, vec!["Li2O", "O2"]);
        assert!((result.energy_above_hull - 0.375).abs() < 1e-9);
    }

    #[test]
    fn oxide_is_reduced_at_low_oxygen_potential() {
        let (_cache, manager) = li_o_cache();
        let result = run_with(&args("Li2O@-15.0", Some(("O", -7.25))), &manager).unwrap();
        assert_eq!(result.phases, vec!["Li"]);
        assert!((result.reaction_energy() + 0.75).abs() < 1e-9);
    }

    #[test]
    fn phase_placed_on_the_hull_has_no_driving_force() {
        let (_cache, manager) = li_o_cache();
        let result = run_with(&args("Li2O", None), &manager).unwrap();
        assert_eq!(result.phases, vec!["Li2O"]);
        assert!(result.energy_above_hull.abs() < 1e-6);
    }
}
