pub mod data;
pub mod decompose;
pub mod evolution;
pub mod gppd;
pub mod pd;
pub mod scan;

use crate::cli::PairArgs;
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::utils::parser::{self, PhaseSpec};
use interstab::core::hull::phase_diagram::PhaseDiagram;
use interstab::core::io::traits::EntrySource;
use interstab::core::models::entry::Entry;
use interstab::engine::cancel::CancellationToken;
use interstab::engine::error::EngineError;
use interstab::workflows::pseudo_binary::PseudoBinary;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Builds the entry named by `spec`, shifted by `energy_correction` eV/atom.
///
/// A bare composition is placed on the convex hull of its own chemical system.
pub fn resolve_phase<S: EntrySource + ?Sized>(
    spec: &str,
    energy_correction: f64,
    source: &S,
) -> Result<Entry> {
    let mut entry = match parser::parse_phase(spec)? {
        PhaseSpec::WithEnergy(composition, energy) => Entry::new(composition, energy),
        PhaseSpec::OnHull(composition) => {
            let chemsys = composition.chemical_system();
            let entries = source.entries(&chemsys).map_err(EngineError::from)?;
            let diagram = PhaseDiagram::new(entries).map_err(EngineError::from)?;
            let mut entry = Entry::new(composition, 0.0);
            entry.stabilize(&diagram).map_err(EngineError::from)?;
            debug!(name = entry.name(), energy = entry.total_energy(), "Placed phase on the hull.");
            entry
        }
    };
    entry.apply_energy_correction(energy_correction);
    Ok(entry)
}

/// Phase diagram of the chemical system of `entry`, widened by the configured extra elements
/// and `open_element`, without the configured exclusions.
pub fn diagram_around<S: EntrySource + ?Sized>(
    entry: &Entry,
    open_element: Option<&str>,
    app: &AppConfig,
    source: &S,
) -> Result<PhaseDiagram> {
    let chemsys: Vec<String> = entry
        .composition()
        .chemical_system()
        .into_iter()
        .chain(app.analysis.extra_elements.iter().cloned())
        .chain(open_element.map(str::to_string))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let mut entries = source.entries(&chemsys).map_err(EngineError::from)?;
    entries.retain(|e| !app.analysis.exclusions.iter().any(|name| name == e.name()));
    let diagram = PhaseDiagram::new(entries).map_err(EngineError::from)?;
    info!(chemsys = %chemsys.join("-"), "Built phase diagram of the composition.");
    Ok(diagram)
}

/// Resolves both phases and sets up the pseudo-binary over `source`.
pub fn setup_pseudo_binary<'s, S: EntrySource + ?Sized>(
    pair: &PairArgs,
    source: &'s S,
    app: &AppConfig,
) -> Result<PseudoBinary<'s, S>> {
    let entry1 = resolve_phase(&pair.reactant1, pair.energy_correction1, source)?;
    let entry2 = resolve_phase(&pair.reactant2, pair.energy_correction2, source)?;

    println!(
        "{}\nThe starting phases compositions are {} and {}",
        "-".repeat(100),
        entry1.name(),
        entry2.name()
    );
    println!("All mixing ratios are based on formulas normalized to ONE atom per formula unit.");

    info!("Building the phase diagram of the pseudo-binary...");
    let mut analysis = PseudoBinary::new(&entry1, &entry2, source, app.analysis.clone())?;
    if let Some(token) = cancellation(app) {
        analysis = analysis.with_cancellation(token);
    }
    Ok(analysis)
}

pub fn cancellation(app: &AppConfig) -> Option<CancellationToken> {
    app.timeout
        .map(|timeout| CancellationToken::new().with_timeout(timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use interstab::core::models::entry_set::EntrySet;

    fn li_o() -> EntrySet {
        [("Li", -2.0), ("O2", -9.0), ("Li2O", -15.0), ("Li2O2", -18.0)]
            .into_iter()
            .map(|(formula, energy)| Entry::new(formula.parse().unwrap(), energy))
            .collect()
    }

    #[test]
    fn bare_composition_is_placed_just_below_the_hull() {
        let entry = resolve_phase("Li2O2", 0.0, &li_o()).unwrap();
        // Per atom the hull at x_O = 1/2 is 3/4 Li2O (-5 eV) and 1/4 O2 (-4.5 eV).
        assert!((entry.total_energy() / 4.0 + 4.875).abs() < 1e-7);
        assert_eq!(entry.name(), "Li2O2");
    }

    #[test]
    fn energy_correction_is_applied_per_atom() {
        let entry = resolve_phase("Li2O@-15.0", 0.1, &li_o()).unwrap();
        assert!((entry.total_energy() + 14.7).abs() < 1e-12);
    }

    #[test]
    fn malformed_phase_is_rejected() {
        assert!(matches!(
            resolve_phase("Li2O@x", 0.0, &li_o()),
            Err(CliError::Phase(parser::ParseError::InvalidEnergy { .. }))
        ));
    }

    #[test]
    fn composition_outside_the_source_is_reported() {
        assert!(matches!(
            resolve_phase("LiCl", 0.0, &li_o()),
            Err(CliError::InterStabCore(_))
        ));
    }
}
