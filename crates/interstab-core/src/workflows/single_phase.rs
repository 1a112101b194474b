use crate::core::hull::oracle::{Decomposition, HullOracle, OpenSystemOracle, Phase};
use crate::core::hull::phase_diagram::PhaseDiagram;
use crate::core::hull::reaction::{Reaction, ReactionBalancer, Species};
use crate::core::models::composition::Composition;
use crate::core::models::entry::{ChemPots, Entry};
use crate::core::models::ids::EntryId;
use crate::engine::error::EngineError;
use std::slice;
use tracing::{info, instrument};

/// Lift (eV/atom) of the open element's own entries when potentials above its reference are
/// allowed in an element profile.
const POSITIVE_MU_OFFSET: f64 = 30.0;
/// Element uptake below this magnitude counts as none.
const EVOLUTION_TOLERANCE: f64 = 1e-8;

/// Equilibrium phases of one composition and the reaction that forms them.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseEquilibrium {
    /// Reduced formula of the analysed entry.
    pub formula: String,
    /// Names of the equilibrium phases, sorted.
    pub phases: Vec<String>,
    /// eV/atom; in the grand-canonical ensemble this is measured on the grand potential.
    pub energy_above_hull: f64,
    /// Decomposition reaction per reduced formula unit of the entry.
    pub reaction: Reaction,
}

impl PhaseEquilibrium {
    /// Reaction energy per reduced formula unit, eV.
    pub fn reaction_energy(&self) -> f64 {
        self.reaction.energy()
    }
}

/// Equilibrium of a composition with an element reservoir over one range of the element's
/// chemical potential. Potentials are eV/atom relative to the element reference.
#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionStage {
    /// Upper end of the range; infinite for the first stage when positive potentials are
    /// allowed.
    pub mu_high: f64,
    /// Lower end of the range; `-∞` for the last stage.
    pub mu_low: f64,
    /// Atoms of the element taken up per reduced formula unit, negative when given off.
    pub evolution: f64,
    /// Equilibrium phases, sorted.
    pub phases: Vec<String>,
    /// Reaction per reduced formula unit with the reservoir at the element reference.
    pub reaction: Reaction,
}

impl EvolutionStage {
    /// Reaction energy per reduced formula unit with the reservoir at `mu`, eV.
    pub fn reaction_energy_at(&self, mu: f64) -> f64 {
        self.reaction.energy() - self.evolution * mu
    }

    pub fn exchanges_element(&self) -> bool {
        self.evolution.abs() >= EVOLUTION_TOLERANCE
    }
}

/// How a composition takes up or gives off one element as the element's chemical potential
/// falls.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementProfile {
    pub formula: String,
    /// Atoms per reduced formula unit.
    pub atoms: f64,
    pub element: String,
    /// Energy per atom of the element reference, eV.
    pub reference: f64,
    /// From the highest chemical potential to the lowest.
    pub stages: Vec<EvolutionStage>,
}

impl ElementProfile {
    /// `(mu_low, mu_high)` over which the composition exchanges nothing with the reservoir.
    /// Zero width for a composition off the hull.
    pub fn stability_window(&self) -> Option<(f64, f64)> {
        self.stages
            .iter()
            .find(|stage| !stage.exchanges_element())
            .map(|stage| (stage.mu_low, stage.mu_high))
    }
}

/// Decomposes `entry` in the closed phase diagram and balances its decomposition reaction.
///
/// # Errors
///
/// Returns [`EngineError::Oracle`] if the composition lies outside the diagram and
/// [`EngineError::Balance`] if no decomposition reaction can be balanced.
#[instrument(skip_all, name = "decomposition_workflow", fields(formula = %entry.composition().reduced_formula()))]
pub fn decompose<B: ReactionBalancer>(
    entry: &Entry,
    diagram: &PhaseDiagram,
    balancer: &B,
) -> Result<PhaseEquilibrium, EngineError> {
    let decomposition = diagram.decompose(entry)?;
    let reactants = [reduced_species(entry)];
    let equilibrium = balance_decomposition(diagram, &decomposition, &reactants, balancer)?;
    info!(phases = %equilibrium.phases.join(", "), "Decomposed composition.");
    Ok(equilibrium)
}

/// Decomposes `entry` with the chemical potential of `element` fixed at `mu` (eV/atom,
/// relative to the element reference). The reservoir enters the reaction as a species of
/// energy `μ` per atom.
///
/// # Errors
///
/// As [`decompose`], plus [`EngineError::Oracle`] when `element` has no reference entry.
#[instrument(skip_all, name = "open_decomposition_workflow", fields(formula = %entry.composition().reduced_formula(), element = element, mu = mu))]
pub fn open_decompose<B: ReactionBalancer>(
    entry: &Entry,
    diagram: &PhaseDiagram,
    element: &str,
    mu: f64,
    balancer: &B,
) -> Result<PhaseEquilibrium, EngineError> {
    let absolute = mu + diagram.element_reference(element)?;
    let grand = diagram.at_chempots(&ChemPots::from([(element.to_string(), absolute)]))?;
    let decomposition = grand.decompose(entry)?;

    let reservoir = Species::new(
        element,
        Composition::from_amounts([(element, 1.0)])?,
        absolute,
    );
    let reactants = [reduced_species(entry), reservoir];
    let equilibrium = balance_decomposition(diagram, &decomposition, &reactants, balancer)?;
    info!(phases = %equilibrium.phases.join(", "), "Decomposed composition in the open system.");
    Ok(equilibrium)
}

/// Follows `entry` open to `element` from the element reference down to the potential where
/// it has given off all of the element. With `allow_positive_mu` the element's own entries are
/// lifted out of the hull first, so phases that only form above the reference show up too.
///
/// # Errors
///
/// [`EngineError::Oracle`] when the element or composition lies outside the diagram or the
/// composition is the pure element, and [`EngineError::Balance`] if a stage reaction cannot
/// be balanced.
#[instrument(skip_all, name = "element_profile_workflow", fields(formula = %entry.composition().reduced_formula(), element = element))]
pub fn element_profile<B: ReactionBalancer>(
    entry: &Entry,
    diagram: &PhaseDiagram,
    element: &str,
    allow_positive_mu: bool,
    balancer: &B,
) -> Result<ElementProfile, EngineError> {
    let reference = diagram.element_reference(element)?;
    let critical = if allow_positive_mu {
        let mut lifted = diagram.entries().clone();
        let reservoir_ids: Vec<EntryId> = lifted
            .iter()
            .filter(|e| e.composition().is_element() && e.composition().contains(element))
            .map(Entry::id)
            .collect();
        for id in reservoir_ids {
            if let Some(e) = lifted.get_mut(id) {
                e.apply_energy_correction(POSITIVE_MU_OFFSET);
            }
        }
        PhaseDiagram::new(lifted)?.element_profile(element, entry.composition())?
    } else {
        diagram.element_profile(element, entry.composition())?
    };

    let formula_unit = reduced_species(entry);
    let atoms = formula_unit.composition.num_atoms();
    let own = formula_unit.composition.get(element);
    let reservoir = Species::new(
        element,
        Composition::from_amounts([(element, 1.0)])?,
        reference,
    );

    let mut stages: Vec<EvolutionStage> = Vec::with_capacity(critical.len());
    for (i, point) in critical.iter().enumerate() {
        let x = point.element_fraction;
        let uptake = (x * atoms - own) / (1.0 - x);
        let mut products = product_species(diagram, point.phases.keys())?;
        let phases: Vec<String> = products.iter().map(|s| s.name.clone()).collect();

        let (evolution, reaction) = if uptake.abs() >= EVOLUTION_TOLERANCE {
            products.retain(|s| !(s.composition.is_element() && s.composition.contains(element)));
            let reactants = [formula_unit.clone(), reservoir.clone()];
            (uptake, balancer.balance(&reactants, &products)?)
        } else {
            (0.0, balancer.balance(slice::from_ref(&formula_unit), &products)?)
        };

        let mu_high = if i == 0 && allow_positive_mu {
            f64::INFINITY
        } else {
            point.chempot - reference
        };
        if let Some(previous) = stages.last_mut() {
            previous.mu_low = mu_high;
        }
        stages.push(EvolutionStage {
            mu_high,
            mu_low: f64::NEG_INFINITY,
            evolution,
            phases,
            reaction: reaction.normalized_to(0, 1.0),
        });
    }

    info!(stages = stages.len(), "Traced element evolution profile.");
    Ok(ElementProfile {
        formula: formula_unit.name,
        atoms,
        element: element.to_string(),
        reference,
        stages,
    })
}

/// Chemical-potential window of `entry` against `element`; see
/// [`ElementProfile::stability_window`].
///
/// # Errors
///
/// As [`element_profile`].
pub fn stability_window<B: ReactionBalancer>(
    entry: &Entry,
    diagram: &PhaseDiagram,
    element: &str,
    allow_positive_mu: bool,
    balancer: &B,
) -> Result<Option<(f64, f64)>, EngineError> {
    Ok(element_profile(entry, diagram, element, allow_positive_mu, balancer)?.stability_window())
}

/// The entry rescaled to its reduced formula unit.
fn reduced_species(entry: &Entry) -> Species {
    let (reduced, factor) = entry.composition().reduced_composition_and_factor();
    Species::new(reduced.reduced_formula(), reduced, entry.total_energy() / factor)
}

fn balance_decomposition<B: ReactionBalancer>(
    diagram: &PhaseDiagram,
    decomposition: &Decomposition,
    reactants: &[Species],
    balancer: &B,
) -> Result<PhaseEquilibrium, EngineError> {
    let products = product_species(diagram, decomposition.phases.keys())?;
    let reaction = balancer.balance(reactants, &products)?.normalized_to(0, 1.0);
    Ok(PhaseEquilibrium {
        formula: reactants[0].name.clone(),
        phases: products.into_iter().map(|s| s.name).collect(),
        energy_above_hull: decomposition.energy_above_hull,
        reaction,
    })
}

/// Diagram entries of `phases` as reaction species, sorted by name.
fn product_species<'p>(
    diagram: &PhaseDiagram,
    phases: impl IntoIterator<Item = &'p Phase>,
) -> Result<Vec<Species>, EngineError> {
    let mut products = phases
        .into_iter()
        .map(|phase| {
            diagram
                .entries()
                .get(phase.id)
                .map(|entry| {
                    Species::new(entry.name(), entry.composition().clone(), entry.total_energy())
                })
                .ok_or_else(|| {
                    EngineError::Internal(format!("phase {} has no entry in the diagram", phase.name))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    products.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hull::reaction::NullSpaceBalancer;
    use crate::testing::{diagram, entry, li_co_o, li_o};

    #[test]
    fn unstable_peroxide_decomposes_to_oxide_and_oxygen() {
        let pd = diagram(li_o());
        let result = decompose(&entry("Li2O2", -18.0), &pd, &NullSpaceBalancer).unwrap();
        assert_eq!(result.formula, "Li2O2");
        assert_eq!(result.phases, vec!["Li2O", "O2"]);
        assert!((result.energy_above_hull - 0.375).abs() < 1e-9);
        assert_eq!(result.reaction.to_string(), "Li2O2 -> Li2O + 0.5 O2");
        assert!((result.reaction_energy() + 1.5).abs() < 1e-9);
    }

    #[test]
    fn stable_phase_decomposes_to_itself() {
        let pd = diagram(li_o());
        let result = decompose(&entry("Li2O", -15.0), &pd, &NullSpaceBalancer).unwrap();
        assert_eq!(result.phases, vec!["Li2O"]);
        assert!(result.energy_above_hull.abs() < 1e-9);
        assert!(result.reaction_energy().abs() < 1e-9);
    }

    #[test]
    fn oxide_releases_oxygen_at_low_potential() {
        let pd = diagram(li_o());
        // μ_O = -11.75 eV absolute, below the Li/Li2O equilibrium at -11 eV.
        let result =
            open_decompose(&entry("Li2O", -15.0), &pd, "O", -7.25, &NullSpaceBalancer).unwrap();
        assert_eq!(result.phases, vec!["Li"]);
        assert_eq!(result.reaction.to_string(), "Li2O -> O + 2 Li");
        // 2·(-2) + (-11.75) - (-15)
        assert!((result.reaction_energy() + 0.75).abs() < 1e-9);
    }

    #[test]
    fn lithium_takes_up_oxygen_from_a_rich_reservoir() {
        let pd = diagram(li_o());
        let result = open_decompose(&entry("Li", -2.0), &pd, "O", -1.0, &NullSpaceBalancer).unwrap();
        assert_eq!(result.phases, vec!["Li2O"]);
        assert_eq!(result.reaction.to_string(), "Li + 0.5 O -> 0.5 Li2O");
    }

    #[test]
    fn oxide_profile_ends_with_lithium_metal() {
        let pd = diagram(li_o());
        let profile =
            element_profile(&entry("Li2O", -15.0), &pd, "O", false, &NullSpaceBalancer).unwrap();
        assert_eq!(profile.formula, "Li2O");
        assert_eq!(profile.atoms, 3.0);
        assert_eq!(profile.reference, -4.5);
        assert_eq!(profile.stages.len(), 2);

        let stable = &profile.stages[0];
        assert_eq!(stable.phases, vec!["Li2O"]);
        assert!(stable.mu_high.abs() < 1e-10);
        assert!((stable.mu_low + 6.5).abs() < 1e-10);
        assert!(!stable.exchanges_element());

        let reduced = &profile.stages[1];
        assert_eq!(reduced.phases, vec!["Li"]);
        assert_eq!(reduced.mu_low, f64::NEG_INFINITY);
        assert!((reduced.evolution + 1.0).abs() < 1e-10);
        assert_eq!(reduced.reaction.to_string(), "Li2O -> O + 2 Li");
        // Same driving force as the open decomposition at this potential.
        assert!((reduced.reaction_energy_at(-7.25) + 0.75).abs() < 1e-9);

        let (low, high) = profile.stability_window().unwrap();
        assert!((low + 6.5).abs() < 1e-10);
        assert!(high.abs() < 1e-10);
    }

    #[test]
    fn metal_takes_up_oxygen_above_its_window() {
        let pd = diagram(li_o());
        let profile =
            element_profile(&entry("Li", -2.0), &pd, "O", false, &NullSpaceBalancer).unwrap();
        let evolutions: Vec<f64> = profile.stages.iter().map(|s| s.evolution).collect();
        assert_eq!(evolutions.len(), 2);
        assert!((evolutions[0] - 0.5).abs() < 1e-10);
        assert_eq!(evolutions[1], 0.0);
        assert_eq!(profile.stages[0].reaction.to_string(), "Li + 0.5 O -> 0.5 Li2O");

        let (low, high) = profile.stability_window().unwrap();
        assert_eq!(low, f64::NEG_INFINITY);
        assert!((high + 6.5).abs() < 1e-10);
    }

    #[test]
    fn unstable_peroxide_has_a_zero_width_window() {
        let pd = diagram(li_o());
        let (low, high) =
            stability_window(&entry("Li2O2", -18.0), &pd, "O", false, &NullSpaceBalancer)
                .unwrap()
                .unwrap();
        assert!(low.abs() < 1e-10);
        assert!(high.abs() < 1e-10);
    }

    #[test]
    fn positive_potentials_reveal_the_peroxide() {
        let pd = diagram(li_o());
        let profile =
            element_profile(&entry("Li2O", -15.0), &pd, "O", true, &NullSpaceBalancer).unwrap();
        let phases: Vec<&[String]> = profile.stages.iter().map(|s| s.phases.as_slice()).collect();
        assert_eq!(phases, [vec!["Li2O2"], vec!["Li2O"], vec!["Li"]]);

        let peroxide = &profile.stages[0];
        assert_eq!(peroxide.mu_high, f64::INFINITY);
        // Li2O + O -> Li2O2 costs 1.5 eV at the reference and pays off above +1.5 eV.
        assert!((peroxide.mu_low - 1.5).abs() < 1e-10);
        assert!((peroxide.evolution - 1.0).abs() < 1e-10);
        assert!((peroxide.reaction_energy_at(0.0) - 1.5).abs() < 1e-9);
        assert_eq!(profile.reference, -4.5);

        let (low, high) = profile.stability_window().unwrap();
        assert!((low + 6.5).abs() < 1e-10);
        assert!((high - 1.5).abs() < 1e-10);
    }

    #[test]
    fn ternary_profile_passes_through_the_mixed_oxide() {
        let pd = diagram(li_co_o());
        let profile =
            element_profile(&entry("Li2CoO2", -29.0), &pd, "Li", false, &NullSpaceBalancer)
                .unwrap();
        let phases: Vec<&[String]> = profile.stages.iter().map(|s| s.phases.as_slice()).collect();
        assert_eq!(
            phases,
            [vec!["Co", "Li2O"], vec!["Li2CoO2"], vec!["CoO", "O2"]]
        );
        assert_eq!(
            profile.stages[0].reaction.to_string(),
            "Li2CoO2 + 2 Li -> Co + 2 Li2O"
        );
        assert_eq!(
            profile.stages[2].reaction.to_string(),
            "Li2CoO2 -> 2 Li + CoO + 0.5 O2"
        );
        for pair in profile.stages.windows(2) {
            assert!(pair[0].mu_high > pair[1].mu_high);
            assert_eq!(pair[0].mu_low, pair[1].mu_high);
            assert!(pair[0].evolution > pair[1].evolution);
        }

        let (low, high) = profile.stability_window().unwrap();
        assert!((low + 3.75).abs() < 1e-10);
        assert!((high + 2.0).abs() < 1e-10);
    }

    #[test]
    fn pure_element_has_no_profile() {
        let pd = diagram(li_o());
        assert!(matches!(
            element_profile(&entry("O2", -9.0), &pd, "O", false, &NullSpaceBalancer),
            Err(EngineError::Oracle { .. })
        ));
    }

    #[test]
    fn composition_outside_the_diagram_is_rejected() {
        let pd = diagram(li_o());
        assert!(matches!(
            decompose(&entry("LiCl", -8.0), &pd, &NullSpaceBalancer),
            Err(EngineError::Oracle { .. })
        ));
    }
}
