use super::convex::{ConvexHull, CriticalComposition};
use super::grand::GrandPotentialDiagram;
use super::oracle::{Decomposition, HullOracle, OpenSystemOracle, OracleError, Phase};
use crate::core::models::composition::Composition;
use crate::core::models::entry::{ChemPots, Entry};
use crate::core::models::entry_set::EntrySet;

/// Closed-system phase diagram of an entry set.
///
/// Owns its entries so grand-potential views at arbitrary chemical potentials can be derived
/// from it.
#[derive(Debug, Clone)]
pub struct PhaseDiagram {
    entries: EntrySet,
    hull: ConvexHull,
}

impl PhaseDiagram {
    /// Builds the phase diagram of every entry in `entries`.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::NoFacets`] if the entries do not define a hull.
    pub fn new(entries: EntrySet) -> Result<Self, OracleError> {
        let hull = ConvexHull::build(entries.iter())?;
        Ok(Self { entries, hull })
    }

    pub fn entries(&self) -> &EntrySet {
        &self.entries
    }

    pub fn elements(&self) -> &[String] {
        self.hull.elements()
    }

    /// Entries lying on the hull, in insertion order.
    pub fn stable_entries(&self) -> Vec<&Entry> {
        let stable = self.hull.stable_phases();
        self.entries
            .iter()
            .filter(|entry| stable.iter().any(|phase| phase.id == entry.id()))
            .collect()
    }

    pub fn energy_above_hull(&self, entry: &Entry) -> Result<f64, OracleError> {
        Ok(self.hull.decompose(entry)?.energy_above_hull)
    }

    /// Compositions at which the equilibrium changes as `composition` takes up or gives off
    /// `element`. See [`ConvexHull::element_profile`].
    pub fn element_profile(
        &self,
        element: &str,
        composition: &Composition,
    ) -> Result<Vec<CriticalComposition>, OracleError> {
        self.hull.element_profile(element, composition)
    }
}

impl HullOracle for PhaseDiagram {
    fn decompose(&self, entry: &Entry) -> Result<Decomposition, OracleError> {
        self.hull.decompose(entry)
    }

    fn phase_composition(&self, phase: &Phase) -> Option<Composition> {
        self.hull.phase_composition(phase)
    }
}

impl OpenSystemOracle for PhaseDiagram {
    type Grand = GrandPotentialDiagram;

    fn at_chempots(&self, chempots: &ChemPots) -> Result<GrandPotentialDiagram, OracleError> {
        GrandPotentialDiagram::new(&self.entries, chempots)
    }

    fn transition_chempots(&self, element: &str) -> Result<Vec<f64>, OracleError> {
        self.hull.transition_chempots(element)
    }

    fn element_reference(&self, element: &str) -> Result<f64, OracleError> {
        self.hull.element_reference(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(formula: &str, energy: f64) -> Entry {
        Entry::new(formula.parse().unwrap(), energy)
    }

    fn diagram() -> PhaseDiagram {
        let set: EntrySet = vec![
            entry("Li", -2.0),
            entry("O2", -9.0),
            entry("Li2O", -15.0),
            entry("Li2O2", -18.0),
        ]
        .into_iter()
        .collect();
        PhaseDiagram::new(set).unwrap()
    }

    #[test]
    fn stable_entries_exclude_unstable_phases() {
        let pd = diagram();
        let names: Vec<&str> = pd.stable_entries().into_iter().map(Entry::name).collect();
        assert_eq!(names, vec!["Li", "O2", "Li2O"]);
    }

    #[test]
    fn stabilized_entry_becomes_its_own_decomposition() {
        let pd = diagram();
        let mut li2o2 = pd.entries().iter().find(|e| e.name() == "Li2O2").unwrap().clone();
        li2o2.stabilize(&pd).unwrap();

        let mut set = pd.entries().clone();
        set.retain(|e| e.name() != "Li2O2");
        let id = set.insert(li2o2);
        let stabilized = PhaseDiagram::new(set).unwrap();
        let decomposition = stabilized.decompose(&stabilized.entries()[id]).unwrap();
        assert_eq!(decomposition.phases.len(), 1);
        assert!(decomposition.phases.keys().all(|p| p.id == id));
        assert!(decomposition.energy_above_hull.abs() < 1e-9);
        let names: Vec<&str> = stabilized.stable_entries().into_iter().map(Entry::name).collect();
        assert!(names.contains(&"Li2O2"));
    }

    #[test]
    fn element_reference_uses_the_element_entries() {
        let pd = diagram();
        assert_eq!(pd.element_reference("Li").unwrap(), -2.0);
    }

    #[test]
    fn grand_view_is_built_from_the_same_entries() {
        let pd = diagram();
        let chempots = ChemPots::from([("Li".to_string(), -3.0)]);
        let grand = pd.at_chempots(&chempots).unwrap();
        let o2 = pd.entries().iter().find(|e| e.name() == "O2").unwrap();
        let decomposition = grand.decompose(o2).unwrap();
        let names: Vec<&str> = decomposition.phases.keys().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Li2O"]);
    }
}
