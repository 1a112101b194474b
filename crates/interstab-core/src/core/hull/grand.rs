use super::convex::ConvexHull;
use super::oracle::{Decomposition, HullOracle, OracleError, Phase};
use crate::core::models::composition::Composition;
use crate::core::models::entry::{ChemPots, Entry};
use crate::core::models::entry_set::EntrySet;
use std::borrow::Cow;

/// Phase diagram of the grand potential `Φ = E − Σ nᵢμᵢ` at fixed chemical potentials of the
/// open elements.
///
/// Entries made only of open elements are reservoirs and do not take part in the hull. Phases
/// are reported under the ids of the original (closed-system) entries.
#[derive(Debug, Clone)]
pub struct GrandPotentialDiagram {
    chempots: ChemPots,
    hull: ConvexHull,
}

impl GrandPotentialDiagram {
    /// # Errors
    ///
    /// Returns [`OracleError::NoFacets`] if nothing but open-element entries remain.
    pub fn new(entries: &EntrySet, chempots: &ChemPots) -> Result<Self, OracleError> {
        let grand: Vec<Entry> = entries
            .iter()
            .map(|entry| entry.to_grand_potential(chempots))
            .filter(|entry| !entry.effective_composition().is_empty())
            .collect();
        let hull = ConvexHull::build(grand.iter())?;
        Ok(Self {
            chempots: chempots.clone(),
            hull,
        })
    }

    pub fn chempots(&self) -> &ChemPots {
        &self.chempots
    }

    pub fn elements(&self) -> &[String] {
        self.hull.elements()
    }

    fn in_ensemble<'a>(&self, entry: &'a Entry) -> Cow<'a, Entry> {
        match entry.chempots() {
            Some(chempots) if chempots == &self.chempots => Cow::Borrowed(entry),
            _ => Cow::Owned(entry.to_grand_potential(&self.chempots)),
        }
    }
}

impl HullOracle for GrandPotentialDiagram {
    /// Plain entries are viewed at this diagram's chemical potentials before decomposing.
    fn decompose(&self, entry: &Entry) -> Result<Decomposition, OracleError> {
        self.hull.decompose(&self.in_ensemble(entry))
    }

    fn phase_composition(&self, phase: &Phase) -> Option<Composition> {
        self.hull.phase_composition(phase)
    }
}
