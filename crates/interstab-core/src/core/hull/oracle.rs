use crate::core::models::composition::Composition;
use crate::core::models::entry::{ChemPots, Entry};
use crate::core::models::ids::EntryId;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    #[error("Composition {formula} lies outside the chemical space of the hull ({chemsys})")]
    UnsupportedComposition { formula: String, chemsys: String },

    #[error("No convex hull facets could be built for chemical system {chemsys}")]
    NoFacets { chemsys: String },

    #[error(
        "Hull of {chemsys} has {candidates} candidate entries, giving {simplices} simplices to test (limit {limit})"
    )]
    TooManyCandidates {
        chemsys: String,
        candidates: usize,
        simplices: u128,
        limit: u128,
    },

    #[error("Element '{0}' is not part of the hull's chemical system")]
    UnknownElement(String),

    #[error("No pure-element reference entry for '{0}'")]
    MissingElementReference(String),

    #[error("Composition {formula} contains no element other than '{element}'")]
    ElementOnlyComposition { formula: String, element: String },
}

/// A phase of the hull, identified by the entry it comes from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Phase {
    pub id: EntryId,
    pub name: String,
}

impl Phase {
    pub fn of(entry: &Entry) -> Self {
        Self {
            id: entry.id(),
            name: entry.name().to_string(),
        }
    }
}

pub type PhaseSet = BTreeSet<Phase>;

/// Equilibrium decomposition of a composition.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    /// Atomic fraction contributed by each phase.
    pub phases: BTreeMap<Phase, f64>,
    /// Energy per atom above the hull (negative when the queried entry lies below it).
    pub energy_above_hull: f64,
}

impl Decomposition {
    pub fn phase_set(&self) -> PhaseSet {
        self.phases.keys().cloned().collect()
    }
}

/// Answers "what is the equilibrium decomposition of this entry" for a fixed entry set.
///
/// Implementations must be deterministic for a fixed entry set and composition.
pub trait HullOracle {
    /// Decomposes `entry` into hull phases and reports its energy above the hull.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::UnsupportedComposition`] if the composition lies outside the
    /// chemical space spanned by the hull.
    fn decompose(&self, entry: &Entry) -> Result<Decomposition, OracleError>;

    /// Composition of a hull phase as this oracle sees it (open elements excluded in a
    /// grand-canonical oracle). `None` for phases the oracle does not know.
    fn phase_composition(&self, phase: &Phase) -> Option<Composition>;
}

/// A closed-system oracle that can also be viewed in a grand-canonical ensemble.
pub trait OpenSystemOracle {
    type Grand: HullOracle + Sync;

    /// Grand-canonical oracle at absolute chemical potentials `chempots`.
    fn at_chempots(&self, chempots: &ChemPots) -> Result<Self::Grand, OracleError>;

    /// Absolute chemical potentials of `element` at which its equilibrium changes, ascending.
    fn transition_chempots(&self, element: &str) -> Result<Vec<f64>, OracleError>;

    /// Energy per atom of the lowest-energy pure `element` entry.
    fn element_reference(&self, element: &str) -> Result<f64, OracleError>;
}

impl<T: HullOracle + ?Sized> HullOracle for &T {
    fn decompose(&self, entry: &Entry) -> Result<Decomposition, OracleError> {
        (**self).decompose(entry)
    }

    fn phase_composition(&self, phase: &Phase) -> Option<Composition> {
        (**self).phase_composition(phase)
    }
}
