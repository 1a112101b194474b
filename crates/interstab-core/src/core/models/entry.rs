use super::composition::Composition;
use super::ids::EntryId;
use crate::core::hull::oracle::{HullOracle, OracleError};
use std::collections::BTreeMap;
use thiserror::Error;

/// Chemical potential of each open element, in eV/atom.
pub type ChemPots = BTreeMap<String, f64>;

/// Margin (eV per formula unit) by which [`Entry::stabilize`] places an entry below the hull,
/// so that the stabilized entry is the unique hull phase at its own composition.
pub const STABILIZE_MARGIN: f64 = 1e-8;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EntryError {
    #[error("Cannot mix an empty set of parent entries")]
    EmptyMixingSet,

    #[error("Cannot mix grand-potential entries held at different chemical potentials")]
    IncompatibleEnsembles,
}

/// Where an entry's energy comes from.
///
/// Parents are referenced by [`EntryId`]; a null id marks a parent that was never registered
/// in an [`EntrySet`](super::entry_set::EntrySet).
#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    /// A computed or database record.
    Primary,
    /// A linear combination of parent entries, flattened onto non-mixed ancestors.
    Mixed { parents: Vec<(EntryId, f64)> },
    /// An entry viewed in a grand-canonical ensemble with fixed chemical potentials.
    GrandPotential { original: EntryId, chempots: ChemPots },
}

/// An immutable composition + energy record.
///
/// `energy` is the raw energy of the whole formula unit described by `composition`; the total
/// energy adds `correction`. Grand-potential entries additionally subtract `n·μ` for each open
/// element and exclude those elements from their effective composition.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    id: EntryId,
    name: String,
    composition: Composition,
    energy: f64,
    correction: f64,
    kind: EntryKind,
}

impl Entry {
    /// Creates a primary entry named after the reduced formula of `composition`.
    pub fn new(composition: Composition, energy: f64) -> Self {
        Self {
            id: EntryId::default(),
            name: composition.reduced_formula(),
            composition,
            energy,
            correction: 0.0,
            kind: EntryKind::Primary,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_correction(mut self, correction: f64) -> Self {
        self.correction = correction;
        self
    }

    pub(crate) fn set_id(&mut self, id: EntryId) {
        self.id = id;
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    /// Raw energy, without the correction term.
    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn correction(&self) -> f64 {
        self.correction
    }

    pub fn total_energy(&self) -> f64 {
        self.energy + self.correction
    }

    pub fn chempots(&self) -> Option<&ChemPots> {
        match &self.kind {
            EntryKind::GrandPotential { chempots, .. } => Some(chempots),
            _ => None,
        }
    }

    /// Composition seen by a phase diagram: open elements are removed for grand-potential
    /// entries.
    pub fn effective_composition(&self) -> Composition {
        match &self.kind {
            EntryKind::GrandPotential { chempots, .. } => {
                let open: Vec<&str> = chempots.keys().map(String::as_str).collect();
                self.composition.without(&open)
            }
            EntryKind::Primary | EntryKind::Mixed { .. } => self.composition.clone(),
        }
    }

    /// Energy seen by a phase diagram: the grand potential `E − Σ nᵢμᵢ` for grand-potential
    /// entries, the total energy otherwise.
    pub fn effective_energy(&self) -> f64 {
        match &self.kind {
            EntryKind::GrandPotential { chempots, .. } => {
                self.total_energy()
                    - chempots
                        .iter()
                        .map(|(el, mu)| self.composition.get(el) * mu)
                        .sum::<f64>()
            }
            EntryKind::Primary | EntryKind::Mixed { .. } => self.total_energy(),
        }
    }

    pub fn energy_per_atom(&self) -> f64 {
        self.effective_energy() / self.effective_composition().num_atoms()
    }

    pub fn is_element(&self) -> bool {
        self.effective_composition().is_element()
    }

    /// Returns the same entry scaled to one atom per formula unit.
    pub fn normalized(&self) -> Self {
        let factor = 1.0 / self.composition.num_atoms();
        let parents = flatten_parent(self, factor);
        Self {
            id: EntryId::default(),
            name: self.name.clone(),
            composition: self.composition.scaled(factor),
            energy: self.total_energy() * factor,
            correction: 0.0,
            kind: self.rewrap(EntryKind::Mixed { parents }),
        }
    }

    /// Linear combination of parent entries: compositions and total energies are summed with
    /// the given weights. Weights need not sum to one.
    ///
    /// When every parent is a grand-potential entry held at the same chemical potentials, the
    /// mixture is a grand-potential entry at those chemical potentials.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::EmptyMixingSet`] if `parents` is empty and
    /// [`EntryError::IncompatibleEnsembles`] if grand-potential parents disagree on their
    /// chemical potentials or are mixed with plain entries.
    pub fn mix(parents: &[(&Entry, f64)]) -> Result<Self, EntryError> {
        let (first, _) = parents.first().ok_or(EntryError::EmptyMixingSet)?;
        let ensemble = first.chempots();
        if parents.iter().any(|(entry, _)| entry.chempots() != ensemble) {
            return Err(EntryError::IncompatibleEnsembles);
        }

        let mut composition = Composition::new();
        let mut energy = 0.0;
        let mut lineage = Vec::new();
        for &(entry, weight) in parents {
            composition = &composition + &entry.composition.scaled(weight);
            energy += weight * entry.total_energy();
            lineage.extend(flatten_parent(entry, weight));
        }

        let mixed = EntryKind::Mixed { parents: lineage };
        let kind = match ensemble {
            Some(chempots) => EntryKind::GrandPotential {
                original: EntryId::default(),
                chempots: chempots.clone(),
            },
            None => mixed,
        };
        Ok(Self {
            id: EntryId::default(),
            name: composition.formula(),
            composition,
            energy,
            correction: 0.0,
            kind,
        })
    }

    /// Views this entry in a grand-canonical ensemble at fixed `chempots`.
    pub fn to_grand_potential(&self, chempots: &ChemPots) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            composition: self.composition.clone(),
            energy: self.energy,
            correction: self.correction,
            kind: EntryKind::GrandPotential {
                original: self.id,
                chempots: chempots.clone(),
            },
        }
    }

    /// Adjusts the correction so the entry sits on the convex hull of `oracle`
    /// (`STABILIZE_MARGIN` below it).
    ///
    /// # Errors
    ///
    /// Propagates the oracle failure if the composition cannot be placed on the hull.
    pub fn stabilize(&mut self, oracle: &impl HullOracle) -> Result<(), OracleError> {
        let decomposition = oracle.decompose(self)?;
        let atoms = self.effective_composition().num_atoms();
        self.correction -= decomposition.energy_above_hull * atoms + STABILIZE_MARGIN;
        Ok(())
    }

    /// Shifts the energy by `delta` eV per atom.
    pub fn apply_energy_correction(&mut self, delta: f64) {
        self.correction += delta * self.composition.num_atoms();
    }

    fn rewrap(&self, mixed: EntryKind) -> EntryKind {
        match &self.kind {
            EntryKind::GrandPotential { chempots, .. } => EntryKind::GrandPotential {
                original: self.id,
                chempots: chempots.clone(),
            },
            EntryKind::Primary | EntryKind::Mixed { .. } => mixed,
        }
    }
}

fn flatten_parent(entry: &Entry, weight: f64) -> Vec<(EntryId, f64)> {
    match &entry.kind {
        EntryKind::Mixed { parents } => parents.iter().map(|&(id, w)| (id, w * weight)).collect(),
        EntryKind::Primary | EntryKind::GrandPotential { .. } => vec![(entry.id, weight)],
    }
}
