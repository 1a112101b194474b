use super::oracle::{Decomposition, OracleError, Phase};
use crate::core::models::composition::Composition;
use crate::core::models::entry::Entry;
use itertools::Itertools;
use nalgebra::{DMatrix, DVector};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Slack (eV/atom) allowed when testing that a candidate facet lies below every entry.
pub const FACET_TOLERANCE: f64 = 1e-10;
/// Barycentric weights below this are treated as zero when reading off decomposition phases.
pub const PHASE_FRACTION_TOLERANCE: f64 = 1e-12;
/// Most negative barycentric weight for which a composition still counts as inside a facet.
const CONTAINMENT_TOLERANCE: f64 = 1e-9;
const SINGULARITY_TOLERANCE: f64 = 1e-12;
const CHEMPOT_DEDUP_TOLERANCE: f64 = 1e-8;
/// Line parameters closer than this are one crossing.
const LINE_TOLERANCE: f64 = 1e-9;
/// Largest number of candidate simplices the facet enumeration will test.
pub const MAX_SIMPLICES: u128 = 10_000_000;

#[derive(Debug, Clone)]
struct Vertex {
    phase: Phase,
    composition: Composition,
    fractions: DVector<f64>,
    energy_per_atom: f64,
}

#[derive(Debug, Clone)]
struct Facet {
    vertices: Vec<usize>,
    /// Hyperplane coefficients: the chemical potential of each element on this facet.
    chempots: DVector<f64>,
    /// Maps atomic fractions to barycentric weights of the facet vertices.
    barycentric: DMatrix<f64>,
}

/// A composition on a line through composition space at which the equilibrium phases change.
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalComposition {
    /// Atomic fraction of the line's element.
    pub element_fraction: f64,
    /// Equilibrium phases and their atomic fractions at this composition.
    pub phases: BTreeMap<Phase, f64>,
    /// Absolute chemical potential of the element on the element-rich side of this
    /// composition.
    pub chempot: f64,
}

/// Lower convex hull of entries in (atomic fraction, energy per atom) space.
///
/// Works on the effective composition and energy of each entry, so the same machinery serves
/// closed and grand-canonical diagrams. Only the lowest-energy entry of each composition is a
/// hull candidate.
#[derive(Debug, Clone)]
pub struct ConvexHull {
    elements: Vec<String>,
    vertices: Vec<Vertex>,
    facets: Vec<Facet>,
}

impl ConvexHull {
    /// Builds the hull by enumerating every simplex of candidate entries and keeping those whose
    /// hyperplane lies below all candidates.
    ///
    /// Candidates above the simplex of elemental references (positive formation energy) are
    /// dropped first; they can never be a hull vertex.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::NoFacets`] if no valid facet exists, for instance when the entries
    /// span no composition space or leave an element without any supporting simplex, and
    /// [`OracleError::TooManyCandidates`] when more than [`MAX_SIMPLICES`] simplices would have
    /// to be tested.
    pub fn build<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Result<Self, OracleError> {
        let mut candidates: Vec<(Phase, Composition, f64)> = Vec::new();
        for entry in entries {
            let composition = entry.effective_composition();
            if composition.is_empty() {
                continue;
            }
            let energy_per_atom = entry.energy_per_atom();
            if !energy_per_atom.is_finite() {
                continue;
            }
            let fractional = composition.fractional();
            match candidates
                .iter_mut()
                .find(|(_, existing, _)| existing.fractional().almost_equals(&fractional, 1e-8))
            {
                Some(slot) if slot.2 <= energy_per_atom => {}
                Some(slot) => *slot = (Phase::of(entry), composition, energy_per_atom),
                None => candidates.push((Phase::of(entry), composition, energy_per_atom)),
            }
        }

        let elements: Vec<String> = candidates
            .iter()
            .flat_map(|(_, composition, _)| composition.chemical_system())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let vertices: Vec<Vertex> = candidates
            .into_iter()
            .map(|(phase, composition, energy_per_atom)| Vertex {
                fractions: fraction_vector(&elements, &composition),
                phase,
                composition,
                energy_per_atom,
            })
            .collect();
        let vertices = drop_above_references(&elements, vertices);

        let simplices = simplex_count(vertices.len(), elements.len());
        if simplices > MAX_SIMPLICES {
            return Err(OracleError::TooManyCandidates {
                chemsys: elements.join("-"),
                candidates: vertices.len(),
                simplices,
                limit: MAX_SIMPLICES,
            });
        }

        let facets = enumerate_facets(&elements, &vertices);
        if facets.is_empty() {
            return Err(OracleError::NoFacets {
                chemsys: elements.join("-"),
            });
        }
        debug!(
            chemsys = %elements.join("-"),
            candidates = vertices.len(),
            facets = facets.len(),
            "Built convex hull."
        );
        Ok(Self {
            elements,
            vertices,
            facets,
        })
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    pub fn chemsys(&self) -> String {
        self.elements.join("-")
    }

    /// Decomposes the effective composition of `entry` and measures its energy against the
    /// hull.
    pub fn decompose(&self, entry: &Entry) -> Result<Decomposition, OracleError> {
        let composition = entry.effective_composition();
        let fractions = self.fractions_of(&composition)?;
        let (facet, weights, hull_energy) = self
            .supporting_facet(&fractions)
            .ok_or_else(|| self.unsupported(&composition))?;

        Ok(Decomposition {
            phases: self.phases_of(facet, &weights),
            energy_above_hull: entry.energy_per_atom() - hull_energy,
        })
    }

    /// Points where the line from pure `element` through `composition` to the composition's
    /// element-free end crosses from one facet into another, ordered from the element-rich
    /// end. `composition` itself is always one of them; the pure element never is.
    ///
    /// # Errors
    ///
    /// [`OracleError::UnknownElement`] for an element outside the hull,
    /// [`OracleError::UnsupportedComposition`] for a composition outside it and
    /// [`OracleError::ElementOnlyComposition`] when `composition` has no other element.
    pub fn element_profile(
        &self,
        element: &str,
        composition: &Composition,
    ) -> Result<Vec<CriticalComposition>, OracleError> {
        let index = self.element_index(element)?;
        let target = self.fractions_of(composition)?;
        let remainder = 1.0 - target[index];
        if remainder <= LINE_TOLERANCE {
            return Err(OracleError::ElementOnlyComposition {
                formula: composition.formula(),
                element: element.to_string(),
            });
        }

        let mut start = DVector::zeros(self.elements.len());
        start[index] = 1.0;
        let mut end = target;
        end[index] = 0.0;
        end /= remainder;
        let at = |t: f64| &start * (1.0 - t) + &end * t;

        // Line parameter t runs from the pure element (0) to the element-free end (1).
        let mut crossings = vec![remainder];
        for facet in &self.facets {
            if let Some((low, high)) = facet_interval(facet, &start, &end) {
                crossings.extend([low, high]);
            }
        }
        crossings.retain(|&t| t > LINE_TOLERANCE);
        crossings.sort_by(f64::total_cmp);
        crossings.dedup_by(|a, b| (*a - *b).abs() < LINE_TOLERANCE);

        let mut previous = 0.0;
        let mut profile = Vec::with_capacity(crossings.len());
        for t in crossings {
            let (facet, weights, _) = self
                .supporting_facet(&at(t))
                .ok_or_else(|| self.unsupported(composition))?;
            let (rich_side, _, _) = self
                .supporting_facet(&at((previous + t) / 2.0))
                .ok_or_else(|| self.unsupported(composition))?;
            profile.push(CriticalComposition {
                element_fraction: 1.0 - t,
                phases: self.phases_of(facet, &weights),
                chempot: rich_side.chempots[index],
            });
            previous = t;
        }
        debug!(
            element,
            formula = %composition.formula(),
            stages = profile.len(),
            "Traced element profile."
        );
        Ok(profile)
    }

    /// Among the facets containing `fractions`, the one whose plane is highest there. Every
    /// facet plane lies on or below the hull, so this is the facet supporting the hull.
    fn supporting_facet(&self, fractions: &DVector<f64>) -> Option<(&Facet, DVector<f64>, f64)> {
        self.facets
            .iter()
            .filter_map(|facet| {
                let weights = &facet.barycentric * fractions;
                weights
                    .iter()
                    .all(|&w| w >= -CONTAINMENT_TOLERANCE)
                    .then(|| (facet, weights, facet.chempots.dot(fractions)))
            })
            .max_by(|a, b| a.2.total_cmp(&b.2))
    }

    fn phases_of(&self, facet: &Facet, weights: &DVector<f64>) -> BTreeMap<Phase, f64> {
        facet
            .vertices
            .iter()
            .zip(weights.iter())
            .filter(|&(_, &w)| w > PHASE_FRACTION_TOLERANCE)
            .map(|(&v, &w)| (self.vertices[v].phase.clone(), w))
            .collect()
    }

    pub fn phase_composition(&self, phase: &Phase) -> Option<Composition> {
        self.vertices
            .iter()
            .find(|v| v.phase.id == phase.id)
            .map(|v| v.composition.clone())
    }

    /// Phases that are a vertex of at least one facet.
    pub fn stable_phases(&self) -> Vec<Phase> {
        self.facets
            .iter()
            .flat_map(|facet| facet.vertices.iter().copied())
            .unique()
            .sorted()
            .map(|v| self.vertices[v].phase.clone())
            .collect()
    }

    /// Chemical potential of `element` on every facet, ascending and deduplicated.
    pub fn transition_chempots(&self, element: &str) -> Result<Vec<f64>, OracleError> {
        let index = self.element_index(element)?;
        let mut chempots: Vec<f64> = self.facets.iter().map(|f| f.chempots[index]).collect();
        chempots.sort_by(f64::total_cmp);
        chempots.dedup_by(|a, b| (*a - *b).abs() < CHEMPOT_DEDUP_TOLERANCE);
        Ok(chempots)
    }

    pub fn element_reference(&self, element: &str) -> Result<f64, OracleError> {
        self.vertices
            .iter()
            .filter(|v| v.composition.is_element() && v.composition.contains(element))
            .map(|v| v.energy_per_atom)
            .min_by(f64::total_cmp)
            .ok_or_else(|| OracleError::MissingElementReference(element.to_string()))
    }

    fn element_index(&self, element: &str) -> Result<usize, OracleError> {
        self.elements
            .iter()
            .position(|el| el == element)
            .ok_or_else(|| OracleError::UnknownElement(element.to_string()))
    }

    fn fractions_of(&self, composition: &Composition) -> Result<DVector<f64>, OracleError> {
        let inside = !composition.is_empty()
            && composition
                .elements()
                .all(|el| self.elements.iter().any(|known| known == el));
        if !inside {
            return Err(self.unsupported(composition));
        }
        Ok(fraction_vector(&self.elements, composition))
    }

    fn unsupported(&self, composition: &Composition) -> OracleError {
        OracleError::UnsupportedComposition {
            formula: composition.formula(),
            chemsys: self.chemsys(),
        }
    }
}

fn fraction_vector(elements: &[String], composition: &Composition) -> DVector<f64> {
    DVector::from_iterator(
        elements.len(),
        elements.iter().map(|el| composition.fraction(el)),
    )
}

/// Range of the line parameter `t` over which `(1 − t)·start + t·end` lies inside `facet`,
/// clamped to `[0, 1]`.
fn facet_interval(facet: &Facet, start: &DVector<f64>, end: &DVector<f64>) -> Option<(f64, f64)> {
    let from = &facet.barycentric * start;
    let slope = &facet.barycentric * end - &from;
    let (mut low, mut high) = (0.0_f64, 1.0_f64);
    for (&w, &dw) in from.iter().zip(slope.iter()) {
        if dw.abs() < SINGULARITY_TOLERANCE {
            if w < -CONTAINMENT_TOLERANCE {
                return None;
            }
        } else if dw > 0.0 {
            low = low.max(-w / dw);
        } else {
            high = high.min(-w / dw);
        }
    }
    (low <= high + LINE_TOLERANCE).then_some((low, high.max(low)))
}

/// Keeps elemental candidates and those on or below the plane through the elemental
/// references. Nothing is dropped while an element lacks a pure-element candidate.
fn drop_above_references(elements: &[String], vertices: Vec<Vertex>) -> Vec<Vertex> {
    let references: Option<Vec<f64>> = elements
        .iter()
        .map(|el| {
            vertices
                .iter()
                .filter(|v| v.composition.is_element() && v.composition.contains(el))
                .map(|v| v.energy_per_atom)
                .min_by(f64::total_cmp)
        })
        .collect();
    let Some(references) = references else {
        return vertices;
    };
    let references = DVector::from_vec(references);

    let before = vertices.len();
    let kept: Vec<Vertex> = vertices
        .into_iter()
        .filter(|v| {
            v.composition.is_element()
                || v.energy_per_atom - v.fractions.dot(&references) <= FACET_TOLERANCE
        })
        .collect();
    if kept.len() < before {
        debug!(dropped = before - kept.len(), "Dropped candidates with positive formation energy.");
    }
    kept
}

/// Binomial coefficient `n` choose `k`, saturating at `u128::MAX`.
fn simplex_count(n: usize, k: usize) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k)
        .try_fold(1u128, |acc, i| {
            acc.checked_mul((n - i) as u128).map(|product| product / (i as u128 + 1))
        })
        .unwrap_or(u128::MAX)
}

fn enumerate_facets(elements: &[String], vertices: &[Vertex]) -> Vec<Facet> {
    let dim = elements.len();
    if dim == 0 {
        return Vec::new();
    }
    (0..vertices.len())
        .combinations(dim)
        .filter_map(|simplex| {
            let matrix = DMatrix::from_fn(dim, dim, |r, c| vertices[simplex[r]].fractions[c]);
            if matrix.determinant().abs() < SINGULARITY_TOLERANCE {
                return None;
            }
            let inverse = matrix.try_inverse()?;
            let energies = DVector::from_iterator(
                dim,
                simplex.iter().map(|&v| vertices[v].energy_per_atom),
            );
            let chempots = &inverse * energies;
            let below_all = vertices
                .iter()
                .all(|v| v.energy_per_atom - v.fractions.dot(&chempots) >= -FACET_TOLERANCE);
            below_all.then(|| Facet {
                vertices: simplex,
                chempots,
                barycentric: inverse.transpose(),
            })
        })
        .collect()
}
