use crate::core::hull::oracle::PhaseSet;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A mixing ratio usable as an ordered map key.
#[derive(Debug, Clone, Copy)]
pub struct RatioKey(pub f64);

impl PartialEq for RatioKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RatioKey {}

impl PartialOrd for RatioKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RatioKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // `0.0 + x` folds -0.0 onto 0.0 so both spellings share one key.
        (0.0 + self.0).total_cmp(&(0.0 + other.0))
    }
}

/// One sample of the mixing line: the fraction of `entry1`, the equilibrium phases there and
/// the energy above hull of the mixture (eV/atom).
#[derive(Debug, Clone, PartialEq)]
pub struct MixPoint {
    pub ratio: f64,
    pub phases: PhaseSet,
    pub energy: f64,
}

impl MixPoint {
    pub fn phase_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.phases.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Sorted phase names joined by `", "`.
    pub fn label(&self) -> String {
        self.phase_names().join(", ")
    }
}

/// Every sample taken by the ratio search, keyed by ratio. Later samples at the same ratio
/// replace earlier ones.
pub type RawProfile = BTreeMap<RatioKey, MixPoint>;

/// Transition points along the mixing line, ratio ascending, both ends of the domain included.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    points: Vec<MixPoint>,
}

impl Profile {
    pub(crate) fn from_points(points: Vec<MixPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[MixPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&MixPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&MixPoint> {
        self.points.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MixPoint> {
        self.points.iter()
    }

    pub fn to_raw(&self) -> RawProfile {
        self.points
            .iter()
            .map(|p| (RatioKey(p.ratio), p.clone()))
            .collect()
    }

    /// Same number of points, ratios within `ratio_tolerance`, and identical phase names at
    /// every point.
    pub fn same_decomposition(&self, other: &Profile, ratio_tolerance: f64) -> bool {
        self.points.len() == other.points.len()
            && self.points.iter().zip(&other.points).all(|(a, b)| {
                (a.ratio - b.ratio).abs() <= ratio_tolerance && a.phase_names() == b.phase_names()
            })
    }
}

impl<'a> IntoIterator for &'a Profile {
    type Item = &'a MixPoint;
    type IntoIter = std::slice::Iter<'a, MixPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// A chemical-potential interval (relative to the element reference, eV/atom) with the phase
/// equilibrium found at minimum mutual reaction energy.
#[derive(Debug, Clone, PartialEq)]
pub struct ChemicalPotentialWindow {
    pub mu_low: f64,
    pub mu_high: f64,
    pub label: String,
}

/// Reaction energetics of the minimum-mutual-reaction-energy point at one chemical potential.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionEnergetics {
    pub mu: f64,
    /// eV/atom, relative to the linear interpolation between the two endpoints.
    pub mutual_reaction_energy: f64,
    /// eV/atom.
    pub reaction_energy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub open_element: String,
    pub windows: Vec<ChemicalPotentialWindow>,
    pub transitions: Vec<TransitionEnergetics>,
}
