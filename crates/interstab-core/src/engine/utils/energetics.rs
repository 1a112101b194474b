use crate::engine::profile::{MixPoint, Profile};

/// Reaction energies of one profile point, in eV/atom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointEnergetics {
    /// Energy released by the mixture reacting to its equilibrium phases (`-e_above_hull`).
    pub reaction_energy: f64,
    /// Reaction energy measured from the line joining the two pure ends, so that
    /// self-decomposition of either end does not count.
    pub mutual_reaction_energy: f64,
}

/// Energetics of every point, using the first and last points as the pure ends.
pub fn profile_energetics(profile: &Profile) -> Vec<PointEnergetics> {
    let (Some(first), Some(last)) = (profile.first(), profile.last()) else {
        return Vec::new();
    };
    let e0 = -first.energy;
    let e1 = -last.energy;
    profile
        .iter()
        .map(|point| PointEnergetics {
            reaction_energy: -point.energy,
            mutual_reaction_energy: mutual_reaction_energy(point, e0, e1),
        })
        .collect()
}

fn mutual_reaction_energy(point: &MixPoint, e0: f64, e1: f64) -> f64 {
    -point.energy - point.ratio * e1 - (1.0 - point.ratio) * e0
}

/// Index of the first minimum of `key` over `energetics`.
pub fn first_minimum(
    energetics: &[PointEnergetics],
    key: impl Fn(&PointEnergetics) -> f64,
) -> Option<usize> {
    energetics
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, e)| {
            let value = key(e);
            match best {
                Some((_, current)) if current <= value => best,
                _ => Some((i, value)),
            }
        })
        .map(|(i, _)| i)
}

/// The point of minimum mutual reaction energy with its energetics.
pub fn min_mutual_point(profile: &Profile) -> Option<(&MixPoint, PointEnergetics)> {
    let energetics = profile_energetics(profile);
    let index = first_minimum(&energetics, |e| e.mutual_reaction_energy)?;
    Some((&profile.points()[index], energetics[index]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn profile(points: &[(f64, f64)]) -> Profile {
        Profile::from_points(
            points
                .iter()
                .map(|&(ratio, energy)| MixPoint {
                    ratio,
                    phases: BTreeSet::new(),
                    energy,
                })
                .collect(),
        )
    }

    #[test]
    fn mutual_energy_is_measured_from_the_end_line() {
        let energetics = profile_energetics(&profile(&[(0.0, 0.1), (0.5, 0.3), (1.0, 0.0)]));
        assert!((energetics[0].mutual_reaction_energy).abs() < 1e-12);
        assert!((energetics[2].mutual_reaction_energy).abs() < 1e-12);
        // -0.3 - 0.5 * 0.0 - 0.5 * (-0.1)
        assert!((energetics[1].mutual_reaction_energy + 0.25).abs() < 1e-12);
        assert!((energetics[1].reaction_energy + 0.3).abs() < 1e-12);
    }

    #[test]
    fn first_minimum_prefers_the_earliest_tie() {
        let energetics = profile_energetics(&profile(&[(0.0, 0.0), (0.4, 0.2), (0.6, 0.2), (1.0, 0.0)]));
        assert_eq!(first_minimum(&energetics, |e| e.reaction_energy), Some(1));
    }

    #[test]
    fn min_mutual_point_of_empty_profile_is_none() {
        assert!(min_mutual_point(&profile(&[])).is_none());
    }
}
