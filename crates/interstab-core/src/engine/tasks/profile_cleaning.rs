use crate::engine::profile::{MixPoint, Profile, RatioKey, RawProfile};
use tracing::trace;

/// Reduces raw samples to the points where the equilibrium phases change.
///
/// Walking in ratio order, a sample is dropped when the last kept phase set is a subset of
/// (or equal to) its own, i.e. the mixture is still inside the same phase field. The final
/// sample is kept even then, so both ends of the sampled domain survive. When it carries the
/// same phases as an interior point kept before it, it takes that point's place.
pub fn run(raw: &RawProfile) -> Profile {
    let mut kept: Vec<MixPoint> = Vec::new();
    for point in raw.values() {
        match kept.last() {
            Some(last) if last.phases.is_subset(&point.phases) => {
                trace!(ratio = point.ratio, "Dropped sample inside the current phase field.");
            }
            _ => kept.push(point.clone()),
        }
    }

    if let (Some(end), Some(last)) = (raw.values().next_back(), kept.last()) {
        if RatioKey(end.ratio) != RatioKey(last.ratio) {
            if kept.len() > 1 && last.phases == end.phases {
                trace!(ratio = last.ratio, "Moved the last transition onto the domain end.");
                kept.pop();
            }
            kept.push(end.clone());
        }
    }
    Profile::from_points(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hull::oracle::Phase;
    use crate::core::models::ids::EntryId;
    use slotmap::SlotMap;

    struct Phases {
        ids: SlotMap<EntryId, ()>,
        known: Vec<(String, EntryId)>,
    }

    impl Phases {
        fn new() -> Self {
            Self {
                ids: SlotMap::with_key(),
                known: Vec::new(),
            }
        }

        fn point(&mut self, ratio: f64, names: &[&str]) -> MixPoint {
            let phases = names
                .iter()
                .map(|&name| {
                    let id = match self.known.iter().find(|(n, _)| n == name) {
                        Some(&(_, id)) => id,
                        None => {
                            let id = self.ids.insert(());
                            self.known.push((name.to_string(), id));
                            id
                        }
                    };
                    Phase {
                        id,
                        name: name.to_string(),
                    }
                })
                .collect();
            MixPoint {
                ratio,
                phases,
                energy: -ratio,
            }
        }
    }

    fn raw(points: Vec<MixPoint>) -> RawProfile {
        points.into_iter().map(|p| (RatioKey(p.ratio), p)).collect()
    }

    fn ratios(profile: &Profile) -> Vec<f64> {
        profile.iter().map(|p| p.ratio).collect()
    }

    fn typical() -> RawProfile {
        let mut phases = Phases::new();
        raw(vec![
            phases.point(0.0, &["Cl2"]),
            phases.point(0.125, &["Cl2", "LiCl"]),
            phases.point(0.25, &["Cl2", "LiCl"]),
            phases.point(0.5, &["LiCl"]),
            phases.point(0.75, &["Li", "LiCl"]),
            phases.point(1.0, &["Li"]),
        ])
    }

    #[test]
    fn keeps_only_phase_field_changes() {
        let cleaned = run(&typical());
        assert_eq!(ratios(&cleaned), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn cleaning_is_idempotent() {
        let once = run(&typical());
        let twice = run(&once.to_raw());
        assert_eq!(once, twice);
    }

    #[test]
    fn ratios_strictly_increase_and_adjacent_sets_differ() {
        let cleaned = run(&typical());
        for pair in cleaned.points().windows(2) {
            assert!(pair[0].ratio < pair[1].ratio);
            assert_ne!(pair[0].phases, pair[1].phases);
        }
    }

    #[test]
    fn subset_point_is_kept_and_superset_dropped() {
        let mut phases = Phases::new();
        let cleaned = run(&raw(vec![
            phases.point(0.0, &["A"]),
            phases.point(0.3, &["A", "B"]),
            phases.point(0.6, &["C"]),
            phases.point(1.0, &["C", "D"]),
        ]));
        assert_eq!(ratios(&cleaned), vec![0.0, 0.6, 1.0]);
        assert_eq!(cleaned.points()[0].phase_names(), vec!["A"]);
    }

    #[test]
    fn single_phase_field_keeps_both_ends() {
        let mut phases = Phases::new();
        let cleaned = run(&raw(vec![
            phases.point(0.0, &["Li2O"]),
            phases.point(1.0, &["Li2O"]),
        ]));
        assert_eq!(ratios(&cleaned), vec![0.0, 1.0]);
    }

    #[test]
    fn end_with_the_phases_of_the_last_transition_replaces_it() {
        let mut phases = Phases::new();
        let cleaned = run(&raw(vec![
            phases.point(0.0, &["Cl2"]),
            phases.point(0.25, &["Cl2", "LiCl"]),
            phases.point(0.5, &["LiCl"]),
            phases.point(0.75, &["Li", "LiCl"]),
            phases.point(0.999, &["Li"]),
            phases.point(1.0, &["Li"]),
        ]));
        assert_eq!(ratios(&cleaned), vec![0.0, 0.5, 1.0]);
        assert_eq!(cleaned.points()[2].phase_names(), vec!["Li"]);
        for pair in cleaned.points().windows(2) {
            assert_ne!(pair[0].phases, pair[1].phases);
        }
    }

    #[test]
    fn empty_input_gives_empty_profile() {
        assert!(run(&RawProfile::new()).is_empty());
    }
}
