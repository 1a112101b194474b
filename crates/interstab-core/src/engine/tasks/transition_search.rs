use crate::core::hull::oracle::{HullOracle, PhaseSet};
use crate::core::hull::reaction::{BalanceError, ReactionBalancer, Species};
use crate::core::models::entry::Entry;
use crate::engine::cache::SampleCache;
use crate::engine::context::SearchContext;
use crate::engine::error::EngineError;
use crate::engine::profile::{MixPoint, RatioKey, RawProfile};
use crate::engine::progress::Progress;
use tracing::{debug, instrument, trace};

const COEFFICIENT_TOLERANCE: f64 = 1e-10;

/// Samples the mixing line `ratio·entry1 + (1 − ratio)·entry2` over `[x_low, x_high]` and
/// returns every sample needed to locate the ratios where the equilibrium phases change.
///
/// Intervals whose ends share phases are resolved in one step by balancing the two end
/// mixtures against the shared phases; all other intervals are bisected. The sample recorded
/// at a bisection midpoint is always the even mixture of `entry1` and `entry2`, and is
/// replaced by the true sample once the halves are searched.
///
/// # Errors
///
/// Returns [`EngineError::InvalidRange`] for bounds outside `[0, 1]` or in the wrong order,
/// [`EngineError::Cancelled`] if the context's token trips, and propagates oracle failures.
#[instrument(skip_all, name = "transition_search_task", fields(x_low = x_low, x_high = x_high))]
pub fn run<O, B>(
    context: &SearchContext<O, B>,
    entry1: &Entry,
    entry2: &Entry,
    x_low: f64,
    x_high: f64,
) -> Result<RawProfile, EngineError>
where
    O: HullOracle,
    B: ReactionBalancer,
{
    let in_domain = |x: f64| (0.0..=1.0).contains(&x);
    if !(in_domain(x_low) && in_domain(x_high) && x_low <= x_high) {
        return Err(EngineError::InvalidRange {
            reason: format!("mixing ratios must satisfy 0 <= {x_low} <= {x_high} <= 1"),
        });
    }

    let mut search = Search {
        context,
        entry1,
        entry2,
        cache: SampleCache::new(),
        profile: RawProfile::new(),
    };
    search.subdivide(x_low, x_high, 0)?;

    debug!(
        samples = search.cache.len(),
        cache_hits = search.cache.hits(),
        points = search.profile.len(),
        "Ratio search finished."
    );
    Ok(search.profile)
}

struct Search<'s, 'a, O, B> {
    context: &'s SearchContext<'a, O, B>,
    entry1: &'s Entry,
    entry2: &'s Entry,
    cache: SampleCache,
    profile: RawProfile,
}

impl<O, B> Search<'_, '_, O, B>
where
    O: HullOracle,
    B: ReactionBalancer,
{
    fn mixture(&self, ratio: f64) -> Result<Entry, EngineError> {
        Ok(Entry::mix(&[(self.entry1, ratio), (self.entry2, 1.0 - ratio)])?)
    }

    fn sample(&mut self, ratio: f64) -> Result<MixPoint, EngineError> {
        if let Some(point) = self.cache.get(ratio) {
            return Ok(point.clone());
        }
        self.context.check_cancelled()?;
        let mixture = self.mixture(ratio)?;
        let decomposition = self.context.oracle.decompose(&mixture)?;
        self.context.reporter.report(Progress::Sampled { ratio });

        let point = MixPoint {
            ratio,
            phases: decomposition.phase_set(),
            energy: decomposition.energy_above_hull,
        };
        trace!(ratio, phases = %point.label(), "Sampled mixing ratio.");
        self.cache.insert(point.clone());
        Ok(point)
    }

    fn record(&mut self, point: MixPoint) {
        self.profile.insert(RatioKey(point.ratio), point);
    }

    fn subdivide(&mut self, x_low: f64, x_high: f64, depth: usize) -> Result<(), EngineError> {
        let left = self.sample(x_low)?;
        let right = self.sample(x_high)?;
        let same = left.phases == right.phases;
        let shared: PhaseSet = left.phases.intersection(&right.phases).cloned().collect();
        self.record(left);
        self.record(right);
        if same {
            return Ok(());
        }

        if !shared.is_empty() {
            if let Some(point) = self.resolve_transition(x_low, x_high, &shared)? {
                self.record(point);
                return Ok(());
            }
        }

        let config = self.context.config;
        if x_high - x_low < config.min_interval_width || depth >= config.max_depth {
            debug!(x_low, x_high, depth, "Interval below resolution; keeping its end samples.");
            return Ok(());
        }

        let x_mid = (x_low + x_high) / 2.0;
        let even = self.sample(0.5)?;
        self.record(MixPoint {
            ratio: x_mid,
            ..even
        });
        self.subdivide(x_low, x_mid, depth + 1)?;
        self.subdivide(x_mid, x_high, depth + 1)
    }

    /// Locates the single transition inside `[x_low, x_high]` from the reaction
    /// `c1·left + c2·right → shared`. `None` when no usable balance exists.
    fn resolve_transition(
        &self,
        x_low: f64,
        x_high: f64,
        shared: &PhaseSet,
    ) -> Result<Option<MixPoint>, EngineError> {
        let left = self.mixture(x_low)?;
        let right = self.mixture(x_high)?;

        let (c1, c2) = match self.balance_ends(&left, &right, shared) {
            Ok(coefficients) => coefficients,
            Err(err) => {
                debug!(x_low, x_high, error = %err, "No exact transition; bisecting.");
                return Ok(None);
            }
        };

        let total = c1 + c2;
        let ratio = (c1 * x_low + c2 * x_high) / total;
        self.context.check_cancelled()?;
        let mixture = Entry::mix(&[(&left, c1 / total), (&right, c2 / total)])?;
        let decomposition = self.context.oracle.decompose(&mixture)?;
        self.context.reporter.report(Progress::Sampled { ratio });
        trace!(ratio, "Resolved exact transition.");

        Ok(Some(MixPoint {
            ratio,
            phases: shared.clone(),
            energy: decomposition.energy_above_hull,
        }))
    }

    fn balance_ends(
        &self,
        left: &Entry,
        right: &Entry,
        shared: &PhaseSet,
    ) -> Result<(f64, f64), BalanceError> {
        let products = shared
            .iter()
            .map(|phase| {
                self.context
                    .oracle
                    .phase_composition(phase)
                    .map(|composition| Species::new(phase.name.clone(), composition, 0.0))
                    .ok_or_else(|| BalanceError::NoBalance {
                        reason: format!("composition of {} is unknown", phase.name),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let reactants = [
            Species::new("left", left.effective_composition(), left.effective_energy()),
            Species::new("right", right.effective_composition(), right.effective_energy()),
        ];

        let reaction = self.context.balancer.balance(&reactants, &products)?;
        let c1 = -reaction.coefficient(0);
        let c2 = -reaction.coefficient(1);
        for (species, c) in [("left", c1), ("right", c2)] {
            if c.abs() < COEFFICIENT_TOLERANCE {
                return Err(BalanceError::DegenerateCoefficient {
                    species: species.to_string(),
                });
            }
        }
        if c1 * c2 < 0.0 {
            return Err(BalanceError::NoBalance {
                reason: "end mixtures fall on opposite sides of the reaction".to_string(),
            });
        }
        if reaction.coefficients()[2..]
            .iter()
            .any(|&c| c * c1 < -COEFFICIENT_TOLERANCE)
        {
            return Err(BalanceError::NoBalance {
                reason: "a shared phase would be consumed".to_string(),
            });
        }
        Ok((c1, c2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hull::phase_diagram::PhaseDiagram;
    use crate::core::hull::reaction::NullSpaceBalancer;
    use crate::engine::cancel::CancellationToken;
    use crate::engine::config::FinderConfig;
    use crate::engine::progress::ProgressReporter;
    use crate::engine::tasks::profile_cleaning;
    use crate::testing::{diagram, id_of, li_cl, li_co_o, li_o};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn search(pd: &PhaseDiagram, first: &str, second: &str) -> RawProfile {
        let config = FinderConfig::default();
        let reporter = ProgressReporter::new();
        let context = SearchContext::new(pd, &NullSpaceBalancer, &config, &reporter);
        let entry1 = pd.entries()[id_of(pd.entries(), first)].normalized();
        let entry2 = pd.entries()[id_of(pd.entries(), second)].normalized();
        run(&context, &entry1, &entry2, 0.0, 1.0).unwrap()
    }

    fn names(point: &MixPoint) -> Vec<&str> {
        point.phase_names()
    }

    #[test]
    fn identical_endpoints_need_only_two_samples() {
        let pd = diagram(li_o());
        let raw = search(&pd, "Li2O", "Li2O");
        assert_eq!(raw.len(), 2);
        let points: Vec<&MixPoint> = raw.values().collect();
        assert_eq!(points[0].ratio, 0.0);
        assert_eq!(points[1].ratio, 1.0);
        assert_eq!(points[0].phases, points[1].phases);
    }

    #[test]
    fn endpoints_are_always_sampled() {
        let pd = diagram(li_cl());
        let raw = search(&pd, "Li", "Cl2");
        assert!(raw.contains_key(&RatioKey(0.0)));
        assert!(raw.contains_key(&RatioKey(1.0)));
        assert_eq!(names(&raw[&RatioKey(0.0)]), vec!["Cl2"]);
        assert_eq!(names(&raw[&RatioKey(1.0)]), vec!["Li"]);
    }

    #[test]
    fn disjoint_endpoints_reveal_the_interior_compound() {
        let pd = diagram(li_cl());
        let raw = search(&pd, "Li", "Cl2");
        assert_eq!(names(&raw[&RatioKey(0.5)]), vec!["LiCl"]);
        assert!(raw.values().all(|p| (0.0..=1.0).contains(&p.ratio)));
    }

    #[test]
    fn shared_phase_transition_is_resolved_exactly() {
        let pd = diagram(li_co_o());
        let raw = search(&pd, "Li2O", "CoO");
        let exact = raw
            .values()
            .find(|p| names(p) == vec!["Li2CoO2"])
            .expect("transition at the ternary compound");
        assert!((exact.ratio - 0.6).abs() < 1e-9);

        let entry1 = pd.entries()[id_of(pd.entries(), "Li2O")].normalized();
        let entry2 = pd.entries()[id_of(pd.entries(), "CoO")].normalized();
        let requery = Entry::mix(&[(&entry1, exact.ratio), (&entry2, 1.0 - exact.ratio)]).unwrap();
        let decomposition = pd.decompose(&requery).unwrap();
        assert_eq!(decomposition.phase_set(), exact.phases);
    }

    #[test]
    fn cleaned_profiles_step_through_distinct_phase_fields() {
        let cases = [
            (li_cl(), "Li", "Cl2"),
            (li_cl(), "LiCl", "Cl2"),
            (li_o(), "Li", "O2"),
            (li_o(), "Li2O", "O2"),
            (li_co_o(), "Li2O", "CoO"),
            (li_co_o(), "Li", "CoO"),
            (li_co_o(), "Li", "O2"),
        ];
        for (set, first, second) in cases {
            let pd = diagram(set);
            let cleaned = profile_cleaning::run(&search(&pd, first, second));
            let points = cleaned.points();
            assert_eq!(points.first().map(|p| p.ratio), Some(0.0), "{first}/{second}");
            assert_eq!(points.last().map(|p| p.ratio), Some(1.0), "{first}/{second}");
            for pair in points.windows(2) {
                assert!(pair[0].ratio < pair[1].ratio, "{first}/{second}");
                assert_ne!(pair[0].phases, pair[1].phases, "{first}/{second}");
            }
        }
    }

    #[test]
    fn disjoint_endpoints_clean_to_exact_transitions() {
        let pd = diagram(li_cl());
        let cleaned = profile_cleaning::run(&search(&pd, "Li", "Cl2"));
        let ratios: Vec<f64> = cleaned.iter().map(|p| p.ratio).collect();
        assert_eq!(ratios, vec![0.0, 0.5, 1.0]);
        let labels: Vec<Vec<&str>> = cleaned.iter().map(|p| p.phase_names()).collect();
        assert_eq!(labels, vec![vec!["Cl2"], vec!["LiCl"], vec!["Li"]]);

        let pd = diagram(li_o());
        let cleaned = profile_cleaning::run(&search(&pd, "Li", "O2"));
        let ratios: Vec<f64> = cleaned.iter().map(|p| p.ratio).collect();
        assert_eq!(ratios.len(), 3);
        assert!((ratios[1] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(cleaned.points()[1].phase_names(), vec!["Li2O"]);
    }

    #[test]
    fn guard_stops_deep_bisection() {
        let pd = diagram(li_cl());
        let config = FinderConfig {
            min_interval_width: 0.1,
            max_depth: 60,
        };
        let reporter = ProgressReporter::new();
        let context = SearchContext::new(&pd, &NullSpaceBalancer, &config, &reporter);
        let li = pd.entries()[id_of(pd.entries(), "Li")].normalized();
        let cl = pd.entries()[id_of(pd.entries(), "Cl2")].normalized();
        let raw = run(&context, &li, &cl, 0.0, 1.0).unwrap();
        assert!(raw.len() < 20);
    }

    #[test]
    fn every_oracle_query_is_reported() {
        let pd = diagram(li_cl());
        let config = FinderConfig::default();
        let queries = AtomicUsize::new(0);
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if matches!(event, Progress::Sampled { .. }) {
                queries.fetch_add(1, Ordering::Relaxed);
            }
        }));
        let context = SearchContext::new(&pd, &NullSpaceBalancer, &config, &reporter);
        let li = pd.entries()[id_of(pd.entries(), "Li")].normalized();
        let cl = pd.entries()[id_of(pd.entries(), "Cl2")].normalized();
        let raw = run(&context, &li, &cl, 0.0, 1.0).unwrap();
        drop(reporter);
        assert!(queries.into_inner() >= raw.len());
    }

    #[test]
    fn cancelled_token_aborts_the_search() {
        let pd = diagram(li_cl());
        let config = FinderConfig::default();
        let reporter = ProgressReporter::new();
        let token = CancellationToken::new();
        token.cancel();
        let context = SearchContext::new(&pd, &NullSpaceBalancer, &config, &reporter)
            .with_cancellation(Some(&token));
        let li = pd.entries()[id_of(pd.entries(), "Li")].normalized();
        let cl = pd.entries()[id_of(pd.entries(), "Cl2")].normalized();
        assert!(matches!(
            run(&context, &li, &cl, 0.0, 1.0),
            Err(EngineError::Cancelled)
        ));
    }

    #[test]
    fn out_of_domain_bounds_are_rejected() {
        let pd = diagram(li_cl());
        let config = FinderConfig::default();
        let reporter = ProgressReporter::new();
        let context = SearchContext::new(&pd, &NullSpaceBalancer, &config, &reporter);
        let li = pd.entries()[id_of(pd.entries(), "Li")].normalized();
        assert!(matches!(
            run(&context, &li, &li, 0.6, 0.4),
            Err(EngineError::InvalidRange { .. })
        ));
        assert!(matches!(
            run(&context, &li, &li, -0.1, 1.0),
            Err(EngineError::InvalidRange { .. })
        ));
    }
}
