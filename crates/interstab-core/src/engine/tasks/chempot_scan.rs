use super::{profile_cleaning, transition_search};
use crate::core::hull::oracle::OpenSystemOracle;
use crate::core::hull::reaction::ReactionBalancer;
use crate::core::models::entry::{ChemPots, Entry};
use crate::engine::config::ScanConfig;
use crate::engine::context::SearchContext;
use crate::engine::error::EngineError;
use crate::engine::profile::{ChemicalPotentialWindow, Profile, ScanResult, TransitionEnergetics};
use crate::engine::progress::Progress;
use crate::engine::utils::energetics::min_mutual_point;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const CANDIDATE_DEDUP_TOLERANCE: f64 = 1e-8;

/// Cleaned mixing profiles of one pseudo-binary with the chemical potential of `element`
/// held fixed by a reservoir.
///
/// Chemical potentials are given relative to the energy per atom of the element's reference
/// entry.
pub struct OpenProfiler<'a, O, B> {
    context: SearchContext<'a, O, B>,
    entry1: &'a Entry,
    entry2: &'a Entry,
    element: &'a str,
    reference: f64,
}

impl<'a, O, B> OpenProfiler<'a, O, B>
where
    O: OpenSystemOracle,
    B: ReactionBalancer,
{
    /// # Errors
    ///
    /// Returns [`EngineError::Oracle`] if the closed system has no reference entry for
    /// `element`.
    pub fn new(
        context: SearchContext<'a, O, B>,
        entry1: &'a Entry,
        entry2: &'a Entry,
        element: &'a str,
    ) -> Result<Self, EngineError> {
        let reference = context.oracle.element_reference(element)?;
        Ok(Self {
            context,
            entry1,
            entry2,
            element,
            reference,
        })
    }

    pub fn element(&self) -> &str {
        self.element
    }

    /// Energy per atom of the element reference, eV/atom.
    pub fn reference(&self) -> f64 {
        self.reference
    }

    /// Chemical potentials (relative) at which the element's equilibrium changes in the closed
    /// system, ascending.
    pub fn transition_chempots(&self) -> Result<Vec<f64>, EngineError> {
        Ok(self
            .context
            .oracle
            .transition_chempots(self.element)?
            .into_iter()
            .map(|mu| mu - self.reference)
            .collect())
    }

    /// Cleaned profile at relative chemical potential `mu`.
    pub fn profile_at(&self, mu: f64) -> Result<Profile, EngineError> {
        let chempots = ChemPots::from([(self.element.to_string(), mu + self.reference)]);
        let grand = self.context.oracle.at_chempots(&chempots)?;
        let entry1 = self.entry1.to_grand_potential(&chempots);
        let entry2 = self.entry2.to_grand_potential(&chempots);
        let context = self.context.with_oracle(&grand);
        let raw = transition_search::run(&context, &entry1, &entry2, 0.0, 1.0)?;
        debug!(mu, samples = raw.len(), "Computed open-system profile.");
        Ok(profile_cleaning::run(&raw))
    }
}

impl<O, B> OpenProfiler<'_, O, B>
where
    O: OpenSystemOracle + Sync,
    B: ReactionBalancer + Sync,
{
    fn profiles_at(&self, chempots: &[f64]) -> Result<Vec<Profile>, EngineError> {
        let reporter = self.context.reporter;
        reporter.report(Progress::TaskStart {
            total_steps: chempots.len() as u64,
        });

        #[cfg(not(feature = "parallel"))]
        let iterator = chempots.iter();

        #[cfg(feature = "parallel")]
        let iterator = chempots.par_iter();

        let profiles = iterator
            .map(|&mu| {
                let profile = self.profile_at(mu);
                reporter.report(Progress::TaskIncrement);
                profile
            })
            .collect::<Result<Vec<_>, _>>();
        reporter.report(Progress::TaskFinish);
        profiles
    }
}

/// Sweeps the open element's relative chemical potential over `[mu_low, mu_high]` and splits
/// it into windows of constant mixing behaviour.
///
/// Candidate boundaries are the closed-system transition chemical potentials inside the
/// range. A candidate is dropped when the cleaned profiles at the midpoints on either side of
/// it decompose identically. Each window is labelled by the phase equilibrium at the minimum
/// mutual reaction energy of the profile at its midpoint. Reversed bounds are swapped.
///
/// # Errors
///
/// Propagates oracle failures and [`EngineError::Cancelled`].
#[instrument(skip_all, name = "chempot_scan_task", fields(element = %config.open_element))]
pub fn run<O, B>(
    context: &SearchContext<O, B>,
    entry1: &Entry,
    entry2: &Entry,
    config: &ScanConfig,
) -> Result<ScanResult, EngineError>
where
    O: OpenSystemOracle + Sync,
    B: ReactionBalancer + Sync,
{
    let profiler = OpenProfiler::new(*context, entry1, entry2, &config.open_element)?;
    let (lo, hi) = if config.mu_low <= config.mu_high {
        (config.mu_low, config.mu_high)
    } else {
        debug!(mu_low = config.mu_low, mu_high = config.mu_high, "Swapping reversed bounds.");
        (config.mu_high, config.mu_low)
    };

    context.reporter.report(Progress::PhaseStart {
        name: "Candidate Screening",
    });
    let candidates = candidate_chempots(&profiler.transition_chempots()?, lo, hi);
    let midpoints: Vec<f64> = candidates.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    let side_profiles = profiler.profiles_at(&midpoints)?;
    let last = candidates.len() - 1;
    let survivors: Vec<f64> = candidates
        .iter()
        .enumerate()
        .filter(|&(i, _)| {
            i == 0
                || i == last
                || !side_profiles[i - 1].same_decomposition(&side_profiles[i], config.ratio_tolerance)
        })
        .map(|(_, &mu)| mu)
        .collect();
    context.reporter.report(Progress::PhaseFinish);
    info!(
        candidates = candidates.len(),
        survivors = survivors.len(),
        "Screened candidate chemical potentials."
    );

    context.reporter.report(Progress::PhaseStart {
        name: "Window Labelling",
    });
    let bounds: Vec<(f64, f64)> = if survivors.len() == 1 {
        vec![(lo, hi)]
    } else {
        survivors.windows(2).map(|w| (w[0], w[1])).collect()
    };
    let centres: Vec<f64> = bounds.iter().map(|(a, b)| (a + b) / 2.0).collect();
    let mut windows: Vec<ChemicalPotentialWindow> = Vec::with_capacity(bounds.len());
    for ((mu_low, mu_high), profile) in bounds.into_iter().zip(profiler.profiles_at(&centres)?) {
        let (point, _) = min_mutual_point(&profile).ok_or_else(empty_profile)?;
        let window = ChemicalPotentialWindow {
            mu_low,
            mu_high,
            label: point.label(),
        };
        push_window(&mut windows, window, config.merge_identical_labels);
    }
    context.reporter.report(Progress::PhaseFinish);

    context.reporter.report(Progress::PhaseStart {
        name: "Transition Energetics",
    });
    let transitions = survivors
        .iter()
        .zip(profiler.profiles_at(&survivors)?)
        .map(|(&mu, profile)| {
            let (_, energetics) = min_mutual_point(&profile).ok_or_else(empty_profile)?;
            Ok(TransitionEnergetics {
                mu,
                mutual_reaction_energy: energetics.mutual_reaction_energy,
                reaction_energy: energetics.reaction_energy,
            })
        })
        .collect::<Result<Vec<_>, EngineError>>()?;
    context.reporter.report(Progress::PhaseFinish);

    Ok(ScanResult {
        open_element: config.open_element.clone(),
        windows,
        transitions,
    })
}

/// `lo`, the transition chemical potentials inside `[lo, hi]`, and `hi`; ascending with near
/// duplicates removed. The outer bounds are kept exactly.
fn candidate_chempots(transitions: &[f64], lo: f64, hi: f64) -> Vec<f64> {
    let mut candidates: Vec<f64> = std::iter::once(lo)
        .chain(transitions.iter().copied().filter(|mu| (lo..=hi).contains(mu)))
        .chain(std::iter::once(hi))
        .collect();
    candidates.sort_by(f64::total_cmp);
    candidates.dedup_by(|a, b| (*a - *b).abs() < CANDIDATE_DEDUP_TOLERANCE);

    if candidates.len() == 1 {
        if lo < hi {
            candidates.push(hi);
        }
    } else if let Some(last) = candidates.last_mut() {
        *last = hi;
    }
    candidates
}

fn push_window(windows: &mut Vec<ChemicalPotentialWindow>, window: ChemicalPotentialWindow, merge: bool) {
    match windows.last_mut() {
        Some(last) if merge && last.label == window.label => last.mu_high = window.mu_high,
        _ => windows.push(window),
    }
}

fn empty_profile() -> EngineError {
    EngineError::Internal("the transition search returned an empty profile".to_string())
}
