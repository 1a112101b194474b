use crate::core::hull::phase_diagram::PhaseDiagram;
use crate::core::hull::reaction::{NullSpaceBalancer, ReactionBalancer};
use crate::core::io::traits::EntrySource;
use crate::core::models::entry::Entry;
use crate::core::models::entry_set::EntrySet;
use crate::engine::cancel::CancellationToken;
use crate::engine::config::{AnalysisConfig, ScanConfig};
use crate::engine::context::SearchContext;
use crate::engine::error::EngineError;
use crate::engine::profile::{Profile, ScanResult};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tasks::chempot_scan::{self, OpenProfiler};
use crate::engine::tasks::{profile_cleaning, transition_search};
use crate::engine::utils::energetics::{first_minimum, profile_energetics};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{info, instrument};

/// Marks the extreme rows of a presented profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowComment {
    None,
    /// Both reaction energies are minimal here.
    Minimum,
    ReactionEnergyMinimum,
    MutualReactionEnergyMinimum,
}

impl fmt::Display for RowComment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "",
            Self::Minimum => "Minimum",
            Self::ReactionEnergyMinimum => "Rxn. E. Min.",
            Self::MutualReactionEnergyMinimum => "Mutual Rxn. E. Min.",
        })
    }
}

/// One profile point ready for display. Energies are in meV/atom.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRow {
    pub x_entry1: f64,
    pub x_entry2: f64,
    pub reaction_energy: f64,
    pub mutual_reaction_energy: f64,
    pub phases: String,
    pub comment: RowComment,
}

/// Rows for every point of `profile`, with the reaction-energy minima marked.
pub fn profile_rows(profile: &Profile) -> Vec<ProfileRow> {
    let energetics = profile_energetics(profile);
    let min_reaction = first_minimum(&energetics, |e| e.reaction_energy);
    let min_mutual = first_minimum(&energetics, |e| e.mutual_reaction_energy);

    profile
        .iter()
        .zip(&energetics)
        .enumerate()
        .map(|(i, (point, e))| {
            let comment = match (min_reaction == Some(i), min_mutual == Some(i)) {
                (true, true) => RowComment::Minimum,
                (true, false) => RowComment::ReactionEnergyMinimum,
                (false, true) => RowComment::MutualReactionEnergyMinimum,
                (false, false) => RowComment::None,
            };
            ProfileRow {
                x_entry1: point.ratio,
                x_entry2: 1.0 - point.ratio,
                reaction_energy: e.reaction_energy * 1000.0,
                mutual_reaction_energy: e.mutual_reaction_energy * 1000.0,
                phases: point.label(),
                comment,
            }
        })
        .collect()
}

/// A pair of phases mixed along `ratio·entry1 + (1 − ratio)·entry2`, both normalized to one
/// atom per formula unit, together with the phase diagram of their chemical system.
pub struct PseudoBinary<'s, S: ?Sized, B = NullSpaceBalancer> {
    entry1: Entry,
    entry2: Entry,
    originals: [Entry; 2],
    diagram: PhaseDiagram,
    source: &'s S,
    config: AnalysisConfig,
    balancer: B,
    cancel: Option<CancellationToken>,
}

impl<'s, S> PseudoBinary<'s, S>
where
    S: EntrySource + ?Sized,
{
    /// Normalizes both entries and builds the phase diagram of
    /// `chemsys(entry1) ∪ chemsys(entry2) ∪ extra_elements` from `source`, with the two
    /// original entries added and the configured exclusions removed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EntrySource`] if the entries cannot be loaded and
    /// [`EngineError::Oracle`] if they do not form a phase diagram.
    #[instrument(skip_all, name = "pseudo_binary_setup", fields(entry1 = %entry1.name(), entry2 = %entry2.name()))]
    pub fn new(
        entry1: &Entry,
        entry2: &Entry,
        source: &'s S,
        config: AnalysisConfig,
    ) -> Result<Self, EngineError> {
        let chemsys: Vec<String> = entry1
            .composition()
            .chemical_system()
            .into_iter()
            .chain(entry2.composition().chemical_system())
            .chain(config.extra_elements.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let originals = [entry1.clone(), entry2.clone()];
        let entries = collect_entries(source, &chemsys, &config, &originals)?;
        let diagram = PhaseDiagram::new(entries)?;
        info!(
            chemsys = %chemsys.join("-"),
            entries = diagram.entries().len(),
            stable = diagram.stable_entries().len(),
            "Built phase diagram."
        );

        Ok(Self {
            entry1: entry1.normalized(),
            entry2: entry2.normalized(),
            originals,
            diagram,
            source,
            config,
            balancer: NullSpaceBalancer,
            cancel: None,
        })
    }
}

impl<'s, S, B> PseudoBinary<'s, S, B>
where
    S: EntrySource + ?Sized,
    B: ReactionBalancer + Sync,
{
    /// Swaps the reaction balancer used by the analytic transition step.
    pub fn with_balancer<C>(self, balancer: C) -> PseudoBinary<'s, S, C> {
        PseudoBinary {
            entry1: self.entry1,
            entry2: self.entry2,
            originals: self.originals,
            diagram: self.diagram,
            source: self.source,
            config: self.config,
            balancer,
            cancel: self.cancel,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// `entry1`, normalized to one atom per formula unit.
    pub fn entry1(&self) -> &Entry {
        &self.entry1
    }

    pub fn entry2(&self) -> &Entry {
        &self.entry2
    }

    pub fn diagram(&self) -> &PhaseDiagram {
        &self.diagram
    }

    /// Cleaned mixing profile at fixed composition.
    #[instrument(skip_all, name = "closed_mixing_workflow")]
    pub fn closed_mixing(&self, reporter: &ProgressReporter) -> Result<Profile, EngineError> {
        reporter.report(Progress::PhaseStart {
            name: "Closed Mixing",
        });
        let context = self.context(&self.diagram, reporter);
        let raw = transition_search::run(&context, &self.entry1, &self.entry2, 0.0, 1.0)?;
        let profile = profile_cleaning::run(&raw);
        reporter.report(Progress::PhaseFinish);

        info!(samples = raw.len(), points = profile.len(), "Closed mixing profile complete.");
        Ok(profile)
    }

    /// Cleaned mixing profile with the chemical potential of `element` fixed at `mu`
    /// (eV/atom, relative to the element reference).
    #[instrument(skip_all, name = "open_mixing_workflow", fields(element = element, mu = mu))]
    pub fn open_mixing(
        &self,
        element: &str,
        mu: f64,
        reporter: &ProgressReporter,
    ) -> Result<Profile, EngineError> {
        reporter.report(Progress::PhaseStart {
            name: "Open Mixing",
        });
        let diagram = self.open_diagram(element)?;
        let context = self.context(diagram.as_ref(), reporter);
        let profiler = OpenProfiler::new(context, &self.entry1, &self.entry2, element)?;
        let profile = profiler.profile_at(mu)?;
        reporter.report(Progress::PhaseFinish);

        info!(points = profile.len(), "Open mixing profile complete.");
        Ok(profile)
    }

    /// Chemical-potential windows of constant mixing behaviour for the scan in `config`.
    #[instrument(skip_all, name = "chempot_scan_workflow", fields(element = %config.open_element))]
    pub fn scan(
        &self,
        config: &ScanConfig,
        reporter: &ProgressReporter,
    ) -> Result<ScanResult, EngineError> {
        let diagram = self.open_diagram(&config.open_element)?;
        let context = self.context(diagram.as_ref(), reporter);
        let result = chempot_scan::run(&context, &self.entry1, &self.entry2, config)?;
        info!(windows = result.windows.len(), "Chemical potential scan complete.");
        Ok(result)
    }

    pub fn rows(&self, profile: &Profile) -> Vec<ProfileRow> {
        profile_rows(profile)
    }

    /// The closed diagram when it already contains `element`, otherwise a diagram of the
    /// chemical system extended by `element`.
    fn open_diagram(&self, element: &str) -> Result<Cow<'_, PhaseDiagram>, EngineError> {
        if self.diagram.elements().iter().any(|el| el == element) {
            return Ok(Cow::Borrowed(&self.diagram));
        }
        let mut chemsys = self.diagram.elements().to_vec();
        chemsys.push(element.to_string());
        chemsys.sort();
        info!(element, chemsys = %chemsys.join("-"), "Extending the chemical system with the open element.");
        let entries = collect_entries(self.source, &chemsys, &self.config, &self.originals)?;
        Ok(Cow::Owned(PhaseDiagram::new(entries)?))
    }

    fn context<'a, O>(
        &'a self,
        oracle: &'a O,
        reporter: &'a ProgressReporter<'a>,
    ) -> SearchContext<'a, O, B> {
        SearchContext::new(oracle, &self.balancer, &self.config.finder, reporter)
            .with_cancellation(self.cancel.as_ref())
    }
}

fn collect_entries<S: EntrySource + ?Sized>(
    source: &S,
    chemsys: &[String],
    config: &AnalysisConfig,
    originals: &[Entry],
) -> Result<EntrySet, EngineError> {
    let mut entries = source.entries(chemsys)?;
    entries.retain(|entry| !config.exclusions.iter().any(|name| name == entry.name()));
    entries.extend(originals.iter().cloned());
    Ok(entries)
}
