//! Small chemical systems shared by the unit tests.

use crate::core::hull::phase_diagram::PhaseDiagram;
use crate::core::models::entry::Entry;
use crate::core::models::entry_set::EntrySet;
use crate::core::models::ids::EntryId;

pub fn entry(formula: &str, energy: f64) -> Entry {
    Entry::new(formula.parse().unwrap(), energy)
}

pub fn id_of(set: &EntrySet, name: &str) -> EntryId {
    set.iter()
        .find(|e| e.name() == name)
        .map(Entry::id)
        .unwrap_or_else(|| panic!("no entry named {name}"))
}

/// Li–O with one stable oxide (Li2O) and an unstable peroxide.
pub fn li_o() -> EntrySet {
    vec![
        entry("Li", -2.0),
        entry("O2", -9.0),
        entry("Li2O", -15.0),
        entry("Li2O2", -18.0),
    ]
    .into_iter()
    .collect()
}

/// Li–Cl with a single salt at the 1:1 composition.
pub fn li_cl() -> EntrySet {
    vec![entry("Li", -2.0), entry("Cl2", -3.6), entry("LiCl", -8.0)]
        .into_iter()
        .collect()
}

/// Li–Co–O where Li2O and CoO react to Li2CoO2 (at 3/5 Li2O by atoms).
pub fn li_co_o() -> EntrySet {
    vec![
        entry("Li", -2.0),
        entry("Co", -7.0),
        entry("O2", -9.0),
        entry("Li2O", -15.0),
        entry("CoO", -13.0),
        entry("Li2CoO2", -29.0),
    ]
    .into_iter()
    .collect()
}

pub fn diagram(set: EntrySet) -> PhaseDiagram {
    PhaseDiagram::new(set).unwrap()
}
