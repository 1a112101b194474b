use super::entry::Entry;
use super::ids::EntryId;
use slotmap::SlotMap;
use std::collections::BTreeSet;
use std::ops::Index;

/// Arena of entries addressed by stable [`EntryId`]s.
///
/// Inserting an entry stamps it with its id, so entries returned by [`EntrySet::get`] always
/// know where they live. Iteration follows insertion order.
#[derive(Debug, Clone, Default)]
pub struct EntrySet {
    entries: SlotMap<EntryId, Entry>,
    order: Vec<EntryId>,
}

impl EntrySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `entry` and returns its id.
    pub fn insert(&mut self, entry: Entry) -> EntryId {
        let id = self.entries.insert_with_key(|id| {
            let mut entry = entry;
            entry.set_id(id);
            entry
        });
        self.order.push(id);
        id
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        self.entries.get_mut(id)
    }

    pub fn remove(&mut self, id: EntryId) -> Option<Entry> {
        let removed = self.entries.remove(id)?;
        self.order.retain(|&other| other != id);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.order.iter().filter_map(move |&id| self.entries.get(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.order.iter().copied()
    }

    /// Union of the elements of every entry, alphabetically.
    pub fn chemical_system(&self) -> Vec<String> {
        self.iter()
            .flat_map(|entry| entry.composition().chemical_system())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Entries whose elements all belong to `elements`.
    pub fn within<S: AsRef<str>>(&self, elements: &[S]) -> impl Iterator<Item = &Entry> {
        self.iter().filter(move |entry| {
            entry
                .composition()
                .elements()
                .all(|el| elements.iter().any(|allowed| allowed.as_ref() == el))
        })
    }

    /// Keeps only the entries for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&Entry) -> bool) {
        self.entries.retain(|_, entry| keep(entry));
        let entries = &self.entries;
        self.order.retain(|&id| entries.contains_key(id));
    }

    /// Lowest energy per atom among the pure `element` entries.
    pub fn element_reference(&self, element: &str) -> Option<f64> {
        self.iter()
            .filter(|entry| entry.composition().is_element() && entry.composition().contains(element))
            .map(Entry::energy_per_atom)
            .min_by(f64::total_cmp)
    }
}

impl Index<EntryId> for EntrySet {
    type Output = Entry;

    fn index(&self, id: EntryId) -> &Entry {
        &self.entries[id]
    }
}

impl Extend<Entry> for EntrySet {
    fn extend<T: IntoIterator<Item = Entry>>(&mut self, iter: T) {
        for entry in iter {
            self.insert(entry);
        }
    }
}

impl FromIterator<Entry> for EntrySet {
    fn from_iter<T: IntoIterator<Item = Entry>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(formula: &str, energy: f64) -> Entry {
        Entry::new(formula.parse().unwrap(), energy)
    }

    #[test]
    fn insert_stamps_the_entry_with_its_id() {
        let mut set = EntrySet::new();
        let id = set.insert(entry("Li2O", -14.0));
        assert_eq!(set[id].id(), id);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let set: EntrySet = vec![entry("O2", -9.0), entry("Li", -2.0), entry("Li2O", -14.0)]
            .into_iter()
            .collect();
        let names: Vec<&str> = set.iter().map(Entry::name).collect();
        assert_eq!(names, vec!["O2", "Li", "Li2O"]);
    }

    #[test]
    fn chemical_system_is_the_sorted_union_of_elements() {
        let set: EntrySet = vec![entry("Li2O", -14.0), entry("CoO", -12.0)].into_iter().collect();
        assert_eq!(set.chemical_system(), vec!["Co", "Li", "O"]);
    }

    #[test]
    fn within_filters_by_allowed_elements() {
        let set: EntrySet = vec![entry("Li2O", -14.0), entry("CoO", -12.0), entry("Li", -2.0)]
            .into_iter()
            .collect();
        let names: Vec<&str> = set.within(&["Li", "O"]).map(Entry::name).collect();
        assert_eq!(names, vec!["Li2O", "Li"]);
    }

    #[test]
    fn retain_and_remove_keep_order_consistent() {
        let mut set: EntrySet = vec![entry("Li", -2.0), entry("O2", -9.0), entry("Co", -7.0)]
            .into_iter()
            .collect();
        set.retain(|e| e.name() != "O2");
        let first = set.ids().next().unwrap();
        assert!(set.remove(first).is_some());
        let names: Vec<&str> = set.iter().map(Entry::name).collect();
        assert_eq!(names, vec!["Co"]);
    }

    #[test]
    fn element_reference_picks_lowest_energy_per_atom() {
        let set: EntrySet = vec![entry("O2", -9.0), entry("O", -4.0), entry("Li2O", -14.0)]
            .into_iter()
            .collect();
        assert_eq!(set.element_reference("O"), Some(-4.5));
        assert_eq!(set.element_reference("Co"), None);
    }
}
