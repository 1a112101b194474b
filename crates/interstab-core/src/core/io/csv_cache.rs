use super::traits::{EntrySource, EntrySourceError};
use crate::core::models::composition::Composition;
use crate::core::models::entry::Entry;
use crate::core::models::entry_set::EntrySet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FILE_SUFFIX: &str = "_Entries.csv";

#[derive(Debug, Deserialize, Serialize)]
struct EntryRecord {
    #[serde(default)]
    material_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    formula: String,
    energy: f64,
    #[serde(default)]
    correction: f64,
}

/// Entries cached as `<El1>_<El2>_..._Entries.csv` files (elements sorted) in one directory.
///
/// Each file holds every entry of its chemical system, subsystems included, with the columns
/// `material_id,name,formula,energy,correction` (only `formula` and `energy` are required).
/// When no file matches a chemical system exactly, the smallest cached superset is filtered
/// down instead.
#[derive(Debug, Clone)]
pub struct EntryCache {
    dir: PathBuf,
    exclusions: Vec<String>,
}

impl EntryCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            exclusions: Vec::new(),
        }
    }

    /// Skips entries whose name or material id is listed.
    pub fn with_exclusions<I, S>(mut self, exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions = exclusions.into_iter().map(Into::into).collect();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name<S: AsRef<str>>(chemsys: &[S]) -> String {
        let elements: BTreeSet<&str> = chemsys.iter().map(AsRef::as_ref).collect();
        let stem: Vec<&str> = elements.into_iter().collect();
        format!("{}{}", stem.join("_"), FILE_SUFFIX)
    }

    /// Writes `entries` as the cache file of `chemsys` and returns its path.
    pub fn store<S: AsRef<str>>(
        &self,
        chemsys: &[S],
        entries: &EntrySet,
    ) -> Result<PathBuf, EntrySourceError> {
        let path = self.dir.join(Self::file_name(chemsys));
        let csv_error = |source| EntrySourceError::Csv {
            path: path.to_string_lossy().to_string(),
            source,
        };
        let mut writer = csv::Writer::from_path(&path).map_err(csv_error)?;
        for entry in entries.iter() {
            writer
                .serialize(EntryRecord {
                    material_id: None,
                    name: Some(entry.name().to_string()),
                    formula: entry.composition().formula(),
                    energy: entry.energy(),
                    correction: entry.correction(),
                })
                .map_err(csv_error)?;
        }
        writer.flush().map_err(|source| EntrySourceError::Io {
            path: path.to_string_lossy().to_string(),
            source,
        })?;
        debug!(path = %path.display(), count = entries.len(), "Stored entry cache.");
        Ok(path)
    }

    fn locate(&self, chemsys: &[String]) -> Result<PathBuf, EntrySourceError> {
        let exact = self.dir.join(Self::file_name(chemsys));
        if exact.is_file() {
            return Ok(exact);
        }

        let wanted: BTreeSet<&str> = chemsys.iter().map(String::as_str).collect();
        let read_dir = std::fs::read_dir(&self.dir).map_err(|source| EntrySourceError::Io {
            path: self.dir.to_string_lossy().to_string(),
            source,
        })?;

        let mut best: Option<(usize, PathBuf)> = None;
        for dir_entry in read_dir.flatten() {
            let file_name = dir_entry.file_name();
            let Some(stem) = file_name.to_str().and_then(|n| n.strip_suffix(FILE_SUFFIX)) else {
                continue;
            };
            let cached: BTreeSet<&str> = stem.split('_').collect();
            if wanted.is_subset(&cached) && best.as_ref().is_none_or(|(size, _)| cached.len() < *size) {
                best = Some((cached.len(), dir_entry.path()));
            }
        }

        best.map(|(_, path)| path)
            .ok_or_else(|| EntrySourceError::MissingChemicalSystem {
                chemsys: chemsys.join("-"),
            })
    }

    fn read(&self, path: &Path, chemsys: &[String]) -> Result<EntrySet, EntrySourceError> {
        let path_str = path.to_string_lossy().to_string();
        let mut reader = csv::Reader::from_path(path).map_err(|source| EntrySourceError::Csv {
            path: path_str.clone(),
            source,
        })?;

        let mut set = EntrySet::new();
        for result in reader.deserialize::<EntryRecord>() {
            let record = result.map_err(|source| EntrySourceError::Csv {
                path: path_str.clone(),
                source,
            })?;
            let composition: Composition =
                record.formula.parse().map_err(|source| EntrySourceError::Formula {
                    path: path_str.clone(),
                    source,
                })?;
            if !composition
                .elements()
                .all(|el| chemsys.iter().any(|wanted| wanted == el))
            {
                continue;
            }

            let mut entry = Entry::new(composition, record.energy).with_correction(record.correction);
            if let Some(name) = record.name.filter(|n| !n.is_empty()) {
                entry = entry.with_name(name);
            }
            let excluded = self.exclusions.iter().any(|ex| {
                ex == entry.name() || record.material_id.as_deref() == Some(ex.as_str())
            });
            if excluded {
                debug!(name = entry.name(), "Excluded cached entry.");
                continue;
            }
            set.insert(entry);
        }
        Ok(set)
    }
}

impl EntrySource for EntryCache {
    fn entries(&self, chemsys: &[String]) -> Result<EntrySet, EntrySourceError> {
        let path = self.locate(chemsys)?;
        let set = self.read(&path, chemsys)?;
        if set.is_empty() {
            warn!(path = %path.display(), "Cache file holds no entries for the chemical system.");
        }
        debug!(path = %path.display(), count = set.len(), "Loaded cached entries.");
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn chemsys(elements: &[&str]) -> Vec<String> {
        elements.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn file_name_sorts_and_deduplicates_elements() {
        assert_eq!(EntryCache::file_name(&["O", "Li", "O"]), "Li_O_Entries.csv");
    }

    #[test]
    fn reads_exact_chemical_system_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("Li_O_Entries.csv"),
            "material_id,formula,energy,correction\nmp-1,Li,-1.9,0\nmp-12,O2,-9.8,0.5\nmp-1960,Li2O,-14.3,-0.7\n",
        )
        .unwrap();
        let cache = EntryCache::new(dir.path());
        let set = cache.entries(&chemsys(&["Li", "O"])).unwrap();
        assert_eq!(set.len(), 3);
        let o2 = set.iter().find(|e| e.name() == "O2").unwrap();
        assert!((o2.total_energy() + 9.3).abs() < 1e-12);
    }

    #[test]
    fn falls_back_to_the_smallest_superset() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("Co_Li_O_Entries.csv"),
            "formula,energy\nLi,-1.9\nCo,-7.1\nO2,-9.8\nLiCoO2,-22.0\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("Co_Li_O_P_Entries.csv"),
            "formula,energy\nLi,-1.9\nP,-5.4\n",
        )
        .unwrap();
        let cache = EntryCache::new(dir.path());
        let set = cache.entries(&chemsys(&["Co", "O"])).unwrap();
        let names: Vec<&str> = set.iter().map(Entry::name).collect();
        assert_eq!(names, vec!["Co", "O2"]);
    }

    #[test]
    fn exclusions_match_names_and_material_ids() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("Li_O_Entries.csv"),
            "material_id,formula,energy\nmp-1,Li,-1.9\nmp-12,O2,-9.8\nmp-841,Li2O2,-19.5\n",
        )
        .unwrap();
        let cache = EntryCache::new(dir.path()).with_exclusions(["mp-1", "Li2O2"]);
        let set = cache.entries(&chemsys(&["Li", "O"])).unwrap();
        let names: Vec<&str> = set.iter().map(Entry::name).collect();
        assert_eq!(names, vec!["O2"]);
    }

    #[test]
    fn missing_chemical_system_is_reported() {
        let dir = tempdir().unwrap();
        let cache = EntryCache::new(dir.path());
        let result = cache.entries(&chemsys(&["Li", "O"]));
        assert!(matches!(result, Err(EntrySourceError::MissingChemicalSystem { .. })));
    }

    #[test]
    fn malformed_formula_is_reported() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Li_Entries.csv"), "formula,energy\nXx2,-1.0\n").unwrap();
        let result = EntryCache::new(dir.path()).entries(&chemsys(&["Li"]));
        assert!(matches!(result, Err(EntrySourceError::Formula { .. })));
    }

    #[test]
    fn stored_entries_read_back() {
        let dir = tempdir().unwrap();
        let cache = EntryCache::new(dir.path());
        let set: EntrySet = vec![
            Entry::new("Li".parse().unwrap(), -1.9),
            Entry::new("Li2O".parse().unwrap(), -14.3).with_correction(-0.7),
        ]
        .into_iter()
        .collect();
        let path = cache.store(&["O", "Li"], &set).unwrap();
        assert!(path.ends_with("Li_O_Entries.csv"));
        let loaded = cache.entries(&chemsys(&["Li", "O"])).unwrap();
        let li2o = loaded.iter().find(|e| e.name() == "Li2O").unwrap();
        assert_eq!(li2o.correction(), -0.7);
    }
}
