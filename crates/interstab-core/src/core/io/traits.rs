use crate::core::models::composition::CompositionError;
use crate::core::models::entry_set::EntrySet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EntrySourceError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },

    #[error("Invalid formula in '{path}': {source}")]
    Formula {
        path: String,
        source: CompositionError,
    },

    #[error("No cached entries cover chemical system {chemsys}")]
    MissingChemicalSystem { chemsys: String },
}

/// Provides the computed entries of a chemical system.
pub trait EntrySource {
    /// Returns every entry whose elements all belong to `chemsys`, subsystems included.
    ///
    /// # Errors
    ///
    /// Returns an [`EntrySourceError`] if the entries cannot be located or read.
    fn entries(&self, chemsys: &[String]) -> Result<EntrySet, EntrySourceError>;
}

/// An in-memory entry set serves its own subsystems.
impl EntrySource for EntrySet {
    fn entries(&self, chemsys: &[String]) -> Result<EntrySet, EntrySourceError> {
        Ok(self.within(chemsys).cloned().collect())
    }
}
