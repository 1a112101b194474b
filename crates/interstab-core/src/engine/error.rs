use thiserror::Error;

use super::config::ConfigError;
use crate::core::hull::oracle::OracleError;
use crate::core::hull::reaction::BalanceError;
use crate::core::io::traits::EntrySourceError;
use crate::core::models::composition::CompositionError;
use crate::core::models::entry::EntryError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Phase equilibrium query failed: {source}")]
    Oracle {
        #[from]
        source: OracleError,
    },

    #[error("Invalid composition: {source}")]
    Composition {
        #[from]
        source: CompositionError,
    },

    #[error("Entry construction failed: {source}")]
    Entry {
        #[from]
        source: EntryError,
    },

    #[error("Reaction balancing failed: {source}")]
    Balance {
        #[from]
        source: BalanceError,
    },

    #[error("Entry lookup failed: {source}")]
    EntrySource {
        #[from]
        source: EntrySourceError,
    },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Invalid range: {reason}")]
    InvalidRange { reason: String },

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Internal logic error: {0}")]
    Internal(String),
}
