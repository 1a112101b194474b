//! Loading of entry sets for a chemical system.
//!
//! [`traits::EntrySource`] is the contract used by the workflows; [`csv_cache::EntryCache`]
//! reads locally cached entries from CSV files in an explicit directory.

pub mod csv_cache;
pub mod traits;
