//! # Core Models Module
//!
//! Data structures describing materials and their energies.
//!
//! ## Key Components
//!
//! - [`composition`] - Element amounts, formula parsing and the periodic table
//! - [`entry`] - Energy records: primary, mixed (virtual) and grand-potential entries
//! - [`entry_set`] - Arena owning the supporting entries of a phase diagram
//! - [`ids`] - Stable identifiers used for provenance and phase sets
//!
//! ## Usage
//!
//! ```ignore
//! use interstab::core::models::{composition::Composition, entry::Entry};
//!
//! let comp: Composition = "Li3PS4".parse()?;
//! let entry = Entry::new(comp, -32.1).normalized();
//! assert!((entry.composition().num_atoms() - 1.0).abs() < 1e-12);
//! ```

pub mod composition;
pub mod entry;
pub mod entry_set;
pub mod ids;
