//! Computational units of the analysis.
//!
//! The transition search samples one mixing line, profile cleaning reduces its samples to the
//! phase transitions, and the chemical-potential scan repeats both across a range of open
//! element chemical potentials.

pub mod chempot_scan;
pub mod profile_cleaning;
pub mod transition_search;
