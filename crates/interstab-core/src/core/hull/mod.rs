//! # Phase Equilibria Module
//!
//! Contracts of the phase-equilibrium collaborators consumed by the engine, and reference
//! implementations of them.
//!
//! ## Key Components
//!
//! - [`oracle`] - The [`HullOracle`](oracle::HullOracle) and
//!   [`OpenSystemOracle`](oracle::OpenSystemOracle) contracts and their result types
//! - [`convex`] - Lower convex hull in composition–energy space, built by facet enumeration
//! - [`phase_diagram`] - Closed-system phase diagram over an [`EntrySet`](crate::core::models::entry_set::EntrySet)
//! - [`grand`] - Grand-potential phase diagram at fixed chemical potentials of open elements
//! - [`reaction`] - Reaction balancing by the null space of the composition matrix
//!
//! The reference hull enumerates every candidate facet and is intended for the small chemical
//! systems typical of interface studies (a handful of elements, tens of entries).

pub mod convex;
pub mod grand;
pub mod oracle;
pub mod phase_diagram;
pub mod reaction;
