//! # InterStab Core Library
//!
//! Thermodynamic stability profiles of "pseudo-binaries": linear mixtures of two material
//! phases, analysed in a closed system (fixed composition) or in an open system where the
//! chemical potential of one element is fixed by a reservoir.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Immutable data models (`Composition`, `Entry`, `EntrySet`),
//!   the contracts of the phase-equilibrium collaborators (`HullOracle`, `ReactionBalancer`,
//!   `EntrySource`) and small reference implementations of them.
//!
//! - **[`engine`]: The Logic Core.** The adaptive mixing-ratio search, profile cleaning and
//!   chemical-potential scanning, together with their configuration, progress reporting,
//!   cancellation and error types.
//!
//! - **[`workflows`]: The Public API.** Ties `engine` and `core` together into complete
//!   analyses: closed and open pseudo-binary mixing, chemical-potential screening and
//!   single-phase decomposition.

pub mod core;
pub mod engine;
pub mod workflows;

#[cfg(test)]
pub(crate) mod testing;
