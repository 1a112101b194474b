//! # Workflows Module
//!
//! High-level entry points that tie the engine and the hull collaborators together into
//! complete analyses.
//!
//! ## Overview
//!
//! Workflows are the top-level API for users of InterStab. Each one assembles the entry set
//! of its chemical system, builds the phase diagram, drives the engine tasks and organises
//! the results for presentation.
//!
//! - **Pseudo-binary** ([`pseudo_binary`]) - Mixing profiles of two phases in a closed system
//!   or at a fixed chemical potential, chemical-potential screening and presentation rows.
//! - **Single phase** ([`single_phase`]) - Phase equilibria and decomposition reaction of one
//!   composition, closed or open.

pub mod pseudo_binary;
pub mod single_phase;
