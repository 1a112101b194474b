//! # Core Module
//!
//! Fundamental building blocks shared by every analysis in InterStab.
//!
//! ## Architecture
//!
//! - **Material Representation** ([`models`]) - Compositions, energy entries and entry sets
//! - **Phase Equilibria** ([`hull`]) - Hull oracle and reaction balancer contracts together with
//!   reference implementations for small chemical systems
//! - **Entry Sources** ([`io`]) - Lookup of the reference entries of a chemical system
//!
//! ## Scientific Foundation
//!
//! - **Convex hull construction** in composition–energy space: the lower hull defines the
//!   stable phases and the equilibrium decomposition of any overall composition
//! - **Grand-canonical transformation** `Φ = E − Σ nᵢμᵢ` for elements exchanged with a reservoir
//! - **Reaction balancing** by the null space of the element–species composition matrix

pub mod hull;
pub mod io;
pub mod models;
