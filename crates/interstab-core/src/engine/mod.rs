//! # Engine Module
//!
//! The computational core of pseudo-binary stability analysis: the adaptive search over the
//! mixing ratio, the compression of its samples into a profile of phase transitions, and the
//! sweep over the chemical potential of an open element.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Search guards and scan parameters, with validating builders
//! - **Profiles** ([`profile`]) - Sampled points, cleaned profiles and scan results
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress reporting
//! - **Cancellation** ([`cancel`]) - Cooperative cancellation with optional deadlines
//! - **Error Handling** ([`error`]) - Engine-specific error types and error propagation
//!
//! Tasks (`tasks`) are the computational units: the transition search, profile cleaning and
//! the chemical-potential scan. They only talk to the collaborator traits of
//! [`crate::core::hull`], so any hull implementation can drive them.

pub(crate) mod cache;
pub mod cancel;
pub mod config;
pub(crate) mod context;
pub mod error;
pub mod profile;
pub mod progress;
pub(crate) mod tasks;
pub mod utils;
