//! Configuration of the analysis commands.
//!
//! Values are resolved in order of precedence: command-line flags, `--set KEY=VALUE` pairs,
//! the TOML file given with `--config`, then [`defaults::DefaultsConfig`].

mod builder;
mod defaults;
mod file;
mod models;

pub use builder::{build_config, build_scan_config};
pub use models::AppConfig;
