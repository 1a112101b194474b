use crate::error::{CliError, Result};
use std::fs::File;
use std::path::Path;
use tracing_subscriber::{
    EnvFilter,
    filter::LevelFilter,
    fmt::{self},
    prelude::*,
};

/// Extra filter directives (e.g. `interstab::engine=trace`) read from the environment.
pub const LOG_ENV_VAR: &str = "INTERSTAB_LOG";

pub fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::OFF
    } else {
        match verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

/// The verbosity level as the default directive, refined by `directives` unless `quiet`.
pub fn build_filter(verbosity: u8, quiet: bool, directives: Option<&str>) -> Result<EnvFilter> {
    let builder = EnvFilter::builder().with_default_directive(level_filter(verbosity, quiet).into());
    match directives {
        Some(directives) if !quiet => builder.parse(directives).map_err(|e| {
            CliError::Config(format!("Invalid log directives in {LOG_ENV_VAR}: {e}"))
        }),
        _ => Ok(builder.parse_lossy("")),
    }
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let directives = std::env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(verbosity, quiet, directives.as_deref())?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry().with(filter).with(stderr_layer);

    let installed = if let Some(path) = log_file {
        let file = File::create(path)?;
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_target(true);
        subscriber.with(file_layer).try_init()
    } else {
        subscriber.try_init()
    };

    installed.map_err(|e| CliError::Other(anyhow::anyhow!("Failed to install the logger: {e}")))
}
