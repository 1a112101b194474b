use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::AppConfig;
use crate::cli::{ScanArgs, SystemArgs};
use crate::data::DataManager;
use crate::error::{CliError, Result};
use crate::utils::parser;
use interstab::engine::config::{AnalysisConfigBuilder, ScanConfig, ScanConfigBuilder};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub fn build_config(args: &SystemArgs, data_manager: &DataManager) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let search_file = file_config.search.take().unwrap_or_default();
    let scan_file = file_config.scan.take().unwrap_or_default();

    let cache_dir = resolve_cache_dir(
        args.cache_dir.as_deref(),
        file_config.cache_dir.as_deref(),
        data_manager,
    )?;

    let analysis = AnalysisConfigBuilder::new()
        .min_interval_width(
            search_file
                .min_interval_width
                .unwrap_or(defaults.min_interval_width),
        )
        .max_depth(search_file.max_depth.unwrap_or(defaults.max_depth))
        .extra_elements(merge_lists(file_config.extra_elements, &args.extra_elements))
        .exclusions(merge_lists(file_config.exclusions, &args.exclusions))
        .build()?;

    let timeout = args.timeout.map(parse_timeout).transpose()?;

    Ok(AppConfig {
        cache_dir,
        analysis,
        timeout,
        merge_identical_labels: scan_file
            .merge_identical_labels
            .unwrap_or(defaults.merge_identical_labels),
        ratio_tolerance: scan_file.ratio_tolerance.unwrap_or(defaults.ratio_tolerance),
    })
}

pub fn build_scan_config(args: &ScanArgs, app: &AppConfig) -> Result<ScanConfig> {
    ScanConfigBuilder::new()
        .open_element(args.open_element.as_str())
        .chempot_range(args.mu_low, args.mu_high)
        .merge_identical_labels(!args.no_merge && app.merge_identical_labels)
        .ratio_tolerance(args.ratio_tolerance.unwrap_or(app.ratio_tolerance))
        .build()
        .map_err(CliError::from)
}

fn resolve_cache_dir(
    cli_arg: Option<&Path>,
    file_arg: Option<&Path>,
    data_manager: &DataManager,
) -> Result<PathBuf> {
    let path = cli_arg
        .or(file_arg)
        .unwrap_or_else(|| data_manager.get_data_path());
    if !path.is_dir() {
        return Err(CliError::Data(format!(
            "Entry cache directory does not exist: {:?}.\nHint: Run 'interstab data set-path <DIR>' or pass --cache-dir.",
            path
        )));
    }
    Ok(path.to_path_buf())
}

/// File values first, then command-line values not already listed.
fn merge_lists(mut base: Vec<String>, extra: &[String]) -> Vec<String> {
    for value in extra {
        if !base.contains(value) {
            base.push(value.clone());
        }
    }
    base
}

fn parse_timeout(seconds: f64) -> Result<Duration> {
    if seconds.is_finite() && seconds > 0.0 {
        Ok(Duration::from_secs_f64(seconds))
    } else {
        Err(CliError::Argument(format!(
            "Timeout must be a positive number of seconds, got {seconds}"
        )))
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value_str) =
            parser::parse_assignment(kv_pair).map_err(|e| CliError::Config(e.to_string()))?;

        match key {
            "cache-dir" => {
                config.cache_dir = Some(PathBuf::from(value_str));
            }
            "extra-elements" => {
                config.extra_elements = parse_list(value_str);
            }
            "exclusions" => {
                config.exclusions = parse_list(value_str);
            }
            "search.min-interval-width" => {
                config
                    .search
                    .get_or_insert_with(Default::default)
                    .min_interval_width = Some(parse_value(key, value_str, "float")?);
            }
            "search.max-depth" => {
                config.search.get_or_insert_with(Default::default).max_depth =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "scan.merge-identical-labels" => {
                config
                    .scan
                    .get_or_insert_with(Default::default)
                    .merge_identical_labels = Some(parse_value(key, value_str, "boolean")?);
            }
            "scan.ratio-tolerance" => {
                config.scan.get_or_insert_with(Default::default).ratio_tolerance =
                    Some(parse_value(key, value_str, "float")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
