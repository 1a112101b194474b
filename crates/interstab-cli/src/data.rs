use crate::error::{CliError, Result};
use directories::ProjectDirs;
use interstab::core::io::csv_cache::EntryCache;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const CACHE_FILE_SUFFIX: &str = "_Entries.csv";

/// Locates the directory of cached entry files.
///
/// The directory defaults to the OS-specific data directory and can be redirected with
/// `interstab data set-path`, which records the override in the config directory.
#[derive(Debug)]
pub struct DataManager {
    base_path: PathBuf,
}

impl DataManager {
    pub fn new() -> Result<Self> {
        let path = Self::determine_data_path()?;
        debug!("DataManager initialized with path: {:?}", &path);
        Ok(Self::with_custom_path(path))
    }

    pub fn with_custom_path(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn get_data_path(&self) -> &Path {
        &self.base_path
    }

    /// Chemical systems (e.g. `Li-O`) with a cache file in `dir`, sorted.
    pub fn list_chemical_systems(dir: &Path) -> Result<Vec<String>> {
        let mut systems: Vec<String> = fs::read_dir(dir)?
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                name.to_str()
                    .and_then(|n| n.strip_suffix(CACHE_FILE_SUFFIX))
                    .map(|stem| stem.replace('_', "-"))
            })
            .collect();
        systems.sort();
        Ok(systems)
    }

    /// An entry source reading from `dir` with `exclusions` filtered out.
    pub fn entry_cache(dir: &Path, exclusions: &[String]) -> EntryCache {
        EntryCache::new(dir).with_exclusions(exclusions.iter().cloned())
    }

    pub fn set_custom_path(path: &Path) -> Result<()> {
        let config_path = Self::get_path_config_file()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        fs::write(config_path, absolute.to_string_lossy().as_bytes()).map_err(CliError::from)
    }

    pub fn reset_path() -> Result<()> {
        if let Ok(config_path) = Self::get_path_config_file() {
            if config_path.exists() {
                fs::remove_file(config_path)?;
            }
        }
        Ok(())
    }

    fn determine_data_path() -> Result<PathBuf> {
        match Self::get_path_config_file() {
            Ok(config_path) if config_path.exists() => {
                let custom_path_str = fs::read_to_string(&config_path)?.trim().to_string();
                if custom_path_str.is_empty() {
                    warn!("Custom path config file is empty, falling back to default path.");
                    Self::get_default_data_path()
                } else {
                    Ok(PathBuf::from(custom_path_str))
                }
            }
            _ => Self::get_default_data_path(),
        }
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("org", "interstab", "interstab")
    }

    fn get_path_config_file() -> Result<PathBuf> {
        Self::project_dirs()
            .map(|dirs| dirs.config_dir().join("path.conf"))
            .ok_or_else(|| CliError::Data("Could not determine config directory path.".to_string()))
    }

    fn get_default_data_path() -> Result<PathBuf> {
        Self::project_dirs()
            .map(|dirs| dirs.data_dir().join("entries"))
            .ok_or_else(|| {
                CliError::Data("Could not determine default data directory path.".to_string())
            })
    }
}
