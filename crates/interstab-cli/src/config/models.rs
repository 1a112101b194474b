use interstab::engine::config::AnalysisConfig;
use std::path::PathBuf;
use std::time::Duration;

pub struct AppConfig {
    pub cache_dir: PathBuf,
    pub analysis: AnalysisConfig,
    pub timeout: Option<Duration>,
    pub merge_identical_labels: bool,
    pub ratio_tolerance: f64,
}
