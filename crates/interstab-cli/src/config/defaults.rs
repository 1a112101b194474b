pub struct DefaultsConfig {
    pub min_interval_width: f64,
    pub max_depth: usize,
    pub merge_identical_labels: bool,
    pub ratio_tolerance: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            min_interval_width: 1e-8,
            max_depth: 60,
            merge_identical_labels: true,
            ratio_tolerance: 1e-8,
        }
    }
}
