use crate::core::models::composition::is_element;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Termination guard of the mixing-ratio search.
#[derive(Debug, Clone, PartialEq)]
pub struct FinderConfig {
    /// Intervals narrower than this are not subdivided further.
    pub min_interval_width: f64,
    /// Maximum recursion depth of the bisection.
    pub max_depth: usize,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            min_interval_width: 1e-8,
            max_depth: 60,
        }
    }
}

/// Settings shared by every pseudo-binary analysis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisConfig {
    pub finder: FinderConfig,
    /// Extra elements added to the chemical system of the entry set.
    pub extra_elements: Vec<String>,
    /// Entry names or material ids left out of the entry set.
    pub exclusions: Vec<String>,
}

#[derive(Default)]
pub struct AnalysisConfigBuilder {
    min_interval_width: Option<f64>,
    max_depth: Option<usize>,
    extra_elements: Vec<String>,
    exclusions: Vec<String>,
}

impl AnalysisConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_interval_width(mut self, width: f64) -> Self {
        self.min_interval_width = Some(width);
        self
    }
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
    pub fn extra_elements(mut self, elements: Vec<String>) -> Self {
        self.extra_elements = elements;
        self
    }
    pub fn exclusions(mut self, exclusions: Vec<String>) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn build(self) -> Result<AnalysisConfig, ConfigError> {
        let defaults = FinderConfig::default();
        let min_interval_width = self.min_interval_width.unwrap_or(defaults.min_interval_width);
        if !(min_interval_width.is_finite() && min_interval_width > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "min_interval_width",
                reason: format!("must be a positive number, got {min_interval_width}"),
            });
        }
        let max_depth = self.max_depth.unwrap_or(defaults.max_depth);
        if max_depth == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(unknown) = self.extra_elements.iter().find(|el| !is_element(el)) {
            return Err(ConfigError::InvalidParameter {
                name: "extra_elements",
                reason: format!("'{unknown}' is not an element"),
            });
        }
        Ok(AnalysisConfig {
            finder: FinderConfig {
                min_interval_width,
                max_depth,
            },
            extra_elements: self.extra_elements,
            exclusions: self.exclusions,
        })
    }
}

/// A chemical-potential sweep for one open element.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub open_element: String,
    /// Chemical potentials relative to the element's reference energy, eV/atom.
    pub mu_low: f64,
    pub mu_high: f64,
    /// Collapse consecutive windows with the same phase-equilibrium label.
    pub merge_identical_labels: bool,
    /// Ratio tolerance when comparing profiles on either side of a candidate.
    pub ratio_tolerance: f64,
}

#[derive(Default)]
pub struct ScanConfigBuilder {
    open_element: Option<String>,
    chempot_range: Option<(f64, f64)>,
    merge_identical_labels: Option<bool>,
    ratio_tolerance: Option<f64>,
}

impl ScanConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_element(mut self, element: impl Into<String>) -> Self {
        self.open_element = Some(element.into());
        self
    }
    /// Bounds may be given in either order.
    pub fn chempot_range(mut self, a: f64, b: f64) -> Self {
        self.chempot_range = Some((a, b));
        self
    }
    pub fn merge_identical_labels(mut self, merge: bool) -> Self {
        self.merge_identical_labels = Some(merge);
        self
    }
    pub fn ratio_tolerance(mut self, tolerance: f64) -> Self {
        self.ratio_tolerance = Some(tolerance);
        self
    }

    pub fn build(self) -> Result<ScanConfig, ConfigError> {
        let open_element = self
            .open_element
            .ok_or(ConfigError::MissingParameter("open_element"))?;
        if !is_element(&open_element) {
            return Err(ConfigError::InvalidParameter {
                name: "open_element",
                reason: format!("'{open_element}' is not an element"),
            });
        }
        let (mu_low, mu_high) = self
            .chempot_range
            .ok_or(ConfigError::MissingParameter("chempot_range"))?;
        if !(mu_low.is_finite() && mu_high.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                name: "chempot_range",
                reason: "bounds must be finite".to_string(),
            });
        }
        let ratio_tolerance = self.ratio_tolerance.unwrap_or(1e-8);
        if ratio_tolerance.is_nan() || ratio_tolerance < 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "ratio_tolerance",
                reason: format!("must be non-negative, got {ratio_tolerance}"),
            });
        }
        Ok(ScanConfig {
            open_element,
            mu_low,
            mu_high,
            merge_identical_labels: self.merge_identical_labels.unwrap_or(true),
            ratio_tolerance,
        })
    }
}
