//! Analysis configuration.
//!
//! One immutable [`AnalysisConfig`] is built per run (from YAML or from
//! defaults) and handed by reference to every component constructor. Nothing
//! in the crate reads configuration from global state.
//!
//! ```yaml
//! data:
//!   encoding: utf-8
//!   date_format: "%Y-%m-%d"
//! kpi_thresholds:
//!   performance: { aht: 300, fcr: 0.85, service_level: 0.80 }
//!   quality: { qa_score: 90, csat: 4.0, nps: 50 }
//! analysis:
//!   correlation_threshold: 0.3
//!   outlier_std: 3
//!   min_data_points: 30
//! ```

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub data: DataConfig,
    pub kpi_thresholds: ThresholdConfig,
    pub analysis: AnalysisSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    pub encoding: String,
    pub date_format: String,
    /// Field delimiter; resolved from the file extension when absent.
    pub delimiter: Option<char>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            encoding: "utf-8".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            delimiter: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisSettings {
    pub correlation_threshold: f64,
    pub outlier_std: f64,
    pub min_data_points: usize,
    pub pca_components: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            correlation_threshold: 0.3,
            outlier_std: 3.0,
            min_data_points: 30,
            pca_components: 3,
        }
    }
}

/// Targets keyed by indicator category, then by indicator base name
/// (`aht`, `fcr`, `qa_score`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ThresholdConfig(BTreeMap<String, BTreeMap<String, f64>>);

impl ThresholdConfig {
    pub fn new(categories: BTreeMap<String, BTreeMap<String, f64>>) -> Self {
        Self(categories)
    }

    pub fn category(&self, name: &str) -> Option<&BTreeMap<String, f64>> {
        self.0.get(name)
    }

    pub fn target(&self, category: &str, base_name: &str) -> Option<f64> {
        self.category(category)
            .and_then(|targets| targets.get(base_name))
            .copied()
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        let performance = [("aht", 300.0), ("fcr", 0.85), ("service_level", 0.80)];
        let quality = [("qa_score", 90.0), ("csat", 4.0), ("nps", 50.0)];
        let to_map = |pairs: &[(&str, f64)]| {
            pairs
                .iter()
                .map(|(name, target)| (name.to_string(), *target))
                .collect::<BTreeMap<_, _>>()
        };
        let mut categories = BTreeMap::new();
        categories.insert("performance".to_string(), to_map(&performance));
        categories.insert("quality".to_string(), to_map(&quality));
        Self(categories)
    }
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AnalyticsError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path).map_err(|err| AnalyticsError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let config: AnalysisConfig = serde_yaml::from_reader(BufReader::new(file)).map_err(
            |err| AnalyticsError::Config {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
        )?;
        config.check().map_err(|message| AnalyticsError::Config {
            path: path.to_path_buf(),
            message,
        })?;
        info!("Loaded configuration from {path:?}");
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!("Config file not found: {path:?}; using defaults");
            Ok(Self::default())
        }
    }

    pub fn delimiter(&self) -> Option<u8> {
        self.data
            .delimiter
            .and_then(|c| u8::try_from(u32::from(c)).ok())
    }

    fn check(&self) -> std::result::Result<(), String> {
        if !self.analysis.outlier_std.is_finite() || self.analysis.outlier_std <= 0.0 {
            return Err(format!(
                "analysis.outlier_std must be positive (got {})",
                self.analysis.outlier_std
            ));
        }
        if !(0.0..=1.0).contains(&self.analysis.correlation_threshold) {
            return Err(format!(
                "analysis.correlation_threshold must lie in [0, 1] (got {})",
                self.analysis.correlation_threshold
            ));
        }
        if let Some(delimiter) = self.data.delimiter
            && !delimiter.is_ascii()
        {
            return Err(format!("data.delimiter '{delimiter}' is not an ASCII character"));
        }
        Ok(())
    }
}
