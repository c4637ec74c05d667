use std::path::{Path, PathBuf};

use log::{error, info};
use serde::Serialize;

use crate::{
    cleaner::Cleaner,
    config::AnalysisConfig,
    correlation::{CorrelationAnalyzer, RelationshipReport},
    error::{AnalyticsError, Result},
    frame::Table,
    kpi::{KpiAnalyzer, KpiCategory, KpiResult, TargetComparison},
    loader::Loader,
    statistics::{DescriptiveStatistics, StatisticalAnalyzer},
    validator::{ValidationReport, Validator},
};

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub remove_outliers: bool,
    /// Columns the schema check must find; empty skips the check.
    pub required_columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TargetReport {
    pub performance: Vec<TargetComparison>,
    pub quality: Vec<TargetComparison>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub sources: Vec<PathBuf>,
    pub rows_loaded: usize,
    pub rows_analyzed: usize,
    pub validation: ValidationReport,
    pub kpis: KpiResult,
    pub targets: TargetReport,
    pub relationships: RelationshipReport,
    pub statistics: DescriptiveStatistics,
}

/// Report plus the cleaned table it was computed from.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub report: AnalysisReport,
    pub cleaned: Table,
}

pub struct Pipeline {
    loader: Loader,
    validator: Validator,
    cleaner: Cleaner,
    kpi: KpiAnalyzer,
    correlation: CorrelationAnalyzer,
    statistics: StatisticalAnalyzer,
}

impl Pipeline {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            loader: Loader::new(config)?,
            validator: Validator::new(config),
            cleaner: Cleaner::new(config),
            kpi: KpiAnalyzer::new(config),
            correlation: CorrelationAnalyzer::new(config),
            statistics: StatisticalAnalyzer::new(config),
        })
    }

    /// Loads the inputs and parses auto-detected date columns.
    pub fn load<P>(&self, inputs: &[P]) -> Result<Table>
    where
        P: AsRef<Path>,
    {
        let table = self.loader.load_inputs(inputs)?;
        Ok(self.loader.parse_dates(&table, None))
    }

    pub fn run<P>(&self, inputs: &[P], options: &PipelineOptions) -> Result<PipelineOutput>
    where
        P: AsRef<Path>,
    {
        info!("[1/6] Loading data...");
        let table = self.load(inputs)?;
        let rows_loaded = table.row_count();
        info!("✓ Loaded {rows_loaded} rows, {} columns", table.column_count());

        info!("[2/6] Validating data...");
        let required = (!options.required_columns.is_empty())
            .then_some(options.required_columns.as_slice());
        let validation = self.validator.validate_all(&table, required);
        if !validation.sufficient_data.sufficient {
            error!("Insufficient data for analysis");
            return Err(AnalyticsError::InsufficientData {
                rows: rows_loaded,
                minimum: self.validator.min_rows(),
            });
        }

        info!("[3/6] Cleaning data...");
        let cleaned = self.cleaner.clean(table, options.remove_outliers)?;

        info!("[4/6] Calculating KPIs...");
        let kpis = self.kpi.calculate_all(&cleaned);
        let targets = TargetReport {
            performance: self
                .kpi
                .compare_to_targets(&kpis.performance, KpiCategory::Performance),
            quality: self.kpi.compare_to_targets(&kpis.quality, KpiCategory::Quality),
        };

        info!("[5/6] Analyzing correlations...");
        let relationships = self.correlation.analyze_relationships(&cleaned);

        info!("[6/6] Summarizing distributions...");
        let statistics = self.statistics.descriptive_statistics(&cleaned);

        let report = AnalysisReport {
            sources: inputs.iter().map(|p| p.as_ref().to_path_buf()).collect(),
            rows_loaded,
            rows_analyzed: cleaned.row_count(),
            validation,
            kpis,
            targets,
            relationships,
            statistics,
        };
        info!("✓ Analysis complete");
        Ok(PipelineOutput { report, cleaned })
    }
}
