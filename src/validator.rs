use std::{collections::BTreeMap, fmt, str::FromStr};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::AnalysisConfig,
    error::{AnalyticsError, Result},
    frame::{ColumnKind, Table},
    stats,
};

/// Declared type for a column in a type-conformance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedType {
    Numeric,
    String,
    Datetime,
    Boolean,
}

impl ExpectedType {
    fn accepts(self, kind: ColumnKind) -> bool {
        match self {
            // Binary flags are numeric for aggregation purposes.
            ExpectedType::Numeric => matches!(kind, ColumnKind::Numeric | ColumnKind::Boolean),
            ExpectedType::String => kind == ColumnKind::String,
            ExpectedType::Datetime => kind == ColumnKind::DateTime,
            ExpectedType::Boolean => kind == ColumnKind::Boolean,
        }
    }
}

impl fmt::Display for ExpectedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExpectedType::Numeric => "numeric",
            ExpectedType::String => "string",
            ExpectedType::Datetime => "datetime",
            ExpectedType::Boolean => "boolean",
        };
        f.write_str(label)
    }
}

impl FromStr for ExpectedType {
    type Err = AnalyticsError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "numeric" => Ok(ExpectedType::Numeric),
            "string" => Ok(ExpectedType::String),
            "datetime" => Ok(ExpectedType::Datetime),
            "boolean" => Ok(ExpectedType::Boolean),
            other => Err(AnalyticsError::InvalidArgument(format!(
                "Unknown expected type '{other}' (use numeric, string, datetime or boolean)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaCheck {
    pub valid: bool,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeCheck {
    pub valid: bool,
    pub mismatches: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeCheck {
    pub valid: bool,
    pub violations: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sufficiency {
    pub sufficient: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingSummary {
    pub column: String,
    pub missing: usize,
    /// Absent for a table with no rows.
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Data-quality snapshot of one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub total_rows: usize,
    pub total_columns: usize,
    pub missing_values: Vec<MissingSummary>,
    pub duplicate_rows: usize,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub numeric_stats: Vec<NumericSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub quality_report: QualityReport,
    pub sufficient_data: Sufficiency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaCheck>,
}

#[derive(Debug, Clone)]
pub struct Validator {
    min_rows: usize,
}

impl Validator {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self::with_min_rows(config.analysis.min_data_points)
    }

    pub fn with_min_rows(min_rows: usize) -> Self {
        Self { min_rows }
    }

    pub fn min_rows(&self) -> usize {
        self.min_rows
    }

    pub fn validate_schema(&self, table: &Table, required: &[String]) -> SchemaCheck {
        let missing: Vec<String> = required
            .iter()
            .filter(|name| !table.has_column(name))
            .cloned()
            .collect();
        if missing.is_empty() {
            info!("✓ All required columns present");
        } else {
            warn!("✗ Missing columns: {missing:?}");
        }
        SchemaCheck {
            valid: missing.is_empty(),
            missing,
        }
    }

    /// Checks declared column types; undeclared or absent columns are skipped.
    pub fn validate_types(
        &self,
        table: &Table,
        expected: &BTreeMap<String, ExpectedType>,
    ) -> TypeCheck {
        let mismatches: BTreeMap<String, String> = expected
            .iter()
            .filter_map(|(name, expected)| {
                let column = table.column(name)?;
                (!expected.accepts(column.kind())).then(|| {
                    (
                        name.clone(),
                        format!("Expected {expected}, got {}", kind_label(column.kind())),
                    )
                })
            })
            .collect();
        if mismatches.is_empty() {
            info!("✓ All data types valid");
        } else {
            warn!("✗ Type mismatches: {mismatches:?}");
        }
        TypeCheck {
            valid: mismatches.is_empty(),
            mismatches,
        }
    }

    /// Counts values strictly outside each declared closed `[min, max]`
    /// range. Columns without violations are not reported.
    pub fn validate_ranges(&self, table: &Table, ranges: &BTreeMap<String, (f64, f64)>) -> RangeCheck {
        let violations: BTreeMap<String, usize> = ranges
            .iter()
            .filter_map(|(name, (min, max))| {
                let values = table.numeric_values(name)?;
                let count = values
                    .iter()
                    .flatten()
                    .filter(|v| **v < *min || **v > *max)
                    .count();
                (count > 0).then(|| (name.clone(), count))
            })
            .collect();
        if violations.is_empty() {
            info!("✓ All values within expected ranges");
        } else {
            warn!("✗ Range violations: {violations:?}");
        }
        RangeCheck {
            valid: violations.is_empty(),
            violations,
        }
    }

    pub fn check_quality(&self, table: &Table) -> QualityReport {
        let rows = table.row_count();
        let missing_values = table
            .columns()
            .iter()
            .map(|column| {
                let missing = column.missing_count();
                MissingSummary {
                    column: column.name().to_string(),
                    missing,
                    percentage: (rows > 0).then(|| missing as f64 / rows as f64 * 100.0),
                }
            })
            .collect();
        let duplicate_rows = table
            .duplicate_mask(&[])
            .map(|mask| mask.into_iter().filter(|dup| *dup).count())
            .unwrap_or(0);
        let numeric_columns: Vec<String> =
            table.numeric_columns().into_iter().map(str::to_string).collect();
        let categorical_columns: Vec<String> = table
            .categorical_columns()
            .into_iter()
            .map(str::to_string)
            .collect();
        let numeric_stats = numeric_columns
            .iter()
            .filter_map(|name| {
                let values = stats::present(&table.numeric_values(name)?);
                let sorted = stats::sorted_copy(&values);
                Some(NumericSummary {
                    column: name.clone(),
                    mean: stats::mean(&values),
                    median: stats::quantile_sorted(&sorted, 0.5),
                    std: stats::std_dev(&values),
                    min: sorted.first().copied(),
                    max: sorted.last().copied(),
                })
            })
            .collect();

        let report = QualityReport {
            total_rows: rows,
            total_columns: table.column_count(),
            missing_values,
            duplicate_rows,
            numeric_columns,
            categorical_columns,
            numeric_stats,
        };
        info!(
            "📊 Data quality: {} rows, {} columns, {} duplicate rows, {} numeric / {} categorical columns",
            report.total_rows,
            report.total_columns,
            report.duplicate_rows,
            report.numeric_columns.len(),
            report.categorical_columns.len()
        );
        report
    }

    pub fn validate_sufficiency(&self, table: &Table) -> Sufficiency {
        let rows = table.row_count();
        if rows < self.min_rows {
            let message = AnalyticsError::InsufficientData {
                rows,
                minimum: self.min_rows,
            }
            .to_string();
            warn!("✗ {message}");
            Sufficiency {
                sufficient: false,
                message,
            }
        } else {
            let message = format!("Sufficient data: {rows} rows");
            info!("✓ {message}");
            Sufficiency {
                sufficient: true,
                message,
            }
        }
    }

    /// The pipeline gate: errors with `InsufficientData` below the minimum.
    pub fn require_sufficient(&self, table: &Table) -> Result<()> {
        let rows = table.row_count();
        if rows < self.min_rows {
            return Err(AnalyticsError::InsufficientData {
                rows,
                minimum: self.min_rows,
            });
        }
        Ok(())
    }

    /// Runs every check and reports; does not enforce the sufficiency gate.
    pub fn validate_all(&self, table: &Table, required: Option<&[String]>) -> ValidationReport {
        info!("🔍 Validating data...");
        ValidationReport {
            quality_report: self.check_quality(table),
            sufficient_data: self.validate_sufficiency(table),
            schema: required
                .filter(|names| !names.is_empty())
                .map(|names| self.validate_schema(table, names)),
        }
    }
}

fn kind_label(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Numeric => "numeric",
        ColumnKind::String => "string",
        ColumnKind::DateTime => "datetime",
        ColumnKind::Boolean => "boolean",
    }
}
