//! Pairwise correlation, single-feature regression, principal components and
//! driver ranking over the numeric columns of a table.

use std::fmt;

use itertools::Itertools;
use log::{debug, info, warn};
use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};

use crate::{
    config::AnalysisConfig,
    error::{AnalyticsError, Result},
    frame::Table,
    stats,
};

/// Fewest complete pairs a regression fit will accept.
pub const MIN_REGRESSION_PAIRS: usize = 10;
/// Numeric columns needed before relationship analysis adds PCA.
pub const MIN_PCA_COLUMNS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
    Kendall,
}

impl CorrelationMethod {
    /// Coefficient over already-paired observations.
    fn coefficient(self, x: &[f64], y: &[f64]) -> Option<f64> {
        match self {
            CorrelationMethod::Pearson => stats::pearson(x, y),
            CorrelationMethod::Spearman => {
                stats::pearson(&stats::average_ranks(x), &stats::average_ranks(y))
            }
            CorrelationMethod::Kendall => kendall_tau_b(x, y),
        }
    }
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CorrelationMethod::Pearson => "pearson",
            CorrelationMethod::Spearman => "spearman",
            CorrelationMethod::Kendall => "kendall",
        };
        f.write_str(label)
    }
}

/// Square, symmetric coefficients over named numeric columns. Off-diagonal
/// entries are `None` when fewer than two complete pairs exist or either side
/// is constant over those pairs; the diagonal is always `1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    columns: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn value(&self, row: usize, column: usize) -> Option<f64> {
        self.values.get(row)?.get(column).copied().flatten()
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let row = self.columns.iter().position(|c| c == a)?;
        let column = self.columns.iter().position(|c| c == b)?;
        self.value(row, column)
    }

    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.values
    }
}

/// Serialises as `{column: {column: coefficient}}` in column order.
impl Serialize for CorrelationMatrix {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        struct Row<'a>(&'a [String], &'a [Option<f64>]);

        impl Serialize for Row<'_> {
            fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (name, value) in self.0.iter().zip(self.1) {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, row) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(name, &Row(&self.columns, row))?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationPair {
    #[serde(rename = "column_a")]
    pub first: String,
    #[serde(rename = "column_b")]
    pub second: String,
    #[serde(rename = "correlation")]
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionFit {
    pub feature: String,
    pub slope: f64,
    pub intercept: f64,
    pub r2: f64,
    pub rmse: f64,
    pub correlation: Option<f64>,
    pub observations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PcaResult {
    pub columns: Vec<String>,
    /// One row of component scores per complete input row.
    pub scores: Vec<Vec<f64>>,
    pub explained_variance_ratio: Vec<f64>,
    pub cumulative_variance: Vec<f64>,
    /// One loading vector per component, over `columns`.
    pub loadings: Vec<Vec<f64>>,
}

impl PcaResult {
    pub fn component_count(&self) -> usize {
        self.loadings.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Driver {
    pub column: String,
    pub correlation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipReport {
    pub correlation_matrix: CorrelationMatrix,
    pub strong_correlations: Vec<CorrelationPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pca: Option<PcaResult>,
}

#[derive(Debug, Clone)]
pub struct CorrelationAnalyzer {
    threshold: f64,
    pca_components: usize,
}

impl CorrelationAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            threshold: config.analysis.correlation_threshold,
            pca_components: config.analysis.pca_components,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn correlation_matrix(&self, table: &Table, method: CorrelationMethod) -> CorrelationMatrix {
        let columns: Vec<String> = table
            .numeric_columns()
            .into_iter()
            .map(str::to_string)
            .collect();
        let series: Vec<Vec<Option<f64>>> = columns
            .iter()
            .map(|name| table.numeric_values(name).unwrap_or_default())
            .collect();
        let n = columns.len();
        let mut values = vec![vec![None; n]; n];
        for (i, row) in values.iter_mut().enumerate() {
            row[i] = Some(1.0);
        }
        for (i, j) in (0..n).tuple_combinations() {
            let (x, y) = stats::paired(&series[i], &series[j]);
            let coefficient = method.coefficient(&x, &y);
            values[i][j] = coefficient;
            values[j][i] = coefficient;
        }
        info!("📊 Correlation matrix ({method}): {n}x{n}");
        CorrelationMatrix { columns, values }
    }

    /// Upper-triangle pairs with `|r| >= threshold` (configured default when
    /// `None`), strongest first; equal magnitudes keep row-major order.
    pub fn strong_correlations(
        &self,
        matrix: &CorrelationMatrix,
        threshold: Option<f64>,
    ) -> Vec<CorrelationPair> {
        let threshold = threshold.unwrap_or(self.threshold);
        let mut pairs: Vec<CorrelationPair> = (0..matrix.len())
            .tuple_combinations()
            .filter_map(|(i, j)| {
                let coefficient = matrix.value(i, j)?;
                (coefficient.abs() >= threshold).then(|| CorrelationPair {
                    first: matrix.columns[i].clone(),
                    second: matrix.columns[j].clone(),
                    coefficient,
                })
            })
            .collect();
        pairs.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));
        info!(
            "🔍 Found {} strong correlations (threshold: {threshold})",
            pairs.len()
        );
        for pair in pairs.iter().take(10) {
            debug!("  {} <-> {}: {:.3}", pair.first, pair.second, pair.coefficient);
        }
        pairs
    }

    /// Fits `target = slope * feature + intercept` per feature over complete
    /// pairs. Features that are absent, non-numeric or have fewer than
    /// [`MIN_REGRESSION_PAIRS`] complete pairs are skipped.
    pub fn regression_analysis(
        &self,
        table: &Table,
        target: &str,
        features: &[String],
    ) -> Vec<RegressionFit> {
        let Some(target_values) = table.numeric_values(target) else {
            warn!("⚠ Regression target '{target}' is missing or not numeric");
            return Vec::new();
        };
        let mut fits = Vec::new();
        for feature in features {
            let Some(feature_values) = table.numeric_values(feature) else {
                debug!("Skipping regression feature '{feature}': missing or not numeric");
                continue;
            };
            let (x, y) = stats::paired(&feature_values, &target_values);
            if x.len() < MIN_REGRESSION_PAIRS {
                debug!(
                    "Skipping regression feature '{feature}': {} complete pairs",
                    x.len()
                );
                continue;
            }
            if let Some(fit) = fit_line(feature, &x, &y) {
                debug!(
                    "  {feature}: R² {:.3}, slope {:.3}",
                    fit.r2, fit.slope
                );
                fits.push(fit);
            }
        }
        info!("📈 Regression analysis for '{target}': {} features fitted", fits.len());
        fits
    }

    /// Principal components of the standardised numeric columns over rows
    /// with no missing numeric value. A constant column standardises to zeros.
    pub fn pca(&self, table: &Table, n_components: usize) -> Result<PcaResult> {
        if n_components == 0 {
            return Err(AnalyticsError::InvalidArgument(
                "PCA needs at least one component".to_string(),
            ));
        }
        let columns: Vec<String> = table
            .numeric_columns()
            .into_iter()
            .map(str::to_string)
            .collect();
        if columns.is_empty() {
            return Err(AnalyticsError::InvalidArgument(
                "PCA needs at least one numeric column".to_string(),
            ));
        }
        let series: Vec<Vec<Option<f64>>> = columns
            .iter()
            .map(|name| table.numeric_values(name).unwrap_or_default())
            .collect();
        let rows: Vec<Vec<f64>> = (0..table.row_count())
            .filter_map(|row| series.iter().map(|s| s[row]).collect::<Option<Vec<f64>>>())
            .collect();
        if rows.len() < 2 {
            return Err(AnalyticsError::InsufficientData {
                rows: rows.len(),
                minimum: 2,
            });
        }

        let p = columns.len();
        let standardized = standardize(&rows, p);
        let count = rows.len();
        let covariance = DMatrix::from_fn(p, p, |i, j| {
            standardized.iter().map(|r| r[i] * r[j]).sum::<f64>() / (count as f64 - 1.0)
        });
        let eigen = SymmetricEigen::new(covariance);
        let order: Vec<usize> = (0..p)
            .sorted_by(|a, b| eigen.eigenvalues[*b].total_cmp(&eigen.eigenvalues[*a]))
            .collect();
        let total: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();
        let k = n_components.min(p).min(count);

        let mut loadings = Vec::with_capacity(k);
        let mut explained_variance_ratio = Vec::with_capacity(k);
        for &idx in order.iter().take(k) {
            let mut vector: Vec<f64> = eigen.eigenvectors.column(idx).iter().copied().collect();
            // Deterministic orientation: the largest-magnitude loading is positive.
            let dominant = vector
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap_or(0.0);
            if dominant < 0.0 {
                vector.iter_mut().for_each(|v| *v = -*v);
            }
            loadings.push(vector);
            let eigenvalue = eigen.eigenvalues[idx].max(0.0);
            explained_variance_ratio.push(if total > 0.0 { eigenvalue / total } else { 0.0 });
        }
        let cumulative_variance = explained_variance_ratio
            .iter()
            .scan(0.0, |acc, ratio| {
                *acc += ratio;
                Some(*acc)
            })
            .collect();
        let scores = standardized
            .iter()
            .map(|row| {
                loadings
                    .iter()
                    .map(|loading| row.iter().zip(loading).map(|(z, w)| z * w).sum())
                    .collect()
            })
            .collect();
        info!(
            "🔬 PCA: {k} components over {p} columns, explained variance {explained_variance_ratio:.3?}"
        );
        Ok(PcaResult {
            columns,
            scores,
            explained_variance_ratio,
            cumulative_variance,
            loadings,
        })
    }

    /// Other numeric columns whose Pearson correlation with `target` has
    /// magnitude at least `min_correlation`, strongest first.
    pub fn drivers_of(&self, table: &Table, target: &str, min_correlation: f64) -> Result<Vec<Driver>> {
        let target_values = table.require_column(target)?.numeric_values().ok_or_else(|| {
            AnalyticsError::InvalidArgument(format!("Target column '{target}' is not numeric"))
        })?;
        let mut drivers: Vec<Driver> = table
            .numeric_columns()
            .into_iter()
            .filter(|name| *name != target)
            .filter_map(|name| {
                let (x, y) = stats::paired(&target_values, &table.numeric_values(name)?);
                let correlation = stats::pearson(&x, &y)?;
                (correlation.abs() >= min_correlation).then(|| Driver {
                    column: name.to_string(),
                    correlation,
                })
            })
            .collect();
        drivers.sort_by(|a, b| b.correlation.abs().total_cmp(&a.correlation.abs()));
        info!("🎯 {} drivers found for '{target}'", drivers.len());
        for driver in &drivers {
            let direction = if driver.correlation > 0.0 { "positive" } else { "negative" };
            debug!("  {}: {:.3} ({direction})", driver.column, driver.correlation);
        }
        Ok(drivers)
    }

    /// Pearson matrix plus strong pairs, and PCA when at least
    /// [`MIN_PCA_COLUMNS`] numeric columns exist. A PCA failure is logged and
    /// leaves `pca` empty.
    pub fn analyze_relationships(&self, table: &Table) -> RelationshipReport {
        info!("🔍 Analyzing relationships between variables...");
        let correlation_matrix = self.correlation_matrix(table, CorrelationMethod::Pearson);
        let strong_correlations = self.strong_correlations(&correlation_matrix, None);
        let pca = if correlation_matrix.len() >= MIN_PCA_COLUMNS {
            match self.pca(table, self.pca_components) {
                Ok(result) => Some(result),
                Err(err) => {
                    warn!("⚠ PCA skipped: {err}");
                    None
                }
            }
        } else {
            None
        };
        info!("✓ Relationship analysis completed");
        RelationshipReport {
            correlation_matrix,
            strong_correlations,
            pca,
        }
    }
}

/// Least-squares line through paired values. A constant feature gets slope 0
/// and the target mean as intercept.
fn fit_line(feature: &str, x: &[f64], y: &[f64]) -> Option<RegressionFit> {
    let n = x.len() as f64;
    let mean_x = stats::mean(x)?;
    let mean_y = stats::mean(y)?;
    let sxx: f64 = x.iter().map(|v| (v - mean_x).powi(2)).sum();
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mean_x) * (b - mean_y)).sum();
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    let intercept = mean_y - slope * mean_x;
    let ss_res: f64 = x
        .iter()
        .zip(y)
        .map(|(a, b)| (b - (slope * a + intercept)).powi(2))
        .sum();
    let ss_tot: f64 = y.iter().map(|v| (v - mean_y).powi(2)).sum();
    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };
    Some(RegressionFit {
        feature: feature.to_string(),
        slope,
        intercept,
        r2,
        rmse: (ss_res / n).sqrt(),
        correlation: stats::pearson(x, y),
        observations: x.len(),
    })
}

/// Z-scores each column with the population deviation; constant columns keep
/// a scale of 1.
fn standardize(rows: &[Vec<f64>], width: usize) -> Vec<Vec<f64>> {
    let (means, scales): (Vec<f64>, Vec<f64>) = (0..width)
        .map(|col| {
            let column: Vec<f64> = rows.iter().map(|r| r[col]).collect();
            let mean = stats::mean(&column).unwrap_or(0.0);
            let scale = stats::population_std_dev(&column)
                .filter(|s| *s > 0.0)
                .unwrap_or(1.0);
            (mean, scale)
        })
        .unzip();
    rows.iter()
        .map(|row| {
            row.iter()
                .zip(means.iter().zip(&scales))
                .map(|(v, (mean, scale))| (v - mean) / scale)
                .collect()
        })
        .collect()
}

/// Kendall's tau-b; `None` with fewer than two pairs or when either side is
/// entirely tied.
fn kendall_tau_b(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mut concordant = 0i64;
    let mut discordant = 0i64;
    let mut ties_x = 0i64;
    let mut ties_y = 0i64;
    for (i, j) in (0..n).tuple_combinations() {
        let dx = x[i] - x[j];
        let dy = y[i] - y[j];
        if dx == 0.0 || dy == 0.0 {
            ties_x += i64::from(dx == 0.0);
            ties_y += i64::from(dy == 0.0);
        } else if dx * dy > 0.0 {
            concordant += 1;
        } else {
            discordant += 1;
        }
    }
    let pairs = (n * (n - 1) / 2) as i64;
    let denominator = ((pairs - ties_x) as f64 * (pairs - ties_y) as f64).sqrt();
    if denominator <= 0.0 {
        return None;
    }
    Some(((concordant - discordant) as f64 / denominator).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Column;

    fn analyzer() -> CorrelationAnalyzer {
        CorrelationAnalyzer::new(&AnalysisConfig::default())
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn sample() -> Table {
        Table::new(vec![
            Column::from_f64("a", &[1.0, 2.0, 3.0, 4.0, 5.0]),
            Column::from_f64("b", &[2.0, 4.0, 6.0, 8.0, 10.0]),
            Column::from_f64("c", &[5.0, 3.0, 4.0, 1.0, 2.0]),
            Column::from_f64("flat", &[7.0; 5]),
        ])
        .unwrap()
    }

    #[test]
    fn matrix_is_symmetric_with_unit_diagonal() {
        let matrix = analyzer().correlation_matrix(&sample(), CorrelationMethod::Pearson);
        assert_eq!(matrix.columns(), &["a", "b", "c", "flat"]);
        for i in 0..matrix.len() {
            assert_eq!(matrix.value(i, i), Some(1.0));
            for j in 0..matrix.len() {
                assert_eq!(matrix.value(i, j), matrix.value(j, i));
            }
        }
        assert!(approx(matrix.get("a", "b").unwrap(), 1.0));
        assert_eq!(matrix.get("a", "flat"), None);
    }

    #[test]
    fn rank_methods_agree_on_monotone_data() {
        let table = Table::new(vec![
            Column::from_f64("x", &[1.0, 2.0, 3.0, 4.0, 5.0]),
            Column::from_f64("y", &[1.0, 4.0, 9.0, 16.0, 100.0]),
        ])
        .unwrap();
        for method in [CorrelationMethod::Spearman, CorrelationMethod::Kendall] {
            let matrix = analyzer().correlation_matrix(&table, method);
            assert!(approx(matrix.get("x", "y").unwrap(), 1.0), "{method}");
        }
    }

    #[test]
    fn kendall_counts_discordant_pairs() {
        // One swapped pair out of ten.
        let tau = kendall_tau_b(&[1.0, 2.0, 3.0, 4.0, 5.0], &[1.0, 2.0, 3.0, 5.0, 4.0]).unwrap();
        assert!(approx(tau, 0.8));
    }

    #[test]
    fn strong_pairs_sorted_by_magnitude() {
        let analyzer = analyzer();
        let matrix = analyzer.correlation_matrix(&sample(), CorrelationMethod::Pearson);
        let pairs = analyzer.strong_correlations(&matrix, Some(0.5));
        assert!(pairs.iter().all(|p| p.coefficient.abs() >= 0.5));
        assert_eq!((pairs[0].first.as_str(), pairs[0].second.as_str()), ("a", "b"));
        assert!(
            pairs
                .windows(2)
                .all(|w| w[0].coefficient.abs() >= w[1].coefficient.abs())
        );
        assert!(analyzer.strong_correlations(&matrix, Some(0.95)).len() <= pairs.len());
    }

    #[test]
    fn regression_recovers_line_and_skips_short_features() {
        let x: Vec<f64> = (0..12).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v + 2.0).collect();
        let mut short = vec![f64::NAN; 12];
        short[..2].copy_from_slice(&[1.0, 2.0]);
        let table = Table::new(vec![
            Column::from_f64("x", &x),
            Column::from_f64("y", &y),
            Column::from_f64("short", &short),
        ])
        .unwrap();
        let features = vec!["x".to_string(), "short".to_string(), "absent".to_string()];
        let fits = analyzer().regression_analysis(&table, "y", &features);
        assert_eq!(fits.len(), 1);
        let fit = &fits[0];
        assert!(approx(fit.slope, 3.0));
        assert!(approx(fit.intercept, 2.0));
        assert!(approx(fit.r2, 1.0));
        assert!(fit.rmse < 1e-9);
        assert_eq!(fit.observations, 12);
    }

    #[test]
    fn pca_orders_components_by_variance() {
        let table = Table::new(vec![
            Column::from_f64("a", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            Column::from_f64("b", &[2.1, 3.9, 6.2, 7.8, 10.1, 12.0]),
            Column::from_f64("c", &[3.0, 1.0, 4.0, 1.0, 5.0, 9.0]),
            Column::from_f64("flat", &[1.0; 6]),
        ])
        .unwrap();
        let result = analyzer().pca(&table, 3).unwrap();
        assert_eq!(result.component_count(), 3);
        assert_eq!(result.scores.len(), 6);
        assert_eq!(result.scores[0].len(), 3);
        assert!(
            result
                .explained_variance_ratio
                .windows(2)
                .all(|w| w[0] >= w[1])
        );
        assert!(*result.cumulative_variance.last().unwrap() <= 1.0 + 1e-9);
        for loading in &result.loadings {
            let dominant = loading
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap();
            assert!(dominant > 0.0);
        }
    }

    #[test]
    fn pca_needs_complete_rows() {
        let table = Table::new(vec![
            Column::from_f64("a", &[1.0, f64::NAN]),
            Column::from_f64("b", &[2.0, 3.0]),
        ])
        .unwrap();
        assert!(matches!(
            analyzer().pca(&table, 2),
            Err(AnalyticsError::InsufficientData { rows: 1, minimum: 2 })
        ));
    }

    #[test]
    fn drivers_rank_by_magnitude_and_require_target() {
        let drivers = analyzer().drivers_of(&sample(), "a", 0.3).unwrap();
        let names: Vec<_> = drivers.iter().map(|d| d.column.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert!(drivers[1].correlation < 0.0);

        assert!(matches!(
            analyzer().drivers_of(&sample(), "nope", 0.3),
            Err(AnalyticsError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn relationships_include_pca_with_three_columns() {
        let report = analyzer().analyze_relationships(&sample());
        assert!(report.pca.is_some());

        let two = Table::new(vec![
            Column::from_f64("a", &[1.0, 2.0, 3.0]),
            Column::from_f64("b", &[3.0, 1.0, 2.0]),
        ])
        .unwrap();
        assert!(analyzer().analyze_relationships(&two).pca.is_none());
    }

    #[test]
    fn matrix_serialises_as_nested_map() {
        let matrix = analyzer().correlation_matrix(&sample(), CorrelationMethod::Pearson);
        let json = serde_json::to_value(&matrix).unwrap();
        assert_eq!(json["a"]["a"], 1.0);
        assert!(json["a"]["flat"].is_null());
    }
}
