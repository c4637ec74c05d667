//! Descriptive summaries and inferential tests: Shapiro-Wilk normality,
//! pooled two-sample t-test, t-based confidence intervals, anomaly flags,
//! additive seasonal decomposition, Kolmogorov-Smirnov and Mann-Whitney
//! comparisons and one-way ANOVA.
//!
//! Tests return `None` (or an error for structural problems) when the
//! statistic is undefined for the data given, never `NaN`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::{debug, info, warn};
use rand::{SeedableRng, rngs::StdRng, seq::index};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, Normal, StudentsT};

use crate::{
    cleaner::zscore_mask,
    config::AnalysisConfig,
    data::Value,
    error::{AnalyticsError, Result},
    frame::{Column, Table},
    stats::{self, ColumnStats},
};

pub const SIGNIFICANCE_LEVEL: f64 = 0.05;
/// Larger columns are subsampled before the Shapiro-Wilk test.
pub const MAX_NORMALITY_SAMPLE: usize = 5000;
pub const ANOMALY_COLUMN: &str = "is_anomaly";
const SAMPLE_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyMethod {
    #[default]
    ZScore,
    /// Outside `[Q1 - k·IQR, Q3 + k·IQR]`.
    Iqr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericDescription {
    pub column: String,
    #[serde(flatten)]
    pub stats: ColumnStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalDescription {
    pub column: String,
    pub unique_values: usize,
    pub most_common: Option<String>,
    pub most_common_freq: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DescriptiveStatistics {
    pub numeric: Vec<NumericDescription>,
    pub categorical: Vec<CategoricalDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalityResult {
    pub column: String,
    pub statistic: f64,
    pub p_value: f64,
    pub is_normal: bool,
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TTestResult {
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: f64,
    pub significant: bool,
    pub group_a_mean: f64,
    pub group_b_mean: f64,
    pub mean_difference: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
    pub significant: bool,
}

impl TestOutcome {
    fn new(statistic: f64, p_value: f64) -> Self {
        let p_value = p_value.clamp(0.0, 1.0);
        Self {
            statistic,
            p_value,
            significant: p_value < SIGNIFICANCE_LEVEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionComparison {
    pub ks_test: TestOutcome,
    pub mann_whitney: TestOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnovaResult {
    pub f_statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub significant: bool,
    pub num_groups: usize,
    pub group_means: BTreeMap<String, Option<f64>>,
}

/// Additive decomposition of a daily series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decomposition {
    pub period: usize,
    pub dates: Vec<NaiveDate>,
    pub observed: Vec<f64>,
    /// Centred moving average; absent for the half-window at each end.
    pub trend: Vec<Option<f64>>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct StatisticalAnalyzer {
    outlier_std: f64,
}

impl StatisticalAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            outlier_std: config.analysis.outlier_std,
        }
    }

    pub fn descriptive_statistics(&self, table: &Table) -> DescriptiveStatistics {
        let numeric: Vec<NumericDescription> = table
            .numeric_columns()
            .into_iter()
            .filter_map(|name| {
                Some(NumericDescription {
                    column: name.to_string(),
                    stats: ColumnStats::from_values(&table.numeric_values(name)?),
                })
            })
            .collect();
        let categorical: Vec<CategoricalDescription> = table
            .categorical_columns()
            .into_iter()
            .filter_map(|name| table.column(name))
            .map(describe_categorical)
            .collect();
        info!(
            "📊 Descriptive statistics: {} numeric, {} categorical columns",
            numeric.len(),
            categorical.len()
        );
        DescriptiveStatistics {
            numeric,
            categorical,
        }
    }

    /// Shapiro-Wilk per column (all numeric columns when `columns` is
    /// `None`). Columns with three or fewer values, or constant values, are
    /// skipped.
    pub fn test_normality(&self, table: &Table, columns: Option<&[String]>) -> Vec<NormalityResult> {
        let names: Vec<String> = match columns {
            Some(names) => names.to_vec(),
            None => table.numeric_columns().into_iter().map(str::to_string).collect(),
        };
        let mut results = Vec::new();
        for name in names {
            let Some(values) = table.numeric_values(&name).map(|v| stats::present(&v)) else {
                debug!("Skipping normality test for '{name}': missing or not numeric");
                continue;
            };
            if values.len() <= 3 {
                debug!("Skipping normality test for '{name}': {} values", values.len());
                continue;
            }
            let sample = deterministic_sample(&values, MAX_NORMALITY_SAMPLE);
            let Some((statistic, p_value)) = shapiro_wilk(&sample) else {
                debug!("Skipping normality test for '{name}': statistic undefined");
                continue;
            };
            let is_normal = p_value > SIGNIFICANCE_LEVEL;
            info!(
                "🔬 {name}: {} (W={statistic:.4}, p={p_value:.4})",
                if is_normal { "Normal" } else { "Not Normal" }
            );
            results.push(NormalityResult {
                column: name,
                statistic,
                p_value,
                is_normal,
                sample_size: sample.len(),
            });
        }
        results
    }

    /// Independent two-sample t-test with pooled variance. Non-finite values
    /// are ignored; `None` when the statistic is undefined.
    pub fn t_test(&self, group_a: &[f64], group_b: &[f64]) -> Option<TTestResult> {
        let a = finite(group_a);
        let b = finite(group_b);
        let (n1, n2) = (a.len() as f64, b.len() as f64);
        let df = n1 + n2 - 2.0;
        if a.is_empty() || b.is_empty() || df < 1.0 {
            return None;
        }
        let mean_a = stats::mean(&a)?;
        let mean_b = stats::mean(&b)?;
        let ss = |values: &[f64], mean: f64| values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
        let pooled = (ss(&a, mean_a) + ss(&b, mean_b)) / df;
        let se = (pooled * (1.0 / n1 + 1.0 / n2)).sqrt();
        if se == 0.0 || !se.is_finite() {
            return None;
        }
        let statistic = (mean_a - mean_b) / se;
        let p_value = 2.0 * StudentsT::new(0.0, 1.0, df).ok()?.sf(statistic.abs());
        let outcome = TestOutcome::new(statistic, p_value);
        info!(
            "📊 t-test: t={:.4}, p={:.4}, significant={}",
            outcome.statistic, outcome.p_value, outcome.significant
        );
        Some(TTestResult {
            statistic: outcome.statistic,
            p_value: outcome.p_value,
            degrees_of_freedom: df,
            significant: outcome.significant,
            group_a_mean: mean_a,
            group_b_mean: mean_b,
            mean_difference: mean_a - mean_b,
        })
    }

    /// Mean with a two-sided t interval on n − 1 degrees of freedom.
    pub fn confidence_interval(&self, data: &[f64], confidence: f64) -> Result<ConfidenceInterval> {
        if confidence.is_nan() || confidence <= 0.0 || confidence >= 1.0 {
            return Err(AnalyticsError::InvalidArgument(format!(
                "Confidence level must be between 0 and 1, got {confidence}"
            )));
        }
        let values = finite(data);
        let n = values.len();
        let (Some(mean), Some(std)) = (stats::mean(&values), stats::std_dev(&values)) else {
            return Err(AnalyticsError::InsufficientData { rows: n, minimum: 2 });
        };
        let critical = StudentsT::new(0.0, 1.0, n as f64 - 1.0)
            .map_err(|err| AnalyticsError::InvalidArgument(err.to_string()))?
            .inverse_cdf((1.0 + confidence) / 2.0);
        let margin = critical * std / (n as f64).sqrt();
        Ok(ConfidenceInterval {
            mean,
            lower: mean - margin,
            upper: mean + margin,
            confidence,
        })
    }

    /// Returns `table` with a boolean [`ANOMALY_COLUMN`]. The threshold is the
    /// z-score cut-off or the IQR multiplier; it defaults to the configured
    /// outlier deviation. Missing values are never anomalous.
    pub fn detect_anomalies(
        &self,
        table: &Table,
        column: &str,
        method: AnomalyMethod,
        threshold: Option<f64>,
    ) -> Result<Table> {
        let values = table.require_column(column)?.numeric_values().ok_or_else(|| {
            AnalyticsError::InvalidArgument(format!("Column '{column}' is not numeric"))
        })?;
        let threshold = threshold.unwrap_or(self.outlier_std);
        let flags = match method {
            AnomalyMethod::ZScore => zscore_mask(&values, threshold),
            AnomalyMethod::Iqr => iqr_mask(&values, threshold),
        };
        let count = flags.iter().filter(|f| **f).count();
        let share = if flags.is_empty() {
            0.0
        } else {
            count as f64 / flags.len() as f64 * 100.0
        };
        info!("🚨 Anomalies in '{column}' ({method:?}): {count} ({share:.2}%)");
        let cells = flags.into_iter().map(|f| Some(Value::Boolean(f))).collect();
        table.clone().with_column(Column::new(ANOMALY_COLUMN, cells))
    }

    /// Averages `value_column` per calendar day, forward-fills empty days,
    /// then splits the series into centred-moving-average trend, periodic
    /// seasonal means and residual.
    pub fn time_series_decomposition(
        &self,
        table: &Table,
        date_column: &str,
        value_column: &str,
        period: usize,
    ) -> Result<Decomposition> {
        if period < 2 {
            return Err(AnalyticsError::InvalidArgument(format!(
                "Seasonal period must be at least 2, got {period}"
            )));
        }
        let dates = table.require_column(date_column)?;
        let values = table
            .require_column(value_column)?
            .numeric_values()
            .ok_or_else(|| {
                AnalyticsError::InvalidArgument(format!("Column '{value_column}' is not numeric"))
            })?;
        let (dates, observed) = daily_series(dates, &values)?;
        if observed.len() < 2 * period {
            return Err(AnalyticsError::InsufficientData {
                rows: observed.len(),
                minimum: 2 * period,
            });
        }
        let trend = centered_moving_average(&observed, period);
        let seasonal = seasonal_component(&observed, &trend, period);
        let residual = observed
            .iter()
            .zip(&trend)
            .zip(&seasonal)
            .map(|((o, t), s)| t.map(|t| o - t - s))
            .collect();
        info!(
            "📈 Decomposed '{value_column}' over {} days (period {period})",
            observed.len()
        );
        Ok(Decomposition {
            period,
            dates,
            observed,
            trend,
            seasonal,
            residual,
        })
    }

    /// Two-sample Kolmogorov-Smirnov and Mann-Whitney U tests; `None` when
    /// either group is empty after dropping non-finite values.
    pub fn compare_distributions(&self, group_a: &[f64], group_b: &[f64]) -> Option<DistributionComparison> {
        let a = finite(group_a);
        let b = finite(group_b);
        if a.is_empty() || b.is_empty() {
            return None;
        }
        let comparison = DistributionComparison {
            ks_test: ks_two_sample(&a, &b),
            mann_whitney: mann_whitney(&a, &b)?,
        };
        info!(
            "🔬 Distribution comparison: KS p={:.4}, Mann-Whitney p={:.4}",
            comparison.ks_test.p_value, comparison.mann_whitney.p_value
        );
        Some(comparison)
    }

    /// One-way ANOVA of `value_column` across the distinct values of
    /// `group_column` (rows with a missing group are ignored). Groups are
    /// reported in ascending key order.
    pub fn analyze_variance(
        &self,
        table: &Table,
        value_column: &str,
        group_column: &str,
    ) -> Result<AnovaResult> {
        let groups = group_values(table, value_column, group_column)?;
        let group_means = groups
            .iter()
            .map(|(key, values)| (key.clone(), stats::mean(values)))
            .collect();
        let non_empty: Vec<&[f64]> = groups
            .values()
            .filter(|v| !v.is_empty())
            .map(Vec::as_slice)
            .collect();
        let (f_statistic, p_value) = match one_way_anova(&non_empty) {
            Some((f, p)) => (Some(f), Some(p)),
            None => {
                warn!("⚠ ANOVA undefined for '{value_column}' by '{group_column}'");
                (None, None)
            }
        };
        let result = AnovaResult {
            f_statistic,
            p_value,
            significant: p_value.is_some_and(|p| p < SIGNIFICANCE_LEVEL),
            num_groups: groups.len(),
            group_means,
        };
        info!(
            "📊 ANOVA: {} groups, F={:?}, p={:?}",
            result.num_groups, result.f_statistic, result.p_value
        );
        Ok(result)
    }
}

/// Non-missing values of `value_column` keyed by the display text of
/// `group_column`.
pub fn group_values(
    table: &Table,
    value_column: &str,
    group_column: &str,
) -> Result<BTreeMap<String, Vec<f64>>> {
    let values = table
        .require_column(value_column)?
        .numeric_values()
        .ok_or_else(|| {
            AnalyticsError::InvalidArgument(format!("Column '{value_column}' is not numeric"))
        })?;
    let groups = table.require_column(group_column)?;
    let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (group, value) in groups.cells().iter().zip(values) {
        let Some(group) = group else { continue };
        let bucket = grouped.entry(group.as_display()).or_default();
        if let Some(v) = value {
            bucket.push(v);
        }
    }
    Ok(grouped)
}

fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

fn describe_categorical(column: &Column) -> CategoricalDescription {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in column.cells().iter().flatten() {
        *counts.entry(value.as_display()).or_default() += 1;
    }
    // Ties resolve to the smallest value.
    let mut most_common: Option<(&String, usize)> = None;
    for (value, count) in &counts {
        if most_common.is_none_or(|(_, best)| *count > best) {
            most_common = Some((value, *count));
        }
    }
    CategoricalDescription {
        column: column.name().to_string(),
        unique_values: counts.len(),
        most_common: most_common.map(|(value, _)| value.clone()),
        most_common_freq: most_common.map(|(_, count)| count).unwrap_or(0),
    }
}

/// Reproducible subsample of at most `limit` values.
fn deterministic_sample(values: &[f64], limit: usize) -> Vec<f64> {
    if values.len() <= limit {
        return values.to_vec();
    }
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    let mut picked = index::sample(&mut rng, values.len(), limit).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|idx| values[idx]).collect()
}

fn standard_normal() -> Option<Normal> {
    Normal::new(0.0, 1.0).ok()
}

fn iqr_mask(values: &[Option<f64>], multiplier: f64) -> Vec<bool> {
    let sorted = stats::sorted_copy(&stats::present(values));
    let (Some(q1), Some(q3)) = (
        stats::quantile_sorted(&sorted, 0.25),
        stats::quantile_sorted(&sorted, 0.75),
    ) else {
        return vec![false; values.len()];
    };
    let iqr = q3 - q1;
    let (lower, upper) = (q1 - multiplier * iqr, q3 + multiplier * iqr);
    values
        .iter()
        .map(|v| v.is_some_and(|v| v < lower || v > upper))
        .collect()
}

/// Daily means from the first to the last dated observation, with empty
/// days carrying the previous day's mean.
fn daily_series(dates: &Column, values: &[Option<f64>]) -> Result<(Vec<NaiveDate>, Vec<f64>)> {
    let mut days: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for (cell, value) in dates.cells().iter().zip(values) {
        let (Some(date), Some(value)) = (
            cell.as_ref().and_then(Value::as_datetime).map(|dt| dt.date()),
            value,
        ) else {
            continue;
        };
        days.entry(date).or_default().push(*value);
    }
    let (Some(first), Some(last)) = (days.keys().next().copied(), days.keys().next_back().copied())
    else {
        return Ok((Vec::new(), Vec::new()));
    };
    let mut dates = Vec::new();
    let mut observed = Vec::new();
    let mut previous = 0.0;
    let mut day = first;
    while day <= last {
        let value = days
            .get(&day)
            .and_then(|values| stats::mean(values))
            .unwrap_or(previous);
        dates.push(day);
        observed.push(value);
        previous = value;
        day = day.succ_opt().ok_or_else(|| {
            AnalyticsError::InvalidArgument(format!("Date {day} is out of range"))
        })?;
    }
    Ok((dates, observed))
}

/// Centred moving average; an even period uses a 2×period average with
/// half weights at both ends.
fn centered_moving_average(series: &[f64], period: usize) -> Vec<Option<f64>> {
    let weights: Vec<f64> = if period % 2 == 0 {
        let mut w = vec![1.0 / period as f64; period + 1];
        w[0] /= 2.0;
        w[period] /= 2.0;
        w
    } else {
        vec![1.0 / period as f64; period]
    };
    let half = weights.len() / 2;
    (0..series.len())
        .map(|t| {
            if t < half || t + half >= series.len() {
                return None;
            }
            let window = &series[t - half..=t + half];
            Some(window.iter().zip(&weights).map(|(v, w)| v * w).sum())
        })
        .collect()
}

/// Mean detrended value per phase, centred to sum to zero, tiled over the
/// series.
fn seasonal_component(series: &[f64], trend: &[Option<f64>], period: usize) -> Vec<f64> {
    let phase_means: Vec<f64> = (0..period)
        .map(|phase| {
            let detrended: Vec<f64> = series
                .iter()
                .zip(trend)
                .skip(phase)
                .step_by(period)
                .filter_map(|(v, t)| t.map(|t| v - t))
                .collect();
            stats::mean(&detrended).unwrap_or(0.0)
        })
        .collect();
    let offset = stats::mean(&phase_means).unwrap_or(0.0);
    (0..series.len())
        .map(|t| phase_means[t % period] - offset)
        .collect()
}

/// Royston's approximation (AS R94) of the Shapiro-Wilk W test. Returns
/// `(W, p)`; `None` outside 3..=5000 values or for a constant sample.
fn shapiro_wilk(data: &[f64]) -> Option<(f64, f64)> {
    const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.07119, 4.434685, -2.706056];
    const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
    const C3: [f64; 4] = [0.544, -0.39978, 0.025054, -6.714e-4];
    const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
    const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
    const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
    const G: [f64; 2] = [-2.273, 0.459];

    let n = data.len();
    if !(3..=MAX_NORMALITY_SAMPLE).contains(&n) {
        return None;
    }
    let x = stats::sorted_copy(data);
    let mean = stats::mean(&x)?;
    let ss: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    if stats::is_constant(&x) || ss <= 0.0 {
        return None;
    }
    let nf = n as f64;
    if n == 3 {
        let w = (0.5 * (x[2] - x[0]).powi(2) / ss).clamp(0.75, 1.0);
        let p = 1.0 - 6.0 / std::f64::consts::PI * w.sqrt().acos();
        return Some((w, p.clamp(0.0, 1.0)));
    }

    let normal = standard_normal()?;
    let half = n / 2;
    // Blom scores for the lower half; the upper half mirrors them.
    let m: Vec<f64> = (0..half)
        .map(|i| -normal.inverse_cdf((i as f64 + 1.0 - 0.375) / (nf + 0.25)))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / nf.sqrt();

    let mut a: Vec<f64> = m.iter().map(|v| v / ssumm2).collect();
    a[0] = m[0] / ssumm2 + polynomial(&C1, rsn);
    let corrected = if n > 5 { 2 } else { 1 };
    if corrected == 2 {
        a[1] = m[1] / ssumm2 + polynomial(&C2, rsn);
    }
    let fac_num = summ2 - 2.0 * m[..corrected].iter().map(|v| v * v).sum::<f64>();
    let fac_den = 1.0 - 2.0 * a[..corrected].iter().map(|v| v * v).sum::<f64>();
    if fac_num <= 0.0 || fac_den <= 0.0 {
        return None;
    }
    let fac = (fac_num / fac_den).sqrt();
    for (coefficient, score) in a.iter_mut().zip(&m).skip(corrected) {
        *coefficient = score / fac;
    }

    let numerator: f64 = a
        .iter()
        .enumerate()
        .map(|(i, coefficient)| coefficient * (x[n - 1 - i] - x[i]))
        .sum();
    let w = (numerator * numerator / ss).min(1.0);

    let w1 = 1.0 - w;
    if w1 <= 0.0 {
        return Some((w, 1.0));
    }
    let y = w1.ln();
    let z = if n <= 11 {
        let gamma = polynomial(&G, nf);
        if y >= gamma {
            return Some((w, 0.0));
        }
        let y = -(gamma - y).ln();
        (y - polynomial(&C3, nf)) / polynomial(&C4, nf).exp()
    } else {
        let ln_n = nf.ln();
        (y - polynomial(&C5, ln_n)) / polynomial(&C6, ln_n).exp()
    };
    Some((w, normal.sf(z).clamp(0.0, 1.0)))
}

/// `c[0] + c[1]·x + c[2]·x² + …`
fn polynomial(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Two-sided two-sample KS test with the asymptotic Kolmogorov
/// distribution (Stephens' small-sample correction).
fn ks_two_sample(a: &[f64], b: &[f64]) -> TestOutcome {
    let a = stats::sorted_copy(a);
    let b = stats::sorted_copy(b);
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut d: f64 = 0.0;
    while i < a.len() && j < b.len() {
        let value = a[i].min(b[j]);
        while i < a.len() && a[i] <= value {
            i += 1;
        }
        while j < b.len() && b[j] <= value {
            j += 1;
        }
        d = d.max((i as f64 / n1 - j as f64 / n2).abs());
    }
    let en = (n1 * n2 / (n1 + n2)).sqrt();
    let lambda = (en + 0.12 + 0.11 / en) * d;
    TestOutcome::new(d, kolmogorov_sf(lambda))
}

fn kolmogorov_sf(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    let mut sum = 0.0;
    for k in 1..=100i32 {
        let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
        let k = f64::from(k);
        let term = sign * (-2.0 * k * k * lambda * lambda).exp();
        sum += term;
        if term.abs() < 1e-15 {
            break;
        }
    }
    (2.0 * sum).clamp(0.0, 1.0)
}

/// Mann-Whitney U for the first group, two-sided normal approximation with
/// tie and continuity corrections.
fn mann_whitney(a: &[f64], b: &[f64]) -> Option<TestOutcome> {
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let combined: Vec<f64> = a.iter().chain(b).copied().collect();
    let ranks = stats::average_ranks(&combined);
    let rank_sum: f64 = ranks[..a.len()].iter().sum();
    let u = rank_sum - n1 * (n1 + 1.0) / 2.0;

    let n = n1 + n2;
    let ties: f64 = stats::tie_groups(&combined)
        .into_iter()
        .map(|t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum();
    let variance = n1 * n2 / 12.0 * ((n + 1.0) - ties / (n * (n - 1.0)));
    let mu = n1 * n2 / 2.0;
    if variance.is_nan() || variance <= 0.0 {
        return Some(TestOutcome::new(u, 1.0));
    }
    let z = ((u - mu).abs() - 0.5).max(0.0) / variance.sqrt();
    Some(TestOutcome::new(u, 2.0 * standard_normal()?.sf(z)))
}

/// `(F, p)` across groups; `None` with fewer than two groups, no residual
/// degrees of freedom or zero within-group variance.
fn one_way_anova(groups: &[&[f64]]) -> Option<(f64, f64)> {
    let k = groups.len();
    let total: usize = groups.iter().map(|g| g.len()).sum();
    if k < 2 || total <= k {
        return None;
    }
    let grand_mean = groups.iter().flat_map(|g| g.iter()).sum::<f64>() / total as f64;
    let mut between = 0.0;
    let mut within = 0.0;
    for group in groups {
        let mean = stats::mean(group)?;
        between += group.len() as f64 * (mean - grand_mean).powi(2);
        within += group.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    }
    let df_between = (k - 1) as f64;
    let df_within = (total - k) as f64;
    if within <= 0.0 {
        return None;
    }
    let f = (between / df_between) / (within / df_within);
    let p = FisherSnedecor::new(df_between, df_within).ok()?.sf(f);
    Some((f, p.clamp(0.0, 1.0)))
}
