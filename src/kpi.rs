//! Performance and quality indicators, target comparison and period trends.
//!
//! Every indicator is computed only when its source column(s) exist and hold
//! numeric (or boolean) data. An absent indicator is `None` and is omitted from
//! serialised output rather than reported as zero.

use std::{collections::BTreeMap, fmt};

use chrono::{Datelike, Days, Months, NaiveDate};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AnalysisConfig, ThresholdConfig},
    error::{AnalyticsError, Result},
    frame::Table,
    stats,
};

pub const HANDLE_TIME: &str = "handle_time";
pub const FIRST_CALL_RESOLUTION: &str = "first_call_resolution";
pub const CALLS_OFFERED: &str = "calls_offered";
pub const CALLS_ANSWERED: &str = "calls_answered";
pub const LOGGED_TIME: &str = "logged_time";
pub const PRODUCTIVE_TIME: &str = "productive_time";
pub const SCHEDULED_TIME: &str = "scheduled_time";
pub const ACTUAL_TIME: &str = "actual_time";
pub const QA_SCORE: &str = "qa_score";
pub const CSAT_SCORE: &str = "csat_score";
pub const NPS_SCORE: &str = "nps_score";
pub const COMPLIANCE_PASS: &str = "compliance_pass";
pub const ERROR_COUNT: &str = "error_count";
pub const TOTAL_INTERACTIONS: &str = "total_interactions";

const ROLLING_WINDOW: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiCategory {
    Performance,
    Quality,
}

impl KpiCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            KpiCategory::Performance => "performance",
            KpiCategory::Quality => "quality",
        }
    }
}

impl fmt::Display for KpiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A group of named indicators that can be listed in a fixed order.
pub trait IndicatorSet {
    /// Present indicators as `(name, value)`, in declaration order.
    fn indicators(&self) -> Vec<(&'static str, f64)>;

    fn len(&self) -> usize {
        self.indicators().len()
    }

    fn is_empty(&self) -> bool {
        self.indicators().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceKpis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aht: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aht_median: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aht_std: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcr_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupancy_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adherence: Option<f64>,
}

impl IndicatorSet for PerformanceKpis {
    fn indicators(&self) -> Vec<(&'static str, f64)> {
        present_indicators([
            ("aht", self.aht),
            ("aht_median", self.aht_median),
            ("aht_std", self.aht_std),
            ("fcr_rate", self.fcr_rate),
            ("service_level", self.service_level),
            ("occupancy_rate", self.occupancy_rate),
            ("adherence", self.adherence),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityKpis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qa_score_avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qa_score_median: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qa_score_std: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csat_avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csat_median: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nps_avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
}

impl IndicatorSet for QualityKpis {
    fn indicators(&self) -> Vec<(&'static str, f64)> {
        present_indicators([
            ("qa_score_avg", self.qa_score_avg),
            ("qa_score_median", self.qa_score_median),
            ("qa_score_std", self.qa_score_std),
            ("csat_avg", self.csat_avg),
            ("csat_median", self.csat_median),
            ("nps_avg", self.nps_avg),
            ("compliance_rate", self.compliance_rate),
            ("error_rate", self.error_rate),
        ])
    }
}

fn present_indicators<const N: usize>(
    entries: [(&'static str, Option<f64>); N],
) -> Vec<(&'static str, f64)> {
    entries
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KpiResult {
    pub performance: PerformanceKpis,
    pub quality: QualityKpis,
}

impl KpiResult {
    /// Human-readable block: upper-cased indicator names, two decimals.
    pub fn summary(&self) -> String {
        let rule = "=".repeat(60);
        let mut lines = vec![rule.clone(), "KPI SUMMARY".to_string(), rule.clone()];
        lines.push(String::new());
        lines.push("PERFORMANCE METRICS:".to_string());
        for (name, value) in self.performance.indicators() {
            lines.push(format!("  {}: {value:.2}", name.to_uppercase()));
        }
        lines.push(String::new());
        lines.push("QUALITY METRICS:".to_string());
        for (name, value) in self.quality.indicators() {
            lines.push(format!("  {}: {value:.2}", name.to_uppercase()));
        }
        lines.push(rule);
        lines.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetComparison {
    pub indicator: String,
    pub actual: f64,
    pub target: f64,
    pub delta: f64,
    pub pct_delta: f64,
    pub meets_target: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendPeriod {
    Day,
    /// Weeks end on Sunday and are labelled with that Sunday.
    Week,
    /// Labelled with the last day of the month.
    Month,
}

impl TrendPeriod {
    fn label(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            TrendPeriod::Day => Some(date),
            TrendPeriod::Week => {
                let to_sunday = 6 - u64::from(date.weekday().num_days_from_monday());
                date.checked_add_days(Days::new(to_sunday))
            }
            TrendPeriod::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?
                .checked_add_months(Months::new(1))?
                .pred_opt(),
        }
    }

    fn next(self, label: NaiveDate) -> Option<NaiveDate> {
        match self {
            TrendPeriod::Day => label.succ_opt(),
            TrendPeriod::Week => label.checked_add_days(Days::new(7)),
            TrendPeriod::Month => self.label(label.succ_opt()?),
        }
    }
}

/// Aggregates for one calendar period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendBucket {
    pub period: NaiveDate,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
    pub count: usize,
    /// Mean of this and the six preceding period means; absent until seven
    /// periods exist or when any of them is empty.
    pub rolling_avg_7: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct KpiAnalyzer {
    thresholds: ThresholdConfig,
}

impl KpiAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self::with_thresholds(config.kpi_thresholds.clone())
    }

    pub fn with_thresholds(thresholds: ThresholdConfig) -> Self {
        Self { thresholds }
    }

    pub fn performance_kpis(&self, table: &Table) -> PerformanceKpis {
        let handle_time = present_values(table, HANDLE_TIME);
        PerformanceKpis {
            aht: handle_time.as_deref().and_then(stats::mean),
            aht_median: handle_time.as_deref().and_then(stats::median),
            aht_std: handle_time.as_deref().and_then(stats::std_dev),
            fcr_rate: present_values(table, FIRST_CALL_RESOLUTION)
                .as_deref()
                .and_then(stats::mean),
            service_level: guarded_ratio(table, CALLS_ANSWERED, CALLS_OFFERED),
            occupancy_rate: guarded_ratio(table, PRODUCTIVE_TIME, LOGGED_TIME),
            adherence: guarded_ratio(table, ACTUAL_TIME, SCHEDULED_TIME),
        }
    }

    pub fn quality_kpis(&self, table: &Table) -> QualityKpis {
        let qa = present_values(table, QA_SCORE);
        let csat = present_values(table, CSAT_SCORE);
        QualityKpis {
            qa_score_avg: qa.as_deref().and_then(stats::mean),
            qa_score_median: qa.as_deref().and_then(stats::median),
            qa_score_std: qa.as_deref().and_then(stats::std_dev),
            csat_avg: csat.as_deref().and_then(stats::mean),
            csat_median: csat.as_deref().and_then(stats::median),
            nps_avg: present_values(table, NPS_SCORE)
                .as_deref()
                .and_then(stats::mean),
            compliance_rate: present_values(table, COMPLIANCE_PASS)
                .as_deref()
                .and_then(stats::mean),
            error_rate: guarded_ratio(table, ERROR_COUNT, TOTAL_INTERACTIONS),
        }
    }

    pub fn calculate_all(&self, table: &Table) -> KpiResult {
        info!("📊 Calculating KPIs...");
        let result = KpiResult {
            performance: self.performance_kpis(table),
            quality: self.quality_kpis(table),
        };
        info!("  Performance KPIs: {} metrics", result.performance.len());
        info!("  Quality KPIs: {} metrics", result.quality.len());
        result
    }

    /// Compares each indicator with the target of its base name in
    /// `category`. The base name drops a trailing `_avg`, then a trailing
    /// `_rate` (`qa_score_avg` → `qa_score`, `fcr_rate` → `fcr`). Indicators
    /// without a target are left out.
    pub fn compare_to_targets(
        &self,
        kpis: &impl IndicatorSet,
        category: KpiCategory,
    ) -> Vec<TargetComparison> {
        kpis.indicators()
            .into_iter()
            .filter_map(|(name, actual)| {
                let target = self.thresholds.target(category.as_str(), threshold_key(name))?;
                let delta = actual - target;
                Some(TargetComparison {
                    indicator: name.to_string(),
                    actual,
                    target,
                    delta,
                    pct_delta: if target != 0.0 {
                        delta / target * 100.0
                    } else {
                        0.0
                    },
                    meets_target: actual >= target,
                })
            })
            .collect()
    }

    /// Buckets `metric_column` by the calendar period of `date_column`.
    /// Every period between the first and last observation is reported,
    /// including empty ones. Rows without a parseable date are ignored.
    pub fn analyze_trends(
        &self,
        table: &Table,
        date_column: &str,
        metric_column: &str,
        period: TrendPeriod,
    ) -> Result<Vec<TrendBucket>> {
        let dates = table.require_column(date_column)?;
        let metric = table.require_column(metric_column)?;
        let values = metric.numeric_values().ok_or_else(|| {
            AnalyticsError::InvalidArgument(format!("Column '{metric_column}' is not numeric"))
        })?;

        let mut groups: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
        for (cell, value) in dates.cells().iter().zip(&values) {
            let Some(date) = cell.as_ref().and_then(|v| v.as_datetime()).map(|dt| dt.date())
            else {
                continue;
            };
            let label = period.label(date).ok_or_else(|| out_of_range(date))?;
            let bucket = groups.entry(label).or_default();
            if let Some(v) = value {
                bucket.push(*v);
            }
        }

        let (Some(first), Some(last)) = (
            groups.keys().next().copied(),
            groups.keys().next_back().copied(),
        ) else {
            return Ok(Vec::new());
        };

        let mut buckets = Vec::new();
        let mut label = first;
        while label <= last {
            let values = groups.get(&label).map(Vec::as_slice).unwrap_or_default();
            buckets.push(TrendBucket {
                period: label,
                mean: stats::mean(values),
                median: stats::median(values),
                std: stats::std_dev(values),
                count: values.len(),
                rolling_avg_7: None,
            });
            label = period.next(label).ok_or_else(|| out_of_range(label))?;
        }
        for end in ROLLING_WINDOW..=buckets.len() {
            let window = &buckets[end - ROLLING_WINDOW..end];
            let means: Option<Vec<f64>> = window.iter().map(|b| b.mean).collect();
            buckets[end - 1].rolling_avg_7 = means.as_deref().and_then(stats::mean);
        }
        debug!(
            "Trend of '{metric_column}' by {period:?}: {} periods",
            buckets.len()
        );
        Ok(buckets)
    }
}

fn threshold_key(indicator: &str) -> &str {
    let base = indicator.strip_suffix("_avg").unwrap_or(indicator);
    base.strip_suffix("_rate").unwrap_or(base)
}

/// Non-missing values of a numeric or boolean column; `None` when the column
/// is absent or holds text.
fn present_values(table: &Table, column: &str) -> Option<Vec<f64>> {
    let values = table.numeric_values(column);
    if values.is_none() && table.has_column(column) {
        debug!("Column '{column}' is not numeric; skipping its indicators");
    }
    values.map(|v| stats::present(&v))
}

/// `sum(numerator) / sum(denominator)`, or 0 when the denominator sum is not
/// positive. `None` unless both columns are present.
fn guarded_ratio(table: &Table, numerator: &str, denominator: &str) -> Option<f64> {
    let top: f64 = present_values(table, numerator)?.iter().sum();
    let bottom: f64 = present_values(table, denominator)?.iter().sum();
    Some(if bottom > 0.0 { top / bottom } else { 0.0 })
}

fn out_of_range(date: NaiveDate) -> AnalyticsError {
    AnalyticsError::InvalidArgument(format!("Date {date} is out of range for resampling"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, frame::Column};

    fn column(name: &str, values: &[f64]) -> Column {
        Column::from_f64(name, values)
    }

    fn analyzer() -> KpiAnalyzer {
        KpiAnalyzer::new(&AnalysisConfig::default())
    }

    #[test]
    fn aht_and_fcr_from_two_calls() {
        let table = Table::new(vec![
            column(HANDLE_TIME, &[300.0, 360.0]),
            column(FIRST_CALL_RESOLUTION, &[1.0, 0.0]),
        ])
        .unwrap();
        let kpis = analyzer().performance_kpis(&table);
        assert_eq!(kpis.aht, Some(330.0));
        assert_eq!(kpis.fcr_rate, Some(0.5));
        assert_eq!(kpis.service_level, None);
        assert_eq!(kpis.occupancy_rate, None);
    }

    #[test]
    fn service_level_sums_before_dividing() {
        let table = Table::new(vec![
            column(CALLS_OFFERED, &[100.0, 50.0]),
            column(CALLS_ANSWERED, &[90.0, 50.0]),
        ])
        .unwrap();
        let level = analyzer().performance_kpis(&table).service_level.unwrap();
        assert!((level - 140.0 / 150.0).abs() < 1e-12);
    }

    #[test]
    fn zero_denominators_yield_zero() {
        let table = Table::new(vec![
            column(CALLS_OFFERED, &[0.0, 0.0]),
            column(CALLS_ANSWERED, &[0.0, 0.0]),
            column(ERROR_COUNT, &[1.0, 2.0]),
            column(TOTAL_INTERACTIONS, &[0.0, 0.0]),
        ])
        .unwrap();
        let result = analyzer().calculate_all(&table);
        assert_eq!(result.performance.service_level, Some(0.0));
        assert_eq!(result.quality.error_rate, Some(0.0));
    }

    #[test]
    fn boolean_flags_average_into_rates() {
        let table = Table::new(vec![Column::new(
            COMPLIANCE_PASS,
            vec![
                Some(Value::Boolean(true)),
                Some(Value::Boolean(true)),
                Some(Value::Boolean(false)),
                None,
            ],
        )])
        .unwrap();
        let rate = analyzer().quality_kpis(&table).compliance_rate.unwrap();
        assert!((rate - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn comparisons_skip_indicators_without_targets() {
        let kpis = PerformanceKpis {
            aht: Some(330.0),
            aht_median: Some(320.0),
            fcr_rate: Some(0.9),
            occupancy_rate: Some(0.7),
            ..PerformanceKpis::default()
        };
        let comparisons = analyzer().compare_to_targets(&kpis, KpiCategory::Performance);
        let names: Vec<_> = comparisons.iter().map(|c| c.indicator.as_str()).collect();
        assert_eq!(names, vec!["aht", "fcr_rate"]);
        assert_eq!(comparisons[0].target, 300.0);
        assert_eq!(comparisons[0].delta, 30.0);
        assert!((comparisons[0].pct_delta - 10.0).abs() < 1e-12);
        assert!(comparisons[0].meets_target);
        assert!(comparisons[1].meets_target);
    }

    #[test]
    fn zero_target_gives_zero_pct_delta() {
        let mut quality = BTreeMap::new();
        quality.insert("nps".to_string(), 0.0);
        let mut categories = BTreeMap::new();
        categories.insert("quality".to_string(), quality);
        let analyzer = KpiAnalyzer::with_thresholds(ThresholdConfig::new(categories));
        let kpis = QualityKpis {
            nps_avg: Some(-12.0),
            ..QualityKpis::default()
        };
        let comparisons = analyzer.compare_to_targets(&kpis, KpiCategory::Quality);
        assert_eq!(comparisons.len(), 1);
        assert_eq!(comparisons[0].pct_delta, 0.0);
        assert!(!comparisons[0].meets_target);
    }

    #[test]
    fn threshold_keys_strip_known_suffixes() {
        assert_eq!(threshold_key("qa_score_avg"), "qa_score");
        assert_eq!(threshold_key("fcr_rate"), "fcr");
        assert_eq!(threshold_key("service_level"), "service_level");
        assert_eq!(threshold_key("aht_median"), "aht_median");
    }

    #[test]
    fn summary_lists_present_indicators() {
        let result = KpiResult {
            performance: PerformanceKpis {
                aht: Some(330.0),
                ..PerformanceKpis::default()
            },
            quality: QualityKpis::default(),
        };
        let summary = result.summary();
        assert!(summary.contains("KPI SUMMARY"));
        assert!(summary.contains("  AHT: 330.00"));
        assert!(!summary.contains("FCR_RATE"));
    }

    fn day(d: u32) -> Option<Value> {
        Some(Value::Date(NaiveDate::from_ymd_opt(2024, 1, d).unwrap()))
    }

    #[test]
    fn daily_trends_include_empty_days() {
        let table = Table::new(vec![
            Column::new("date", vec![day(1), day(1), day(3)]),
            column("aht", &[100.0, 200.0, 400.0]),
        ])
        .unwrap();
        let buckets = analyzer()
            .analyze_trends(&table, "date", "aht", TrendPeriod::Day)
            .unwrap();
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].mean, Some(150.0));
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[1].count, 0);
        assert_eq!(buckets[1].mean, None);
        assert_eq!(buckets[2].std, None);
    }

    #[test]
    fn weekly_and_monthly_labels() {
        // 2024-01-01 is a Monday.
        let table = Table::new(vec![
            Column::new("date", vec![day(1), day(7), day(8), day(31)]),
            column("aht", &[1.0, 2.0, 3.0, 4.0]),
        ])
        .unwrap();
        let weekly = analyzer()
            .analyze_trends(&table, "date", "aht", TrendPeriod::Week)
            .unwrap();
        assert_eq!(weekly[0].period, NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());
        assert_eq!(weekly[0].count, 2);
        assert_eq!(weekly[1].period, NaiveDate::from_ymd_opt(2024, 1, 14).unwrap());

        let monthly = analyzer()
            .analyze_trends(&table, "date", "aht", TrendPeriod::Month)
            .unwrap();
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].period, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(monthly[0].mean, Some(2.5));
    }

    #[test]
    fn rolling_mean_needs_seven_periods() {
        let dates = (1..=8).map(day).collect();
        let table = Table::new(vec![
            Column::new("date", dates),
            column("aht", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]),
        ])
        .unwrap();
        let buckets = analyzer()
            .analyze_trends(&table, "date", "aht", TrendPeriod::Day)
            .unwrap();
        assert_eq!(buckets[5].rolling_avg_7, None);
        assert_eq!(buckets[6].rolling_avg_7, Some(4.0));
        assert_eq!(buckets[7].rolling_avg_7, Some(5.0));
    }

    #[test]
    fn trends_require_both_columns() {
        let table = Table::new(vec![column("aht", &[1.0])]).unwrap();
        let err = analyzer()
            .analyze_trends(&table, "date", "aht", TrendPeriod::Day)
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::ColumnNotFound(name) if name == "date"));
    }
}
