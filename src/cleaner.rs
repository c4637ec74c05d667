//! Column-name normalisation, de-duplication, missing-value handling and
//! z-score outlier removal.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::AnalysisConfig,
    data::{Value, standardize_column_name},
    error::Result,
    frame::{Column, ColumnKind, Table},
    stats,
};

/// Placeholder written into missing categorical cells by [`MissingStrategy::Auto`].
pub const UNKNOWN_CATEGORY: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingStrategy {
    /// Remove any row with a missing cell.
    Drop,
    Mean,
    Median,
    ForwardFill,
    /// Median for numeric columns, [`UNKNOWN_CATEGORY`] for text columns.
    #[default]
    Auto,
}

/// Per-column outlier flags, in checked-column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutlierMasks {
    masks: Vec<(String, Vec<bool>)>,
}

impl OutlierMasks {
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.masks.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, column: &str) -> Option<&[bool]> {
        self.masks
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, mask)| mask.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[bool])> {
        self.masks
            .iter()
            .map(|(name, mask)| (name.as_str(), mask.as_slice()))
    }

    /// Rows flagged in any column.
    pub fn combined(&self, rows: usize) -> Vec<bool> {
        let mut any = vec![false; rows];
        for (_, mask) in &self.masks {
            for (flag, outlier) in any.iter_mut().zip(mask) {
                *flag |= *outlier;
            }
        }
        any
    }

    pub fn total_flagged(&self) -> usize {
        self.masks
            .iter()
            .map(|(_, mask)| mask.iter().filter(|f| **f).count())
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct Cleaner {
    outlier_std: f64,
}

impl Cleaner {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self::with_outlier_std(config.analysis.outlier_std)
    }

    pub fn with_outlier_std(outlier_std: f64) -> Self {
        Self { outlier_std }
    }

    /// Lower-cases names and replaces spaces and hyphens with underscores.
    /// Two headers that normalise to the same name are rejected with
    /// `DuplicateColumn`.
    pub fn standardize_names(&self, table: Table) -> Result<Table> {
        let names = table
            .column_names()
            .into_iter()
            .map(standardize_column_name)
            .collect();
        let renamed = table.rename_columns(names)?;
        info!("✓ Standardized column names");
        Ok(renamed)
    }

    /// Drops rows repeating an earlier row across `subset` (all columns when
    /// `None`); survivors keep their relative order.
    pub fn remove_duplicates(&self, table: &Table, subset: Option<&[String]>) -> Result<Table> {
        let subset: Vec<&str> = subset
            .unwrap_or_default()
            .iter()
            .map(String::as_str)
            .collect();
        let duplicates = table.duplicate_mask(&subset)?;
        let removed = duplicates.iter().filter(|d| **d).count();
        if removed > 0 {
            info!("✓ Removed {removed} duplicate rows");
        } else {
            info!("✓ No duplicates found");
        }
        let keep: Vec<bool> = duplicates.into_iter().map(|dup| !dup).collect();
        Ok(table.filter_rows(&keep))
    }

    pub fn handle_missing(&self, table: &Table, strategy: MissingStrategy) -> Table {
        let total_missing: usize = table.columns().iter().map(Column::missing_count).sum();
        if total_missing == 0 {
            info!("✓ No missing values found");
            return table.clone();
        }
        for column in table.columns().iter().filter(|c| c.missing_count() > 0) {
            debug!("Missing values in '{}': {}", column.name(), column.missing_count());
        }

        let handled = match strategy {
            MissingStrategy::Drop => {
                let keep: Vec<bool> = (0..table.row_count())
                    .map(|row| table.columns().iter().all(|c| c.cells()[row].is_some()))
                    .collect();
                table.filter_rows(&keep)
            }
            MissingStrategy::Mean => {
                table.map_columns(|column| fill_numeric(column, stats::mean))
            }
            MissingStrategy::Median => {
                table.map_columns(|column| fill_numeric(column, stats::median))
            }
            MissingStrategy::ForwardFill => table.map_columns(forward_fill),
            MissingStrategy::Auto => table.map_columns(|column| match column.kind() {
                ColumnKind::String => fill_text(column, UNKNOWN_CATEGORY),
                // Flag columns keep their gaps so rate KPIs stay 0/1 averages.
                ColumnKind::Boolean => column.clone(),
                _ => fill_numeric(column, stats::median),
            }),
        };
        info!(
            "✓ Handled {total_missing} missing values ({strategy:?}); {} rows remain",
            handled.row_count()
        );
        handled
    }

    /// Flags values whose absolute z-score (sample standard deviation)
    /// exceeds the configured threshold. Absent or non-numeric columns are
    /// skipped; a column with zero or undefined deviation gets an all-`false`
    /// mask.
    pub fn detect_outliers(&self, table: &Table, columns: Option<&[String]>) -> OutlierMasks {
        let names: Vec<String> = match columns {
            Some(names) => names.to_vec(),
            None => table.numeric_columns().into_iter().map(str::to_string).collect(),
        };
        let mut masks = Vec::with_capacity(names.len());
        for name in names {
            let Some(column) = table.column(&name).filter(|c| c.kind() == ColumnKind::Numeric)
            else {
                debug!("Skipping outlier check for non-numeric column '{name}'");
                continue;
            };
            let values = column.numeric_values().unwrap_or_default();
            let mask = zscore_mask(&values, self.outlier_std);
            let flagged = mask.iter().filter(|f| **f).count();
            if flagged > 0 {
                warn!("⚠ {name}: {flagged} outliers detected");
            }
            masks.push((name, mask));
        }
        OutlierMasks { masks }
    }

    pub fn remove_outliers(&self, table: &Table, columns: Option<&[String]>) -> Table {
        let masks = self.detect_outliers(table, columns);
        let keep: Vec<bool> = masks
            .combined(table.row_count())
            .into_iter()
            .map(|outlier| !outlier)
            .collect();
        let cleaned = table.filter_rows(&keep);
        info!(
            "✓ Removed {} rows with outliers. Remaining: {} rows",
            table.row_count() - cleaned.row_count(),
            cleaned.row_count()
        );
        cleaned
    }

    /// standardize_names → remove_duplicates → handle_missing(Auto) →
    /// optionally remove_outliers.
    pub fn clean(&self, table: Table, remove_outliers: bool) -> Result<Table> {
        info!("🧹 Starting data cleaning...");
        let table = self.standardize_names(table)?;
        let table = self.remove_duplicates(&table, None)?;
        let mut table = self.handle_missing(&table, MissingStrategy::Auto);
        if remove_outliers {
            table = self.remove_outliers(&table, None);
        }
        info!("✓ Data cleaning completed");
        Ok(table)
    }
}

/// `|z| > threshold` per cell; missing cells and degenerate columns are never
/// flagged.
pub(crate) fn zscore_mask(values: &[Option<f64>], threshold: f64) -> Vec<bool> {
    let present = stats::present(values);
    let (Some(mean), Some(std)) = (stats::mean(&present), stats::std_dev(&present)) else {
        return vec![false; values.len()];
    };
    if std == 0.0 || !std.is_finite() {
        return vec![false; values.len()];
    }
    values
        .iter()
        .map(|value| value.is_some_and(|v| ((v - mean) / std).abs() > threshold))
        .collect()
}

fn fill_numeric<F>(column: &Column, statistic: F) -> Column
where
    F: Fn(&[f64]) -> Option<f64>,
{
    if column.kind() != ColumnKind::Numeric || column.missing_count() == 0 {
        return column.clone();
    }
    let values = stats::present(&column.numeric_values().unwrap_or_default());
    let Some(fill) = statistic(&values) else {
        return column.clone();
    };
    let cells = column
        .cells()
        .iter()
        .map(|cell| cell.clone().or(Some(Value::Float(fill))))
        .collect();
    Column::new(column.name(), cells)
}

fn fill_text(column: &Column, placeholder: &str) -> Column {
    if column.missing_count() == 0 {
        return column.clone();
    }
    let cells = column
        .cells()
        .iter()
        .map(|cell| {
            cell.clone()
                .or_else(|| Some(Value::String(placeholder.to_string())))
        })
        .collect();
    Column::new(column.name(), cells)
}

fn forward_fill(column: &Column) -> Column {
    if column.missing_count() == 0 {
        return column.clone();
    }
    let mut last: Option<Value> = None;
    let cells = column
        .cells()
        .iter()
        .map(|cell| {
            if cell.is_some() {
                last = cell.clone();
            }
            last.clone()
        })
        .collect();
    Column::new(column.name(), cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyticsError;

    fn num(values: &[Option<f64>]) -> Vec<Option<Value>> {
        values.iter().map(|v| v.map(Value::Float)).collect()
    }

    fn text(values: &[Option<&str>]) -> Vec<Option<Value>> {
        values
            .iter()
            .map(|v| v.map(|s| Value::String(s.to_string())))
            .collect()
    }

    fn cleaner() -> Cleaner {
        Cleaner::with_outlier_std(3.0)
    }

    #[test]
    fn standardize_names_normalises_and_rejects_collisions() {
        let table = Table::new(vec![
            Column::new("Handle Time", num(&[Some(1.0)])),
            Column::new("QA-Score", num(&[Some(2.0)])),
        ])
        .unwrap();
        let renamed = cleaner().standardize_names(table).unwrap();
        assert_eq!(renamed.column_names(), vec!["handle_time", "qa_score"]);

        let clash = Table::new(vec![
            Column::new("Handle Time", num(&[Some(1.0)])),
            Column::new("handle-time", num(&[Some(2.0)])),
        ])
        .unwrap();
        assert!(matches!(
            cleaner().standardize_names(clash),
            Err(AnalyticsError::DuplicateColumn(name)) if name == "handle_time"
        ));
    }

    #[test]
    fn remove_duplicates_keeps_first_occurrence() {
        let table = Table::new(vec![
            Column::new("a", num(&[Some(1.0), Some(2.0), Some(1.0), Some(3.0)])),
            Column::new("b", text(&[Some("x"), Some("y"), Some("x"), Some("y")])),
        ])
        .unwrap();
        let deduped = cleaner().remove_duplicates(&table, None).unwrap();
        assert_eq!(
            deduped.numeric_values("a").unwrap(),
            vec![Some(1.0), Some(2.0), Some(3.0)]
        );

        let subset = vec!["b".to_string()];
        let deduped = cleaner().remove_duplicates(&table, Some(&subset)).unwrap();
        assert_eq!(deduped.row_count(), 2);
    }

    #[test]
    fn auto_fills_median_and_unknown() {
        let table = Table::new(vec![
            Column::new("aht", num(&[Some(1.0), None, Some(3.0), Some(10.0)])),
            Column::new("team", text(&[Some("a"), None, None, Some("b")])),
            Column::new("full", num(&[Some(1.0), Some(1.0), Some(1.0), Some(1.0)])),
        ])
        .unwrap();
        let filled = cleaner().handle_missing(&table, MissingStrategy::Auto);
        assert_eq!(filled.numeric_values("aht").unwrap()[1], Some(3.0));
        assert_eq!(
            filled.column("team").unwrap().cells()[2],
            Some(Value::String("Unknown".into()))
        );
        assert_eq!(filled.column("full"), table.column("full"));
    }

    #[test]
    fn mean_fill_leaves_text_columns_missing() {
        let table = Table::new(vec![
            Column::new("aht", num(&[Some(1.0), None, Some(5.0)])),
            Column::new("team", text(&[Some("a"), None, Some("b")])),
        ])
        .unwrap();
        let filled = cleaner().handle_missing(&table, MissingStrategy::Mean);
        assert_eq!(filled.numeric_values("aht").unwrap()[1], Some(3.0));
        assert_eq!(filled.column("team").unwrap().cells()[1], None);
    }

    #[test]
    fn drop_and_forward_fill() {
        let table = Table::new(vec![
            Column::new("a", num(&[Some(1.0), None, Some(3.0), None])),
            Column::new("b", text(&[Some("x"), Some("y"), None, Some("z")])),
        ])
        .unwrap();
        let dropped = cleaner().handle_missing(&table, MissingStrategy::Drop);
        assert_eq!(dropped.row_count(), 1);

        let filled = cleaner().handle_missing(&table, MissingStrategy::ForwardFill);
        assert_eq!(
            filled.numeric_values("a").unwrap(),
            vec![Some(1.0), Some(1.0), Some(3.0), Some(3.0)]
        );
        assert_eq!(filled.column("b").unwrap().cells()[2], Some(Value::String("y".into())));
    }

    #[test]
    fn identical_values_have_no_outliers() {
        let table = Table::new(vec![Column::new("a", num(&[Some(5.0); 12]))]).unwrap();
        let masks = cleaner().detect_outliers(&table, None);
        assert_eq!(masks.total_flagged(), 0);
    }

    #[test]
    fn removes_rows_flagged_in_any_column() {
        let mut a = vec![Some(10.0); 20];
        a[3] = Some(1000.0);
        let mut b = vec![Some(1.0); 20];
        b[7] = Some(-500.0);
        b[0] = None;
        let table = Table::new(vec![
            Column::new("a", num(&a)),
            Column::new("b", num(&b)),
            Column::new("team", text(&[Some("x"); 20])),
        ])
        .unwrap();
        let masks = cleaner().detect_outliers(&table, None);
        assert_eq!(masks.columns().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(masks.get("a").unwrap()[3]);
        assert!(!masks.get("b").unwrap()[0]);

        let cleaned = cleaner().remove_outliers(&table, None);
        assert_eq!(cleaned.row_count(), 18);
    }

    #[test]
    fn clean_runs_canonical_order() {
        let table = Table::new(vec![
            Column::new("Handle Time", num(&[Some(300.0), Some(300.0), None])),
            Column::new("Agent", text(&[Some("ann"), Some("ann"), None])),
        ])
        .unwrap();
        let cleaned = cleaner().clean(table, false).unwrap();
        assert_eq!(cleaned.column_names(), vec!["handle_time", "agent"]);
        assert_eq!(cleaned.row_count(), 2);
        assert_eq!(cleaned.numeric_values("handle_time").unwrap()[1], Some(300.0));
    }

    #[test]
    fn auto_strategy_leaves_flag_gaps_missing() {
        let flags = vec![Some(Value::Boolean(true)), None, Some(Value::Boolean(false))];
        let table = Table::new(vec![
            Column::new("Compliance Pass", flags),
            Column::new("Handle Time", num(&[Some(300.0), Some(240.0), None])),
        ])
        .unwrap();

        let cleaned = cleaner().clean(table, false).unwrap();

        let compliance = cleaned.column("compliance_pass").unwrap();
        assert_eq!(compliance.kind(), ColumnKind::Boolean);
        assert_eq!(compliance.missing_count(), 1);
        assert_eq!(cleaned.column("handle_time").unwrap().missing_count(), 0);
    }

    #[test]
    fn signed_zeros_are_duplicates() {
        let table = Table::new(vec![Column::new("delta", num(&[Some(0.0), Some(-0.0)]))]).unwrap();

        let deduped = cleaner().remove_duplicates(&table, None).unwrap();

        assert_eq!(deduped.row_count(), 1);
    }
}
