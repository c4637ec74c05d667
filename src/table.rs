use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{
    correlation::{CorrelationMatrix, CorrelationPair, Driver},
    frame::Table,
    kpi::{TargetComparison, TrendBucket},
    statistics::DescriptiveStatistics,
    validator::QualityReport,
};

/// Renders a plain-text grid. Cells that parse as numbers are right-aligned.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// Four decimals, or `-` for an undefined value.
pub fn format_number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.4}"),
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

pub fn render_targets(comparisons: &[TargetComparison]) -> String {
    let headers = headers(&["indicator", "actual", "target", "delta", "pct_delta", "meets_target"]);
    let rows = comparisons
        .iter()
        .map(|c| {
            vec![
                c.indicator.clone(),
                format_number(Some(c.actual)),
                format_number(Some(c.target)),
                format_number(Some(c.delta)),
                format!("{:.2}%", c.pct_delta),
                c.meets_target.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

pub fn render_matrix(matrix: &CorrelationMatrix) -> String {
    let mut headers = vec![String::new()];
    headers.extend(matrix.columns().iter().cloned());
    let rows = matrix
        .columns()
        .iter()
        .zip(matrix.rows())
        .map(|(name, values)| {
            let mut row = vec![name.clone()];
            row.extend(values.iter().map(|v| format_number(*v)));
            row
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

pub fn render_pairs(pairs: &[CorrelationPair]) -> String {
    let rows = pairs
        .iter()
        .map(|p| {
            vec![
                p.first.clone(),
                p.second.clone(),
                format_number(Some(p.coefficient)),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&headers(&["column_a", "column_b", "correlation"]), &rows)
}

pub fn render_drivers(drivers: &[Driver]) -> String {
    let rows = drivers
        .iter()
        .map(|d| vec![d.column.clone(), format_number(Some(d.correlation))])
        .collect::<Vec<_>>();
    render_table(&headers(&["column", "correlation"]), &rows)
}

pub fn render_trends(buckets: &[TrendBucket]) -> String {
    let rows = buckets
        .iter()
        .map(|b| {
            vec![
                b.period.to_string(),
                format_number(b.mean),
                format_number(b.median),
                format_number(b.std),
                b.count.to_string(),
                format_number(b.rolling_avg_7),
            ]
        })
        .collect::<Vec<_>>();
    render_table(
        &headers(&["period", "mean", "median", "std", "count", "rolling_avg_7"]),
        &rows,
    )
}

pub fn render_quality(report: &QualityReport) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Rows: {}  Columns: {}  Duplicate rows: {}",
        report.total_rows, report.total_columns, report.duplicate_rows
    );
    let missing = report
        .missing_values
        .iter()
        .map(|m| {
            vec![
                m.column.clone(),
                m.missing.to_string(),
                m.percentage.map_or_else(|| "-".to_string(), |p| format!("{p:.2}%")),
            ]
        })
        .collect::<Vec<_>>();
    output.push_str(&render_table(&headers(&["column", "missing", "percentage"]), &missing));
    output
}

pub fn render_descriptive(stats: &DescriptiveStatistics) -> String {
    let numeric = stats
        .numeric
        .iter()
        .map(|d| {
            vec![
                d.column.clone(),
                d.stats.count.to_string(),
                format_number(d.stats.mean),
                format_number(d.stats.std),
                format_number(d.stats.min),
                format_number(d.stats.median),
                format_number(d.stats.max),
            ]
        })
        .collect::<Vec<_>>();
    let mut output = render_table(
        &headers(&["column", "count", "mean", "std", "min", "median", "max"]),
        &numeric,
    );
    if !stats.categorical.is_empty() {
        let categorical = stats
            .categorical
            .iter()
            .map(|d| {
                vec![
                    d.column.clone(),
                    d.unique_values.to_string(),
                    d.most_common.clone().unwrap_or_default(),
                    d.most_common_freq.to_string(),
                ]
            })
            .collect::<Vec<_>>();
        output.push('\n');
        output.push_str(&render_table(
            &headers(&["column", "unique", "most_common", "freq"]),
            &categorical,
        ));
    }
    output
}

/// First `limit` rows of a table, missing cells shown empty.
pub fn render_preview(table: &Table, limit: usize) -> String {
    let headers = table
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let rows = (0..table.row_count().min(limit))
        .map(|row| {
            (0..table.column_count())
                .map(|col| {
                    table
                        .cell(row, col)
                        .map(|v| v.as_display())
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect::<Vec<Vec<String>>>();
    render_table(&headers, &rows)
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .map(|(value, &width)| {
            let sanitized = sanitize_cell(value);
            let padding = " ".repeat(width.saturating_sub(display_width(&sanitized)));
            if is_numeric_cell(&sanitized) {
                format!("{padding}{sanitized}")
            } else {
                format!("{sanitized}{padding}")
            }
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn is_numeric_cell(value: &str) -> bool {
    let trimmed = value.trim_end_matches('%');
    !trimmed.is_empty() && trimmed.parse::<f64>().is_ok()
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape, e.g. \x1b[31m
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
