use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{
    correlation::CorrelationMethod, kpi::TrendPeriod, statistics::AnomalyMethod,
    validator::ExpectedType,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Clean, validate and analyze call-center KPI data",
    long_about = None
)]
pub struct Cli {
    /// YAML configuration file; defaults apply when it does not exist
    #[arg(short = 'c', long, global = true, default_value = "config.yaml")]
    pub config: PathBuf,
    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the full pipeline: load, validate, clean, KPIs, correlations, statistics
    Analyze(AnalyzeArgs),
    /// Report data quality and check schema, types, ranges and row count
    Validate(ValidateArgs),
    /// Calculate performance and quality KPIs and compare them with targets
    Kpi(KpiArgs),
    /// Correlation matrix, strong pairs, drivers of a target and PCA
    Correlate(CorrelateArgs),
    /// Aggregate a metric per day, week or month
    Trend(TrendArgs),
    /// Flag anomalous values of one column
    Anomalies(AnomaliesArgs),
    /// Compare a metric across groups (t-test, KS, Mann-Whitney or ANOVA)
    Compare(CompareArgs),
    /// Shapiro-Wilk normality tests for numeric columns
    Normality(NormalityArgs),
    /// Split a daily series into trend, seasonal and residual components
    Decompose(DecomposeArgs),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input CSV file or directory of CSV files (repeatable)
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|'); overrides the config
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files; overrides the config
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Drop rows flagged as outliers before analysis
    #[arg(long = "remove-outliers")]
    pub remove_outliers: bool,
    /// Comma-separated columns that must be present
    #[arg(long = "require", value_delimiter = ',')]
    pub required: Vec<String>,
    /// Write the JSON report to this file
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Write the cleaned data to this CSV file
    #[arg(long = "cleaned-output")]
    pub cleaned_output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Comma-separated columns that must be present
    #[arg(long = "require", value_delimiter = ',')]
    pub required: Vec<String>,
    /// Expected column type such as `handle_time=numeric` (repeatable)
    #[arg(long = "expect", value_parser = parse_expectation, action = clap::ArgAction::Append)]
    pub expectations: Vec<(String, ExpectedType)>,
    /// Allowed range such as `csat_score=1:5` (repeatable)
    #[arg(long = "range", value_parser = parse_range, action = clap::ArgAction::Append)]
    pub ranges: Vec<(String, (f64, f64))>,
}

#[derive(Debug, Args)]
pub struct KpiArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum MethodArg {
    Pearson,
    Spearman,
    Kendall,
}

impl From<MethodArg> for CorrelationMethod {
    fn from(value: MethodArg) -> Self {
        match value {
            MethodArg::Pearson => CorrelationMethod::Pearson,
            MethodArg::Spearman => CorrelationMethod::Spearman,
            MethodArg::Kendall => CorrelationMethod::Kendall,
        }
    }
}

#[derive(Debug, Args)]
pub struct CorrelateArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Correlation method
    #[arg(long, value_enum, default_value = "pearson")]
    pub method: MethodArg,
    /// Minimum absolute coefficient for strong pairs (defaults to the config value)
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Rank the columns that move with this target
    #[arg(long)]
    pub target: Option<String>,
    /// Number of principal components to compute
    #[arg(long)]
    pub pca: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum PeriodArg {
    Day,
    Week,
    Month,
}

impl From<PeriodArg> for TrendPeriod {
    fn from(value: PeriodArg) -> Self {
        match value {
            PeriodArg::Day => TrendPeriod::Day,
            PeriodArg::Week => TrendPeriod::Week,
            PeriodArg::Month => TrendPeriod::Month,
        }
    }
}

#[derive(Debug, Args)]
pub struct TrendArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Date column
    #[arg(long = "date-column", default_value = "date")]
    pub date_column: String,
    /// Metric column to aggregate
    #[arg(short = 'm', long)]
    pub metric: String,
    /// Aggregation period
    #[arg(long, value_enum, default_value = "day")]
    pub period: PeriodArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum AnomalyMethodArg {
    Zscore,
    Iqr,
}

impl From<AnomalyMethodArg> for AnomalyMethod {
    fn from(value: AnomalyMethodArg) -> Self {
        match value {
            AnomalyMethodArg::Zscore => AnomalyMethod::ZScore,
            AnomalyMethodArg::Iqr => AnomalyMethod::Iqr,
        }
    }
}

#[derive(Debug, Args)]
pub struct AnomaliesArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Column to screen
    #[arg(long)]
    pub column: String,
    /// Detection method
    #[arg(long, value_enum, default_value = "zscore")]
    pub method: AnomalyMethodArg,
    /// Z-score cutoff or IQR multiplier (defaults to the configured outlier_std)
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Write the table with its `is_anomaly` column to this CSV file
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Numeric column to compare
    #[arg(long)]
    pub value: String,
    /// Column whose values define the groups
    #[arg(long)]
    pub group: String,
    /// Restrict the comparison to these comma-separated group labels
    #[arg(long = "groups", value_delimiter = ',')]
    pub groups: Vec<String>,
    /// Confidence level for per-group mean intervals
    #[arg(long, default_value_t = 0.95)]
    pub confidence: f64,
}

#[derive(Debug, Args)]
pub struct NormalityArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Comma-separated columns to test (all numeric columns when omitted)
    #[arg(short = 'C', long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
}

#[derive(Debug, Args)]
pub struct DecomposeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Date column
    #[arg(long = "date-column", default_value = "date")]
    pub date_column: String,
    /// Value column
    #[arg(long)]
    pub value: String,
    /// Seasonal period in days
    #[arg(long, default_value_t = 7)]
    pub period: usize,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

fn split_assignment(value: &str) -> Result<(String, &str), String> {
    let (column, rest) = value
        .split_once('=')
        .ok_or_else(|| format!("Expected `column=...`, got '{value}'"))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("Missing column name in '{value}'"));
    }
    Ok((column.to_string(), rest.trim()))
}

pub fn parse_expectation(value: &str) -> Result<(String, ExpectedType), String> {
    let (column, kind) = split_assignment(value)?;
    let kind = kind.parse::<ExpectedType>().map_err(|err| err.to_string())?;
    Ok((column, kind))
}

pub fn parse_range(value: &str) -> Result<(String, (f64, f64)), String> {
    let (column, bounds) = split_assignment(value)?;
    let (min, max) = bounds
        .split_once(':')
        .ok_or_else(|| format!("Expected `min:max` bounds, got '{bounds}'"))?;
    let parse = |raw: &str| {
        raw.trim()
            .parse::<f64>()
            .map_err(|_| format!("Invalid bound '{raw}' in '{value}'"))
    };
    let (min, max) = (parse(min)?, parse(max)?);
    if min > max {
        return Err(format!("Lower bound exceeds upper bound in '{value}'"));
    }
    Ok((column, (min, max)))
}
