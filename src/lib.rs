pub mod cleaner;
pub mod cli;
pub mod config;
pub mod correlation;
pub mod data;
pub mod error;
pub mod frame;
pub mod io_utils;
pub mod kpi;
pub mod loader;
pub mod pipeline;
pub mod statistics;
pub mod stats;
pub mod table;
pub mod validator;

use std::{collections::BTreeMap, env, fs, path::Path, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info};
use serde::Serialize;

use crate::{
    cleaner::Cleaner,
    cli::{Cli, Commands, InputArgs, OutputFormat},
    config::AnalysisConfig,
    correlation::{
        CorrelationAnalyzer, CorrelationMatrix, CorrelationMethod, CorrelationPair, Driver,
        PcaResult, RegressionFit,
    },
    data::{Value, standardize_column_name},
    frame::Table,
    kpi::{KpiAnalyzer, KpiCategory, KpiResult},
    loader::Loader,
    pipeline::{AnalysisReport, Pipeline, PipelineOptions, TargetReport},
    statistics::{
        ANOMALY_COLUMN, AnomalyMethod, AnovaResult, ConfidenceInterval, DistributionComparison,
        StatisticalAnalyzer, TTestResult,
    },
    validator::{RangeCheck, TypeCheck, ValidationReport, Validator},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(verbose: bool) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if verbose {
            builder.filter_module("callcenter_analytics", LevelFilter::Debug);
        } else if env::var("RUST_LOG").is_err() {
            builder.filter_module("callcenter_analytics", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = AnalysisConfig::load_or_default(&cli.config)
        .with_context(|| format!("Loading configuration from {:?}", cli.config))?;
    match cli.command {
        Commands::Analyze(args) => handle_analyze(&config, &args),
        Commands::Validate(args) => handle_validate(&config, &args),
        Commands::Kpi(args) => handle_kpi(&config, &args),
        Commands::Correlate(args) => handle_correlate(&config, &args),
        Commands::Trend(args) => handle_trend(&config, &args),
        Commands::Anomalies(args) => handle_anomalies(&config, &args),
        Commands::Compare(args) => handle_compare(&config, &args),
        Commands::Normality(args) => handle_normality(&config, &args),
        Commands::Decompose(args) => handle_decompose(&config, &args),
    }
}

fn handle_analyze(config: &AnalysisConfig, args: &cli::AnalyzeArgs) -> Result<()> {
    let config = with_input_overrides(config, &args.input);
    let pipeline = Pipeline::new(&config)?;
    let options = PipelineOptions {
        remove_outliers: args.remove_outliers,
        required_columns: args.required.clone(),
    };
    let output = pipeline
        .run(&args.input.inputs, &options)
        .with_context(|| format!("Analyzing {:?}", args.input.inputs))?;

    if let Some(path) = &args.cleaned_output {
        write_table(&output.cleaned, path, &config)?;
    }
    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&output.report)?;
        fs::write(path, json).with_context(|| format!("Writing report to {path:?}"))?;
        info!("Report written to {path:?}");
    }
    match args.input.format {
        OutputFormat::Json => print_json(&output.report),
        OutputFormat::Table => {
            print_analysis(&output.report);
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct ValidateOutput<'a> {
    #[serde(flatten)]
    report: &'a ValidationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    types: Option<TypeCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ranges: Option<RangeCheck>,
}

fn handle_validate(config: &AnalysisConfig, args: &cli::ValidateArgs) -> Result<()> {
    let config = with_input_overrides(config, &args.input);
    let table = load_table(&config, &args.input)?;
    let validator = Validator::new(&config);
    let report = validator.validate_all(&table, Some(args.required.as_slice()));
    let types = (!args.expectations.is_empty()).then(|| {
        let expected = args.expectations.iter().cloned().collect::<BTreeMap<_, _>>();
        validator.validate_types(&table, &expected)
    });
    let ranges = (!args.ranges.is_empty()).then(|| {
        let bounds = args.ranges.iter().cloned().collect::<BTreeMap<_, _>>();
        validator.validate_ranges(&table, &bounds)
    });

    let output = ValidateOutput {
        report: &report,
        types,
        ranges,
    };
    match args.input.format {
        OutputFormat::Json => print_json(&output)?,
        OutputFormat::Table => print_validation(&output),
    }

    validator
        .require_sufficient(&table)
        .with_context(|| format!("Validating {:?}", args.input.inputs))?;
    let failed = [
        report.schema.as_ref().is_some_and(|s| !s.valid),
        output.types.as_ref().is_some_and(|t| !t.valid),
        output.ranges.as_ref().is_some_and(|r| !r.valid),
    ]
    .into_iter()
    .filter(|f| *f)
    .count();
    if failed > 0 {
        bail!("Validation failed: {failed} check(s) did not pass");
    }
    Ok(())
}

#[derive(Serialize)]
struct KpiOutput {
    kpis: KpiResult,
    targets: TargetReport,
}

fn handle_kpi(config: &AnalysisConfig, args: &cli::KpiArgs) -> Result<()> {
    let config = with_input_overrides(config, &args.input);
    let table = load_clean(&config, &args.input)?;
    let analyzer = KpiAnalyzer::new(&config);
    let kpis = analyzer.calculate_all(&table);
    let targets = TargetReport {
        performance: analyzer.compare_to_targets(&kpis.performance, KpiCategory::Performance),
        quality: analyzer.compare_to_targets(&kpis.quality, KpiCategory::Quality),
    };
    let output = KpiOutput { kpis, targets };
    match args.input.format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table => {
            println!("{}", output.kpis.summary());
            print_targets(&output.targets);
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct CorrelateOutput {
    method: CorrelationMethod,
    threshold: f64,
    correlation_matrix: CorrelationMatrix,
    strong_correlations: Vec<CorrelationPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    drivers: Option<Vec<Driver>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    regressions: Option<Vec<RegressionFit>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pca: Option<PcaResult>,
}

fn handle_correlate(config: &AnalysisConfig, args: &cli::CorrelateArgs) -> Result<()> {
    let config = with_input_overrides(config, &args.input);
    let table = load_clean(&config, &args.input)?;
    let analyzer = CorrelationAnalyzer::new(&config);
    let method = CorrelationMethod::from(args.method);
    let threshold = args.threshold.unwrap_or(analyzer.threshold());
    let correlation_matrix = analyzer.correlation_matrix(&table, method);
    let strong_correlations = analyzer.strong_correlations(&correlation_matrix, Some(threshold));

    let (drivers, regressions) = match &args.target {
        Some(target) => {
            let target = standardize_column_name(target);
            let drivers = analyzer
                .drivers_of(&table, &target, threshold)
                .with_context(|| format!("Ranking drivers of '{target}'"))?;
            let features = drivers.iter().map(|d| d.column.clone()).collect::<Vec<_>>();
            let regressions = analyzer.regression_analysis(&table, &target, &features);
            (Some(drivers), Some(regressions))
        }
        None => (None, None),
    };
    let pca = args
        .pca
        .map(|components| analyzer.pca(&table, components))
        .transpose()
        .context("Computing principal components")?;

    let output = CorrelateOutput {
        method,
        threshold,
        correlation_matrix,
        strong_correlations,
        drivers,
        regressions,
        pca,
    };
    match args.input.format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table => {
            print_correlations(&output);
            Ok(())
        }
    }
}

fn handle_trend(config: &AnalysisConfig, args: &cli::TrendArgs) -> Result<()> {
    let config = with_input_overrides(config, &args.input);
    let table = load_clean(&config, &args.input)?;
    let date_column = standardize_column_name(&args.date_column);
    let metric = standardize_column_name(&args.metric);
    let buckets = KpiAnalyzer::new(&config)
        .analyze_trends(&table, &date_column, &metric, args.period.into())
        .with_context(|| format!("Aggregating '{metric}' by '{date_column}'"))?;
    match args.input.format {
        OutputFormat::Json => print_json(&buckets),
        OutputFormat::Table => {
            print!("{}", table::render_trends(&buckets));
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct AnomalyOutput {
    column: String,
    method: AnomalyMethod,
    rows: usize,
    flagged: usize,
    flagged_rows: Vec<usize>,
}

fn handle_anomalies(config: &AnalysisConfig, args: &cli::AnomaliesArgs) -> Result<()> {
    let config = with_input_overrides(config, &args.input);
    let table = load_clean(&config, &args.input)?;
    let column = standardize_column_name(&args.column);
    let method = AnomalyMethod::from(args.method);
    let flagged = StatisticalAnalyzer::new(&config)
        .detect_anomalies(&table, &column, method, args.threshold)
        .with_context(|| format!("Detecting anomalies in '{column}'"))?;
    let mask = flagged
        .column(ANOMALY_COLUMN)
        .map(|c| {
            c.cells()
                .iter()
                .map(|cell| matches!(cell, Some(Value::Boolean(true))))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if let Some(path) = &args.output {
        write_table(&flagged, path, &config)?;
    }
    let output = AnomalyOutput {
        column,
        method,
        rows: flagged.row_count(),
        flagged: mask.iter().filter(|f| **f).count(),
        flagged_rows: mask
            .iter()
            .enumerate()
            .filter_map(|(idx, f)| f.then_some(idx))
            .collect(),
    };
    match args.input.format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table => {
            println!(
                "{} of {} row(s) flagged in '{}'",
                output.flagged, output.rows, output.column
            );
            if output.flagged > 0 {
                print!("{}", table::render_preview(&flagged.filter_rows(&mask), usize::MAX));
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct CompareOutput {
    value_column: String,
    group_column: String,
    intervals: BTreeMap<String, ConfidenceInterval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    t_test: Option<TTestResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distributions: Option<DistributionComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    anova: Option<AnovaResult>,
}

fn handle_compare(config: &AnalysisConfig, args: &cli::CompareArgs) -> Result<()> {
    let config = with_input_overrides(config, &args.input);
    let table = load_clean(&config, &args.input)?;
    let value_column = standardize_column_name(&args.value);
    let group_column = standardize_column_name(&args.group);
    let table = if args.groups.is_empty() {
        table
    } else {
        let groups = table.require_column(&group_column)?;
        let keep = groups
            .cells()
            .iter()
            .map(|cell| {
                cell.as_ref()
                    .is_some_and(|v| args.groups.contains(&v.as_display()))
            })
            .collect::<Vec<_>>();
        table.filter_rows(&keep)
    };

    let analyzer = StatisticalAnalyzer::new(&config);
    let grouped = statistics::group_values(&table, &value_column, &group_column)
        .with_context(|| format!("Grouping '{value_column}' by '{group_column}'"))?;
    if let Some(label) = args.groups.iter().find(|g| !grouped.contains_key(*g)) {
        bail!("Group '{label}' not found in column '{group_column}'");
    }
    let mut intervals = BTreeMap::new();
    for (label, values) in &grouped {
        match analyzer.confidence_interval(values, args.confidence) {
            Ok(interval) => {
                intervals.insert(label.clone(), interval);
            }
            Err(err) => debug!("No interval for group '{label}': {err}"),
        }
    }

    let mut output = CompareOutput {
        value_column,
        group_column,
        intervals,
        t_test: None,
        distributions: None,
        anova: None,
    };
    if let [(_, a), (_, b)] = grouped.iter().collect::<Vec<_>>().as_slice() {
        output.t_test = analyzer.t_test(a, b);
        output.distributions = analyzer.compare_distributions(a, b);
    } else {
        output.anova = Some(analyzer.analyze_variance(
            &table,
            &output.value_column,
            &output.group_column,
        )?);
    }
    match args.input.format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table => {
            print_comparison(&output);
            Ok(())
        }
    }
}

fn handle_normality(config: &AnalysisConfig, args: &cli::NormalityArgs) -> Result<()> {
    let config = with_input_overrides(config, &args.input);
    let table = load_clean(&config, &args.input)?;
    let columns = args
        .columns
        .iter()
        .map(|c| standardize_column_name(c))
        .collect::<Vec<_>>();
    let results = StatisticalAnalyzer::new(&config)
        .test_normality(&table, (!columns.is_empty()).then_some(columns.as_slice()));
    match args.input.format {
        OutputFormat::Json => print_json(&results),
        OutputFormat::Table => {
            let rows = results
                .iter()
                .map(|r| {
                    vec![
                        r.column.clone(),
                        r.sample_size.to_string(),
                        table::format_number(Some(r.statistic)),
                        table::format_number(Some(r.p_value)),
                        r.is_normal.to_string(),
                    ]
                })
                .collect::<Vec<_>>();
            table::print_table(&labels(&["column", "n", "w", "p_value", "is_normal"]), &rows);
            Ok(())
        }
    }
}

fn handle_decompose(config: &AnalysisConfig, args: &cli::DecomposeArgs) -> Result<()> {
    let config = with_input_overrides(config, &args.input);
    let table = load_clean(&config, &args.input)?;
    let date_column = standardize_column_name(&args.date_column);
    let value_column = standardize_column_name(&args.value);
    let decomposition = StatisticalAnalyzer::new(&config)
        .time_series_decomposition(&table, &date_column, &value_column, args.period)
        .with_context(|| format!("Decomposing '{value_column}' by '{date_column}'"))?;
    match args.input.format {
        OutputFormat::Json => print_json(&decomposition),
        OutputFormat::Table => {
            let rows = (0..decomposition.dates.len())
                .map(|idx| {
                    vec![
                        decomposition.dates[idx].to_string(),
                        table::format_number(Some(decomposition.observed[idx])),
                        table::format_number(decomposition.trend[idx]),
                        table::format_number(Some(decomposition.seasonal[idx])),
                        table::format_number(decomposition.residual[idx]),
                    ]
                })
                .collect::<Vec<_>>();
            table::print_table(
                &labels(&["date", "observed", "trend", "seasonal", "residual"]),
                &rows,
            );
            Ok(())
        }
    }
}

fn with_input_overrides(config: &AnalysisConfig, input: &InputArgs) -> AnalysisConfig {
    let mut config = config.clone();
    if let Some(delimiter) = input.delimiter {
        config.data.delimiter = Some(delimiter as char);
    }
    if let Some(encoding) = &input.input_encoding {
        config.data.encoding = encoding.clone();
    }
    config
}

fn load_table(config: &AnalysisConfig, input: &InputArgs) -> Result<Table> {
    let loader = Loader::new(config)?;
    let table = loader
        .load_inputs(&input.inputs)
        .with_context(|| format!("Loading {:?}", input.inputs))?;
    Ok(loader.parse_dates(&table, None))
}

fn load_clean(config: &AnalysisConfig, input: &InputArgs) -> Result<Table> {
    let table = load_table(config, input)?;
    let cleaned = Cleaner::new(config)
        .clean(table, false)
        .context("Cleaning input data")?;
    debug!("Cleaned columns: {:?}", cleaned.column_names());
    Ok(cleaned)
}

fn write_table(table: &Table, path: &Path, config: &AnalysisConfig) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(path, config.delimiter());
    table
        .write_csv(path, delimiter)
        .with_context(|| format!("Writing {path:?}"))?;
    info!(
        "Wrote {} row(s) to {:?} using delimiter '{}'",
        table.row_count(),
        path,
        printable_delimiter(delimiter)
    );
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn print_targets(targets: &TargetReport) {
    for (title, comparisons) in [
        ("PERFORMANCE TARGETS", &targets.performance),
        ("QUALITY TARGETS", &targets.quality),
    ] {
        if !comparisons.is_empty() {
            println!("\n{title}:");
            print!("{}", table::render_targets(comparisons));
        }
    }
}

fn print_analysis(report: &AnalysisReport) {
    println!(
        "Rows loaded: {}  Rows analyzed: {}",
        report.rows_loaded, report.rows_analyzed
    );
    println!("{}", report.kpis.summary());
    print_targets(&report.targets);

    let relationships = &report.relationships;
    println!("\nSTRONG CORRELATIONS:");
    if relationships.strong_correlations.is_empty() {
        println!("  none");
    } else {
        print!("{}", table::render_pairs(&relationships.strong_correlations));
    }
    if let Some(pca) = &relationships.pca {
        print_pca(pca);
    }
    println!("\nDESCRIPTIVE STATISTICS:");
    print!("{}", table::render_descriptive(&report.statistics));
}

fn print_pca(pca: &PcaResult) {
    println!("\nPRINCIPAL COMPONENTS:");
    let rows = pca
        .explained_variance_ratio
        .iter()
        .zip(&pca.cumulative_variance)
        .enumerate()
        .map(|(idx, (ratio, cumulative))| {
            vec![
                format!("PC{}", idx + 1),
                table::format_number(Some(*ratio)),
                table::format_number(Some(*cumulative)),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&labels(&["component", "explained", "cumulative"]), &rows);
}

fn print_validation(output: &ValidateOutput<'_>) {
    print!("{}", table::render_quality(&output.report.quality_report));
    println!("{}", output.report.sufficient_data.message);
    if let Some(schema) = &output.report.schema {
        if schema.valid {
            println!("✓ All required columns present");
        } else {
            println!("✗ Missing columns: {}", schema.missing.join(", "));
        }
    }
    if let Some(types) = &output.types {
        for (column, message) in &types.mismatches {
            println!("✗ {column}: {message}");
        }
    }
    if let Some(ranges) = &output.ranges {
        for (column, count) in &ranges.violations {
            println!("✗ {column}: {count} value(s) out of range");
        }
    }
}

fn print_correlations(output: &CorrelateOutput) {
    println!("{} correlation matrix:", output.method);
    print!("{}", table::render_matrix(&output.correlation_matrix));
    println!("\nPairs with |r| >= {}:", output.threshold);
    print!("{}", table::render_pairs(&output.strong_correlations));
    if let Some(drivers) = &output.drivers {
        println!("\nDrivers:");
        print!("{}", table::render_drivers(drivers));
    }
    if let Some(regressions) = &output.regressions {
        let rows = regressions
            .iter()
            .map(|fit| {
                vec![
                    fit.feature.clone(),
                    table::format_number(Some(fit.slope)),
                    table::format_number(Some(fit.intercept)),
                    table::format_number(Some(fit.r2)),
                    table::format_number(Some(fit.rmse)),
                    fit.observations.to_string(),
                ]
            })
            .collect::<Vec<_>>();
        println!("\nRegressions:");
        table::print_table(
            &labels(&["feature", "slope", "intercept", "r2", "rmse", "n"]),
            &rows,
        );
    }
    if let Some(pca) = &output.pca {
        print_pca(pca);
    }
}

fn print_comparison(output: &CompareOutput) {
    let rows = output
        .intervals
        .iter()
        .map(|(label, ci)| {
            vec![
                label.clone(),
                table::format_number(Some(ci.mean)),
                table::format_number(Some(ci.lower)),
                table::format_number(Some(ci.upper)),
            ]
        })
        .collect::<Vec<_>>();
    println!("{} by {}:", output.value_column, output.group_column);
    table::print_table(&labels(&["group", "mean", "lower", "upper"]), &rows);
    if let Some(t) = &output.t_test {
        println!(
            "t-test: t = {:.4}, p = {:.4}, significant = {}",
            t.statistic, t.p_value, t.significant
        );
    }
    if let Some(d) = &output.distributions {
        println!(
            "Kolmogorov-Smirnov: D = {:.4}, p = {:.4}, significant = {}",
            d.ks_test.statistic, d.ks_test.p_value, d.ks_test.significant
        );
        println!(
            "Mann-Whitney: U = {:.4}, p = {:.4}, significant = {}",
            d.mann_whitney.statistic, d.mann_whitney.p_value, d.mann_whitney.significant
        );
    }
    if let Some(anova) = &output.anova {
        println!(
            "ANOVA: F = {}, p = {}, groups = {}, significant = {}",
            table::format_number(anova.f_statistic),
            table::format_number(anova.p_value),
            anova.num_groups,
            anova.significant
        );
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
