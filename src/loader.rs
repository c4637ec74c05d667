use std::path::Path;

use encoding_rs::Encoding;
use log::{debug, info, warn};

use crate::{
    config::AnalysisConfig,
    data::{Value, is_missing_token, parse_boolean, parse_with_format},
    error::{AnalyticsError, Result},
    frame::{Column, ColumnKind, Table},
    io_utils,
};

/// Reads delimited files into [`Table`]s.
#[derive(Debug, Clone)]
pub struct Loader {
    encoding: &'static Encoding,
    delimiter: Option<u8>,
    date_format: String,
}

impl Loader {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            encoding: io_utils::resolve_encoding(&config.data.encoding)?,
            delimiter: config.delimiter(),
            date_format: config.data.date_format.clone(),
        })
    }

    pub fn load(&self, path: &Path) -> Result<Table> {
        if !path.exists() {
            return Err(AnalyticsError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let delimiter = io_utils::resolve_input_delimiter(path, self.delimiter);
        let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        let header_record = reader
            .byte_headers()
            .map_err(|err| AnalyticsError::load(path, err))?
            .clone();
        let headers = io_utils::decode_record(&header_record, self.encoding)
            .map_err(|message| AnalyticsError::load_message(path, message))?;
        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            return Err(AnalyticsError::load_message(path, "No columns to parse from file"));
        }

        let mut raw_columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for (row_idx, record) in reader.byte_records().enumerate() {
            let record = record.map_err(|err| AnalyticsError::load(path, err))?;
            let decoded = io_utils::decode_record(&record, self.encoding).map_err(|message| {
                AnalyticsError::load_message(path, format!("Row {}: {message}", row_idx + 2))
            })?;
            for (column, field) in raw_columns.iter_mut().zip(decoded) {
                column.push(field);
            }
        }

        let columns = headers
            .into_iter()
            .zip(raw_columns)
            .map(|(name, raw)| typed_column(name, &raw))
            .collect();
        let table = Table::new(columns)
            .map_err(|err| AnalyticsError::load_message(path, err.to_string()))?;
        info!(
            "✓ Loaded {} rows from {:?} ({} columns)",
            table.row_count(),
            path,
            table.column_count()
        );
        Ok(table)
    }

    /// Loads every path and stacks the results; the first failure aborts.
    pub fn load_many<P>(&self, paths: &[P]) -> Result<Table>
    where
        P: AsRef<Path>,
    {
        if paths.is_empty() {
            return Err(AnalyticsError::InvalidArgument(
                "At least one input file must be provided".to_string(),
            ));
        }
        let tables = paths
            .iter()
            .map(|path| self.load(path.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let count = tables.len();
        let combined = Table::concat(tables);
        info!("✓ Combined {count} files into {} rows", combined.row_count());
        Ok(combined)
    }

    pub fn load_directory(&self, dir: &Path, pattern: &str) -> Result<Table> {
        let files = io_utils::list_matching_files(dir, pattern)?;
        if files.is_empty() {
            return Err(AnalyticsError::NotFound {
                path: dir.join(pattern),
            });
        }
        debug!("Files matching '{pattern}' in {dir:?}: {files:?}");
        self.load_many(&files)
    }

    /// Loads a single file, or every `*.csv` directly inside a directory.
    pub fn load_input(&self, input: &Path) -> Result<Table> {
        if input.is_dir() {
            self.load_directory(input, "*.csv")
        } else {
            self.load(input)
        }
    }

    /// One path may name a file or a directory; several paths are loaded as
    /// files and stacked.
    pub fn load_inputs<P>(&self, inputs: &[P]) -> Result<Table>
    where
        P: AsRef<Path>,
    {
        match inputs {
            [single] => self.load_input(single.as_ref()),
            many => self.load_many(many),
        }
    }

    /// Column names containing "date" or "time" (case-insensitive). Values
    /// are not inspected.
    pub fn detect_date_columns(table: &Table) -> Vec<String> {
        table
            .column_names()
            .into_iter()
            .filter(|name| {
                let lowered = name.to_lowercase();
                lowered.contains("date") || lowered.contains("time")
            })
            .map(str::to_string)
            .collect()
    }

    /// Parses the given (or auto-detected) columns with the configured date
    /// format. Unparseable cells become missing; other columns are untouched.
    ///
    /// Auto-detection leaves name matches that already hold numbers alone, so
    /// durations such as `handle_time` survive.
    pub fn parse_dates(&self, table: &Table, columns: Option<&[String]>) -> Table {
        let targets = match columns {
            Some(names) => names.to_vec(),
            None => Self::detect_date_columns(table)
                .into_iter()
                .filter(|name| table.column(name).is_some_and(|column| !holds_numbers(column)))
                .collect(),
        };
        table.map_columns(|column| {
            if !targets.iter().any(|t| t == column.name()) {
                return column.clone();
            }
            let mut failures = 0usize;
            let cells = column
                .cells()
                .iter()
                .map(|cell| match cell {
                    None => None,
                    Some(value @ (Value::Date(_) | Value::DateTime(_))) => Some(value.clone()),
                    Some(value) => {
                        let parsed = parse_with_format(&value.as_display(), &self.date_format);
                        if parsed.is_none() {
                            failures += 1;
                        }
                        parsed
                    }
                })
                .collect();
            if failures > 0 {
                warn!(
                    "⚠ {failures} value(s) in '{}' did not match date format '{}'",
                    column.name(),
                    self.date_format
                );
            } else {
                debug!("✓ Parsed date column: {}", column.name());
            }
            Column::new(column.name(), cells)
        })
    }
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    possible_boolean: bool,
    possible_integer: bool,
    possible_float: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            possible_boolean: true,
            possible_integer: true,
            possible_float: true,
        }
    }

    fn observe(&mut self, raw: &str) {
        let trimmed = raw.trim();
        if self.possible_boolean && parse_boolean(trimmed).is_none() {
            self.possible_boolean = false;
        }
        if self.possible_integer && trimmed.parse::<i64>().is_err() {
            self.possible_integer = false;
        }
        if self.possible_float && trimmed.parse::<f64>().is_err() {
            self.possible_float = false;
        }
    }

    fn parse(&self, raw: &str) -> Value {
        let trimmed = raw.trim();
        if self.possible_boolean
            && let Some(b) = parse_boolean(trimmed)
        {
            return Value::Boolean(b);
        }
        if self.possible_integer
            && let Ok(i) = trimmed.parse::<i64>()
        {
            return Value::Integer(i);
        }
        if self.possible_float
            && let Ok(f) = trimmed.parse::<f64>()
        {
            return Value::Float(f);
        }
        Value::String(raw.to_string())
    }
}

fn holds_numbers(column: &Column) -> bool {
    column.kind() == ColumnKind::Numeric && column.missing_count() < column.len()
}

fn typed_column(name: String, raw: &[String]) -> Column {
    let mut candidate = TypeCandidate::new();
    for field in raw.iter().filter(|f| !is_missing_token(f)) {
        candidate.observe(field);
    }
    let cells = raw
        .iter()
        .map(|field| (!is_missing_token(field)).then(|| candidate.parse(field)))
        .collect();
    Column::new(name, cells)
}
