//! In-memory tabular model shared by every analysis stage.
//!
//! A [`Table`] is an ordered set of uniquely named [`Column`]s of equal
//! length. Transformations consume `&Table` and return a fresh `Table`, so a
//! stage never mutates a table it received from its caller. The only
//! ownership-taking operations (`rename_columns`, `with_column`) consume the
//! table they modify.

use std::{collections::HashSet, path::Path};

use serde::Serialize;

use crate::{
    data::Value,
    error::{AnalyticsError, Result},
    io_utils,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    String,
    DateTime,
    Boolean,
}

impl ColumnKind {
    fn classify<'a, I>(cells: I) -> ColumnKind
    where
        I: IntoIterator<Item = &'a Option<Value>>,
    {
        let mut numeric = true;
        let mut boolean = true;
        let mut temporal = true;
        let mut seen = false;
        for value in cells.into_iter().flatten() {
            seen = true;
            numeric &= matches!(value, Value::Integer(_) | Value::Float(_));
            boolean &= matches!(value, Value::Boolean(_));
            temporal &= matches!(value, Value::Date(_) | Value::DateTime(_));
            if !numeric && !boolean && !temporal {
                return ColumnKind::String;
            }
        }
        // An all-missing column carries no text, so it behaves as an empty
        // numeric column.
        if !seen || numeric {
            ColumnKind::Numeric
        } else if boolean {
            ColumnKind::Boolean
        } else {
            ColumnKind::DateTime
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    cells: Vec<Option<Value>>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Option<Value>>) -> Self {
        let kind = ColumnKind::classify(&cells);
        Self {
            name: name.into(),
            kind,
            cells,
        }
    }

    pub fn from_f64(name: impl Into<String>, values: &[f64]) -> Self {
        let cells = values
            .iter()
            .map(|v| v.is_finite().then_some(Value::Float(*v)))
            .collect();
        Self::new(name, cells)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn cells(&self) -> &[Option<Value>] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    /// Numeric view of a numeric or boolean column; `None` for other kinds.
    pub fn numeric_values(&self) -> Option<Vec<Option<f64>>> {
        match self.kind {
            ColumnKind::Numeric | ColumnKind::Boolean => Some(
                self.cells
                    .iter()
                    .map(|cell| cell.as_ref().and_then(Value::as_f64))
                    .collect(),
            ),
            _ => None,
        }
    }

    pub(crate) fn into_cells(self) -> Vec<Option<Value>> {
        self.cells
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name()) {
                return Err(AnalyticsError::DuplicateColumn(column.name().to_string()));
            }
        }
        if let Some(first) = columns.first()
            && let Some(bad) = columns.iter().find(|c| c.len() != first.len())
        {
            return Err(AnalyticsError::InvalidArgument(format!(
                "Column '{}' has {} rows but '{}' has {}",
                bad.name(),
                bad.len(),
                first.name(),
                first.len()
            )));
        }
        Ok(Self { columns })
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn require_column(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| AnalyticsError::ColumnNotFound(name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn numeric_values(&self, name: &str) -> Option<Vec<Option<f64>>> {
        self.column(name).and_then(Column::numeric_values)
    }

    /// Names of columns holding integer or float values, in column order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns_of_kind(ColumnKind::Numeric)
    }

    /// Names of free-text columns, in column order.
    pub fn categorical_columns(&self) -> Vec<&str> {
        self.columns_of_kind(ColumnKind::String)
    }

    fn columns_of_kind(&self, kind: ColumnKind) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.kind() == kind)
            .map(Column::name)
            .collect()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.columns
            .get(column)
            .and_then(|c| c.cells.get(row))
            .and_then(Option::as_ref)
    }

    /// Flags every row that repeats an earlier row across `columns` (all
    /// columns when empty). The first occurrence is never flagged.
    pub fn duplicate_mask(&self, columns: &[&str]) -> Result<Vec<bool>> {
        let selected = if columns.is_empty() {
            self.columns.iter().collect::<Vec<_>>()
        } else {
            columns
                .iter()
                .map(|name| self.require_column(name))
                .collect::<Result<Vec<_>>>()?
        };
        let mut seen = HashSet::new();
        let mask = (0..self.row_count())
            .map(|row| {
                let key = selected
                    .iter()
                    .map(|column| match &column.cells[row] {
                        Some(value) => value.identity_key(),
                        None => String::from("\u{0}missing"),
                    })
                    .collect::<Vec<_>>();
                !seen.insert(key)
            })
            .collect();
        Ok(mask)
    }

    /// Keeps the rows whose mask entry is `true`, preserving relative order.
    pub fn filter_rows(&self, keep: &[bool]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|column| {
                let cells = column
                    .cells
                    .iter()
                    .zip(keep)
                    .filter(|(_, keep)| **keep)
                    .map(|(cell, _)| cell.clone())
                    .collect();
                Column {
                    name: column.name.clone(),
                    kind: column.kind,
                    cells,
                }
            })
            .collect();
        Table { columns }
    }

    /// Returns a copy with `column` appended, or replacing an existing column
    /// of the same name in place.
    pub fn with_column(mut self, column: Column) -> Result<Table> {
        if !self.columns.is_empty() && column.len() != self.row_count() {
            return Err(AnalyticsError::InvalidArgument(format!(
                "Column '{}' has {} rows but table has {}",
                column.name(),
                column.len(),
                self.row_count()
            )));
        }
        match self.columns.iter().position(|c| c.name() == column.name()) {
            Some(idx) => self.columns[idx] = column,
            None => self.columns.push(column),
        }
        Ok(self)
    }

    pub fn map_columns<F>(&self, mut f: F) -> Table
    where
        F: FnMut(&Column) -> Column,
    {
        Table {
            columns: self.columns.iter().map(&mut f).collect(),
        }
    }

    pub fn rename_columns(self, names: Vec<String>) -> Result<Table> {
        if names.len() != self.columns.len() {
            return Err(AnalyticsError::InvalidArgument(format!(
                "Expected {} column names, got {}",
                self.columns.len(),
                names.len()
            )));
        }
        let columns = self
            .columns
            .into_iter()
            .zip(names)
            .map(|(column, name)| Column { name, ..column })
            .collect();
        Table::new(columns)
    }

    /// Stacks tables row-wise over the union of their columns (first-seen
    /// order); a column absent from an input contributes missing cells.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut names: Vec<String> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                if !names.iter().any(|n| n == column.name()) {
                    names.push(column.name().to_string());
                }
            }
        }
        let mut cells: Vec<Vec<Option<Value>>> = vec![Vec::new(); names.len()];
        for table in tables {
            let rows = table.row_count();
            let mut owned = table.columns;
            for (idx, name) in names.iter().enumerate() {
                match owned.iter().position(|c| c.name() == name) {
                    Some(pos) => cells[idx].extend(owned.swap_remove(pos).into_cells()),
                    None => cells[idx].extend(std::iter::repeat_n(None, rows)),
                }
            }
        }
        let columns = names
            .into_iter()
            .zip(cells)
            .map(|(name, cells)| Column::new(name, cells))
            .collect();
        Table { columns }
    }

    pub fn write_csv(&self, path: &Path, delimiter: u8) -> Result<()> {
        let mut writer = io_utils::open_csv_writer(path, delimiter)?;
        let map_err = |err: csv::Error| AnalyticsError::write(path, err);
        writer.write_record(self.column_names()).map_err(map_err)?;
        for row in 0..self.row_count() {
            let record = (0..self.columns.len()).map(|col| {
                self.cell(row, col)
                    .map(Value::as_display)
                    .unwrap_or_default()
            });
            writer.write_record(record).map_err(map_err)?;
        }
        writer
            .flush()
            .map_err(|err| AnalyticsError::write(path, err))?;
        Ok(())
    }
}
