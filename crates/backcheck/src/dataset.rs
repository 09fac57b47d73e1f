//! In-memory tabular datasets and CSV ingestion.
//!
//! Column kinds are decided once, when the column is built. Later stages
//! dispatch on `Column::kind` instead of inspecting individual cells.

use std::path::Path;

use serde::Serialize;

use crate::error::BackcheckError;
use crate::model::{parse_number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Text,
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => write!(f, "numeric"),
            Self::Text => write!(f, "text"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<Value>,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Numeric,
            values: values
                .into_iter()
                .map(|v| v.map_or(Value::Missing, Value::Number))
                .collect(),
        }
    }

    pub fn text(name: impl Into<String>, values: Vec<Option<&str>>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Text,
            values: values
                .into_iter()
                .map(|v| v.map_or(Value::Missing, Value::text))
                .collect(),
        }
    }

    /// Build a column from raw cells, inferring its kind.
    ///
    /// Numeric when every non-missing cell parses as a finite float. Empty
    /// cells, a lone `.` and `NA` are missing in either kind. Text cells are
    /// kept verbatim.
    pub fn from_cells(name: impl Into<String>, cells: Vec<String>) -> Self {
        let numeric = cells
            .iter()
            .filter(|c| !is_missing_cell(c))
            .all(|c| parse_number(c).is_some());

        let (kind, values) = if numeric {
            let values = cells
                .iter()
                .map(|c| match parse_number(c) {
                    Some(n) if !is_missing_cell(c) => Value::Number(n),
                    _ => Value::Missing,
                })
                .collect();
            (ColumnKind::Numeric, values)
        } else {
            let values = cells
                .into_iter()
                .map(|c| if is_missing_cell(&c) { Value::Missing } else { Value::Text(c) })
                .collect();
            (ColumnKind::Text, values)
        };

        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Empty, `.` and `NA` cells are missing.
fn is_missing_cell(cell: &str) -> bool {
    matches!(cell.trim(), "" | "." | "NA")
}

/// A named, rectangular, column-oriented table.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Dataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn require_column(&self, name: &str) -> Result<&Column, BackcheckError> {
        self.column(name).ok_or_else(|| BackcheckError::MissingColumn {
            dataset: self.name.clone(),
            column: name.to_string(),
        })
    }
}

/// Parse CSV text (with a header row) into a dataset.
pub fn load_csv(name: &str, csv_data: &str) -> Result<Dataset, BackcheckError> {
    let csv_err = |e: csv::Error| BackcheckError::Csv {
        dataset: name.to_string(),
        message: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(record.get(i).unwrap_or("").to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(header, column)| Column::from_cells(header, column))
        .collect();

    let dataset = Dataset {
        name: name.to_string(),
        columns,
    };
    tracing::debug!(
        dataset = name,
        rows = dataset.row_count(),
        columns = dataset.columns.len(),
        "loaded csv"
    );
    Ok(dataset)
}

/// Read and parse a CSV file.
pub fn load_csv_file(name: &str, path: &Path) -> Result<Dataset, BackcheckError> {
    let csv_data = std::fs::read_to_string(path)
        .map_err(|e| BackcheckError::Io(format!("cannot read {}: {e}", path.display())))?;
    load_csv(name, &csv_data)
}
