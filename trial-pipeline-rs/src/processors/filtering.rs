//! Row filtering by a boolean flag column.

use std::path::Path;

use anyhow::Result;
use thiserror::Error;

use crate::config::FilterConfig;
use crate::core::loaders::Table;
use crate::core::pipeline::{TableJob, TableReport};

/// Errors that can occur during filtering operations.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Flag column '{column}' not found (columns: {available})")]
    MissingColumn { column: String, available: String },

    #[error("Row {row}: value '{value}' in column '{column}' is not a boolean")]
    InvalidFlag {
        row: usize,
        column: String,
        value: String,
    },
}

/// Parse a boolean cell.
///
/// Accepts `true/false`, `t/f`, `yes/no` and `1/0` in any letter case,
/// surrounding whitespace ignored. Returns `None` for anything else.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "1" | "1.0" => Some(true),
        "false" | "f" | "no" | "0" | "0.0" => Some(false),
        _ => None,
    }
}

/// Keep the rows whose `column` holds a true flag.
///
/// Retained rows keep their input order and row labels; cells are copied
/// unchanged.
///
/// # Errors
///
/// Returns an error if the column is missing or any of its cells is not a
/// boolean.
pub fn filter_rows(table: &Table, column: &str) -> std::result::Result<Table, FilterError> {
    let index = table
        .column_index(column)
        .ok_or_else(|| FilterError::MissingColumn {
            column: column.to_string(),
            available: table.headers.iter().collect::<Vec<_>>().join(", "),
        })?;

    let mut filtered = Table::new(table.headers.clone());

    for (&label, row) in table.row_labels.iter().zip(&table.rows) {
        let cell = row.get(index).unwrap_or("");
        let keep = parse_flag(cell).ok_or_else(|| FilterError::InvalidFlag {
            row: label,
            column: column.to_string(),
            value: cell.to_string(),
        })?;

        if keep {
            filtered.push_row(label, row.clone());
        }
    }

    Ok(filtered)
}

/// Write the valid trials of `input` to `output`.
///
/// The flag column comes from `config.flag_column`. The output has the same
/// header as the input and no row index.
pub fn filter_valid_trials(input: &Path, output: &Path, config: &FilterConfig) -> Result<TableReport> {
    let column = config.flag_column.as_str();
    let report = TableJob::new(input, output, |table: &Table| filter_rows(table, column)).run()?;

    log::info!(
        "Kept {} of {} rows where '{}' is true",
        report.rows_out,
        report.rows_in,
        column
    );

    Ok(report)
}
