//! Data writers for NPY arrays and CSV tables.
//!
//! This module provides functions for writing pipeline results:
//! - NPY arrays (little-endian `f64`, C order)
//! - CSV tables, with or without a leading row index column

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use csv::StringRecord;
use ndarray::ArrayD;
use ndarray_npy::{WriteNpyError, WriteNpyExt};
use thiserror::Error;

use super::loaders::Table;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}'")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}'")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}'")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}'")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// NPY encoding error.
    #[error("NPY write error for '{path}'")]
    NpyError {
        path: String,
        #[source]
        source: WriteNpyError,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

/// Write an array to a `.npy` file.
///
/// The file is written exactly at `path`; no extension is appended.
///
/// # Errors
///
/// Returns an error if:
/// - Parent directories cannot be created
/// - File cannot be created or written to
///
/// # Example
///
/// ```no_run
/// use ndarray::ArrayD;
/// use trial_pipeline::core::writers::write_npy;
/// use std::path::Path;
///
/// let array = ArrayD::<f64>::zeros(vec![3, 4]);
/// write_npy(Path::new("zeros.npy"), &array).unwrap();
/// ```
pub fn write_npy(path: &Path, array: &ArrayD<f64>) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;
    let path_str = path.display().to_string();

    array
        .write_npy(&mut writer)
        .map_err(|e| WriteError::NpyError {
            path: path_str.clone(),
            source: e,
        })?;

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write a table to CSV.
///
/// With `with_index` the output starts with an unnamed column holding each
/// row's source row label, the layout spreadsheet-style tools produce when
/// they keep the row index.
///
/// # Errors
///
/// Returns an error if:
/// - Parent directories cannot be created
/// - File cannot be created or written to
pub fn write_csv_table(path: &Path, table: &Table, with_index: bool) -> Result<()> {
    ensure_parent_dirs(path)?;
    let buf_writer = create_buffered_writer(path)?;
    let mut csv_writer = csv::Writer::from_writer(buf_writer);

    let path_str = path.display().to_string();
    let csv_error = |e: csv::Error| WriteError::CsvError {
        path: path_str.clone(),
        source: e,
    };

    if with_index {
        let mut header = StringRecord::from(vec![""]);
        header.extend(table.headers.iter());
        csv_writer.write_record(&header).map_err(csv_error)?;

        for (label, row) in table.row_labels.iter().zip(&table.rows) {
            let mut record = StringRecord::from(vec![label.to_string()]);
            record.extend(row.iter());
            csv_writer.write_record(&record).map_err(csv_error)?;
        }
    } else {
        csv_writer.write_record(&table.headers).map_err(csv_error)?;
        for row in &table.rows {
            csv_writer.write_record(row).map_err(csv_error)?;
        }
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;

    Ok(())
}
