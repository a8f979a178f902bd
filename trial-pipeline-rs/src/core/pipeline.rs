//! Load → transform → save jobs for single-input commands.
//!
//! `standardize`, `normalize` and `filter-valid` differ only in the pure
//! function they apply; the reading, writing and error context around it is
//! shared here.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{debug, info};
use ndarray::ArrayD;

use super::loaders::{load_csv_table, load_npy, Table};
use super::transforms;
use super::writers::{write_csv_table, write_npy};

/// Outcome of an [`ArrayJob`].
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayReport {
    /// Shape of the array read from the input file.
    pub input_shape: Vec<usize>,
    /// Shape of the array written to the output file.
    pub output_shape: Vec<usize>,
}

/// One `.npy` in, one `.npy` out, a transform in between.
pub struct ArrayJob<F> {
    pub input: PathBuf,
    pub output: PathBuf,
    pub transform: F,
}

impl<F> ArrayJob<F>
where
    F: Fn(&ArrayD<f64>) -> transforms::Result<ArrayD<f64>>,
{
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, transform: F) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            transform,
        }
    }

    /// Run the job. Errors name the stage and the file involved.
    pub fn run(&self) -> Result<ArrayReport> {
        let input = load_npy(&self.input)
            .with_context(|| format!("loading input array '{}'", self.input.display()))?;
        debug!("Loaded {:?} array from {}", input.shape(), self.input.display());

        let output = (self.transform)(&input)
            .with_context(|| format!("transforming array from '{}'", self.input.display()))?;

        write_npy(&self.output, &output)
            .with_context(|| format!("saving output array '{}'", self.output.display()))?;
        info!("Array -> {}", self.output.display());

        Ok(ArrayReport {
            input_shape: input.shape().to_vec(),
            output_shape: output.shape().to_vec(),
        })
    }
}

/// Outcome of a [`TableJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableReport {
    pub rows_in: usize,
    pub rows_out: usize,
}

/// One CSV in, one CSV out (written without a row index).
pub struct TableJob<F> {
    pub input: PathBuf,
    pub output: PathBuf,
    pub transform: F,
}

impl<F, E> TableJob<F>
where
    F: Fn(&Table) -> std::result::Result<Table, E>,
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, transform: F) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            transform,
        }
    }

    /// Run the job. Errors name the stage and the file involved.
    pub fn run(&self) -> Result<TableReport> {
        let input = load_csv_table(&self.input)
            .with_context(|| format!("loading input table '{}'", self.input.display()))?;
        debug!("Loaded {} rows from {}", input.len(), self.input.display());

        let output = (self.transform)(&input)
            .with_context(|| format!("transforming table from '{}'", self.input.display()))?;

        write_csv_table(&self.output, &output, false)
            .with_context(|| format!("saving output table '{}'", self.output.display()))?;
        info!("Table -> {}", self.output.display());

        Ok(TableReport {
            rows_in: input.len(),
            rows_out: output.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transforms::{normalize, standardize, TransformError};
    use ndarray::arr1;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_array_job_normalize() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in.npy");
        let output = temp_dir.path().join("out.npy");
        write_npy(&input, &arr1(&[2.0, 4.0, 6.0]).into_dyn()).unwrap();

        let report = ArrayJob::new(&input, &output, normalize).run().unwrap();

        assert_eq!(report.input_shape, vec![3]);
        assert_eq!(report.output_shape, vec![3]);
        let result = load_npy(&output).unwrap();
        assert_eq!(result.iter().copied().collect::<Vec<_>>(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_array_job_degenerate_input_reports_stage() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("flat.npy");
        let output = temp_dir.path().join("out.npy");
        write_npy(&input, &arr1(&[1.0, 1.0]).into_dyn()).unwrap();

        let err = ArrayJob::new(&input, &output, standardize).run().unwrap_err();

        assert!(format!("{err:#}").contains("transforming array"));
        assert!(err.downcast_ref::<TransformError>().is_some());
        assert!(!output.exists());
    }

    #[test]
    fn test_array_job_missing_input_reports_stage() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("absent.npy");

        let err = ArrayJob::new(&input, temp_dir.path().join("o.npy"), normalize)
            .run()
            .unwrap_err();

        let message = format!("{err:#}");
        assert!(message.contains("loading input array"));
        assert!(message.contains("absent.npy"));
    }

    #[test]
    fn test_table_job_identity() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in.csv");
        let output = temp_dir.path().join("out.csv");
        fs::write(&input, "a,b\n1,2\n3,4\n").unwrap();

        let report = TableJob::new(&input, &output, |t: &Table| {
            Ok::<_, std::io::Error>(t.clone())
        })
        .run()
        .unwrap();

        assert_eq!(report, TableReport { rows_in: 2, rows_out: 2 });
        assert_eq!(fs::read_to_string(&output).unwrap(), "a,b\n1,2\n3,4\n");
    }
}
