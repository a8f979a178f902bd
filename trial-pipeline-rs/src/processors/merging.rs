//! Merge per-trial array files into one array with a leading trial axis.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use ndarray::ArrayD;
use regex::Regex;
use thiserror::Error;

use crate::config::MergeConfig;
use crate::core::loaders::{list_files, load_mat_variable, load_npy};
use crate::core::transforms::{squeeze, stack_arrays};
use crate::core::writers::write_npy;

/// Errors that can occur while merging trial arrays.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("No .{extension} files found in {folder}")]
    NoFilesFound { folder: PathBuf, extension: String },

    #[error("Shape mismatch in {path}: found {found:?}, but {first} has {expected:?}")]
    ShapeMismatch {
        path: PathBuf,
        first: PathBuf,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
}

/// Summary of a finished merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSummary {
    /// Input files, in stacking order.
    pub files: Vec<PathBuf>,
    /// Shape of the merged array, trial axis first.
    pub shape: Vec<usize>,
}

/// Load every file with `load` and stack the results along axis 0.
///
/// Shapes are checked as files are read so the error names the first file
/// that disagrees with the first one.
fn stack_files<F>(files: &[PathBuf], progress: &ProgressBar, mut load: F) -> Result<ArrayD<f64>>
where
    F: FnMut(&Path) -> Result<ArrayD<f64>>,
{
    progress.set_length(files.len() as u64);

    let mut arrays: Vec<ArrayD<f64>> = Vec::with_capacity(files.len());
    for path in files {
        let array = load(path)?;
        debug!("{}: shape {:?}", path.display(), array.shape());

        if let Some(first) = arrays.first() {
            if first.shape() != array.shape() {
                return Err(MergeError::ShapeMismatch {
                    path: path.clone(),
                    first: files[0].clone(),
                    expected: first.shape().to_vec(),
                    found: array.shape().to_vec(),
                }
                .into());
            }
        }

        arrays.push(array);
        progress.inc(1);
    }

    Ok(stack_arrays(&arrays)?)
}

fn find_inputs(
    input_dir: &Path,
    extension: &str,
    config: &MergeConfig,
    pattern: Option<&Regex>,
) -> Result<Vec<PathBuf>> {
    let files = list_files(input_dir, extension, pattern, config.sort_files).with_context(|| {
        format!("listing .{} files in '{}'", extension, input_dir.display())
    })?;

    if !config.sort_files {
        warn!("Stacking in directory order; trial order may differ between machines");
    }

    if files.is_empty() {
        return Err(MergeError::NoFilesFound {
            folder: input_dir.to_path_buf(),
            extension: extension.to_string(),
        }
        .into());
    }

    Ok(files)
}

/// Stack every `.npy` file in `input_dir`.
///
/// N files of shape `S` give an array of shape `(N, S...)`, in file order
/// (name order unless `config.sort_files` is off).
pub fn merge_npy_files(
    input_dir: &Path,
    config: &MergeConfig,
    pattern: Option<&Regex>,
    progress: &ProgressBar,
) -> Result<(ArrayD<f64>, Vec<PathBuf>)> {
    let files = find_inputs(input_dir, "npy", config, pattern)?;

    let merged = stack_files(&files, progress, |path| {
        load_npy(path).with_context(|| format!("loading trial array '{}'", path.display()))
    })?;

    Ok((merged, files))
}

/// Extract `variable` from every `.mat` file in `input_dir`, squeeze away
/// singleton axes, and stack.
///
/// A `(1, T)` position trace per trial gives `(N, T)` overall.
pub fn merge_mat_files(
    input_dir: &Path,
    variable: &str,
    config: &MergeConfig,
    pattern: Option<&Regex>,
    progress: &ProgressBar,
) -> Result<(ArrayD<f64>, Vec<PathBuf>)> {
    let files = find_inputs(input_dir, "mat", config, pattern)?;

    let merged = stack_files(&files, progress, |path| {
        let array = load_mat_variable(path, variable).with_context(|| {
            format!("loading '{}' from '{}'", variable, path.display())
        })?;
        Ok(squeeze(array))
    })?;

    Ok((merged, files))
}

/// Write a merged array and summarize it.
pub fn save_merged(output: &Path, merged: &ArrayD<f64>, files: Vec<PathBuf>) -> Result<MergeSummary> {
    write_npy(output, merged)
        .with_context(|| format!("saving merged array '{}'", output.display()))?;
    info!(
        "Merged {} files into {:?} -> {}",
        files.len(),
        merged.shape(),
        output.display()
    );

    Ok(MergeSummary {
        files,
        shape: merged.shape().to_vec(),
    })
}
