//! Data loaders for per-trial array, table and metadata files.
//!
//! This module provides readers for:
//! - NumPy `.npy` arrays of any numeric (or bool) dtype, promoted to `f64`
//! - MATLAB level-5 `.mat` files, one named variable at a time
//! - Delimited CSV tables with a header row
//! - JSON metadata sidecars
//!
//! It also owns directory enumeration, since every multi-file command
//! starts by listing the trial files it is going to read.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use matfile::{MatFile, NumericData};
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use ndarray_npy::{read_npy, ReadNpyError, ReadableElement};
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error on '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parsing error in '{path}'")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("NPY read error in '{path}'")]
    Npy {
        path: PathBuf,
        #[source]
        source: ReadNpyError,
    },

    #[error("Unsupported NPY dtype in '{0}': expected a numeric or bool array")]
    UnsupportedDtype(PathBuf),

    #[error("Invalid MAT file '{path}': {message}")]
    InvalidMat { path: PathBuf, message: String },

    #[error("Variable '{name}' not found in '{path}'")]
    MissingVariable { path: PathBuf, name: String },

    #[error("Variable '{name}' in '{path}' holds complex data")]
    ComplexData { path: PathBuf, name: String },

    #[error("JSON parsing error in '{path}'")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Metadata file '{0}' does not contain a JSON object")]
    NotAnObject(PathBuf),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> LoaderError {
    let path = path.to_path_buf();
    move |source| LoaderError::Io { path, source }
}

/// In-memory CSV table.
///
/// Cells are kept as the text found in the file, so rows that pass through
/// a filter or a concatenation are written back unchanged. `row_labels`
/// holds the row number each row had inside the file it was read from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Column names from the header row.
    pub headers: StringRecord,
    /// Data rows, each with `headers.len()` fields.
    pub rows: Vec<StringRecord>,
    /// Per-file row number of each entry in `rows`.
    pub row_labels: Vec<usize>,
}

impl Table {
    /// Creates an empty table with the given header row.
    pub fn new(headers: StringRecord) -> Self {
        Self {
            headers,
            rows: Vec::new(),
            row_labels: Vec::new(),
        }
    }

    /// Returns the number of data rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no data rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the named column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Appends a row together with its source row label.
    #[inline]
    pub fn push_row(&mut self, label: usize, row: StringRecord) {
        self.row_labels.push(label);
        self.rows.push(row);
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, index: usize) -> Vec<&str> {
        self.rows
            .iter()
            .map(|row| row.get(index).unwrap_or(""))
            .collect()
    }
}

/// Load a NumPy `.npy` file as an `f64` array.
///
/// Floating point, integer and bool arrays are accepted and promoted to
/// `f64`. Both C and Fortran ordered files are supported.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, its header is malformed,
/// or its dtype is not numeric.
pub fn load_npy<P: AsRef<Path>>(path: P) -> Result<ArrayD<f64>> {
    let path = path.as_ref();

    if let Some(array) = read_promoted(path, |v: &f64| *v)? {
        return Ok(array);
    }
    if let Some(array) = read_promoted(path, |v: &f32| f64::from(*v))? {
        return Ok(array);
    }
    if let Some(array) = read_promoted(path, |v: &i64| *v as f64)? {
        return Ok(array);
    }
    if let Some(array) = read_promoted(path, |v: &i32| f64::from(*v))? {
        return Ok(array);
    }
    if let Some(array) = read_promoted(path, |v: &i16| f64::from(*v))? {
        return Ok(array);
    }
    if let Some(array) = read_promoted(path, |v: &i8| f64::from(*v))? {
        return Ok(array);
    }
    if let Some(array) = read_promoted(path, |v: &u64| *v as f64)? {
        return Ok(array);
    }
    if let Some(array) = read_promoted(path, |v: &u32| f64::from(*v))? {
        return Ok(array);
    }
    if let Some(array) = read_promoted(path, |v: &u16| f64::from(*v))? {
        return Ok(array);
    }
    if let Some(array) = read_promoted(path, |v: &u8| f64::from(*v))? {
        return Ok(array);
    }
    if let Some(array) = read_promoted(path, |v: &bool| if *v { 1.0 } else { 0.0 })? {
        return Ok(array);
    }

    Err(LoaderError::UnsupportedDtype(path.to_path_buf()))
}

/// Read `path` as an array of `T`, returning `None` when the stored dtype
/// is not `T`.
fn read_promoted<T, F>(path: &Path, convert: F) -> Result<Option<ArrayD<f64>>>
where
    T: ReadableElement,
    F: Fn(&T) -> f64,
{
    match read_npy::<_, ArrayD<T>>(path) {
        Ok(array) => Ok(Some(array.map(convert))),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(ReadNpyError::Io(source)) => Err(LoaderError::Io {
            path: path.to_path_buf(),
            source,
        }),
        Err(source) => Err(LoaderError::Npy {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Load one named variable from a MATLAB level-5 `.mat` file.
///
/// MATLAB stores matrices column-major; the returned array is row-major
/// with the same logical shape (at least two dimensions, as MATLAB
/// reports them). Integer and single precision data are promoted to `f64`.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed, the variable is absent,
/// or the variable holds complex values.
pub fn load_mat_variable<P: AsRef<Path>>(path: P, name: &str) -> Result<ArrayD<f64>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(io_error(path))?;

    let mat = MatFile::parse(BufReader::new(file)).map_err(|e| LoaderError::InvalidMat {
        path: path.to_path_buf(),
        message: format!("{e:?}"),
    })?;

    let array = mat
        .find_by_name(name)
        .ok_or_else(|| LoaderError::MissingVariable {
            path: path.to_path_buf(),
            name: name.to_string(),
        })?;

    let values = match array.data() {
        NumericData::Double { real, imag } => real_values(path, name, real, imag, |v| v)?,
        NumericData::Single { real, imag } => real_values(path, name, real, imag, f64::from)?,
        NumericData::Int64 { real, imag } => real_values(path, name, real, imag, |v| v as f64)?,
        NumericData::UInt64 { real, imag } => real_values(path, name, real, imag, |v| v as f64)?,
        NumericData::Int32 { real, imag } => real_values(path, name, real, imag, f64::from)?,
        NumericData::UInt32 { real, imag } => real_values(path, name, real, imag, f64::from)?,
        NumericData::Int16 { real, imag } => real_values(path, name, real, imag, f64::from)?,
        NumericData::UInt16 { real, imag } => real_values(path, name, real, imag, f64::from)?,
        NumericData::Int8 { real, imag } => real_values(path, name, real, imag, f64::from)?,
        NumericData::UInt8 { real, imag } => real_values(path, name, real, imag, f64::from)?,
    };

    let dims: Vec<usize> = array.size().to_vec();
    let column_major = ArrayD::from_shape_vec(IxDyn(&dims).f(), values).map_err(|e| {
        LoaderError::InvalidMat {
            path: path.to_path_buf(),
            message: format!("variable '{name}' has inconsistent dimensions {dims:?}: {e}"),
        }
    })?;

    Ok(column_major.as_standard_layout().into_owned())
}

fn real_values<T: Copy>(
    path: &Path,
    name: &str,
    real: &[T],
    imag: &Option<Vec<T>>,
    convert: impl Fn(T) -> f64,
) -> Result<Vec<f64>> {
    if imag.is_some() {
        return Err(LoaderError::ComplexData {
            path: path.to_path_buf(),
            name: name.to_string(),
        });
    }
    Ok(real.iter().map(|&v| convert(v)).collect())
}

/// Load a CSV file with a header row into a [`Table`].
///
/// Every data row must have as many fields as the header.
///
/// # Errors
///
/// Returns an error if the file cannot be read, has no header row, or
/// contains a row of the wrong width.
pub fn load_csv_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(io_error(path))?;

    let csv_error = |source: csv::Error| LoaderError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(file));

    let headers = reader.headers().map_err(csv_error)?.clone();
    if headers.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    let mut table = Table::new(headers);
    for (label, result) in reader.records().enumerate() {
        let record = result.map_err(csv_error)?;
        table.push_row(label, record);
    }

    Ok(table)
}

/// Load a JSON metadata sidecar as a key-value map.
pub fn load_metadata<P: AsRef<Path>>(path: P) -> Result<Map<String, Value>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(io_error(path))?;

    let root: Value = serde_json::from_str(&text).map_err(|source| LoaderError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    match root {
        Value::Object(map) => Ok(map),
        _ => Err(LoaderError::NotAnObject(path.to_path_buf())),
    }
}

/// List the files in `dir` with the given extension.
///
/// Behaves like the shell glob `*.<extension>`: the extension match is
/// case-sensitive and hidden files (names starting with `.`, such as
/// `._trial_01.csv` resource forks) are skipped.
///
/// When `pattern` is given, only file names it matches are kept. With
/// `sorted` the result is ordered by path; otherwise it follows the order
/// the directory listing returns, which is platform dependent.
pub fn list_files(
    dir: &Path,
    extension: &str,
    pattern: Option<&Regex>,
    sorted: bool,
) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(LoaderError::DirectoryNotFound(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_error(dir))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            let visible = path
                .file_name()
                .map(|name| !name.to_string_lossy().starts_with('.'))
                .unwrap_or(false);
            visible
                && path.is_file()
                && path.extension().map(|ext| ext == extension).unwrap_or(false)
        })
        .filter(|path| match pattern {
            Some(re) => path
                .file_name()
                .map(|name| re.is_match(&name.to_string_lossy()))
                .unwrap_or(false),
            None => true,
        })
        .collect();

    if sorted {
        files.sort();
    }

    Ok(files)
}
